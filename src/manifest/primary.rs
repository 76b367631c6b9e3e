// src/manifest/primary.rs

//! RPM repodata primary.xml parser
//!
//! Each `<package type="rpm">` element becomes one manifest entry. The
//! checksum is stored as `ALGO:hexdigest` with the algorithm upper-cased,
//! e.g. `SHA256:6c2f...`.

use crate::db::models::PackageAttributes;
use crate::error::{Error, Result};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::{debug, warn};

/// Parse primary.xml content into manifest entries
///
/// Packages missing a name, version, or checksum are skipped with a warning.
pub fn parse_primary_xml(xml_content: &str) -> Result<Vec<PackageAttributes>> {
    let mut reader = Reader::from_str(xml_content);
    reader.trim_text(true);

    let mut packages = Vec::new();
    let mut skipped = 0;
    let mut buf = Vec::new();

    let mut current_package: Option<PackageBuilder> = None;
    let mut current_tag = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let tag_name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if tag_name == "package" {
                    current_package = Some(PackageBuilder::default());
                } else if let Some(ref mut pkg) = current_package {
                    pkg.apply_attributes(&tag_name, &e);
                }
                current_tag = tag_name;
            }
            Ok(Event::Empty(e)) => {
                if let Some(ref mut pkg) = current_package {
                    let tag_name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                    pkg.apply_attributes(&tag_name, &e);
                }
            }
            Ok(Event::Text(e)) => {
                if let Some(ref mut pkg) = current_package {
                    let text = e
                        .unescape()
                        .map_err(|err| Error::ParseError(format!("Invalid text in primary.xml: {}", err)))?
                        .to_string();
                    pkg.set_text(&current_tag, text);
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(ref mut pkg) = current_package {
                    let text = String::from_utf8(e.into_inner().into_owned())
                        .map_err(|err| Error::ParseError(format!("Invalid CDATA in primary.xml: {}", err)))?;
                    pkg.set_text(&current_tag, text);
                }
            }
            Ok(Event::End(e)) => {
                if e.name().as_ref() == b"package" {
                    if let Some(builder) = current_package.take() {
                        match builder.build()? {
                            Some(pkg) => packages.push(pkg),
                            None => skipped += 1,
                        }
                    }
                }
                current_tag.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::ParseError(format!(
                    "Failed to parse primary.xml at position {}: {}",
                    reader.buffer_position(),
                    e
                )));
            }
            _ => {}
        }
        buf.clear();
    }

    if skipped > 0 {
        warn!("Skipped {} incomplete package entries in primary.xml", skipped);
    }
    debug!("Parsed {} packages from primary.xml", packages.len());
    Ok(packages)
}

/// Fields collected for one `<package>` element
#[derive(Default)]
struct PackageBuilder {
    name: Option<String>,
    arch: Option<String>,
    epoch: Option<String>,
    ver: Option<String>,
    rel: Option<String>,
    checksum: Option<String>,
    checksum_type: Option<String>,
    summary: Option<String>,
}

impl PackageBuilder {
    fn apply_attributes(&mut self, tag_name: &str, e: &BytesStart) {
        for attr in e.attributes().filter_map(|a| a.ok()) {
            let key = String::from_utf8_lossy(attr.key.as_ref());
            let value = String::from_utf8_lossy(&attr.value).to_string();
            match (tag_name, key.as_ref()) {
                ("version", "epoch") => self.epoch = Some(value),
                ("version", "ver") => self.ver = Some(value),
                ("version", "rel") => self.rel = Some(value),
                ("checksum", "type") => self.checksum_type = Some(value),
                _ => {}
            }
        }
    }

    fn set_text(&mut self, tag_name: &str, text: String) {
        match tag_name {
            "name" => self.name = Some(text),
            "arch" => self.arch = Some(text),
            "summary" => self.summary = Some(text),
            "checksum" => self.checksum = Some(text),
            _ => {}
        }
    }

    /// `Ok(None)` for an incomplete package, `Err` for a malformed one
    fn build(self) -> Result<Option<PackageAttributes>> {
        let (Some(name), Some(version), Some(digest)) = (self.name, self.ver, self.checksum) else {
            return Ok(None);
        };

        let epoch = match self.epoch.as_deref() {
            None | Some("") => 0,
            Some(raw) => raw.parse::<i32>().map_err(|e| {
                Error::ParseError(format!("Invalid epoch '{}' for {}: {}", raw, name, e))
            })?,
        };

        let checksum = match self.checksum_type {
            Some(algo) => format!("{}:{}", algo.to_ascii_uppercase(), digest),
            None => digest,
        };

        Ok(Some(PackageAttributes {
            name,
            architecture: self.arch.unwrap_or_default(),
            version,
            release: self.rel.unwrap_or_default(),
            epoch,
            checksum,
            summary: self.summary.unwrap_or_default(),
        }))
    }
}
