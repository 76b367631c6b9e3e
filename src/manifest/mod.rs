// src/manifest/mod.rs

//! Manifest loading
//!
//! A manifest is the full list of packages a repository should contain at
//! sync time. The engine does not care where it comes from; this module reads
//! the formats the CLI accepts:
//! - JSON: an array of package attribute objects
//! - RPM repodata primary.xml, plain or `.gz` / `.xz` / `.zst` compressed

pub mod primary;

use crate::db::models::PackageAttributes;
use crate::error::{Error, Result};
use flate2::read::GzDecoder;
use std::fs;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};
use xz2::read::XzDecoder;

/// Compression wrapped around a primary.xml file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Xz,
    Zstd,
}

/// On-disk manifest formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    Json,
    PrimaryXml(Compression),
}

impl ManifestFormat {
    /// Pick the format from the file name
    pub fn detect(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        if name.ends_with(".json") {
            ManifestFormat::Json
        } else if name.ends_with(".gz") {
            ManifestFormat::PrimaryXml(Compression::Gzip)
        } else if name.ends_with(".xz") {
            ManifestFormat::PrimaryXml(Compression::Xz)
        } else if name.ends_with(".zst") {
            ManifestFormat::PrimaryXml(Compression::Zstd)
        } else {
            ManifestFormat::PrimaryXml(Compression::None)
        }
    }
}

/// Read a manifest file in whichever format its name indicates
pub fn load(path: &Path) -> Result<Vec<PackageAttributes>> {
    let format = ManifestFormat::detect(path);
    debug!("Loading manifest {} as {:?}", path.display(), format);

    let bytes = fs::read(path)?;
    let packages = match format {
        ManifestFormat::Json => parse_json(&bytes)?,
        ManifestFormat::PrimaryXml(compression) => {
            let xml = decompress(&bytes, compression)?;
            primary::parse_primary_xml(&xml)?
        }
    };

    info!("Loaded {} manifest entries from {}", packages.len(), path.display());
    Ok(packages)
}

/// Parse a JSON array of package attributes
pub fn parse_json(bytes: &[u8]) -> Result<Vec<PackageAttributes>> {
    serde_json::from_slice(bytes)
        .map_err(|e| Error::ParseError(format!("Invalid JSON manifest: {}", e)))
}

/// Decompress primary.xml into a string
fn decompress(bytes: &[u8], compression: Compression) -> Result<String> {
    let mut xml = String::new();
    match compression {
        Compression::None => {
            xml = String::from_utf8(bytes.to_vec())
                .map_err(|e| Error::ParseError(format!("Invalid UTF-8 in primary.xml: {}", e)))?;
        }
        Compression::Gzip => {
            GzDecoder::new(bytes)
                .read_to_string(&mut xml)
                .map_err(|e| Error::ParseError(format!("Failed to decompress primary.xml.gz: {}", e)))?;
        }
        Compression::Xz => {
            XzDecoder::new(bytes)
                .read_to_string(&mut xml)
                .map_err(|e| Error::ParseError(format!("Failed to decompress primary.xml.xz: {}", e)))?;
        }
        Compression::Zstd => {
            let decompressed = zstd::decode_all(bytes)
                .map_err(|e| Error::ParseError(format!("Failed to decompress primary.xml.zst: {}", e)))?;
            xml = String::from_utf8(decompressed)
                .map_err(|e| Error::ParseError(format!("Invalid UTF-8 in primary.xml: {}", e)))?;
        }
    }

    debug!("Decompressed primary.xml: {} bytes", xml.len());
    Ok(xml)
}
