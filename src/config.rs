// src/config.rs

//! Runtime settings
//!
//! Settings come from an optional TOML file, overridden by environment
//! variables prefixed with `PKGCATALOG` (nested keys separated by `__`):
//!
//! ```toml
//! paged_insert_limit = 1000
//!
//! [database]
//! path = "/var/lib/pkgcatalog/catalog.db"
//! ```

use crate::error::Result;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Chunk size used when neither the store nor the settings give a positive one
///
/// Larger configured values are honored only up to SQLite's host-parameter
/// limit: a package insert binds 7 parameters per row, so at most 4680 rows
/// go into one statement whatever is configured.
pub const DEFAULT_PAGED_INSERT_LIMIT: usize = 500;

/// Database path used when the settings do not name one
pub const DEFAULT_DB_PATH: &str = "/var/lib/pkgcatalog/catalog.db";

const ENV_PREFIX: &str = "PKGCATALOG";

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Database {
    pub path: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Settings {
    /// Rows per statement for batched package inserts and checksum lookups.
    /// Non-positive values fall back to the default.
    pub paged_insert_limit: Option<i64>,
    #[serde(default)]
    pub database: Database,
}

impl Settings {
    /// Load settings from `config_file` (if given) and the environment
    pub fn new(config_file: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = config_file {
            builder = builder.add_source(File::from(path));
        }
        let s = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;
        Ok(s.try_deserialize()?)
    }

    /// The database path, falling back to the system default
    pub fn db_path(&self) -> &str {
        self.database.path.as_deref().unwrap_or(DEFAULT_DB_PATH)
    }

    /// Chunk size after applying an optional per-store override
    ///
    /// The override wins over the settings value; whichever is chosen must be
    /// positive or the default is used instead.
    pub fn effective_paged_insert_limit(&self, store_override: Option<i64>) -> usize {
        match store_override.or(self.paged_insert_limit) {
            Some(value) if value > 0 => value as usize,
            _ => DEFAULT_PAGED_INSERT_LIMIT,
        }
    }
}
