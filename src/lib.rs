// src/lib.rs

//! Package catalog
//!
//! Keeps a content-addressed catalog of packages and reconciles, per
//! repository, which packages currently belong to it against a freshly
//! fetched manifest.
//!
//! # Architecture
//!
//! - Database-first: all state in SQLite
//! - Packages are deduplicated globally by checksum
//! - Membership is recomputed from the full manifest on every sync, inside
//!   one transaction, so syncs can be retried at will
//! - Packages referenced by no repository are garbage-collected

pub mod catalog;
pub mod config;
pub mod db;
mod error;
pub mod manifest;

pub use error::{Error, Result};
