// src/catalog/mod.rs

//! Package catalog engine
//!
//! This module provides functionality for:
//! - Storing package records deduplicated by checksum
//! - Reconciling a repository's membership against a fresh manifest
//! - Collecting packages no repository references anymore, after a sync or
//!   when a repository is removed
//! - Listing and searching the catalog

mod orphans;
mod query;
mod reconcile;
mod store;

pub use orphans::collect_orphans;
pub use query::{PackagePage, SearchHit, SearchRequest, list, search};
pub use reconcile::{ReconcileReport, reconcile};
pub use store::{PackageStore, StoreOptions};

use crate::db;
use crate::db::models::{Repository, RepositoryConfig};
use crate::error::{Error, Result};
use rusqlite::Connection;
use tracing::info;

/// Register a repository by URL
pub fn add_repository(conn: &Connection, url: String, public: bool) -> Result<Repository> {
    if url.is_empty() {
        return Err(Error::InvalidArgument("url can not be empty".to_string()));
    }
    if Repository::find_by_url(conn, &url)?.is_some() {
        return Err(Error::Conflict(format!("Repository '{}' already exists", url)));
    }

    let mut repo = Repository::new(url);
    repo.public = public;
    repo.insert(conn)?;

    info!("Added repository: {} (public: {})", repo.url, repo.public);
    Ok(repo)
}

/// Give an organization its own configuration of an existing repository
pub fn add_repository_config(
    conn: &Connection,
    org_id: String,
    name: String,
    repository_id: i64,
) -> Result<RepositoryConfig> {
    if org_id.is_empty() || name.is_empty() {
        return Err(Error::InvalidArgument(
            "org_id and name can not be empty".to_string(),
        ));
    }
    if Repository::find_by_id(conn, repository_id)?.is_none() {
        return Err(Error::NotFound(format!(
            "Repository {} not found",
            repository_id
        )));
    }

    let mut config = RepositoryConfig::new(name, org_id, repository_id);
    config.insert(conn)?;

    info!(
        "Added repository configuration '{}' for org {} -> repository {}",
        config.name, config.org_id, repository_id
    );
    Ok(config)
}

/// Delete a repository along with its memberships and configurations
///
/// Packages that belonged to no other repository are collected in the same
/// transaction. Returns how many were removed.
pub fn remove_repository(
    conn: &mut Connection,
    store: &PackageStore,
    repository_id: i64,
) -> Result<usize> {
    let repo = Repository::find_by_id(conn, repository_id)?
        .ok_or_else(|| Error::NotFound(format!("Repository {} not found", repository_id)))?;

    let orphans_removed = db::transaction(conn, |tx| {
        let package_ids = reconcile::current_package_ids(tx, repository_id)?;
        Repository::delete(tx, repository_id)?;
        collect_orphans(tx, &package_ids, store.chunk_rows(1))
    })?;

    info!(
        "Removed repository {} ({}), {} orphans removed",
        repository_id, repo.url, orphans_removed
    );
    Ok(orphans_removed)
}
