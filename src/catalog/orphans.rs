// src/catalog/orphans.rs

//! Removal of packages no repository references anymore

use super::store::placeholders;
use crate::error::{Error, Result};
use rusqlite::Connection;
use std::collections::HashSet;
use tracing::debug;

/// Delete the candidates that are left with zero memberships
///
/// Only packages that just lost a membership can have become dangling, so the
/// check is limited to `candidates`. Returns the number of packages deleted.
pub fn collect_orphans(conn: &Connection, candidates: &HashSet<i64>, chunk_size: usize) -> Result<usize> {
    if candidates.is_empty() {
        return Ok(0);
    }

    let mut ids: Vec<i64> = candidates.iter().copied().collect();
    ids.sort_unstable();

    let mut removed = 0;
    for chunk in ids.chunks(chunk_size.max(1)) {
        let sql = format!(
            "DELETE FROM packages
             WHERE id IN ({})
               AND NOT EXISTS (
                   SELECT 1 FROM repositories_packages
                   WHERE repositories_packages.package_id = packages.id
               )",
            placeholders(chunk.len())
        );
        removed += conn
            .execute(&sql, rusqlite::params_from_iter(chunk.iter()))
            .map_err(Error::query("delete dangling packages"))?;
    }

    debug!(
        "Collected {} orphaned packages out of {} candidates",
        removed,
        ids.len()
    );
    Ok(removed)
}
