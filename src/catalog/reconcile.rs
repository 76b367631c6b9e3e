// src/catalog/reconcile.rs

//! Repository membership reconciliation
//!
//! A sync hands over the full manifest of a repository. Membership is
//! recomputed from scratch against it every time, which makes the operation
//! safe to retry after any failure: a second run with the same manifest finds
//! nothing to insert, add, or remove.

use super::orphans::collect_orphans;
use super::store::{PackageStore, placeholders, row_placeholders};
use crate::db;
use crate::db::models::{PackageAttributes, Repository};
use crate::error::{Error, Result};
use rusqlite::Connection;
use rusqlite::types::ToSql;
use std::collections::HashSet;
use tracing::{debug, info};

/// What a reconciliation changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Packages new to the whole catalog, not just to this repository
    pub new_packages: usize,
    pub memberships_added: usize,
    pub memberships_removed: usize,
    pub orphans_removed: usize,
}

/// Make the membership of `repository_id` match `manifest` exactly
///
/// Missing packages are inserted into the global store first, then stale
/// memberships are dropped (collecting packages nobody references anymore)
/// and new ones added. Everything after the repository lookup runs in one
/// transaction, so a failure leaves the previous membership untouched.
pub fn reconcile(
    conn: &mut Connection,
    store: &PackageStore,
    repository_id: i64,
    manifest: &[PackageAttributes],
) -> Result<ReconcileReport> {
    let repo = Repository::find_by_id(conn, repository_id)?
        .ok_or_else(|| Error::NotFound(format!("Repository {} not found", repository_id)))?;

    for entry in manifest {
        entry.validate()?;
    }

    info!(
        "Reconciling repository {} ({}) against {} manifest entries",
        repository_id,
        repo.url,
        manifest.len()
    );

    let checksums: Vec<&str> = manifest.iter().map(|p| p.checksum.as_str()).collect();
    let lookup_rows = store.chunk_rows(1);

    let report = db::transaction(conn, |tx| {
        let existing = store.existing_checksums(tx, &checksums)?;
        let candidates = new_candidates(manifest, &existing);
        debug!(
            "{} checksums already stored, {} candidates to insert",
            existing.len(),
            candidates.len()
        );

        // Completed chunks are rolled back along with everything else
        let new_packages = store.upsert_batch(tx, &candidates).map_err(|e| match e {
            Error::PartialReconciliation { source, .. } => Error::InsertFailed {
                step: "insert packages",
                source,
            },
            other => other,
        })?;

        let desired = store.resolve_ids(tx, &checksums)?;
        let current = current_package_ids(tx, repository_id)?;

        let to_remove: HashSet<i64> = current.difference(&desired).copied().collect();
        let to_add: HashSet<i64> = desired.difference(&current).copied().collect();

        let memberships_removed = delete_memberships(tx, repository_id, &to_remove, lookup_rows)?;
        let orphans_removed = collect_orphans(tx, &to_remove, lookup_rows)?;
        let memberships_added =
            insert_memberships(tx, repository_id, &to_add, store.chunk_rows(2))?;

        Repository::touch_last_sync(tx, repository_id, &chrono::Utc::now().to_rfc3339())?;

        Ok(ReconcileReport {
            new_packages,
            memberships_added,
            memberships_removed,
            orphans_removed,
        })
    })?;

    info!(
        "Repository {}: {} new packages, +{} / -{} memberships, {} orphans removed",
        repository_id,
        report.new_packages,
        report.memberships_added,
        report.memberships_removed,
        report.orphans_removed
    );
    Ok(report)
}

/// Manifest entries whose checksum is not stored, one per checksum
fn new_candidates(manifest: &[PackageAttributes], existing: &HashSet<String>) -> Vec<PackageAttributes> {
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();
    for pkg in manifest {
        if !existing.contains(&pkg.checksum) && seen.insert(pkg.checksum.as_str()) {
            candidates.push(pkg.clone());
        }
    }
    candidates
}

/// Package ids currently associated with the repository
pub(super) fn current_package_ids(conn: &Connection, repository_id: i64) -> Result<HashSet<i64>> {
    let step = "read current memberships";
    let mut stmt = conn
        .prepare("SELECT package_id FROM repositories_packages WHERE repository_id = ?1")
        .map_err(Error::query(step))?;
    let ids = stmt
        .query_map([repository_id], |row| row.get(0))
        .map_err(Error::query(step))?
        .collect::<std::result::Result<HashSet<i64>, _>>()
        .map_err(Error::query(step))?;
    Ok(ids)
}

fn delete_memberships(
    conn: &Connection,
    repository_id: i64,
    package_ids: &HashSet<i64>,
    chunk_size: usize,
) -> Result<usize> {
    let ids = sorted(package_ids);
    let mut removed = 0;

    for chunk in ids.chunks(chunk_size) {
        let sql = format!(
            "DELETE FROM repositories_packages
             WHERE repository_id = ? AND package_id IN ({})",
            placeholders(chunk.len())
        );
        let mut values: Vec<&dyn ToSql> = Vec::with_capacity(chunk.len() + 1);
        values.push(&repository_id);
        values.extend(chunk.iter().map(|id| id as &dyn ToSql));

        removed += conn
            .execute(&sql, &*values)
            .map_err(Error::query("delete stale memberships"))?;
    }

    Ok(removed)
}

/// Insert-or-ignore on (repository_id, package_id)
fn insert_memberships(
    conn: &Connection,
    repository_id: i64,
    package_ids: &HashSet<i64>,
    chunk_size: usize,
) -> Result<usize> {
    let ids = sorted(package_ids);
    let mut added = 0;

    // Two parameters per row
    for chunk in ids.chunks(chunk_size) {
        let sql = format!(
            "INSERT INTO repositories_packages (repository_id, package_id)
             VALUES {}
             ON CONFLICT(repository_id, package_id) DO NOTHING",
            row_placeholders(chunk.len(), 2)
        );
        let mut values: Vec<&dyn ToSql> = Vec::with_capacity(chunk.len() * 2);
        for id in chunk {
            values.push(&repository_id);
            values.push(id);
        }

        added += conn
            .execute(&sql, &*values)
            .map_err(Error::insert("insert memberships"))?;
    }

    Ok(added)
}

fn sorted(ids: &HashSet<i64>) -> Vec<i64> {
    let mut ids: Vec<i64> = ids.iter().copied().collect();
    ids.sort_unstable();
    ids
}
