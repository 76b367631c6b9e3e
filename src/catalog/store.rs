// src/catalog/store.rs

//! Content-addressed package store
//!
//! Packages are deduplicated globally by checksum. Writes are insert-or-ignore
//! on the checksum constraint and are split into chunks so a single statement
//! never exceeds SQLite's host-parameter limit.

use crate::config::{DEFAULT_PAGED_INSERT_LIMIT, Settings};
use crate::db::models::PackageAttributes;
use crate::error::{Error, Result};
use rusqlite::Connection;
use rusqlite::types::ToSql;
use std::collections::HashSet;
use tracing::debug;

/// Columns bound per candidate row
const PACKAGE_INSERT_COLUMNS: usize = 7;

/// Host parameters SQLite accepts in one statement (`SQLITE_MAX_VARIABLE_NUMBER`)
pub(crate) const MAX_SQL_VARIABLES: usize = 32766;

/// Per-store overrides of the global settings
#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    pub paged_insert_limit: Option<i64>,
}

/// Batched access to the `packages` table
#[derive(Debug, Clone)]
pub struct PackageStore {
    paged_insert_limit: usize,
}

impl PackageStore {
    /// Build a store from settings, letting `options` override them
    pub fn new(settings: &Settings, options: Option<&StoreOptions>) -> Self {
        let store_override = options.and_then(|o| o.paged_insert_limit);
        Self {
            paged_insert_limit: settings.effective_paged_insert_limit(store_override),
        }
    }

    /// Build a store with an explicit chunk size; zero means the default
    pub fn with_limit(paged_insert_limit: usize) -> Self {
        Self {
            paged_insert_limit: if paged_insert_limit == 0 {
                DEFAULT_PAGED_INSERT_LIMIT
            } else {
                paged_insert_limit
            },
        }
    }

    /// Rows per statement
    pub fn paged_insert_limit(&self) -> usize {
        self.paged_insert_limit
    }

    /// Rows per statement when each row binds `params_per_row` parameters
    ///
    /// The configured limit, lowered as needed so a statement stays within
    /// `MAX_SQL_VARIABLES` with one parameter to spare for a fixed key.
    pub(crate) fn chunk_rows(&self, params_per_row: usize) -> usize {
        let ceiling = (MAX_SQL_VARIABLES - 1) / params_per_row.max(1);
        self.paged_insert_limit.min(ceiling).max(1)
    }

    /// Insert every candidate whose checksum is not stored yet
    ///
    /// Existing rows are never overwritten and duplicate checksums inside
    /// `candidates` are no-ops. Returns the number of rows actually inserted.
    ///
    /// Stops at the first failing chunk. If earlier chunks had already been
    /// written the error is `PartialReconciliation` carrying their count.
    pub fn upsert_batch(&self, conn: &Connection, candidates: &[PackageAttributes]) -> Result<usize> {
        if candidates.is_empty() {
            return Ok(0);
        }
        for candidate in candidates {
            candidate.validate()?;
        }

        let mut inserted = 0;
        for (index, chunk) in candidates
            .chunks(self.chunk_rows(PACKAGE_INSERT_COLUMNS))
            .enumerate()
        {
            let sql = format!(
                "INSERT INTO packages (name, architecture, version, release, epoch, checksum, summary)
                 VALUES {}
                 ON CONFLICT(checksum) DO NOTHING",
                row_placeholders(chunk.len(), PACKAGE_INSERT_COLUMNS)
            );

            let mut values: Vec<&dyn ToSql> = Vec::with_capacity(chunk.len() * PACKAGE_INSERT_COLUMNS);
            for pkg in chunk {
                values.push(&pkg.name);
                values.push(&pkg.architecture);
                values.push(&pkg.version);
                values.push(&pkg.release);
                values.push(&pkg.epoch);
                values.push(&pkg.checksum);
                values.push(&pkg.summary);
            }

            match conn.execute(&sql, &*values) {
                Ok(rows) => {
                    debug!(
                        "Chunk {}: inserted {} of {} candidate packages",
                        index,
                        rows,
                        chunk.len()
                    );
                    inserted += rows;
                }
                Err(source) if index == 0 => {
                    return Err(Error::InsertFailed {
                        step: "insert packages",
                        source,
                    });
                }
                Err(source) => {
                    return Err(Error::PartialReconciliation { inserted, source });
                }
            }
        }

        Ok(inserted)
    }

    /// The subset of `checksums` already present in the store
    pub fn existing_checksums(&self, conn: &Connection, checksums: &[&str]) -> Result<HashSet<String>> {
        let unique = dedup(checksums);
        let mut found = HashSet::with_capacity(unique.len());

        for chunk in unique.chunks(self.chunk_rows(1)) {
            let sql = format!(
                "SELECT checksum FROM packages WHERE checksum IN ({})",
                placeholders(chunk.len())
            );
            let step = "look up existing checksums";
            let mut stmt = conn.prepare(&sql).map_err(Error::query(step))?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(chunk.iter()), |row| row.get::<_, String>(0))
                .map_err(Error::query(step))?;
            for checksum in rows {
                found.insert(checksum.map_err(Error::query(step))?);
            }
        }

        Ok(found)
    }

    /// Identifiers of the stored packages carrying any of `checksums`
    pub fn resolve_ids(&self, conn: &Connection, checksums: &[&str]) -> Result<HashSet<i64>> {
        let unique = dedup(checksums);
        let mut ids = HashSet::with_capacity(unique.len());

        for chunk in unique.chunks(self.chunk_rows(1)) {
            let sql = format!(
                "SELECT id FROM packages WHERE checksum IN ({})",
                placeholders(chunk.len())
            );
            let step = "resolve package ids";
            let mut stmt = conn.prepare(&sql).map_err(Error::query(step))?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(chunk.iter()), |row| row.get::<_, i64>(0))
                .map_err(Error::query(step))?;
            for id in rows {
                ids.insert(id.map_err(Error::query(step))?);
            }
        }

        Ok(ids)
    }
}

impl Default for PackageStore {
    fn default() -> Self {
        Self::with_limit(DEFAULT_PAGED_INSERT_LIMIT)
    }
}

/// `?, ?, ?` for an `IN (...)` list
pub(crate) fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// `(?, ?), (?, ?)` for a multi-row `VALUES` clause
pub(crate) fn row_placeholders(rows: usize, columns: usize) -> String {
    let row = format!("({})", placeholders(columns));
    vec![row; rows].join(", ")
}

/// Drop repeated checksums, keeping first-seen order
fn dedup<'a>(checksums: &[&'a str]) -> Vec<&'a str> {
    let mut seen = HashSet::with_capacity(checksums.len());
    checksums
        .iter()
        .copied()
        .filter(|checksum| seen.insert(*checksum))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Package;
    use crate::db::schema;
    use tempfile::NamedTempFile;

    fn create_test_db() -> (NamedTempFile, Connection) {
        let temp_file = NamedTempFile::new().unwrap();
        let conn = Connection::open(temp_file.path()).unwrap();
        conn.execute("PRAGMA foreign_keys = ON", []).unwrap();
        schema::migrate(&conn).unwrap();
        (temp_file, conn)
    }

    fn candidate(name: &str, checksum: &str) -> PackageAttributes {
        PackageAttributes {
            name: name.to_string(),
            architecture: "x86_64".to_string(),
            version: "1.0.0".to_string(),
            release: "1".to_string(),
            epoch: 0,
            checksum: checksum.to_string(),
            summary: format!("{} summary", name),
        }
    }

    fn candidates(count: usize) -> Vec<PackageAttributes> {
        (0..count)
            .map(|i| candidate(&format!("pkg-{}", i), &format!("sha256:{:04x}", i)))
            .collect()
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders(3), "?, ?, ?");
        assert_eq!(row_placeholders(2, 2), "(?, ?), (?, ?)");
    }

    #[test]
    fn test_empty_input_is_noop() {
        let (_temp, conn) = create_test_db();
        let store = PackageStore::default();

        assert_eq!(store.upsert_batch(&conn, &[]).unwrap(), 0);
        assert_eq!(Package::count(&conn).unwrap(), 0);
    }

    #[test]
    fn test_counts_only_new_rows() {
        let (_temp, conn) = create_test_db();
        let store = PackageStore::with_limit(3);
        let all = candidates(10);

        assert_eq!(store.upsert_batch(&conn, &all[..4]).unwrap(), 4);
        assert_eq!(store.upsert_batch(&conn, &all).unwrap(), 6);
        assert_eq!(Package::count(&conn).unwrap(), 10);
    }

    #[test]
    fn test_chunk_size_does_not_change_result() {
        for limit in [1, 2, 7, 500] {
            let (_temp, conn) = create_test_db();
            let store = PackageStore::with_limit(limit);
            let all = candidates(25);

            store.upsert_batch(&conn, &all[..5]).unwrap();
            assert_eq!(store.upsert_batch(&conn, &all).unwrap(), 20, "limit {}", limit);
            assert_eq!(Package::count(&conn).unwrap(), 25);
        }
    }

    #[test]
    fn test_duplicates_within_input_are_ignored() {
        let (_temp, conn) = create_test_db();
        let store = PackageStore::with_limit(2);
        let input = vec![
            candidate("a", "sha256:aa"),
            candidate("a-copy", "sha256:aa"),
            candidate("b", "sha256:bb"),
        ];

        assert_eq!(store.upsert_batch(&conn, &input).unwrap(), 2);

        // First occurrence wins, existing rows are never overwritten
        let stored = Package::find_by_checksum(&conn, "sha256:aa").unwrap().unwrap();
        assert_eq!(stored.name, "a");
        store.upsert_batch(&conn, &[candidate("renamed", "sha256:aa")]).unwrap();
        let stored = Package::find_by_checksum(&conn, "sha256:aa").unwrap().unwrap();
        assert_eq!(stored.name, "a");
    }

    #[test]
    fn test_empty_checksum_rejected_before_writing() {
        let (_temp, conn) = create_test_db();
        let store = PackageStore::default();
        let input = vec![candidate("ok", "sha256:aa"), candidate("bad", "")];

        let result = store.upsert_batch(&conn, &input);
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
        assert_eq!(Package::count(&conn).unwrap(), 0);
    }

    #[test]
    fn test_failure_after_first_chunk_is_partial() {
        let (_temp, conn) = create_test_db();
        let store = PackageStore::with_limit(2);

        // Reject one specific name so the second chunk fails
        conn.execute_batch(
            "CREATE TRIGGER reject_poison BEFORE INSERT ON packages
             WHEN NEW.name = 'poison'
             BEGIN SELECT RAISE(ABORT, 'poisoned row'); END;",
        )
        .unwrap();

        let mut input = candidates(2);
        input.push(candidate("poison", "sha256:dead"));

        match store.upsert_batch(&conn, &input) {
            Err(Error::PartialReconciliation { inserted, .. }) => assert_eq!(inserted, 2),
            other => panic!("expected partial failure, got {:?}", other),
        }
        assert_eq!(Package::count(&conn).unwrap(), 2);
    }

    #[test]
    fn test_failure_in_first_chunk_is_insert_failed() {
        let (_temp, conn) = create_test_db();
        let store = PackageStore::with_limit(2);
        conn.execute_batch(
            "CREATE TRIGGER reject_poison BEFORE INSERT ON packages
             WHEN NEW.name = 'poison'
             BEGIN SELECT RAISE(ABORT, 'poisoned row'); END;",
        )
        .unwrap();

        let result = store.upsert_batch(&conn, &[candidate("poison", "sha256:dead")]);
        assert!(matches!(result, Err(Error::InsertFailed { .. })));
    }

    #[test]
    fn test_lookups_span_chunks() {
        let (_temp, conn) = create_test_db();
        let store = PackageStore::with_limit(3);
        let all = candidates(10);
        store.upsert_batch(&conn, &all[..7]).unwrap();

        let checksums: Vec<&str> = all.iter().map(|c| c.checksum.as_str()).collect();
        let existing = store.existing_checksums(&conn, &checksums).unwrap();
        assert_eq!(existing.len(), 7);
        assert!(existing.contains("sha256:0000"));
        assert!(!existing.contains("sha256:0009"));

        let ids = store.resolve_ids(&conn, &checksums).unwrap();
        assert_eq!(ids.len(), 7);

        assert!(store.resolve_ids(&conn, &[]).unwrap().is_empty());
    }

    #[test]
    fn test_chunks_stay_within_parameter_limit() {
        let store = PackageStore::with_limit(10_000);
        assert_eq!(store.paged_insert_limit(), 10_000);
        assert_eq!(store.chunk_rows(PACKAGE_INSERT_COLUMNS), 4680);
        assert_eq!(store.chunk_rows(2), 10_000);
        assert_eq!(PackageStore::with_limit(3).chunk_rows(PACKAGE_INSERT_COLUMNS), 3);

        // 5000 rows of 7 columns would overflow a single statement
        let (_temp, conn) = create_test_db();
        let all = candidates(5000);
        assert_eq!(store.upsert_batch(&conn, &all).unwrap(), 5000);

        let checksums: Vec<&str> = all.iter().map(|c| c.checksum.as_str()).collect();
        assert_eq!(store.resolve_ids(&conn, &checksums).unwrap().len(), 5000);
    }

    #[test]
    fn test_store_from_settings() {
        let settings = Settings {
            paged_insert_limit: Some(50),
            ..Default::default()
        };
        assert_eq!(PackageStore::new(&settings, None).paged_insert_limit(), 50);

        let options = StoreOptions {
            paged_insert_limit: Some(5),
        };
        assert_eq!(PackageStore::new(&settings, Some(&options)).paged_insert_limit(), 5);
        assert_eq!(
            PackageStore::with_limit(0).paged_insert_limit(),
            DEFAULT_PAGED_INSERT_LIMIT
        );
    }
}
