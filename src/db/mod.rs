// src/db/mod.rs

//! Database layer for the package catalog
//!
//! This module handles all SQLite operations including:
//! - Database initialization and schema creation
//! - Connection management
//! - Transaction handling

pub mod models;
pub mod schema;

use crate::error::{Error, Result};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::Path;
use tracing::{debug, info};

/// Initialize a catalog database at the specified path
///
/// Creates the database file and brings the schema up to date.
/// This is idempotent - calling it on an existing database is safe.
///
/// # Arguments
///
/// * `db_path` - Path where the database should be created
pub fn init(db_path: &str) -> Result<()> {
    debug!("Initializing database at: {}", db_path);

    // Create parent directories if they don't exist
    if let Some(parent) = Path::new(db_path).parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| Error::InitError(format!("Failed to create database directory: {}", e)))?;
    }

    let conn = Connection::open(db_path)?;

    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA busy_timeout = 5000;
        ",
    )?;

    schema::migrate(&conn)?;

    info!("Database initialized successfully");
    Ok(())
}

/// Open an existing catalog database
///
/// # Arguments
///
/// * `db_path` - Path to the database file
pub fn open(db_path: &str) -> Result<Connection> {
    if !Path::new(db_path).exists() {
        return Err(Error::DatabaseNotFound(db_path.to_string()));
    }

    let conn = Connection::open(db_path)?;

    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;
        PRAGMA busy_timeout = 5000;
        ",
    )?;

    Ok(conn)
}

/// Run `f` inside a single write transaction
///
/// The transaction commits when `f` returns `Ok` and rolls back otherwise,
/// so either all of its writes land or none do.
///
/// The write lock is taken up front (`BEGIN IMMEDIATE`); concurrent writers
/// queue on `busy_timeout` instead of failing on a lock upgrade.
pub fn transaction<T, F>(conn: &mut Connection, f: F) -> Result<T>
where
    F: FnOnce(&Transaction) -> Result<T>,
{
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    match f(&tx) {
        Ok(value) => {
            tx.commit()?;
            Ok(value)
        }
        Err(e) => {
            debug!("Rolling back transaction: {}", e);
            // Dropping the transaction rolls it back
            drop(tx);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_init_creates_database() {
        let temp_file = NamedTempFile::new().unwrap();
        let db_path = temp_file.path().to_str().unwrap().to_string();

        // Remove the temp file so init can create it
        drop(temp_file);

        let result = init(&db_path);
        assert!(result.is_ok());
        assert!(Path::new(&db_path).exists());
    }

    #[test]
    fn test_init_applies_schema() {
        let temp_file = NamedTempFile::new().unwrap();
        let db_path = temp_file.path().to_str().unwrap();

        init(db_path).unwrap();
        let conn = open(db_path).unwrap();

        let version = schema::get_schema_version(&conn).unwrap();
        assert_eq!(version, schema::SCHEMA_VERSION);
    }

    #[test]
    fn test_open_nonexistent_database() {
        let result = open("/nonexistent/path/catalog.db");
        assert!(result.is_err());
        assert!(matches!(result.unwrap_err(), Error::DatabaseNotFound(_)));
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let temp_file = NamedTempFile::new().unwrap();
        let db_path = temp_file.path().to_str().unwrap();
        init(db_path).unwrap();
        let mut conn = open(db_path).unwrap();

        let result: Result<()> = transaction(&mut conn, |tx| {
            tx.execute(
                "INSERT INTO repositories (url, public) VALUES ('https://example.com/repo', 0)",
                [],
            )?;
            Err(Error::InvalidArgument("abort".to_string()))
        });
        assert!(result.is_err());

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM repositories", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_transaction_takes_write_lock_immediately() {
        let temp_file = NamedTempFile::new().unwrap();
        let db_path = temp_file.path().to_str().unwrap();
        init(db_path).unwrap();
        let mut conn = open(db_path).unwrap();
        let other = open(db_path).unwrap();
        other.busy_timeout(std::time::Duration::ZERO).unwrap();

        transaction(&mut conn, |_tx| {
            // No statement has run yet, the lock is already held
            let blocked = other.execute(
                "INSERT INTO repositories (url, public) VALUES ('https://example.com/other', 0)",
                [],
            );
            assert!(blocked.is_err());
            Ok(())
        })
        .unwrap();

        other
            .execute(
                "INSERT INTO repositories (url, public) VALUES ('https://example.com/other', 0)",
                [],
            )
            .unwrap();
    }

    #[test]
    fn test_transaction_commits_on_success() {
        let temp_file = NamedTempFile::new().unwrap();
        let db_path = temp_file.path().to_str().unwrap();
        init(db_path).unwrap();
        let mut conn = open(db_path).unwrap();

        let id = transaction(&mut conn, |tx| {
            tx.execute(
                "INSERT INTO repositories (url, public) VALUES ('https://example.com/repo', 1)",
                [],
            )?;
            Ok(tx.last_insert_rowid())
        })
        .unwrap();
        assert!(id > 0);

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM repositories", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }
}
