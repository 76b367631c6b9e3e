// src/db/models.rs

//! Data models for catalog database entities
//!
//! This module defines Rust structs that correspond to database tables
//! and provides methods for creating, reading, and deleting records.

use crate::error::{Error, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Repository represents a source of packages, unique by URL
#[derive(Debug, Clone)]
pub struct Repository {
    pub id: Option<i64>,
    pub url: String,
    pub public: bool,
    pub last_sync: Option<String>,
    pub created_at: Option<String>,
}

impl Repository {
    /// Create a new Repository
    pub fn new(url: String) -> Self {
        Self {
            id: None,
            url,
            public: false,
            last_sync: None,
            created_at: None,
        }
    }

    /// Insert this repository into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO repositories (url, public) VALUES (?1, ?2)",
            params![&self.url, self.public as i32],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Find a repository by ID
    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, url, public, last_sync, created_at FROM repositories WHERE id = ?1",
        )?;

        let repo = stmt.query_row([id], Self::from_row).optional()?;

        Ok(repo)
    }

    /// Find a repository by its exact URL
    pub fn find_by_url(conn: &Connection, url: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, url, public, last_sync, created_at FROM repositories WHERE url = ?1",
        )?;

        let repo = stmt.query_row([url], Self::from_row).optional()?;

        Ok(repo)
    }

    /// List all repositories
    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, url, public, last_sync, created_at FROM repositories ORDER BY url",
        )?;

        let repos = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(repos)
    }

    /// Record that the repository was just reconciled
    pub fn touch_last_sync(conn: &Connection, id: i64, timestamp: &str) -> Result<()> {
        conn.execute(
            "UPDATE repositories SET last_sync = ?1 WHERE id = ?2",
            params![timestamp, id],
        )?;
        Ok(())
    }

    /// Delete a repository row; memberships and configurations cascade
    ///
    /// Packages left without a repository stay behind. Use
    /// `catalog::remove_repository`, which collects them in the same
    /// transaction.
    pub(crate) fn delete(conn: &Connection, id: i64) -> Result<()> {
        conn.execute("DELETE FROM repositories WHERE id = ?1", [id])?;
        Ok(())
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            url: row.get(1)?,
            public: row.get::<_, i32>(2)? != 0,
            last_sync: row.get(3)?,
            created_at: row.get(4)?,
        })
    }
}

/// An organization's configuration pointing at a shared Repository
#[derive(Debug, Clone)]
pub struct RepositoryConfig {
    pub id: Option<i64>,
    pub name: String,
    pub org_id: String,
    pub repository_id: i64,
    pub created_at: Option<String>,
}

impl RepositoryConfig {
    /// Create a new RepositoryConfig
    pub fn new(name: String, org_id: String, repository_id: i64) -> Self {
        Self {
            id: None,
            name,
            org_id,
            repository_id,
            created_at: None,
        }
    }

    /// Insert this configuration into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO repository_configurations (name, org_id, repository_id)
             VALUES (?1, ?2, ?3)",
            params![&self.name, &self.org_id, &self.repository_id],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Find a configuration by ID
    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, name, org_id, repository_id, created_at
             FROM repository_configurations WHERE id = ?1",
        )?;

        let config = stmt.query_row([id], Self::from_row).optional()?;

        Ok(config)
    }

    /// List the configurations owned by an organization
    pub fn find_by_org(conn: &Connection, org_id: &str) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, name, org_id, repository_id, created_at
             FROM repository_configurations WHERE org_id = ?1 ORDER BY name",
        )?;

        let configs = stmt
            .query_map([org_id], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(configs)
    }

    /// Whether `org_id` owns the configuration `id`
    pub fn is_owned(conn: &Connection, org_id: &str, id: i64) -> Result<bool> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM repository_configurations WHERE org_id = ?1 AND id = ?2",
            params![org_id, id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            name: row.get(1)?,
            org_id: row.get(2)?,
            repository_id: row.get(3)?,
            created_at: row.get(4)?,
        })
    }
}

/// Attributes of a package as described by a manifest entry
///
/// This is also the shape of a candidate row for the package store:
/// everything but the identifier, which the database assigns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageAttributes {
    pub name: String,
    #[serde(alias = "arch")]
    pub architecture: String,
    pub version: String,
    pub release: String,
    #[serde(default)]
    pub epoch: i32,
    /// Content checksum, `ALGO:hexdigest`
    pub checksum: String,
    #[serde(default)]
    pub summary: String,
}

impl PackageAttributes {
    /// Reject entries that cannot be stored
    pub fn validate(&self) -> Result<()> {
        if self.checksum.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "package {} has an empty checksum",
                self.name
            )));
        }
        Ok(())
    }
}

/// A stored, globally deduplicated package
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Package {
    pub id: i64,
    pub name: String,
    pub architecture: String,
    pub version: String,
    pub release: String,
    pub epoch: i32,
    pub checksum: String,
    pub summary: String,
}

const PACKAGE_COLUMNS: &str =
    "packages.id, packages.name, packages.architecture, packages.version, packages.release,
     packages.epoch, packages.checksum, packages.summary";

impl Package {
    /// Find a package by its content checksum
    pub fn find_by_checksum(conn: &Connection, checksum: &str) -> Result<Option<Self>> {
        let sql = format!("SELECT {} FROM packages WHERE checksum = ?1", PACKAGE_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;

        let package = stmt.query_row([checksum], Self::from_row).optional()?;

        Ok(package)
    }

    /// Find a package by ID
    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let sql = format!("SELECT {} FROM packages WHERE id = ?1", PACKAGE_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;

        let package = stmt.query_row([id], Self::from_row).optional()?;

        Ok(package)
    }

    /// Packages belonging to a repository, in insertion order, windowed
    pub fn find_by_repository(
        conn: &Connection,
        repository_id: i64,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Self>> {
        let sql = format!(
            "SELECT {} FROM packages
             INNER JOIN repositories_packages ON repositories_packages.package_id = packages.id
             WHERE repositories_packages.repository_id = ?1
             ORDER BY packages.id
             LIMIT ?2 OFFSET ?3",
            PACKAGE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;

        let packages = stmt
            .query_map(
                params![repository_id, limit as i64, offset as i64],
                Self::from_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(packages)
    }

    /// Number of packages belonging to a repository
    pub fn count_by_repository(conn: &Connection, repository_id: i64) -> Result<i64> {
        let count = conn.query_row(
            "SELECT COUNT(*) FROM repositories_packages WHERE repository_id = ?1",
            [repository_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Number of stored packages across all repositories
    pub fn count(conn: &Connection) -> Result<i64> {
        let count = conn.query_row("SELECT COUNT(*) FROM packages", [], |row| row.get(0))?;
        Ok(count)
    }

    /// `epoch:version-release`, with the epoch omitted when zero
    pub fn evr(&self) -> String {
        if self.epoch == 0 {
            format!("{}-{}", self.version, self.release)
        } else {
            format!("{}:{}-{}", self.epoch, self.version, self.release)
        }
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            architecture: row.get(2)?,
            version: row.get(3)?,
            release: row.get(4)?,
            epoch: row.get(5)?,
            checksum: row.get(6)?,
            summary: row.get(7)?,
        })
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}.{}", self.name, self.evr(), self.architecture)
    }
}
