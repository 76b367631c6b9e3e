// src/error.rs

use thiserror::Error;

/// Core error types for the package catalog
#[derive(Error, Debug)]
pub enum Error {
    /// A required string or collection argument was empty
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Unknown repository or repository configuration
    #[error("Not found: {0}")]
    NotFound(String),

    /// The caller's organization does not own the repository configuration
    #[error("Repository configuration {0} is not owned")]
    NotOwned(i64),

    /// A store write failed before any of its chunks completed
    #[error("Insert failed while trying to {step}: {source}")]
    InsertFailed {
        step: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    /// A store read or delete failed
    #[error("Query failed while trying to {step}: {source}")]
    QueryFailed {
        step: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    /// A batched insert failed after some chunks had been written
    #[error("Batch insert stopped after {inserted} new rows: {source}")]
    PartialReconciliation {
        inserted: usize,
        #[source]
        source: rusqlite::Error,
    },

    /// Entity already exists
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Manifest could not be parsed
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Database initialization error
    #[error("Failed to initialize database: {0}")]
    InitError(String),

    /// Database not found
    #[error("Database not found at path: {0}")]
    DatabaseNotFound(String),
}

impl Error {
    /// Wrap a store read/delete failure with the step it happened in
    pub(crate) fn query(step: &'static str) -> impl FnOnce(rusqlite::Error) -> Self {
        move |source| Error::QueryFailed { step, source }
    }

    /// Wrap a store write failure with the step it happened in
    pub(crate) fn insert(step: &'static str) -> impl FnOnce(rusqlite::Error) -> Self {
        move |source| Error::InsertFailed { step, source }
    }
}

/// Result type alias using the catalog's Error type
pub type Result<T> = std::result::Result<T, Error>;
