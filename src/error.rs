//! Error types for the mstables data-access layer.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The schema catalog file could not be read.
    #[error("failed to read schema catalog {path}: {source}")]
    CatalogIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The schema catalog file is not valid JSON of the expected shape.
    #[error("malformed schema catalog: {0}")]
    CatalogParse(#[from] serde_json::Error),

    /// A table was requested that the schema catalog does not describe.
    #[error("table '{0}' is not present in the schema catalog")]
    UnknownTable(String),

    /// A table is missing a column the facade relies on.
    #[error("table '{table}' has no column named '{column}'")]
    MissingColumn { table: String, column: String },

    /// The stored table's shape disagrees with the schema catalog.
    ///
    /// Without this guard a mismatch would silently misalign every
    /// column label of the fetched table.
    #[error("table '{table}' returned {actual} columns, catalog expects {expected}")]
    ColumnMismatch {
        table: String,
        expected: usize,
        actual: usize,
    },

    /// A row key column held a non-integer value.
    #[error("table '{table}' row {row} has a non-integer key")]
    InvalidKey { table: String, row: usize },

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    /// A full-table query failed; carries the table name for diagnosis.
    #[error("query against table '{table}' failed: {source}")]
    Query {
        table: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("failed to close database connection: {0}")]
    Close(#[source] rusqlite::Error),
}
