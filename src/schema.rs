//! Schema catalog: table name to ordered column list, read from the
//! tables.json descriptor that ships with the mstables database.
//!
//! The descriptor is a JSON object of objects, `{"Table": {"col": "TYPE",
//! ...}, ...}`. Column order in the descriptor is authoritative: fetched
//! rows are labeled positionally from it.

use std::collections::HashMap;
use std::path::Path;

use crate::error::{Error, Result};

/// Sentinel entry marking an auto-generated primary key in a descriptor
/// column list. It names no real column and is never selected.
pub const PRIMARY_KEY_MARKER: &str = "PRIMARY KEY";

/// Parsed tables.json descriptor. Loaded once at facade construction and
/// consulted on every table fetch.
#[derive(Debug, Clone)]
pub struct SchemaCatalog {
    tables: HashMap<String, Vec<String>>,
}

impl SchemaCatalog {
    /// Read and parse a descriptor file. Missing or malformed input is
    /// fatal; no recovery is attempted.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| Error::CatalogIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Parse a descriptor from a JSON string. Useful for fixture catalogs
    /// in tests.
    pub fn from_json(text: &str) -> Result<Self> {
        let raw: HashMap<String, serde_json::Map<String, serde_json::Value>> =
            serde_json::from_str(text)?;
        let tables = raw
            .into_iter()
            .map(|(name, cols)| (name, cols.keys().cloned().collect()))
            .collect();
        Ok(SchemaCatalog { tables })
    }

    /// Ordered column names for `table`, with a trailing primary-key
    /// marker excluded (the key is assumed auto-generated and not part of
    /// the stored row).
    pub fn columns(&self, table: &str) -> Result<Vec<String>> {
        let cols = self
            .tables
            .get(table)
            .ok_or_else(|| Error::UnknownTable(table.to_string()))?;
        let mut cols = cols.clone();
        if cols.last().map(String::as_str) == Some(PRIMARY_KEY_MARKER) {
            cols.pop();
        }
        Ok(cols)
    }

    /// Names of all tables the descriptor covers, in no particular order.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
