//! In-memory tables and the generic full-table fetch.
//!
//! SQLite cells are dynamically typed, so a fetched table holds [`Cell`]
//! values rather than a fixed row struct. Relabeling (swapping period ids
//! for date labels, header ids for header text) happens in place on the
//! fetched [`DataTable`].

use std::collections::HashMap;
use std::fmt;
use std::ops::Range;

use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::schema::SchemaCatalog;

/// One dynamically typed table cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Cell::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Integer(n) => write!(f, "{n}"),
            Cell::Real(r) => write!(f, "{r}"),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

impl From<ValueRef<'_>> for Cell {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Cell::Null,
            ValueRef::Integer(n) => Cell::Integer(n),
            ValueRef::Real(r) => Cell::Real(r),
            ValueRef::Text(t) => Cell::Text(String::from_utf8_lossy(t).into_owned()),
            // The mstables schema stores no blobs; render as text if one
            // ever appears.
            ValueRef::Blob(b) => Cell::Text(String::from_utf8_lossy(b).into_owned()),
        }
    }
}

impl From<i64> for Cell {
    fn from(n: i64) -> Self {
        Cell::Integer(n)
    }
}

impl From<f64> for Cell {
    fn from(r: f64) -> Self {
        Cell::Real(r)
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

/// A fetched table: named, labeled columns plus uniformly shaped rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataTable {
    name: String,
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl DataTable {
    pub(crate) fn new(name: impl Into<String>, columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        DataTable {
            name: name.into(),
            columns,
            rows,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&Cell> {
        self.rows.get(row).and_then(|r| r.get(col))
    }

    /// Replace cell values inside a half-open column range: any integer
    /// cell whose value is a key of `map` becomes the mapped cell; every
    /// other value passes through unchanged. The range is clamped to the
    /// table's width.
    ///
    /// Only integer-typed cells are candidates. The period and header id
    /// columns carry INTEGER affinity, so a REAL cell holding an id-like
    /// value (`5.0`) is not an id and is left as-is.
    pub fn replace_in_column_range(&mut self, range: Range<usize>, map: &HashMap<i64, Cell>) {
        let end = range.end.min(self.columns.len());
        let start = range.start.min(end);
        for row in &mut self.rows {
            for cell in &mut row[start..end] {
                if let Some(id) = cell.as_integer() {
                    if let Some(replacement) = map.get(&id) {
                        *cell = replacement.clone();
                    }
                }
            }
        }
    }

    /// Same replace-if-present pass, applied to every column whose NAME
    /// contains `substr` (line-item tables carry header ids in their
    /// `label` columns).
    pub fn replace_in_labeled_columns(&mut self, substr: &str, map: &HashMap<i64, Cell>) {
        let targets: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, name)| name.contains(substr))
            .map(|(idx, _)| idx)
            .collect();
        for row in &mut self.rows {
            for &idx in &targets {
                if let Some(id) = row[idx].as_integer() {
                    if let Some(replacement) = map.get(&id) {
                        row[idx] = replacement.clone();
                    }
                }
            }
        }
    }

    pub(crate) fn set_columns(&mut self, columns: Vec<String>) {
        debug_assert_eq!(columns.len(), self.columns.len());
        self.columns = columns;
    }

    /// A copy of this table holding only the columns from `start` on.
    pub fn trailing_columns(&self, start: usize) -> DataTable {
        let start = start.min(self.columns.len());
        DataTable {
            name: self.name.clone(),
            columns: self.columns[start..].to_vec(),
            rows: self.rows.iter().map(|row| row[start..].to_vec()).collect(),
        }
    }
}

/// Fetch a full table: `SELECT *`, columns labeled from the schema
/// catalog. The statement's column count must match the catalog exactly,
/// otherwise labels would silently shift onto the wrong columns.
pub fn fetch_table(
    conn: &Connection,
    catalog: &SchemaCatalog,
    table: &str,
    announce: bool,
) -> Result<DataTable> {
    let columns = catalog.columns(table)?;
    if announce {
        info!("materializing table '{}'", table);
    } else {
        debug!("materializing table '{}'", table);
    }

    let sql = format!("SELECT * FROM {table}");
    let mut stmt = conn.prepare(&sql).map_err(|source| Error::Query {
        table: table.to_string(),
        source,
    })?;

    let actual = stmt.column_count();
    if actual != columns.len() {
        return Err(Error::ColumnMismatch {
            table: table.to_string(),
            expected: columns.len(),
            actual,
        });
    }

    let mut rows = Vec::new();
    let mut fetched = stmt.query([]).map_err(|source| Error::Query {
        table: table.to_string(),
        source,
    })?;
    while let Some(row) = fetched.next().map_err(|source| Error::Query {
        table: table.to_string(),
        source,
    })? {
        let mut cells = Vec::with_capacity(columns.len());
        for idx in 0..columns.len() {
            let value = row.get_ref(idx).map_err(|source| Error::Query {
                table: table.to_string(),
                source,
            })?;
            cells.push(Cell::from(value));
        }
        rows.push(cells);
    }

    Ok(DataTable::new(table, columns, rows))
}
