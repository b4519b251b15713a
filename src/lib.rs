//! Data-access layer for the mstables SQLite database.
//!
//! [`DataFrames`] opens the database, loads the reference tables once at
//! construction, and exposes one accessor per report type. Report tables
//! are fetched fresh on every call and returned with period ids swapped
//! for date labels and header ids swapped for header text.

pub mod error;
pub mod frames;
pub mod schema;
pub mod table;

pub use error::{Error, Result};
pub use frames::{DataFrames, RefTable, Valuation, DEFAULT_CATALOG_PATH, DEFAULT_DB_PATH};
pub use schema::SchemaCatalog;
pub use table::{Cell, DataTable};
