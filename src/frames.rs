//! The repository facade: owns the SQLite connection, caches the
//! reference tables for its lifetime, and exposes one accessor per
//! report type. Accessors re-fetch their table on every call and return
//! it relabeled; the caller owns the result.

use std::collections::HashMap;
use std::ops::Range;
use std::path::Path;

use rusqlite::Connection;
use tracing::info;

use crate::error::{Error, Result};
use crate::schema::SchemaCatalog;
use crate::table::{fetch_table, Cell, DataTable};

/// Standard database location, relative to the working directory.
pub const DEFAULT_DB_PATH: &str = "db/mstables.sqlite";
/// Standard schema descriptor location.
pub const DEFAULT_CATALOG_PATH: &str = "input/tables.json";

/// Raw time-reference values that mean "no date".
const ABSENT_VALUES: [&str; 2] = ["", "\u{2014}"];

/// Column ranges holding period ids in the report tables.
const RATIO_PERIODS: Range<usize> = 2..13;
const IS_CF_PERIODS: Range<usize> = 2..8;
const BS_PERIODS: Range<usize> = 2..7;

/// A reference table re-indexed by its integer `id` column.
///
/// The id column is consumed by the index; the remaining columns keep
/// their descriptor order.
#[derive(Debug, Clone)]
pub struct RefTable {
    name: String,
    columns: Vec<String>,
    rows: HashMap<i64, Vec<Cell>>,
}

impl RefTable {
    fn from_table(table: DataTable) -> Result<Self> {
        let id_idx = table
            .column_index("id")
            .ok_or_else(|| Error::MissingColumn {
                table: table.name().to_string(),
                column: "id".to_string(),
            })?;
        let name = table.name().to_string();
        let mut columns = table.columns().to_vec();
        columns.remove(id_idx);

        let mut rows = HashMap::with_capacity(table.row_count());
        for (row_idx, row) in table.rows().iter().enumerate() {
            let mut row = row.clone();
            let id = row
                .remove(id_idx)
                .as_integer()
                .ok_or_else(|| Error::InvalidKey {
                    table: name.clone(),
                    row: row_idx,
                })?;
            rows.insert(id, row);
        }
        Ok(RefTable {
            name,
            columns,
            rows,
        })
    }

    /// Turn raw placeholder values (empty string, em-dash) into nulls.
    fn normalize_absent(&mut self) {
        for row in self.rows.values_mut() {
            for cell in row.iter_mut() {
                if let Some(text) = cell.as_text() {
                    if ABSENT_VALUES.contains(&text) {
                        *cell = Cell::Null;
                    }
                }
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// One cell by id and column name.
    pub fn lookup(&self, id: i64, column: &str) -> Option<&Cell> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.rows.get(&id).and_then(|row| row.get(idx))
    }

    /// id -> value mapping over one column, for bulk replacement.
    /// Normalized-absent entries map to [`Cell::Null`] so a resolved id
    /// never surfaces the raw placeholder.
    pub fn column_map(&self, column: &str) -> HashMap<i64, Cell> {
        let Some(idx) = self.columns.iter().position(|c| c == column) else {
            return HashMap::new();
        };
        self.rows
            .iter()
            .filter_map(|(id, row)| row.get(idx).map(|cell| (*id, cell.clone())))
            .collect()
    }
}

/// Valuation report: rows keyed by (exchange_id, ticker_id), value
/// columns renamed with their resolved period labels.
#[derive(Debug, Clone)]
pub struct Valuation {
    /// One (exchange_id, ticker_id) pair per source row, in source order.
    pub index: Vec<(i64, i64)>,
    /// The trailing value columns, aligned with `index`.
    pub table: DataTable,
}

/// Facade over the mstables database.
///
/// Construction opens the connection, loads the schema catalog, and
/// eagerly materializes every reference table; any failure aborts
/// construction with no partial state. Dropping the facade releases the
/// connection; [`DataFrames::close`] does so explicitly.
#[derive(Debug)]
pub struct DataFrames {
    conn: Connection,
    catalog: SchemaCatalog,

    /// Line-item header texts, indexed by id.
    pub colheaders: RefTable,
    /// Reporting-period date labels, indexed by id; absent values
    /// normalized to null.
    pub timerefs: RefTable,

    pub urls: DataTable,
    pub securitytypes: DataTable,
    pub tickers: DataTable,
    pub sectors: DataTable,
    pub industries: DataTable,
    pub styles: DataTable,
    pub exchanges: DataTable,
    pub countries: DataTable,
    pub companies: DataTable,
    pub currencies: DataTable,
    pub stocktypes: DataTable,
    pub master: DataTable,
}

impl DataFrames {
    /// Open the database at `db_path` with the descriptor at its
    /// standard location.
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        Self::with_paths(db_path, DEFAULT_CATALOG_PATH)
    }

    /// Open the database at its standard location.
    pub fn open_default() -> Result<Self> {
        Self::new(DEFAULT_DB_PATH)
    }

    pub fn with_paths(db_path: impl AsRef<Path>, catalog_path: impl AsRef<Path>) -> Result<Self> {
        let catalog = SchemaCatalog::load(catalog_path)?;
        info!(
            "opening mstables database at {}",
            db_path.as_ref().display()
        );
        let conn = Connection::open(db_path)?;

        let colheaders = RefTable::from_table(fetch_table(&conn, &catalog, "ColHeaders", true)?)?;
        let mut timerefs = RefTable::from_table(fetch_table(&conn, &catalog, "TimeRefs", true)?)?;
        timerefs.normalize_absent();

        let urls = fetch_table(&conn, &catalog, "URLs", true)?;
        let securitytypes = fetch_table(&conn, &catalog, "SecurityTypes", true)?;
        let tickers = fetch_table(&conn, &catalog, "Tickers", true)?;
        let sectors = fetch_table(&conn, &catalog, "Sectors", true)?;
        let industries = fetch_table(&conn, &catalog, "Industries", true)?;
        let styles = fetch_table(&conn, &catalog, "StockStyles", true)?;
        let exchanges = fetch_table(&conn, &catalog, "Exchanges", true)?;
        let countries = fetch_table(&conn, &catalog, "Countries", true)?;
        let companies = fetch_table(&conn, &catalog, "Companies", true)?;
        let currencies = fetch_table(&conn, &catalog, "Currencies", true)?;
        let stocktypes = fetch_table(&conn, &catalog, "StockTypes", true)?;
        let master = fetch_table(&conn, &catalog, "Master", true)?;

        info!("initial reference tables loaded");
        Ok(DataFrames {
            conn,
            catalog,
            colheaders,
            timerefs,
            urls,
            securitytypes,
            tickers,
            sectors,
            industries,
            styles,
            exchanges,
            countries,
            companies,
            currencies,
            stocktypes,
            master,
        })
    }

    /// Release the connection explicitly. Dropping the facade does the
    /// same; this surfaces any close error instead of swallowing it.
    pub fn close(self) -> Result<()> {
        self.conn
            .close()
            .map_err(|(_, source)| Error::Close(source))
    }

    fn report(&self, table: &str) -> Result<DataTable> {
        fetch_table(&self.conn, &self.catalog, table, false)
    }

    fn dated_report(&self, table: &str, periods: Range<usize>) -> Result<DataTable> {
        let mut report = self.report(table)?;
        report.replace_in_column_range(periods, &self.timerefs.column_map("dates"));
        Ok(report)
    }

    fn line_item_report(&self, table: &str, periods: Range<usize>) -> Result<DataTable> {
        let mut report = self.dated_report(table, periods)?;
        report.replace_in_labeled_columns("label", &self.colheaders.column_map("header"));
        Ok(report)
    }

    pub fn quote_header(&self) -> Result<DataTable> {
        self.report("MSheader")
    }

    pub fn key_ratios(&self) -> Result<DataTable> {
        self.dated_report("MSfinancials", RATIO_PERIODS)
    }

    pub fn financial_health(&self) -> Result<DataTable> {
        self.dated_report("MSratio_financial", RATIO_PERIODS)
    }

    pub fn profitability(&self) -> Result<DataTable> {
        self.dated_report("MSratio_profitability", RATIO_PERIODS)
    }

    pub fn growth(&self) -> Result<DataTable> {
        self.dated_report("MSratio_growth", RATIO_PERIODS)
    }

    pub fn cashflow_health(&self) -> Result<DataTable> {
        self.dated_report("MSratio_cashflow", RATIO_PERIODS)
    }

    pub fn efficiency(&self) -> Result<DataTable> {
        self.dated_report("MSratio_efficiency", RATIO_PERIODS)
    }

    pub fn income_annual(&self) -> Result<DataTable> {
        self.line_item_report("MSreport_is_yr", IS_CF_PERIODS)
    }

    pub fn income_quarterly(&self) -> Result<DataTable> {
        self.line_item_report("MSreport_is_qt", IS_CF_PERIODS)
    }

    pub fn balance_annual(&self) -> Result<DataTable> {
        self.line_item_report("MSreport_bs_yr", BS_PERIODS)
    }

    pub fn balance_quarterly(&self) -> Result<DataTable> {
        self.line_item_report("MSreport_bs_qt", BS_PERIODS)
    }

    pub fn cashflow_annual(&self) -> Result<DataTable> {
        self.line_item_report("MSreport_cf_yr", IS_CF_PERIODS)
    }

    pub fn cashflow_quarterly(&self) -> Result<DataTable> {
        self.line_item_report("MSreport_cf_qt", IS_CF_PERIODS)
    }

    pub fn price_history(&self) -> Result<DataTable> {
        self.report("MSpricehistory")
    }

    /// Valuation report.
    ///
    /// The first row's period-code columns resolve, through the time
    /// references, into a rename dictionary for the value columns: each
    /// value column keeps its 3-character prefix and gets the resolved
    /// date label of the period column its name points at. Rows are then
    /// keyed by (exchange_id, ticker_id) and only the value columns are
    /// returned.
    pub fn valuation(&self) -> Result<Valuation> {
        let mut val = self.report("MSvaluation")?;
        let dates = self.timerefs.column_map("dates");

        // Resolve period column name -> date label from row 0.
        let mut resolved: HashMap<String, String> = HashMap::new();
        if let Some(first) = val.rows().first() {
            let end = RATIO_PERIODS.end.min(val.column_count());
            for idx in RATIO_PERIODS.start.min(end)..end {
                let cell = &first[idx];
                let label = cell
                    .as_integer()
                    .and_then(|id| dates.get(&id))
                    .map(Cell::to_string)
                    .unwrap_or_else(|| cell.to_string());
                resolved.insert(val.columns()[idx].clone(), label);
            }
        }

        let renamed: Vec<String> = val
            .columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                if idx < RATIO_PERIODS.end {
                    return col.clone();
                }
                match (col.get(..3), col.get(3..).and_then(|s| resolved.get(s))) {
                    (Some(prefix), Some(label)) => format!("{prefix}{label}"),
                    _ => col.clone(),
                }
            })
            .collect();
        val.set_columns(renamed);

        let ex_idx = val
            .column_index("exchange_id")
            .ok_or_else(|| Error::MissingColumn {
                table: val.name().to_string(),
                column: "exchange_id".to_string(),
            })?;
        let tk_idx = val
            .column_index("ticker_id")
            .ok_or_else(|| Error::MissingColumn {
                table: val.name().to_string(),
                column: "ticker_id".to_string(),
            })?;

        let mut index = Vec::with_capacity(val.row_count());
        for (row_idx, row) in val.rows().iter().enumerate() {
            let pair = match (row[ex_idx].as_integer(), row[tk_idx].as_integer()) {
                (Some(ex), Some(tk)) => (ex, tk),
                _ => {
                    return Err(Error::InvalidKey {
                        table: val.name().to_string(),
                        row: row_idx,
                    })
                }
            };
            index.push(pair);
        }

        Ok(Valuation {
            index,
            table: val.trailing_columns(RATIO_PERIODS.end),
        })
    }
}
