//! SQLite cache of `(date, ticker, value)` observations.
//!
//! Layout: a single table `prices(date TEXT, ticker TEXT, value REAL,
//! PRIMARY KEY(date, ticker))` in `{base_path}/prices.db`.
//!
//! - Inserts are insert-if-absent: the first value stored for a key wins.
//! - Each `save` runs in one transaction, so a failed write leaves nothing behind.
//! - Loads pivot rows back into a wide [`AlignedTable`].

use crate::error::StoreError;
use crate::table::AlignedTable;
use chrono::NaiveDate;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

/// File name of the cache database inside the base directory.
pub const DB_FILE: &str = "prices.db";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Per-ticker coverage of the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerStatus {
    pub ticker: String,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub rows: usize,
}

/// The SQLite cache store.
pub struct CacheStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl CacheStore {
    /// Open (or create) the database at `path`. Does not create the table.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// Open `{base_dir}/prices.db`, creating `base_dir` if needed.
    pub fn open_in(base_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let base_dir = base_dir.as_ref();
        fs::create_dir_all(base_dir)?;
        Self::open(base_dir.join(DB_FILE))
    }

    /// Private in-memory database, for tests and dry runs.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
            path: None,
        })
    }

    /// Path of the backing file (`None` when in memory).
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Create the `prices` table if it does not exist. Idempotent.
    pub fn initialize(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS prices (
                date TEXT,
                ticker TEXT,
                value REAL,
                PRIMARY KEY (date, ticker)
            );",
        )?;
        Ok(())
    }

    /// Insert every defined cell of `table`, skipping keys that already exist.
    ///
    /// A key exists if the ticker has a row on that calendar day in either
    /// date format, so older `YYYY-MM-DD HH:MM:SS` rows are never duplicated.
    /// Runs as one transaction: on error nothing from this call is kept.
    /// Returns the number of rows actually inserted.
    pub fn save(&mut self, table: &AlignedTable) -> Result<usize, StoreError> {
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            // `?1 || '~'` sorts after every `?1 HH:MM:SS` and before the next day.
            let mut stmt = tx.prepare(
                "INSERT INTO prices (date, ticker, value)
                 SELECT ?1, ?2, ?3
                 WHERE NOT EXISTS (
                     SELECT 1 FROM prices
                     WHERE ticker = ?2 AND date BETWEEN ?1 AND ?1 || '~'
                 )",
            )?;
            for (date, ticker, value) in table.cells() {
                inserted += stmt.execute(params![
                    date.format(DATE_FORMAT).to_string(),
                    ticker,
                    value
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// Rebuild a wide table for the tickers in `symbols`.
    ///
    /// Columns follow the order of `symbols`; tickers with no stored rows get
    /// no column. Missing cells are `NaN`.
    pub fn load<S: AsRef<str>>(&self, symbols: &[S]) -> Result<AlignedTable, StoreError> {
        let mut wanted: Vec<&str> = Vec::with_capacity(symbols.len());
        for s in symbols {
            let s = s.as_ref();
            if !wanted.contains(&s) {
                wanted.push(s);
            }
        }
        if wanted.is_empty() {
            return Ok(AlignedTable::default());
        }

        let placeholders = wanted.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        // Oldest rows first so the first stored value for a day wins.
        let sql = format!(
            "SELECT date, ticker, value FROM prices WHERE ticker IN ({placeholders}) ORDER BY rowid"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let params: Vec<&dyn rusqlite::types::ToSql> = wanted
            .iter()
            .map(|s| s as &dyn rusqlite::types::ToSql)
            .collect();

        let rows = stmt
            .query_map(params.as_slice(), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<f64>>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut by_date: BTreeMap<NaiveDate, HashMap<String, f64>> = BTreeMap::new();
        for (raw_date, ticker, value) in rows {
            let date = parse_stored_date(&raw_date)?;
            by_date
                .entry(date)
                .or_default()
                .entry(ticker)
                .or_insert(value.unwrap_or(f64::NAN));
        }

        let present: Vec<String> = wanted
            .iter()
            .filter(|t| by_date.values().any(|cells| cells.contains_key(**t)))
            .map(|t| t.to_string())
            .collect();

        let (dates, table_rows): (Vec<NaiveDate>, Vec<Vec<f64>>) = by_date
            .into_iter()
            .map(|(date, cells)| {
                let row = present
                    .iter()
                    .map(|t| cells.get(t).copied().unwrap_or(f64::NAN))
                    .collect();
                (date, row)
            })
            .unzip();

        Ok(AlignedTable::from_rows(dates, present, table_rows).unwrap_or_default())
    }

    /// Irreversibly remove the table and everything in it.
    pub fn drop_table(&self) -> Result<(), StoreError> {
        self.conn.execute_batch("DROP TABLE IF EXISTS prices;")?;
        Ok(())
    }

    /// Total stored rows.
    pub fn row_count(&self) -> Result<usize, StoreError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM prices", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    /// Coverage per ticker, sorted by ticker.
    pub fn status(&self) -> Result<Vec<TickerStatus>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT ticker, MIN(date), MAX(date), COUNT(*) FROM prices GROUP BY ticker ORDER BY ticker",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(ticker, first, last, count)| -> Result<TickerStatus, StoreError> {
                Ok(TickerStatus {
                    ticker,
                    first_date: parse_stored_date(&first)?,
                    last_date: parse_stored_date(&last)?,
                    rows: count as usize,
                })
            })
            .collect()
    }
}

/// Accepts `YYYY-MM-DD`, and the `YYYY-MM-DD HH:MM:SS` form older databases hold.
fn parse_stored_date(raw: &str) -> Result<NaiveDate, StoreError> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .ok()
        .or_else(|| {
            raw.get(..10)
                .and_then(|d| NaiveDate::parse_from_str(d, DATE_FORMAT).ok())
        })
        .ok_or_else(|| StoreError::InvalidDate {
            value: raw.to_string(),
        })
}
