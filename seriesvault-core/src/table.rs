//! The date-indexed, symbol-columned table produced by alignment and by
//! cache loads, plus its CSV and Parquet exports.

use crate::error::ExportError;
use chrono::NaiveDate;
use polars::prelude::*;
use std::fs;
use std::path::Path;

/// Wide table: one row per date (ascending), one column per symbol.
///
/// Tables built by alignment are complete. Tables rebuilt from the cache hold
/// `NaN` where a symbol has no stored value for a date that another symbol has.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlignedTable {
    dates: Vec<NaiveDate>,
    symbols: Vec<String>,
    /// Row-major; `rows[i][j]` is `symbols[j]` on `dates[i]`.
    rows: Vec<Vec<f64>>,
}

impl AlignedTable {
    /// Build from parts. Returns `None` if the shapes disagree.
    pub fn from_rows(
        dates: Vec<NaiveDate>,
        symbols: Vec<String>,
        rows: Vec<Vec<f64>>,
    ) -> Option<Self> {
        if rows.len() != dates.len() || rows.iter().any(|r| r.len() != symbols.len()) {
            return None;
        }
        Some(Self {
            dates,
            symbols,
            rows,
        })
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn height(&self) -> usize {
        self.dates.len()
    }

    pub fn width(&self) -> usize {
        self.symbols.len()
    }

    /// No rows or no columns.
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty() || self.symbols.is_empty()
    }

    fn symbol_index(&self, symbol: &str) -> Option<usize> {
        self.symbols.iter().position(|s| s == symbol)
    }

    /// Value for `symbol` on `date`; `None` if either is absent or the cell is `NaN`.
    pub fn value(&self, date: NaiveDate, symbol: &str) -> Option<f64> {
        let col = self.symbol_index(symbol)?;
        let row = self.dates.binary_search(&date).ok()?;
        let v = self.rows[row][col];
        (!v.is_nan()).then_some(v)
    }

    /// All values of one column in date order.
    pub fn column(&self, symbol: &str) -> Option<Vec<f64>> {
        let col = self.symbol_index(symbol)?;
        Some(self.rows.iter().map(|r| r[col]).collect())
    }

    /// Every defined `(date, symbol, value)` cell, row by row.
    pub fn cells(&self) -> impl Iterator<Item = (NaiveDate, &str, f64)> + '_ {
        self.dates.iter().zip(&self.rows).flat_map(move |(date, row)| {
            self.symbols
                .iter()
                .zip(row)
                .filter(|(_, v)| !v.is_nan())
                .map(move |(symbol, v)| (*date, symbol.as_str(), *v))
        })
    }

    /// Whether every cell holds a value.
    pub fn is_complete(&self) -> bool {
        self.rows.iter().all(|r| r.iter().all(|v| !v.is_nan()))
    }

    /// BLAKE3 over dates, symbols, and values, visiting symbols in sorted order
    /// so that two tables with the same contents hash equal regardless of
    /// column order.
    pub fn content_hash(&self) -> String {
        let mut order: Vec<usize> = (0..self.symbols.len()).collect();
        order.sort_by(|&a, &b| self.symbols[a].cmp(&self.symbols[b]));

        let mut hasher = blake3::Hasher::new();
        for &col in &order {
            hasher.update(self.symbols[col].as_bytes());
            hasher.update(&[0]);
        }
        for (date, row) in self.dates.iter().zip(&self.rows) {
            hasher.update(date.to_string().as_bytes());
            for &col in &order {
                hasher.update(&row[col].to_le_bytes());
            }
        }
        hasher.finalize().to_hex().to_string()
    }

    /// Write as CSV with header `date,<symbols...>`; `NaN` cells are left empty.
    pub fn write_csv(&self, path: &Path) -> Result<(), ExportError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut wtr = csv::Writer::from_path(path)?;

        let mut header = vec!["date".to_string()];
        header.extend(self.symbols.iter().cloned());
        wtr.write_record(&header)?;

        for (date, row) in self.dates.iter().zip(&self.rows) {
            let mut record = vec![date.format("%Y-%m-%d").to_string()];
            record.extend(row.iter().map(|v| {
                if v.is_nan() {
                    String::new()
                } else {
                    v.to_string()
                }
            }));
            wtr.write_record(&record)?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Convert to a Polars `DataFrame` with a `date` column of type `Date`
    /// followed by one `Float64` column per symbol (`NaN` becomes null).
    pub fn to_dataframe(&self) -> Result<DataFrame, ExportError> {
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
        let days: Vec<i32> = self
            .dates
            .iter()
            .map(|d| (*d - epoch).num_days() as i32)
            .collect();

        let mut columns = vec![Column::new("date".into(), days)
            .cast(&DataType::Date)
            .map_err(|e| ExportError::Parquet(format!("date cast: {e}")))?];

        for (col, symbol) in self.symbols.iter().enumerate() {
            let values: Vec<Option<f64>> = self
                .rows
                .iter()
                .map(|r| Some(r[col]).filter(|v| !v.is_nan()))
                .collect();
            columns.push(Column::new(symbol.as_str().into(), values));
        }

        DataFrame::new(columns).map_err(|e| ExportError::Parquet(format!("dataframe creation: {e}")))
    }

    /// Write as a Parquet file. The write is atomic: `.tmp` then rename.
    pub fn write_parquet(&self, path: &Path) -> Result<(), ExportError> {
        let mut df = self.to_dataframe()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = path.with_extension("parquet.tmp");
        let file = fs::File::create(&tmp_path)?;
        ParquetWriter::new(file)
            .finish(&mut df)
            .map_err(|e| ExportError::Parquet(format!("write parquet: {e}")))?;

        fs::rename(&tmp_path, path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            ExportError::Io(e)
        })
    }
}
