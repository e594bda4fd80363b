//! Daily resampling and multi-series alignment.
//!
//! Each series is reindexed onto every calendar day between its first and
//! last observation, forward-filling gaps. The resampled series are then
//! joined on date: the union of all dates is taken and any date where some
//! series has no value is dropped, so the result is complete.

use crate::series::NormalizedSeries;
use crate::table::AlignedTable;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashSet};

/// Reindex onto a daily calendar spanning the series' own range.
///
/// Every day takes the most recent observation on or before it. The range
/// starts at the first observation, so there is never an undefined leading
/// slot to drop.
pub fn resample_daily(series: &NormalizedSeries) -> Vec<(NaiveDate, f64)> {
    let points = series.points();
    let (Some(first), Some(last)) = (series.first_date(), series.last_date()) else {
        return Vec::new();
    };

    let mut out = Vec::with_capacity(((last - first).num_days() + 1) as usize);
    let mut next = 0;
    let mut current: Option<f64> = None;

    for day in first.iter_days().take_while(|d| *d <= last) {
        while next < points.len() && points[next].0 <= day {
            current = Some(points[next].1);
            next += 1;
        }
        if let Some(v) = current {
            out.push((day, v));
        }
    }
    out
}

/// Resample every series and join them into one complete table.
///
/// Column order follows input order. When two series carry the same symbol,
/// the first one keeps the column and the later ones are ignored.
pub fn align_series(series: &[NormalizedSeries]) -> AlignedTable {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut symbols: Vec<String> = Vec::new();
    let mut columns: Vec<Vec<(NaiveDate, f64)>> = Vec::new();

    for s in series {
        if !seen.insert(s.symbol()) {
            continue;
        }
        symbols.push(s.symbol().to_string());
        columns.push(resample_daily(s));
    }

    if columns.is_empty() {
        return AlignedTable::default();
    }

    // Outer union of dates, one slot per column.
    let width = columns.len();
    let mut grid: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
    for (col, points) in columns.iter().enumerate() {
        for &(date, value) in points {
            grid.entry(date).or_insert_with(|| vec![f64::NAN; width])[col] = value;
        }
    }

    // Keep only rows where every column is defined.
    let (dates, rows): (Vec<NaiveDate>, Vec<Vec<f64>>) = grid
        .into_iter()
        .filter(|(_, row)| row.iter().all(|v| !v.is_nan()))
        .unzip();

    AlignedTable::from_rows(dates, symbols, rows).unwrap_or_default()
}
