//! Raw provider responses and their reduction to a single value stream.

use crate::error::FetchError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One named column of a provider response. `None` marks an undefined cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawColumn {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

/// Provider-specific tabular response for one symbol (before normalization).
///
/// Every column is indexed by `dates`; a column shorter than the index is
/// treated as undefined for the missing tail.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSeries {
    pub dates: Vec<NaiveDate>,
    pub columns: Vec<RawColumn>,
}

impl RawSeries {
    pub fn new(dates: Vec<NaiveDate>) -> Self {
        Self {
            dates,
            columns: Vec::new(),
        }
    }

    /// Builder-style column append.
    pub fn with_column(mut self, name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        self.columns.push(RawColumn {
            name: name.into(),
            values,
        });
        self
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Pick the value column: the only column if there is one, otherwise the
    /// first whose name contains "open" (case-insensitive).
    pub fn value_column(&self) -> Option<&RawColumn> {
        match self.columns.as_slice() {
            [] => None,
            [only] => Some(only),
            cols => cols
                .iter()
                .find(|c| c.name.to_lowercase().contains("open")),
        }
    }
}

/// A single labelled value-per-day stream with no undefined values.
///
/// Points are sorted by date ascending with at most one point per date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedSeries {
    symbol: String,
    points: Vec<(NaiveDate, f64)>,
}

impl NormalizedSeries {
    /// Build from arbitrary points: NaN values are dropped, points are sorted,
    /// and for a repeated date the last observation wins.
    pub fn new(symbol: impl Into<String>, points: Vec<(NaiveDate, f64)>) -> Self {
        let mut points: Vec<(NaiveDate, f64)> =
            points.into_iter().filter(|(_, v)| !v.is_nan()).collect();
        points.sort_by_key(|(d, _)| *d);

        let mut deduped: Vec<(NaiveDate, f64)> = Vec::with_capacity(points.len());
        for (date, value) in points {
            match deduped.last_mut() {
                Some(last) if last.0 == date => last.1 = value,
                _ => deduped.push((date, value)),
            }
        }

        Self {
            symbol: symbol.into(),
            points: deduped,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn points(&self) -> &[(NaiveDate, f64)] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|(d, _)| *d)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|(d, _)| *d)
    }
}

/// Reduce a raw response to a [`NormalizedSeries`] labelled `symbol`.
///
/// Zero usable rows is a [`FetchError::NoData`], never an empty series.
pub fn normalize(symbol: &str, raw: &RawSeries) -> Result<NormalizedSeries, FetchError> {
    if raw.columns.is_empty() || raw.is_empty() {
        return Err(FetchError::NoData {
            symbol: symbol.to_string(),
        });
    }

    let column = raw.value_column().ok_or_else(|| FetchError::Normalization {
        symbol: symbol.to_string(),
        columns: raw.column_names(),
    })?;

    let points: Vec<(NaiveDate, f64)> = raw
        .dates
        .iter()
        .enumerate()
        .filter_map(|(i, date)| {
            column
                .values
                .get(i)
                .copied()
                .flatten()
                .map(|value| (*date, value))
        })
        .collect();

    let series = NormalizedSeries::new(symbol, points);
    if series.is_empty() {
        return Err(FetchError::NoData {
            symbol: symbol.to_string(),
        });
    }
    Ok(series)
}
