//! Providers whose responses are CSV tables: FRED, Stooq, and local files.
//!
//! All three share one parser. The first column holds the date and every other
//! column becomes a [`RawColumn`](crate::series::RawColumn); cells that do not
//! parse as numbers (FRED writes `.` for a missing observation) are undefined.

use super::{http_client, network_error, SeriesProvider};
use crate::error::FetchError;
use crate::series::RawSeries;
use chrono::NaiveDate;
use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

/// Parse a CSV body into a raw series, keeping rows dated within `[start, end]`.
pub fn parse_csv_series<R: Read>(
    reader: R,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<RawSeries, FetchError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr
        .headers()
        .map_err(|e| FetchError::ResponseFormat(format!("csv header: {e}")))?
        .clone();
    if headers.len() < 2 {
        return Err(FetchError::ResponseFormat(format!(
            "expected a date column and at least one value column, got {:?}",
            headers.iter().collect::<Vec<_>>()
        )));
    }

    let mut dates = Vec::new();
    let mut values: Vec<Vec<Option<f64>>> = vec![Vec::new(); headers.len() - 1];

    for (row, record) in rdr.records().enumerate() {
        let record = record.map_err(|e| FetchError::ResponseFormat(format!("csv row {row}: {e}")))?;
        let raw_date = record.get(0).unwrap_or_default();
        let date = parse_date(raw_date).ok_or_else(|| {
            FetchError::ResponseFormat(format!("csv row {row}: invalid date '{raw_date}'"))
        })?;
        if date < start || date > end {
            continue;
        }

        dates.push(date);
        for (col, column_values) in values.iter_mut().enumerate() {
            let cell = record.get(col + 1).and_then(|c| c.parse::<f64>().ok());
            column_values.push(cell);
        }
    }

    let mut series = RawSeries::new(dates);
    for (name, column_values) in headers.iter().skip(1).zip(values) {
        series = series.with_column(name, column_values);
    }
    Ok(series)
}

/// Accepts `YYYY-MM-DD`, optionally followed by a time part.
fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| s.get(..10).and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()))
}

/// Perform a GET and hand back the body if the status is a success.
fn get_body(
    client: &reqwest::blocking::Client,
    provider: &str,
    symbol: &str,
    url: &str,
) -> Result<String, FetchError> {
    let resp = client.get(url).send().map_err(network_error)?;
    let status = resp.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(FetchError::SymbolNotFound {
            symbol: symbol.to_string(),
        });
    }
    if !status.is_success() {
        return Err(FetchError::Http {
            provider: provider.to_string(),
            symbol: symbol.to_string(),
            status: status.as_u16(),
        });
    }
    resp.text().map_err(network_error)
}

/// FRED (Federal Reserve Economic Data) via the public `fredgraph.csv` endpoint.
///
/// Returns a single column named after the series id.
pub struct FredProvider {
    client: reqwest::blocking::Client,
}

impl FredProvider {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: http_client(timeout),
        }
    }

    fn url(symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
        format!(
            "https://fred.stlouisfed.org/graph/fredgraph.csv?id={symbol}&cosd={}&coed={}",
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d")
        )
    }
}

impl SeriesProvider for FredProvider {
    fn id(&self) -> &str {
        "fred"
    }

    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<RawSeries, FetchError> {
        let body = get_body(&self.client, self.id(), symbol, &Self::url(symbol, start, end))?;
        parse_csv_series(body.as_bytes(), start, end)
    }
}

/// Stooq daily quotes CSV (`Date,Open,High,Low,Close,Volume`).
pub struct StooqProvider {
    client: reqwest::blocking::Client,
}

impl StooqProvider {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: http_client(timeout),
        }
    }

    fn url(symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
        format!(
            "https://stooq.com/q/d/l/?s={}&i=d&d1={}&d2={}",
            symbol.to_lowercase(),
            start.format("%Y%m%d"),
            end.format("%Y%m%d")
        )
    }
}

impl SeriesProvider for StooqProvider {
    fn id(&self) -> &str {
        "stooq"
    }

    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<RawSeries, FetchError> {
        let body = get_body(&self.client, self.id(), symbol, &Self::url(symbol, start, end))?;
        // Stooq answers unknown symbols with a plain-text "No data" page.
        if !body.starts_with("Date") {
            return Err(FetchError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }
        parse_csv_series(body.as_bytes(), start, end)
    }
}

/// Reads `{dir}/{symbol}.csv` from the local filesystem.
pub struct LocalCsvProvider {
    dir: PathBuf,
}

impl LocalCsvProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{symbol}.csv"))
    }
}

impl SeriesProvider for LocalCsvProvider {
    fn id(&self) -> &str {
        "csv"
    }

    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<RawSeries, FetchError> {
        let path = self.path(symbol);
        if !path.exists() {
            return Err(FetchError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }
        let file = std::fs::File::open(&path)
            .map_err(|e| FetchError::Io(format!("open {}: {e}", path.display())))?;
        parse_csv_series(file, start, end)
    }
}
