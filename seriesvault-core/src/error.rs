//! Structured error types for every layer of a download run.
//!
//! Only [`ConfigError`] and [`SetupError`] ever stop a run, and both are raised
//! before any request is enqueued. [`FetchError`] stays inside the worker that
//! produced it and [`StoreError`] is reported, not propagated, by the
//! orchestrator.

use chrono::NaiveDate;
use thiserror::Error;

/// Failure of a single fetch request.
///
/// Displayable in both log lines and the CLI summary.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchError {
    #[error("provider '{provider}' has no registered implementation")]
    ProviderUnavailable { provider: String },

    #[error("network unreachable: {0}")]
    Network(String),

    #[error("HTTP {status} from {provider} for {symbol}")]
    Http {
        provider: String,
        symbol: String,
        status: u16,
    },

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("response format changed: {0}")]
    ResponseFormat(String),

    #[error("no data for symbol '{symbol}'")]
    NoData { symbol: String },

    #[error("cannot pick a value column for '{symbol}' from {columns:?}")]
    Normalization {
        symbol: String,
        columns: Vec<String>,
    },

    #[error("i/o error: {0}")]
    Io(String),

    #[error("provider panicked: {0}")]
    Panicked(String),
}

/// Failure inside the SQLite cache.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("stored date '{value}' is not a calendar day")]
    InvalidDate { value: String },
}

/// Invalid run configuration, detected before any work starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown provider '{provider}' for symbol '{symbol}'")]
    UnknownProvider { provider: String, symbol: String },

    #[error("concurrency must be at least 1")]
    InvalidConcurrency,

    #[error("start date {start} is after end date {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("invalid request '{0}' (expected PROVIDER:SYMBOL)")]
    InvalidRequest(String),

    #[error("parse run config: {0}")]
    Parse(String),

    #[error("read run config: {0}")]
    Io(#[from] std::io::Error),
}

/// The orchestrator could not be constructed.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failure while exporting an aligned table.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("csv export: {0}")]
    Csv(#[from] csv::Error),

    #[error("parquet export: {0}")]
    Parquet(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
