//! SeriesVault Core: concurrent series fetching, daily alignment, and the
//! deduplicating SQLite cache.
//!
//! This crate contains:
//! - Fetch requests and the provider capability (Yahoo, FRED, Stooq, local CSV, synthetic)
//! - Normalization of raw provider tables to one value stream per symbol
//! - The fixed-size fetch worker pool
//! - Daily forward-fill resampling and the completeness join
//! - The SQLite cache store
//! - The orchestrator tying them together

pub mod align;
pub mod config;
pub mod downloader;
pub mod error;
pub mod pool;
pub mod progress;
pub mod provider;
pub mod request;
pub mod series;
pub mod store;
pub mod table;

pub use align::{align_series, resample_daily};
pub use config::RunConfig;
pub use downloader::{DownloadRun, Downloader, FetchSummary};
pub use error::{ConfigError, ExportError, FetchError, SetupError, StoreError};
pub use pool::{FetchPool, FetchReport};
pub use progress::{DownloadProgress, Phase, SilentProgress, TracingProgress};
pub use provider::{ProviderRegistry, SeriesProvider};
pub use request::{FetchRequest, RECOGNIZED_PROVIDERS};
pub use series::{normalize, NormalizedSeries, RawColumn, RawSeries};
pub use store::{CacheStore, TickerStatus};
pub use table::AlignedTable;
