//! Serializable run configuration.
//!
//! A run is described by a TOML file:
//!
//! ```toml
//! start_date = "2000-01-01"
//! end_date = "2023-12-01"
//! concurrency = 10
//! save = true
//! base_path = "./data"
//!
//! [[requests]]
//! provider = "yahoo"
//! symbol = "XHB"
//!
//! [[requests]]
//! provider = "fred"
//! symbol = "CPIAUCSL"
//! ```
//!
//! Every field is optional. Without requests the run fetches `fred:CPIAUCSL`.

use crate::error::ConfigError;
use crate::provider::ProviderRegistry;
use crate::request::{is_recognized, FetchRequest};
use crate::store::DB_FILE;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Everything a download run needs besides its collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Series to fetch, in column order.
    pub requests: Vec<FetchRequest>,
    /// First day requested from every provider (inclusive).
    pub start_date: NaiveDate,
    /// Last day requested from every provider (inclusive).
    pub end_date: NaiveDate,
    /// Upper bound on concurrent fetch workers.
    pub concurrency: usize,
    /// Persist the aligned table to the cache.
    pub save: bool,
    /// Directory holding the cache database.
    pub base_path: PathBuf,
    /// Per-request HTTP timeout in seconds.
    pub fetch_timeout_secs: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            requests: Vec::new(),
            start_date: NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default(),
            end_date: NaiveDate::from_ymd_opt(2023, 12, 1).unwrap_or_default(),
            concurrency: 5,
            save: true,
            base_path: PathBuf::from("./data"),
            fetch_timeout_secs: 30,
        }
    }
}

impl RunConfig {
    /// Load a run config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse a run config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// The request list, or the single default request when none is given.
    pub fn effective_requests(&self) -> Vec<FetchRequest> {
        if self.requests.is_empty() {
            vec![FetchRequest::new("fred", "CPIAUCSL")]
        } else {
            self.requests.clone()
        }
    }

    /// Distinct symbols of the effective requests, in request order.
    pub fn symbols(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for req in self.effective_requests() {
            if !out.iter().any(|s| s == req.symbol()) {
                out.push(req.symbol().to_string());
            }
        }
        out
    }

    pub fn db_path(&self) -> PathBuf {
        self.base_path.join(DB_FILE)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Reject the config before anything is enqueued.
    ///
    /// A provider id passes if it is recognised or registered in `registry`.
    /// Recognised ids without an implementation fail later, per request.
    pub fn validate(&self, registry: &ProviderRegistry) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::InvalidConcurrency);
        }
        if self.start_date > self.end_date {
            return Err(ConfigError::InvalidDateRange {
                start: self.start_date,
                end: self.end_date,
            });
        }
        for req in self.effective_requests() {
            if !is_recognized(req.provider()) && !registry.contains(req.provider()) {
                return Err(ConfigError::UnknownProvider {
                    provider: req.provider().to_string(),
                    symbol: req.symbol().to_string(),
                });
            }
        }
        Ok(())
    }
}
