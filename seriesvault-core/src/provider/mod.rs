//! Data provider trait and the registry that resolves provider ids.
//!
//! The `SeriesProvider` trait abstracts over data sources (Yahoo Finance,
//! FRED, Stooq, local CSV files) so the worker pool never knows which
//! service it is talking to, and tests can substitute stubs.

pub mod csv_source;
pub mod synthetic;
pub mod yahoo;

use crate::error::FetchError;
use crate::series::RawSeries;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub use csv_source::{FredProvider, LocalCsvProvider, StooqProvider};
pub use synthetic::SyntheticProvider;
pub use yahoo::YahooProvider;

/// Trait for series providers.
///
/// Implementations fetch one symbol over an inclusive date range and return
/// the provider's own column layout; normalization happens above this trait.
/// Calls are synchronous and may be slow.
pub trait SeriesProvider: Send + Sync {
    /// Identifier requests use to address this provider (e.g. `"fred"`).
    fn id(&self) -> &str;

    /// Fetch the raw series for `symbol` over `[start, end]`.
    fn fetch(&self, symbol: &str, start: NaiveDate, end: NaiveDate)
        -> Result<RawSeries, FetchError>;
}

/// Maps provider ids to implementations.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn SeriesProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the network providers: `yahoo`, `fred`, `stooq`.
    ///
    /// `timeout` bounds every HTTP call so a hung provider cannot block its
    /// worker forever.
    pub fn with_defaults(timeout: Duration) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(YahooProvider::new(timeout)));
        registry.register(Arc::new(FredProvider::new(timeout)));
        registry.register(Arc::new(StooqProvider::new(timeout)));
        registry
    }

    /// Register a provider under its own id, replacing any previous entry.
    pub fn register(&mut self, provider: Arc<dyn SeriesProvider>) {
        self.providers.insert(provider.id().to_string(), provider);
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn SeriesProvider>> {
        self.providers.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.providers.contains_key(id)
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.providers.keys().map(|s| s.as_str()).collect();
        ids.sort_unstable();
        ids
    }

    /// Fetch through the provider registered under `provider`.
    pub fn fetch(
        &self,
        provider: &str,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<RawSeries, FetchError> {
        let p = self
            .providers
            .get(provider)
            .ok_or_else(|| FetchError::ProviderUnavailable {
                provider: provider.to_string(),
            })?;
        p.fetch(symbol, start, end)
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.ids())
            .finish()
    }
}

/// Build the shared blocking HTTP client used by the network providers.
pub(crate) fn http_client(timeout: Duration) -> reqwest::blocking::Client {
    reqwest::blocking::Client::builder()
        .timeout(timeout)
        .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
        .build()
        .unwrap_or_else(|_| reqwest::blocking::Client::new())
}

/// Map a transport error onto [`FetchError`].
pub(crate) fn network_error(e: reqwest::Error) -> FetchError {
    FetchError::Network(e.to_string())
}
