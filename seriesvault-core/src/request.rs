//! Fetch requests and the recognised provider identifiers.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Provider identifiers the system knows about, whether or not an
/// implementation is registered for them.
pub const RECOGNIZED_PROVIDERS: &[&str] = &[
    "yahoo",
    "iex",
    "iex-tops",
    "iex-last",
    "bankofcanada",
    "stooq",
    "iex-book",
    "enigma",
    "fred",
    "famafrench",
    "oecd",
    "eurostat",
    "nasdaq",
    "quandl",
    "moex",
    "tiingo",
    "yahoo-actions",
    "yahoo-dividends",
    "av-forex",
    "av-forex-daily",
    "av-daily",
    "av-daily-adjusted",
    "av-weekly",
    "av-weekly-adjusted",
    "av-monthly",
    "av-monthly-adjusted",
    "av-intraday",
    "econdb",
    "naver",
    "csv",
    "synthetic",
];

/// Whether `provider` is in [`RECOGNIZED_PROVIDERS`].
pub fn is_recognized(provider: &str) -> bool {
    RECOGNIZED_PROVIDERS.contains(&provider)
}

/// One series to fetch: a symbol within a provider's namespace.
///
/// Immutable once built; workers receive it by value. Provider ids are
/// stored lowercase however they were written.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RequestFields")]
pub struct FetchRequest {
    provider: String,
    symbol: String,
}

/// Wire shape of a request in run config files.
#[derive(Deserialize)]
struct RequestFields {
    provider: String,
    symbol: String,
}

impl From<RequestFields> for FetchRequest {
    fn from(fields: RequestFields) -> Self {
        Self::new(fields.provider, fields.symbol)
    }
}

impl FetchRequest {
    pub fn new(provider: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            provider: provider.into().to_ascii_lowercase(),
            symbol: symbol.into(),
        }
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }
}

impl fmt::Display for FetchRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider, self.symbol)
    }
}

/// Parses `PROVIDER:SYMBOL`. Only the first colon splits, so symbols such as
/// `GC=F` or `BTC-USD` pass through untouched.
impl FromStr for FetchRequest {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((provider, symbol)) if !provider.is_empty() && !symbol.is_empty() => {
                Ok(Self::new(provider, symbol))
            }
            _ => Err(ConfigError::InvalidRequest(s.to_string())),
        }
    }
}
