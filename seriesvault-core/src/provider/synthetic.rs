//! Deterministic synthetic provider for offline development and tests.
//!
//! Produces a weekday-only random walk starting at 100.0. The RNG is seeded
//! from the BLAKE3 hash of the symbol, so the same symbol always yields the
//! same series.

use super::SeriesProvider;
use crate::error::FetchError;
use crate::series::RawSeries;
use chrono::{Datelike, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Debug, Default, Clone, Copy)]
pub struct SyntheticProvider;

impl SyntheticProvider {
    pub fn new() -> Self {
        Self
    }
}

impl SeriesProvider for SyntheticProvider {
    fn id(&self) -> &str {
        "synthetic"
    }

    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<RawSeries, FetchError> {
        let seed: [u8; 32] = *blake3::hash(symbol.as_bytes()).as_bytes();
        let mut rng = StdRng::from_seed(seed);

        let mut dates = Vec::new();
        let mut opens = Vec::new();
        let mut closes = Vec::new();
        let mut price = 100.0_f64;

        for current in start.iter_days().take_while(|d| *d <= end) {
            if matches!(current.weekday(), Weekday::Sat | Weekday::Sun) {
                continue;
            }
            let daily_return: f64 = rng.gen_range(-0.03..0.03);
            let close = price * (1.0 + daily_return);

            dates.push(current);
            opens.push(Some(price));
            closes.push(Some(close));
            price = close;
        }

        Ok(RawSeries::new(dates)
            .with_column("Open", opens)
            .with_column("Close", closes))
    }
}
