//! Progress reporting for download runs.
//!
//! `DownloadProgress` is the logging capability handed to the orchestrator and
//! the worker pool. The library never touches global logger state; callers
//! pick an implementation (structured `tracing` events, nothing at all, or a
//! test recorder) and pass it in.

use crate::error::{FetchError, StoreError};
use crate::request::FetchRequest;
use std::fmt;

/// Stages of a run, reported in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Fetch,
    Align,
    Persist,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Fetch => "fetch",
            Phase::Align => "align",
            Phase::Persist => "persist",
        };
        f.write_str(name)
    }
}

/// Callbacks for a download run. Called from worker threads, hence `Sync`.
pub trait DownloadProgress: Send + Sync {
    /// A phase is about to start. `detail` carries e.g. the worker count.
    fn on_phase_start(&self, phase: Phase, detail: &str);

    /// A phase finished.
    fn on_phase_complete(&self, phase: Phase);

    /// A worker picked up a request.
    fn on_fetch_start(&self, request: &FetchRequest);

    /// A request produced a normalized series of `points` observations.
    fn on_fetch_success(&self, request: &FetchRequest, points: usize);

    /// A request failed; the run continues without it.
    fn on_fetch_failure(&self, request: &FetchRequest, error: &FetchError);

    /// Alignment produced no data (e.g. every fetch failed).
    fn on_empty_result(&self);

    /// The cache accepted `inserted` new rows.
    fn on_persist_complete(&self, inserted: usize);

    /// The cache write was rolled back.
    fn on_persist_failure(&self, error: &StoreError);
}

/// Emits every event through `tracing` with structured fields.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl DownloadProgress for TracingProgress {
    fn on_phase_start(&self, phase: Phase, detail: &str) {
        tracing::info!(%phase, detail, "phase started");
    }

    fn on_phase_complete(&self, phase: Phase) {
        tracing::info!(%phase, "phase complete");
    }

    fn on_fetch_start(&self, request: &FetchRequest) {
        tracing::debug!(provider = request.provider(), symbol = request.symbol(), "fetching");
    }

    fn on_fetch_success(&self, request: &FetchRequest, points: usize) {
        tracing::info!(
            provider = request.provider(),
            symbol = request.symbol(),
            points,
            "downloaded"
        );
    }

    fn on_fetch_failure(&self, request: &FetchRequest, error: &FetchError) {
        tracing::error!(
            provider = request.provider(),
            symbol = request.symbol(),
            %error,
            "download failed"
        );
    }

    fn on_empty_result(&self) {
        tracing::warn!("no data to save: every fetch failed or returned nothing usable");
    }

    fn on_persist_complete(&self, inserted: usize) {
        tracing::info!(inserted, "saved to cache");
    }

    fn on_persist_failure(&self, error: &StoreError) {
        tracing::error!(%error, "error saving data, write rolled back");
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentProgress;

impl DownloadProgress for SilentProgress {
    fn on_phase_start(&self, _phase: Phase, _detail: &str) {}
    fn on_phase_complete(&self, _phase: Phase) {}
    fn on_fetch_start(&self, _request: &FetchRequest) {}
    fn on_fetch_success(&self, _request: &FetchRequest, _points: usize) {}
    fn on_fetch_failure(&self, _request: &FetchRequest, _error: &FetchError) {}
    fn on_empty_result(&self) {}
    fn on_persist_complete(&self, _inserted: usize) {}
    fn on_persist_failure(&self, _error: &StoreError) {}
}
