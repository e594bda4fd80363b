//! Download orchestrator: fetch → align → persist.
//!
//! The fetch phase is the only concurrent one. Alignment and persistence run
//! on the calling thread after the worker pool has joined, and persistence is
//! attempted exactly once per run. Neither fetch failures nor cache failures
//! fail a run; the aligned table is always returned.

use crate::align::align_series;
use crate::config::RunConfig;
use crate::error::{FetchError, SetupError, StoreError};
use crate::pool::{FetchPool, FetchReport};
use crate::progress::{DownloadProgress, Phase};
use crate::provider::ProviderRegistry;
use crate::request::FetchRequest;
use crate::store::CacheStore;
use crate::table::AlignedTable;
use std::sync::Arc;

/// Counts and failures of the fetch phase.
#[derive(Debug, Clone, Default)]
pub struct FetchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub failures: Vec<(FetchRequest, FetchError)>,
}

impl FetchSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

impl From<&FetchReport> for FetchSummary {
    fn from(report: &FetchReport) -> Self {
        Self {
            total: report.total,
            succeeded: report.succeeded(),
            failed: report.failed(),
            failures: report.failures.clone(),
        }
    }
}

/// Result of one run.
#[derive(Debug)]
pub struct DownloadRun {
    /// The aligned table for this run's successful fetches.
    pub table: AlignedTable,
    pub summary: FetchSummary,
    /// Rows newly written to the cache; `None` if saving was off or failed.
    pub inserted: Option<usize>,
}

/// Owns the cache store and runs downloads against a provider registry.
pub struct Downloader {
    config: RunConfig,
    registry: ProviderRegistry,
    store: CacheStore,
    progress: Arc<dyn DownloadProgress>,
}

impl Downloader {
    /// Validate `config`, then open and initialise the cache under
    /// `config.base_path`.
    pub fn new(
        config: RunConfig,
        registry: ProviderRegistry,
        progress: Arc<dyn DownloadProgress>,
    ) -> Result<Self, SetupError> {
        config.validate(&registry)?;
        let store = CacheStore::open_in(&config.base_path)?;
        Self::assemble(config, registry, store, progress)
    }

    /// Like [`Downloader::new`] but with a caller-supplied store.
    pub fn with_store(
        config: RunConfig,
        registry: ProviderRegistry,
        store: CacheStore,
        progress: Arc<dyn DownloadProgress>,
    ) -> Result<Self, SetupError> {
        config.validate(&registry)?;
        Self::assemble(config, registry, store, progress)
    }

    fn assemble(
        config: RunConfig,
        registry: ProviderRegistry,
        store: CacheStore,
        progress: Arc<dyn DownloadProgress>,
    ) -> Result<Self, SetupError> {
        store.initialize()?;
        Ok(Self {
            config,
            registry,
            store,
            progress,
        })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Fetch every request, align, and persist if enabled.
    pub fn run(&mut self) -> DownloadRun {
        let requests = self.config.effective_requests();

        let report = FetchPool::new(
            &self.registry,
            self.progress.as_ref(),
            self.config.start_date,
            self.config.end_date,
            self.config.concurrency,
        )
        .fetch_all(&requests);
        let summary = FetchSummary::from(&report);

        self.progress
            .on_phase_start(Phase::Align, &format!("{} series", report.series.len()));
        let table = align_series(&report.series);
        self.progress.on_phase_complete(Phase::Align);

        if table.is_empty() {
            self.progress.on_empty_result();
        }

        let inserted = if self.config.save {
            self.persist(&table).ok()
        } else {
            None
        };

        DownloadRun {
            table,
            summary,
            inserted,
        }
    }

    fn persist(&mut self, table: &AlignedTable) -> Result<usize, StoreError> {
        self.progress
            .on_phase_start(Phase::Persist, &format!("{} rows", table.height()));
        let result = self.store.save(table);
        match &result {
            Ok(inserted) => self.progress.on_persist_complete(*inserted),
            Err(e) => self.progress.on_persist_failure(e),
        }
        self.progress.on_phase_complete(Phase::Persist);
        result
    }

    /// Stored data for this run's symbols.
    pub fn load(&self) -> Result<AlignedTable, StoreError> {
        self.store.load(&self.config.symbols())
    }

    /// Drop every stored record and recreate the empty table.
    pub fn reset(&self) -> Result<(), StoreError> {
        self.store.drop_table()?;
        self.store.initialize()
    }
}
