//! End-to-end tests for the download orchestrator using scripted providers.

use chrono::NaiveDate;
use seriesvault_core::{
    CacheStore, ConfigError, DownloadProgress, Downloader, FetchError, FetchRequest, Phase,
    ProviderRegistry, RawSeries, RunConfig, SeriesProvider, SetupError, SilentProgress,
    StoreError,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// Provider answering from a fixed script; unknown symbols fail.
struct Scripted {
    id: &'static str,
    answers: HashMap<&'static str, RawSeries>,
}

impl Scripted {
    fn new(id: &'static str) -> Self {
        Self {
            id,
            answers: HashMap::new(),
        }
    }

    fn with(mut self, symbol: &'static str, raw: RawSeries) -> Self {
        self.answers.insert(symbol, raw);
        self
    }
}

impl SeriesProvider for Scripted {
    fn id(&self) -> &str {
        self.id
    }

    fn fetch(
        &self,
        symbol: &str,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<RawSeries, FetchError> {
        // Stagger completion so worker finish order differs from request order.
        std::thread::sleep(Duration::from_millis(((symbol.len() * 7) % 11) as u64));
        self.answers
            .get(symbol)
            .cloned()
            .ok_or_else(|| FetchError::Network(format!("connection reset fetching {symbol}")))
    }
}

/// Records every progress event as a string.
#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl Recorder {
    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn count(&self, prefix: &str) -> usize {
        self.events().iter().filter(|e| e.starts_with(prefix)).count()
    }

    fn push(&self, e: String) {
        self.events.lock().unwrap().push(e);
    }
}

impl DownloadProgress for Recorder {
    fn on_phase_start(&self, phase: Phase, _detail: &str) {
        self.push(format!("start {phase}"));
    }
    fn on_phase_complete(&self, phase: Phase) {
        self.push(format!("done {phase}"));
    }
    fn on_fetch_start(&self, request: &FetchRequest) {
        self.push(format!("fetch {request}"));
    }
    fn on_fetch_success(&self, request: &FetchRequest, points: usize) {
        self.push(format!("ok {request} {points}"));
    }
    fn on_fetch_failure(&self, request: &FetchRequest, error: &FetchError) {
        self.push(format!("fail {request} {error}"));
    }
    fn on_empty_result(&self) {
        self.push("empty".into());
    }
    fn on_persist_complete(&self, inserted: usize) {
        self.push(format!("saved {inserted}"));
    }
    fn on_persist_failure(&self, error: &StoreError) {
        self.push(format!("save-failed {error}"));
    }
}

fn quotes(dates: &[&str], opens: &[f64]) -> RawSeries {
    RawSeries::new(dates.iter().map(|s| d(s)).collect())
        .with_column("Open", opens.iter().map(|v| Some(*v)).collect())
        .with_column("Close", opens.iter().map(|v| Some(v + 0.5)).collect())
}

fn macro_series(dates: &[&str], values: &[f64]) -> RawSeries {
    RawSeries::new(dates.iter().map(|s| d(s)).collect())
        .with_column("VALUE", values.iter().map(|v| Some(*v)).collect())
}

fn registry() -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    registry.register(Arc::new(
        Scripted::new("yahoo")
            .with("AAA", quotes(&["2020-01-02", "2020-01-03", "2020-01-06"], &[10.0, 11.0, 12.0]))
            .with("BBB", quotes(&["2020-01-02", "2020-01-06"], &[20.0, 22.0]))
            .with("CC", quotes(&["2020-01-01", "2020-01-07"], &[30.0, 31.0])),
    ));
    registry.register(Arc::new(
        Scripted::new("fred").with(
            "CPI",
            macro_series(&["2020-01-01", "2020-02-01"], &[259.1, 259.2]),
        ),
    ));
    registry
}

fn config(base: &std::path::Path, requests: &[(&str, &str)]) -> RunConfig {
    RunConfig {
        requests: requests
            .iter()
            .map(|(p, s)| FetchRequest::new(*p, *s))
            .collect(),
        start_date: d("2020-01-01"),
        end_date: d("2020-01-31"),
        concurrency: 4,
        base_path: base.to_path_buf(),
        ..RunConfig::default()
    }
}

#[test]
fn failed_request_is_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = Arc::new(Recorder::default());
    let mut downloader = Downloader::new(
        config(dir.path(), &[("yahoo", "MISSING"), ("yahoo", "AAA")]),
        registry(),
        recorder.clone(),
    )
    .unwrap();

    let run = downloader.run();

    assert_eq!(run.table.symbols(), &["AAA".to_string()]);
    assert_eq!(run.summary.total, 2);
    assert_eq!(run.summary.succeeded, 1);
    assert_eq!(run.summary.failed, 1);
    assert_eq!(run.summary.failures[0].0.symbol(), "MISSING");
    assert_eq!(recorder.count("fail yahoo:MISSING"), 1);
    assert_eq!(recorder.count("ok yahoo:AAA"), 1);
}

#[test]
fn aligned_table_uses_open_column_and_forward_fill() {
    let dir = tempfile::tempdir().unwrap();
    let mut downloader = Downloader::new(
        config(dir.path(), &[("yahoo", "AAA"), ("yahoo", "BBB")]),
        registry(),
        Arc::new(SilentProgress),
    )
    .unwrap();

    let table = downloader.run().table;

    assert_eq!(
        table.dates(),
        &[
            d("2020-01-02"),
            d("2020-01-03"),
            d("2020-01-04"),
            d("2020-01-05"),
            d("2020-01-06")
        ]
    );
    assert_eq!(table.value(d("2020-01-04"), "AAA"), Some(11.0));
    assert_eq!(table.value(d("2020-01-05"), "BBB"), Some(20.0));
    assert_eq!(table.value(d("2020-01-06"), "BBB"), Some(22.0));
    assert!(table.is_complete());
}

#[test]
fn concurrency_does_not_change_the_result() {
    let requests = [("yahoo", "CC"), ("yahoo", "AAA"), ("fred", "CPI"), ("yahoo", "BBB")];

    let run_with = |concurrency: usize| {
        let dir = tempfile::tempdir().unwrap();
        let cfg = RunConfig {
            concurrency,
            save: false,
            ..config(dir.path(), &requests)
        };
        Downloader::new(cfg, registry(), Arc::new(SilentProgress))
            .unwrap()
            .run()
            .table
    };

    let serial = run_with(1);
    let parallel = run_with(10);

    assert_eq!(serial.height(), 5);
    assert_eq!(serial.content_hash(), parallel.content_hash());
    assert_eq!(serial, parallel);
    assert_eq!(
        serial.symbols(),
        &["CC".to_string(), "AAA".to_string(), "CPI".to_string(), "BBB".to_string()]
    );
}

#[test]
fn repeated_runs_do_not_grow_the_cache() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), &[("yahoo", "AAA"), ("yahoo", "BBB")]);

    let mut downloader = Downloader::new(cfg.clone(), registry(), Arc::new(SilentProgress)).unwrap();
    let first = downloader.run();
    assert_eq!(first.inserted, Some(10));

    let mut again = Downloader::new(cfg, registry(), Arc::new(SilentProgress)).unwrap();
    let second = again.run();
    assert_eq!(second.inserted, Some(0));
    assert_eq!(again.store().row_count().unwrap(), 10);
}

#[test]
fn load_returns_persisted_subset() {
    let dir = tempfile::tempdir().unwrap();
    let mut downloader = Downloader::new(
        config(dir.path(), &[("yahoo", "AAA"), ("yahoo", "BBB")]),
        registry(),
        Arc::new(SilentProgress),
    )
    .unwrap();
    let run = downloader.run();

    let loaded = downloader.load().unwrap();
    assert_eq!(loaded, run.table);

    let only_aaa = downloader.store().load(&["AAA"]).unwrap();
    assert_eq!(only_aaa.symbols(), &["AAA".to_string()]);
    assert_eq!(only_aaa.height(), 5);
}

#[test]
fn persistence_failure_still_returns_table() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = Arc::new(Recorder::default());
    let mut downloader = Downloader::new(
        config(dir.path(), &[("yahoo", "AAA")]),
        registry(),
        recorder.clone(),
    )
    .unwrap();
    downloader.store().drop_table().unwrap();

    let run = downloader.run();

    assert_eq!(run.inserted, None);
    assert_eq!(run.table.height(), 5);
    assert_eq!(recorder.count("save-failed"), 1);
}

#[test]
fn all_failures_warn_about_empty_result() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = Arc::new(Recorder::default());
    let mut downloader = Downloader::new(
        config(dir.path(), &[("yahoo", "NOPE"), ("fred", "NADA")]),
        registry(),
        recorder.clone(),
    )
    .unwrap();

    let run = downloader.run();

    assert!(run.table.is_empty());
    assert_eq!(run.summary.failed, 2);
    assert_eq!(run.inserted, Some(0));

    let events = recorder.events();
    let empty_at = events.iter().position(|e| e == "empty").unwrap();
    let persist_at = events.iter().position(|e| e == "start persist").unwrap();
    assert!(empty_at < persist_at);
}

#[test]
fn phases_run_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = Arc::new(Recorder::default());
    let mut downloader = Downloader::new(
        config(dir.path(), &[("yahoo", "AAA"), ("yahoo", "BBB"), ("fred", "CPI")]),
        registry(),
        recorder.clone(),
    )
    .unwrap();
    downloader.run();

    let events = recorder.events();
    let pos = |e: &str| events.iter().position(|x| x == e).unwrap();
    assert!(pos("done fetch") < pos("start align"));
    assert!(pos("done align") < pos("start persist"));

    // Every fetch outcome is reported before the fetch barrier.
    let last_outcome = events
        .iter()
        .rposition(|e| e.starts_with("ok ") || e.starts_with("fail "))
        .unwrap();
    assert!(last_outcome < pos("done fetch"));
}

#[test]
fn save_disabled_leaves_cache_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = RunConfig {
        save: false,
        ..config(dir.path(), &[("yahoo", "AAA")])
    };
    let mut downloader = Downloader::new(cfg, registry(), Arc::new(SilentProgress)).unwrap();
    let run = downloader.run();

    assert_eq!(run.inserted, None);
    assert_eq!(run.table.height(), 5);
    assert_eq!(downloader.store().row_count().unwrap(), 0);
}

#[test]
fn unknown_provider_is_rejected_before_fetching() {
    let dir = tempfile::tempdir().unwrap();
    let result = Downloader::new(
        config(dir.path(), &[("yahoo", "AAA"), ("bloomberg", "IBM")]),
        registry(),
        Arc::new(SilentProgress),
    );
    assert!(matches!(
        result,
        Err(SetupError::Config(ConfigError::UnknownProvider { .. }))
    ));
}

#[test]
fn recognized_but_unregistered_provider_fails_at_fetch_time() {
    let dir = tempfile::tempdir().unwrap();
    let mut downloader = Downloader::new(
        config(dir.path(), &[("tiingo", "IBM"), ("yahoo", "AAA")]),
        registry(),
        Arc::new(SilentProgress),
    )
    .unwrap();
    let run = downloader.run();

    assert_eq!(run.summary.failed, 1);
    assert!(matches!(
        run.summary.failures[0].1,
        FetchError::ProviderUnavailable { .. }
    ));
    assert_eq!(run.table.symbols(), &["AAA".to_string()]);
}

#[test]
fn reset_empties_the_cache() {
    let dir = tempfile::tempdir().unwrap();
    let mut downloader = Downloader::new(
        config(dir.path(), &[("yahoo", "AAA")]),
        registry(),
        Arc::new(SilentProgress),
    )
    .unwrap();
    downloader.run();
    assert!(downloader.store().row_count().unwrap() > 0);

    downloader.reset().unwrap();
    assert_eq!(downloader.store().row_count().unwrap(), 0);
}

#[test]
fn in_memory_store_can_back_a_run() {
    let store = CacheStore::open_in_memory().unwrap();
    let cfg = config(std::path::Path::new("unused"), &[("fred", "CPI")]);
    let mut downloader =
        Downloader::with_store(cfg, registry(), store, Arc::new(SilentProgress)).unwrap();

    let run = downloader.run();
    // Monthly observations forward-fill onto every day in between.
    assert_eq!(run.table.height(), 32);
    assert_eq!(run.table.value(d("2020-01-31"), "CPI"), Some(259.1));
    assert_eq!(run.inserted, Some(32));
}
