//! Fetch worker pool.
//!
//! `W = min(concurrency, requests)` workers run on a private rayon
//! `ThreadPool` and pull jobs from one shared queue. The queue is seeded with
//! every request followed by one shutdown signal per worker before the workers
//! start. Each worker sends exactly one `(index, outcome)` message per request
//! back over a channel; the caller drains it once the scope has joined, so the
//! call is a barrier: it returns only after every request is accounted for and
//! every worker has exited.

use crate::error::FetchError;
use crate::progress::{DownloadProgress, Phase};
use crate::provider::ProviderRegistry;
use crate::request::FetchRequest;
use crate::series::{normalize, NormalizedSeries};
use chrono::NaiveDate;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Mutex;

/// Queue items.
#[derive(Debug)]
enum Job {
    Fetch { index: usize, request: FetchRequest },
    Shutdown,
}

type Outcome = (usize, FetchRequest, Result<NormalizedSeries, FetchError>);

/// Everything the pool learned about a batch of requests.
///
/// `series` and `failures` are in request order, whatever order the workers
/// finished in.
#[derive(Debug, Default)]
pub struct FetchReport {
    pub total: usize,
    pub series: Vec<NormalizedSeries>,
    pub failures: Vec<(FetchRequest, FetchError)>,
}

impl FetchReport {
    pub fn succeeded(&self) -> usize {
        self.series.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Number of workers to start for `requests` requests.
pub fn worker_count(concurrency: usize, requests: usize) -> usize {
    concurrency.min(requests)
}

/// Runs batches of fetch requests concurrently.
pub struct FetchPool<'a> {
    registry: &'a ProviderRegistry,
    progress: &'a dyn DownloadProgress,
    start: NaiveDate,
    end: NaiveDate,
    concurrency: usize,
}

impl<'a> FetchPool<'a> {
    pub fn new(
        registry: &'a ProviderRegistry,
        progress: &'a dyn DownloadProgress,
        start: NaiveDate,
        end: NaiveDate,
        concurrency: usize,
    ) -> Self {
        Self {
            registry,
            progress,
            start,
            end,
            concurrency,
        }
    }

    /// Fetch and normalize every request. Never fails: per-request errors are
    /// reported through the progress capability and collected in the report.
    pub fn fetch_all(&self, requests: &[FetchRequest]) -> FetchReport {
        let total = requests.len();
        let workers = worker_count(self.concurrency, total);
        self.progress
            .on_phase_start(Phase::Fetch, &format!("{workers} workers, {total} requests"));

        if workers == 0 {
            self.progress.on_phase_complete(Phase::Fetch);
            return FetchReport::default();
        }

        let (job_tx, job_rx) = mpsc::channel();
        let jobs = requests
            .iter()
            .cloned()
            .enumerate()
            .map(|(index, request)| Job::Fetch { index, request })
            .chain((0..workers).map(|_| Job::Shutdown));
        for job in jobs {
            // The receiver is alive until the end of this function.
            let _ = job_tx.send(job);
        }
        drop(job_tx);
        let job_rx = Mutex::new(job_rx);

        let (result_tx, result_rx) = mpsc::channel::<Outcome>();

        match rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("fetch-worker-{i}"))
            .build()
        {
            Ok(pool) => pool.scope(|s| {
                for _ in 0..workers {
                    let results = result_tx.clone();
                    let job_rx = &job_rx;
                    s.spawn(move |_| self.run_worker(job_rx, results));
                }
            }),
            // No threads available: drain the queue on the calling thread.
            Err(_) => self.run_worker(&job_rx, result_tx.clone()),
        }
        drop(result_tx);

        let mut slots: Vec<Option<(FetchRequest, Result<NormalizedSeries, FetchError>)>> =
            (0..total).map(|_| None).collect();
        for (index, request, outcome) in result_rx {
            slots[index] = Some((request, outcome));
        }

        let mut report = FetchReport {
            total,
            ..FetchReport::default()
        };
        for (request, outcome) in slots.into_iter().flatten() {
            match outcome {
                Ok(series) => report.series.push(series),
                Err(e) => report.failures.push((request, e)),
            }
        }

        self.progress.on_phase_complete(Phase::Fetch);
        report
    }

    /// Worker loop: dequeue, fetch, normalize, report; exit on shutdown.
    fn run_worker(&self, jobs: &Mutex<Receiver<Job>>, results: Sender<Outcome>) {
        loop {
            let job = match jobs.lock() {
                Ok(rx) => rx.recv(),
                Err(poisoned) => poisoned.into_inner().recv(),
            };

            let (index, request) = match job {
                Ok(Job::Fetch { index, request }) => (index, request),
                Ok(Job::Shutdown) | Err(_) => break,
            };

            self.progress.on_fetch_start(&request);
            let outcome = self.fetch_one(&request);
            match &outcome {
                Ok(series) => self.progress.on_fetch_success(&request, series.len()),
                Err(e) => self.progress.on_fetch_failure(&request, e),
            }

            if results.send((index, request, outcome)).is_err() {
                break;
            }
        }
    }

    fn fetch_one(&self, request: &FetchRequest) -> Result<NormalizedSeries, FetchError> {
        let fetched = panic::catch_unwind(AssertUnwindSafe(|| {
            self.registry
                .fetch(request.provider(), request.symbol(), self.start, self.end)
        }))
        .map_err(|payload| FetchError::Panicked(panic_message(payload.as_ref())))?;

        normalize(request.symbol(), &fetched?)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::SilentProgress;
    use crate::provider::SeriesProvider;
    use crate::series::RawSeries;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    struct Echo {
        calls: AtomicUsize,
    }

    impl SeriesProvider for Echo {
        fn id(&self) -> &str {
            "echo"
        }

        fn fetch(
            &self,
            symbol: &str,
            start: NaiveDate,
            _end: NaiveDate,
        ) -> Result<RawSeries, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match symbol {
                "FAIL" => Err(FetchError::Network("connection refused".into())),
                "EMPTY" => Ok(RawSeries::new(vec![]).with_column("v", vec![])),
                "PANIC" => panic!("provider bug"),
                _ => {
                    std::thread::sleep(Duration::from_millis((symbol.len() % 3) as u64 * 5));
                    Ok(RawSeries::new(vec![start]).with_column("v", vec![Some(1.0)]))
                }
            }
        }
    }

    fn setup() -> (ProviderRegistry, Arc<Echo>) {
        let echo = Arc::new(Echo {
            calls: AtomicUsize::new(0),
        });
        let mut registry = ProviderRegistry::new();
        registry.register(echo.clone());
        (registry, echo)
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
    }

    #[test]
    fn worker_count_is_capped_by_requests() {
        assert_eq!(worker_count(5, 2), 2);
        assert_eq!(worker_count(1, 10), 1);
        assert_eq!(worker_count(5, 0), 0);
    }

    #[test]
    fn every_request_is_accounted_for() {
        let (registry, echo) = setup();
        let requests: Vec<FetchRequest> = ["A", "FAIL", "BB", "EMPTY", "CCC", "PANIC"]
            .iter()
            .map(|s| FetchRequest::new("echo", *s))
            .collect();

        let pool = FetchPool::new(&registry, &SilentProgress, day(), day(), 4);
        let report = pool.fetch_all(&requests);

        assert_eq!(echo.calls.load(Ordering::SeqCst), 6);
        assert_eq!(report.total, 6);
        assert_eq!(report.succeeded() + report.failed(), 6);
        assert_eq!(report.succeeded(), 3);

        let symbols: Vec<&str> = report.series.iter().map(|s| s.symbol()).collect();
        assert_eq!(symbols, vec!["A", "BB", "CCC"]);

        let failed: Vec<&str> = report.failures.iter().map(|(r, _)| r.symbol()).collect();
        assert_eq!(failed, vec!["FAIL", "EMPTY", "PANIC"]);
        assert!(matches!(report.failures[1].1, FetchError::NoData { .. }));
        assert!(matches!(report.failures[2].1, FetchError::Panicked(_)));
    }

    #[test]
    fn unregistered_provider_fails_in_isolation() {
        let (registry, _) = setup();
        let requests = vec![
            FetchRequest::new("tiingo", "X"),
            FetchRequest::new("echo", "Y"),
        ];
        let report = FetchPool::new(&registry, &SilentProgress, day(), day(), 2).fetch_all(&requests);

        assert_eq!(report.succeeded(), 1);
        assert!(matches!(
            report.failures[0].1,
            FetchError::ProviderUnavailable { .. }
        ));
    }

    #[test]
    fn empty_request_list_starts_no_workers() {
        let (registry, echo) = setup();
        let report = FetchPool::new(&registry, &SilentProgress, day(), day(), 3).fetch_all(&[]);
        assert_eq!(report.total, 0);
        assert!(report.all_succeeded());
        assert_eq!(echo.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn duplicate_requests_are_fetched_twice() {
        let (registry, echo) = setup();
        let requests = vec![FetchRequest::new("echo", "A"), FetchRequest::new("echo", "A")];
        let report = FetchPool::new(&registry, &SilentProgress, day(), day(), 2).fetch_all(&requests);
        assert_eq!(echo.calls.load(Ordering::SeqCst), 2);
        assert_eq!(report.succeeded(), 2);
    }
}
