use crate::command::Request;
use crate::config::{LoadTestConfig, OrchestratorOptions};
use crate::dispatcher::Dispatcher;
use crate::invoker::PathInvoker;
use crate::metrics::MetricsSnapshot;
use crate::registry::{ApiPath, Comparison, MetricsRegistry};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::JoinSet;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

/// Produces the next path-B request for a worker.
pub type RequestSource<R> = Arc<dyn Fn(&mut StdRng) -> R + Send + Sync>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LoadTestError {
    #[error("invalid load test config: {0}")]
    InvalidConfig(String),
    #[error("a load test is already running")]
    AlreadyRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadTestState {
    Idle,
    Running,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub config: LoadTestConfig,
}

impl TestResult {
    pub fn duration_ms(&self) -> i64 {
        (self.ended_at - self.started_at).num_milliseconds()
    }
}

#[derive(Debug, Clone, Copy)]
struct Jitter {
    min_ms: u64,
    max_ms: u64,
}

impl Jitter {
    fn sample(&self, rng: &mut StdRng) -> Duration {
        if self.max_ms <= self.min_ms {
            return Duration::from_millis(self.min_ms);
        }
        Duration::from_millis(rng.gen_range(self.min_ms..self.max_ms))
    }
}

/// Drives concurrent traffic through both paths for a fixed duration.
pub struct LoadTester<R: Request + 'static> {
    metrics: Arc<MetricsRegistry>,
    dispatcher: Arc<Dispatcher<R>>,
    path_a: Arc<dyn PathInvoker>,
    source: RequestSource<R>,
    options: OrchestratorOptions,
    state: Mutex<LoadTestState>,
    running: Arc<AtomicBool>,
}

impl<R: Request + 'static> LoadTester<R> {
    pub fn new(
        metrics: Arc<MetricsRegistry>,
        dispatcher: Arc<Dispatcher<R>>,
        path_a: Arc<dyn PathInvoker>,
        source: RequestSource<R>,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            metrics,
            dispatcher,
            path_a,
            source,
            options,
            state: Mutex::new(LoadTestState::Idle),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn state(&self) -> LoadTestState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn metrics(&self, path: ApiPath) -> MetricsSnapshot {
        self.metrics.metrics(path)
    }

    pub fn comparison(&self) -> Comparison {
        self.metrics.compare()
    }

    pub fn reset(&self) {
        self.metrics.reset();
    }

    /// Asks every worker of the current run to exit after its iteration.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }

    fn begin(&self) -> Result<(), LoadTestError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state == LoadTestState::Running {
            return Err(LoadTestError::AlreadyRunning);
        }
        *state = LoadTestState::Running;
        Ok(())
    }

    fn finish(&self) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = LoadTestState::Completed;
    }

    /// Resets the metrics, then runs `concurrency` workers per path until
    /// the deadline. Individual operation failures never fail the run.
    pub async fn run_load_test(&self, config: LoadTestConfig) -> Result<TestResult, LoadTestError> {
        if config.concurrency == 0 {
            return Err(LoadTestError::InvalidConfig("concurrency must be > 0".into()));
        }
        if config.duration_seconds == 0 {
            return Err(LoadTestError::InvalidConfig("duration_seconds must be > 0".into()));
        }
        self.begin()?;

        info!(
            concurrency = config.concurrency,
            duration_seconds = config.duration_seconds,
            path_a = self.path_a.name(),
            "Starting load test"
        );

        self.metrics.reset();
        self.running.store(true, Ordering::Relaxed);

        let started_at = Utc::now();
        let deadline = Instant::now() + config.duration();
        let jitter = Jitter {
            min_ms: self.options.jitter_min_ms,
            max_ms: self.options.jitter_max_ms,
        };

        let mut workers = JoinSet::new();
        for _ in 0..config.concurrency {
            workers.spawn(path_a_worker(
                Arc::clone(&self.path_a),
                Arc::clone(&self.metrics),
                Arc::clone(&self.running),
                deadline,
                jitter,
            ));
        }
        for _ in 0..config.concurrency {
            workers.spawn(path_b_worker(
                Arc::clone(&self.dispatcher),
                Arc::clone(&self.source),
                Arc::clone(&self.running),
                deadline,
                jitter,
            ));
        }

        let budget = config.duration() + self.options.grace_period;
        if timeout(budget, join_all(&mut workers)).await.is_err() {
            warn!(
                remaining = workers.len(),
                "Workers still running after grace period, aborting"
            );
            workers.shutdown().await;
        }

        self.running.store(false, Ordering::Relaxed);
        let ended_at = Utc::now();
        self.finish();

        let result = TestResult {
            started_at,
            ended_at,
            config,
        };
        info!(duration_ms = result.duration_ms(), "Load test completed");
        Ok(result)
    }
}

async fn join_all(workers: &mut JoinSet<()>) {
    while let Some(joined) = workers.join_next().await {
        if let Err(e) = joined {
            warn!("Load test worker panicked: {}", e);
        }
    }
}

async fn path_a_worker(
    invoker: Arc<dyn PathInvoker>,
    metrics: Arc<MetricsRegistry>,
    running: Arc<AtomicBool>,
    deadline: Instant,
    jitter: Jitter,
) {
    let mut rng = StdRng::from_entropy();
    while running.load(Ordering::Relaxed) && Instant::now() < deadline {
        let start = Instant::now();
        match invoker.invoke().await {
            Ok(invocation) => metrics.record_path_a(invocation.elapsed, invocation.success),
            Err(e) => {
                metrics.record_path_a(start.elapsed(), false);
                debug!("Path A call failed: {:#}", e);
            }
        }
        sleep(jitter.sample(&mut rng)).await;
    }
}

/// The dispatcher records path-B metrics itself; errors stop here.
async fn path_b_worker<R: Request + 'static>(
    dispatcher: Arc<Dispatcher<R>>,
    source: RequestSource<R>,
    running: Arc<AtomicBool>,
    deadline: Instant,
    jitter: Jitter,
) {
    let mut rng = StdRng::from_entropy();
    while running.load(Ordering::Relaxed) && Instant::now() < deadline {
        let request = source(&mut rng);
        if let Err(e) = dispatcher.dispatch(&request) {
            debug!("Path B dispatch failed: {}", e);
        }
        sleep(jitter.sample(&mut rng)).await;
    }
}
