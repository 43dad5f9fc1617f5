use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

const MICROS_PER_MS: f64 = 1_000.0;

/// Per-path accumulator of execution timings, safe for any number of
/// concurrent writers.
///
/// Counters are updated independently with relaxed atomics. Derived figures
/// read `total_requests` first and tolerate slight skew against the other
/// counters while writers are active.
#[derive(Debug)]
pub struct MetricsRecorder {
    total_requests: AtomicU64,
    total_execution_us: AtomicU64,
    success_count: AtomicU64,
    failure_count: AtomicU64,
    min_execution_us: AtomicU64,
    max_execution_us: AtomicU64,
    started_at: DateTime<Utc>,
    started: Instant,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            total_execution_us: AtomicU64::new(0),
            success_count: AtomicU64::new(0),
            failure_count: AtomicU64::new(0),
            min_execution_us: AtomicU64::new(u64::MAX),
            max_execution_us: AtomicU64::new(0),
            started_at: Utc::now(),
            started: Instant::now(),
        }
    }

    pub fn record_execution(&self, elapsed: Duration, success: bool) {
        let us = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);

        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.total_execution_us.fetch_add(us, Ordering::Relaxed);
        if success {
            self.success_count.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failure_count.fetch_add(1, Ordering::Relaxed);
        }
        self.min_execution_us.fetch_min(us, Ordering::Relaxed);
        self.max_execution_us.fetch_max(us, Ordering::Relaxed);
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    pub fn success_count(&self) -> u64 {
        self.success_count.load(Ordering::Relaxed)
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    pub fn average_ms(&self) -> f64 {
        let total = self.total_requests();
        if total == 0 {
            return 0.0;
        }
        us_to_ms(self.total_execution_us.load(Ordering::Relaxed)) / total as f64
    }

    pub fn success_rate(&self) -> f64 {
        let total = self.total_requests();
        if total == 0 {
            return 0.0;
        }
        self.success_count() as f64 / total as f64 * 100.0
    }

    pub fn throughput_per_second(&self) -> f64 {
        let secs = self.started.elapsed().as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        self.total_requests() as f64 / secs
    }

    pub fn min_ms(&self) -> f64 {
        match self.min_execution_us.load(Ordering::Relaxed) {
            u64::MAX => 0.0,
            us => us_to_ms(us),
        }
    }

    pub fn max_ms(&self) -> f64 {
        us_to_ms(self.max_execution_us.load(Ordering::Relaxed))
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_requests: self.total_requests(),
            success_count: self.success_count(),
            failure_count: self.failure_count(),
            average_execution_time_ms: self.average_ms(),
            min_execution_time_ms: self.min_ms(),
            max_execution_time_ms: self.max_ms(),
            success_rate: self.success_rate(),
            throughput_per_second: self.throughput_per_second(),
            started_at: self.started_at,
        }
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

fn us_to_ms(us: u64) -> f64 {
    us as f64 / MICROS_PER_MS
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub average_execution_time_ms: f64,
    pub min_execution_time_ms: f64,
    pub max_execution_time_ms: f64,
    pub success_rate: f64,
    pub throughput_per_second: f64,
    pub started_at: DateTime<Utc>,
}
