use crate::metrics::{MetricsRecorder, MetricsSnapshot};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use thiserror::Error;

/// One of the two invocation styles under comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApiPath {
    /// Conventional request/response endpoints reached over the network.
    #[serde(rename = "A")]
    A,
    /// In-process typed command dispatch.
    #[serde(rename = "B")]
    B,
}

impl ApiPath {
    pub fn label(&self) -> &'static str {
        match self {
            ApiPath::A => "REST API",
            ApiPath::B => "Action API",
        }
    }
}

impl fmt::Display for ApiPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiPath::A => f.write_str("A"),
            ApiPath::B => f.write_str("B"),
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown path: {0} (expected A/REST or B/ACTION)")]
pub struct UnknownPath(String);

impl FromStr for ApiPath {
    type Err = UnknownPath;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_uppercase().as_str() {
            "A" | "REST" => Ok(ApiPath::A),
            "B" | "ACTION" => Ok(ApiPath::B),
            _ => Err(UnknownPath(value.to_string())),
        }
    }
}

#[derive(Debug, Default)]
struct Recorders {
    a: MetricsRecorder,
    b: MetricsRecorder,
}

impl Recorders {
    fn get(&self, path: ApiPath) -> &MetricsRecorder {
        match path {
            ApiPath::A => &self.a,
            ApiPath::B => &self.b,
        }
    }
}

/// Owns the recorders for both paths.
///
/// The pair lives behind a single pointer, so `reset` swaps both at once and
/// a reader never sees one path fresh and the other stale.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    current: RwLock<Arc<Recorders>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn recorders(&self) -> Arc<Recorders> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn reset(&self) {
        let fresh = Arc::new(Recorders::default());
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = fresh;
    }

    pub fn record(&self, path: ApiPath, elapsed: Duration, success: bool) {
        self.recorders().get(path).record_execution(elapsed, success);
    }

    pub fn record_path_a(&self, elapsed: Duration, success: bool) {
        self.record(ApiPath::A, elapsed, success);
    }

    pub fn record_path_b(&self, elapsed: Duration, success: bool) {
        self.record(ApiPath::B, elapsed, success);
    }

    pub fn metrics(&self, path: ApiPath) -> MetricsSnapshot {
        self.recorders().get(path).snapshot()
    }

    pub fn compare(&self) -> Comparison {
        let recorders = self.recorders();
        Comparison::between(recorders.a.snapshot(), recorders.b.snapshot())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    #[serde(rename = "A")]
    A,
    #[serde(rename = "B")]
    B,
    #[serde(rename = "TIE")]
    Tie,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::A => f.write_str("A"),
            Verdict::B => f.write_str("B"),
            Verdict::Tie => f.write_str("TIE"),
        }
    }
}

/// Relative statistics between path A and path B, derived on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub path_a: MetricsSnapshot,
    pub path_b: MetricsSnapshot,
    /// Positive when B has the lower average latency.
    pub avg_time_diff_percent: f64,
    /// Positive when B has the higher throughput.
    pub throughput_diff_percent: f64,
    /// B's success rate minus A's, in percentage points.
    pub success_rate_diff_percent: f64,
    pub faster_path: Verdict,
}

impl Comparison {
    pub fn between(path_a: MetricsSnapshot, path_b: MetricsSnapshot) -> Self {
        let avg_a = path_a.average_execution_time_ms;
        let avg_b = path_b.average_execution_time_ms;
        let tp_a = path_a.throughput_per_second;
        let tp_b = path_b.throughput_per_second;

        let avg_time_diff_percent = if avg_a == 0.0 {
            0.0
        } else {
            (avg_a - avg_b) / avg_a * 100.0
        };
        let throughput_diff_percent = if tp_a == 0.0 {
            0.0
        } else {
            (tp_b - tp_a) / tp_a * 100.0
        };
        let success_rate_diff_percent = path_b.success_rate - path_a.success_rate;

        let faster_path = if avg_b < avg_a {
            Verdict::B
        } else if avg_a < avg_b {
            Verdict::A
        } else {
            Verdict::Tie
        };

        Self {
            path_a,
            path_b,
            avg_time_diff_percent,
            throughput_diff_percent,
            success_rate_diff_percent,
            faster_path,
        }
    }
}
