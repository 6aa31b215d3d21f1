//! Latency trends, failure rates, and the thresholds evaluated over them.
//!
//! Every timed request feeds two trends (the global `http_req_duration`
//! and a per-endpoint one keyed `"METHOD /path"`) plus the global
//! `http_req_failed` rate. Trend summaries report count/avg/min/med/max
//! and interpolated p(95)/p(99).

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;

pub const HTTP_REQ_DURATION: &str = "http_req_duration";
pub const HTTP_REQ_FAILED: &str = "http_req_failed";
pub const ITERATIONS: &str = "iterations";
pub const ITERATION_DURATION: &str = "iteration_duration";
pub const WS_MESSAGES_RECEIVED: &str = "ws_messages_received";

#[derive(Debug, Default)]
struct Trend {
    samples: Vec<f64>,
}

#[derive(Debug, Default)]
struct Rate {
    passes: u64,
    fails: u64,
}

#[derive(Debug, Default)]
struct Inner {
    trends: HashMap<String, Trend>,
    rates: HashMap<String, Rate>,
    counters: HashMap<String, u64>,
}

/// Shared metric sink. Cheap to clone; clones feed the same registry.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    inner: Arc<Mutex<Inner>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one HTTP request: global and per-endpoint latency, plus
    /// the failure rate.
    pub fn record_request(&self, endpoint: &str, elapsed: Duration, ok: bool) {
        let ms = elapsed.as_secs_f64() * 1000.0;
        let mut inner = self.inner.lock();
        inner
            .trends
            .entry(HTTP_REQ_DURATION.to_string())
            .or_default()
            .samples
            .push(ms);
        inner
            .trends
            .entry(endpoint.to_string())
            .or_default()
            .samples
            .push(ms);
        let rate = inner.rates.entry(HTTP_REQ_FAILED.to_string()).or_default();
        if ok {
            rate.passes += 1;
        } else {
            rate.fails += 1;
        }
    }

    pub fn add_trend(&self, name: &str, elapsed: Duration) {
        let ms = elapsed.as_secs_f64() * 1000.0;
        self.inner
            .lock()
            .trends
            .entry(name.to_string())
            .or_default()
            .samples
            .push(ms);
    }

    pub fn incr(&self, name: &str) {
        *self.inner.lock().counters.entry(name.to_string()).or_default() += 1;
    }

    /// Times `fut` and records it against `endpoint`, passing the result
    /// through. `Err` counts toward `http_req_failed`.
    pub async fn timed<T, F>(&self, endpoint: &str, fut: F) -> palaver::Result<T>
    where
        F: Future<Output = palaver::Result<T>>,
    {
        let start = Instant::now();
        let result = fut.await;
        self.record_request(endpoint, start.elapsed(), result.is_ok());
        result
    }

    pub fn snapshot(&self) -> BTreeMap<String, MetricSummary> {
        let inner = self.inner.lock();
        let mut out = BTreeMap::new();
        for (name, trend) in &inner.trends {
            out.insert(name.clone(), MetricSummary::Trend(summarize(&trend.samples)));
        }
        for (name, rate) in &inner.rates {
            let total = rate.passes + rate.fails;
            out.insert(
                name.clone(),
                MetricSummary::Rate(RateSummary {
                    rate: if total == 0 {
                        0.0
                    } else {
                        rate.fails as f64 / total as f64
                    },
                    passes: rate.passes,
                    fails: rate.fails,
                }),
            );
        }
        for (name, count) in &inner.counters {
            out.insert(name.clone(), MetricSummary::Counter { count: *count });
        }
        out
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum MetricSummary {
    Trend(TrendSummary),
    Rate(RateSummary),
    Counter { count: u64 },
}

#[derive(Debug, Clone, Serialize)]
pub struct TrendSummary {
    pub count: u64,
    pub avg: f64,
    pub min: f64,
    pub med: f64,
    pub max: f64,
    #[serde(rename = "p(95)")]
    pub p95: f64,
    #[serde(rename = "p(99)")]
    pub p99: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RateSummary {
    pub rate: f64,
    pub passes: u64,
    pub fails: u64,
}

fn summarize(samples: &[f64]) -> TrendSummary {
    if samples.is_empty() {
        return TrendSummary {
            count: 0,
            avg: 0.0,
            min: 0.0,
            med: 0.0,
            max: 0.0,
            p95: 0.0,
            p99: 0.0,
        };
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let sum: f64 = sorted.iter().sum();
    TrendSummary {
        count: sorted.len() as u64,
        avg: sum / sorted.len() as f64,
        min: sorted[0],
        med: percentile(&sorted, 50.0),
        max: sorted[sorted.len() - 1],
        p95: percentile(&sorted, 95.0),
        p99: percentile(&sorted, 99.0),
    }
}

/// Linear-interpolated percentile over an already-sorted slice.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ThresholdResult {
    pub metric: String,
    pub expression: String,
    pub observed: f64,
    pub ok: bool,
}

/// Pass/fail gates: global latency p95/p99, global failure rate, and a
/// p95 gate on every per-endpoint trend.
pub fn evaluate_thresholds(snapshot: &BTreeMap<String, MetricSummary>) -> Vec<ThresholdResult> {
    let mut results = Vec::new();
    for (name, summary) in snapshot {
        match summary {
            MetricSummary::Trend(trend) if name == HTTP_REQ_DURATION => {
                results.push(check(name, "p(95)<500", trend.p95, trend.p95 < 500.0));
                results.push(check(name, "p(99)<1000", trend.p99, trend.p99 < 1000.0));
            }
            // Per-endpoint trends are keyed "METHOD /path".
            MetricSummary::Trend(trend) if name.contains(' ') => {
                results.push(check(name, "p(95)<500", trend.p95, trend.p95 < 500.0));
            }
            MetricSummary::Rate(rate) if name == HTTP_REQ_FAILED => {
                results.push(check(name, "rate<0.01", rate.rate, rate.rate < 0.01));
            }
            _ => {}
        }
    }
    results
}

fn check(metric: &str, expression: &str, observed: f64, ok: bool) -> ThresholdResult {
    ThresholdResult {
        metric: metric.to_string(),
        expression: expression.to_string(),
        observed,
        ok,
    }
}
