//! Source health metrics collection and reporting
//!
//! Tracks latency percentiles and success rates per quote source.

use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

/// Maximum number of samples to keep for metrics calculation
const MAX_SAMPLES: usize = 100;

/// Metrics for a single source
#[derive(Debug, Clone, Serialize)]
pub struct SourceMetrics {
    /// Name of the source
    pub source_name: String,
    /// 50th percentile latency of successful calls in milliseconds
    pub latency_p50_ms: f64,
    /// 99th percentile latency of successful calls in milliseconds
    pub latency_p99_ms: f64,
    /// Success rate over the recent window (0.0 to 1.0)
    pub success_rate: f64,
    /// Total number of calls tracked
    pub total_requests: u64,
    /// Number of failed calls
    pub failed_requests: u64,
}

impl SourceMetrics {
    /// Creates metrics with no data
    pub fn empty(source_name: &str) -> Self {
        Self {
            source_name: source_name.to_string(),
            latency_p50_ms: 0.0,
            latency_p99_ms: 0.0,
            success_rate: 1.0,
            total_requests: 0,
            failed_requests: 0,
        }
    }

    /// True once the source has answered at least one call
    pub fn has_samples(&self) -> bool {
        self.total_requests > 0
    }
}

#[derive(Debug, Clone)]
struct LatencySample {
    duration_ms: f64,
    success: bool,
}

/// Collects and computes metrics for one source
pub struct MetricsCollector {
    source_name: String,
    /// Rolling window of latency samples
    samples: RwLock<VecDeque<LatencySample>>,
    total_requests: AtomicU64,
    failed_requests: AtomicU64,
}

impl MetricsCollector {
    /// Creates a new metrics collector for a source
    pub fn new(source_name: &str) -> Self {
        Self {
            source_name: source_name.to_string(),
            samples: RwLock::new(VecDeque::with_capacity(MAX_SAMPLES)),
            total_requests: AtomicU64::new(0),
            failed_requests: AtomicU64::new(0),
        }
    }

    /// Records a call with its duration and outcome
    pub async fn record_request(&self, duration: Duration, success: bool) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }

        let mut samples = self.samples.write().await;
        if samples.len() >= MAX_SAMPLES {
            samples.pop_front();
        }
        samples.push_back(LatencySample {
            duration_ms: duration.as_secs_f64() * 1000.0,
            success,
        });
    }

    /// Computes current metrics from collected samples
    pub async fn get_metrics(&self) -> SourceMetrics {
        let samples = self.samples.read().await;
        if samples.is_empty() {
            return SourceMetrics::empty(&self.source_name);
        }

        let mut latencies: Vec<f64> = samples
            .iter()
            .filter(|s| s.success)
            .map(|s| s.duration_ms)
            .collect();
        latencies.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let successes = samples.iter().filter(|s| s.success).count();

        SourceMetrics {
            source_name: self.source_name.clone(),
            latency_p50_ms: percentile(&latencies, 50.0),
            latency_p99_ms: percentile(&latencies, 99.0),
            success_rate: successes as f64 / samples.len() as f64,
            total_requests: self.total_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
        }
    }
}

/// Calculate percentile from sorted values
fn percentile(sorted_values: &[f64], p: f64) -> f64 {
    if sorted_values.is_empty() {
        return 0.0;
    }

    let idx = (p / 100.0 * (sorted_values.len() - 1) as f64).round() as usize;
    sorted_values[idx.min(sorted_values.len() - 1)]
}

/// One collector per source, in chain order
pub struct MetricsRegistry {
    order: Vec<&'static str>,
    collectors: HashMap<&'static str, MetricsCollector>,
}

impl MetricsRegistry {
    pub fn new<I>(source_names: I) -> Self
    where
        I: IntoIterator<Item = &'static str>,
    {
        let mut order = Vec::new();
        let mut collectors = HashMap::new();
        for name in source_names {
            if collectors
                .insert(name, MetricsCollector::new(name))
                .is_none()
            {
                order.push(name);
            }
        }
        Self { order, collectors }
    }

    /// Records a call for `source_name`; unknown names are ignored
    pub async fn record(&self, source_name: &str, duration: Duration, success: bool) {
        if let Some(collector) = self.collectors.get(source_name) {
            collector.record_request(duration, success).await;
        }
    }

    /// Metrics for every source, in chain order
    pub async fn snapshot(&self) -> Vec<SourceMetrics> {
        let mut all = Vec::with_capacity(self.order.len());
        for name in &self.order {
            if let Some(collector) = self.collectors.get(name) {
                all.push(collector.get_metrics().await);
            }
        }
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_metrics_collector() {
        let collector = MetricsCollector::new("yahoo");

        collector.record_request(Duration::from_millis(100), true).await;
        collector.record_request(Duration::from_millis(200), true).await;
        collector.record_request(Duration::from_millis(150), false).await;

        let metrics = collector.get_metrics().await;

        assert_eq!(metrics.source_name, "yahoo");
        assert_eq!(metrics.total_requests, 3);
        assert_eq!(metrics.failed_requests, 1);
        assert!(metrics.success_rate > 0.6 && metrics.success_rate < 0.7);
        assert_eq!(metrics.latency_p99_ms, 200.0);
    }

    #[tokio::test]
    async fn test_window_is_bounded() {
        let collector = MetricsCollector::new("nse");
        for _ in 0..MAX_SAMPLES {
            collector.record_request(Duration::from_millis(10), false).await;
        }
        for _ in 0..MAX_SAMPLES {
            collector.record_request(Duration::from_millis(10), true).await;
        }

        let metrics = collector.get_metrics().await;
        assert_eq!(metrics.total_requests, 2 * MAX_SAMPLES as u64);
        assert_eq!(metrics.success_rate, 1.0);
    }

    #[tokio::test]
    async fn test_registry_keeps_chain_order() {
        let registry = MetricsRegistry::new(["alpha_vantage", "yahoo", "alpha_vantage"]);
        registry.record("yahoo", Duration::from_millis(5), true).await;
        registry.record("unknown", Duration::from_millis(5), true).await;

        let snapshot = registry.snapshot().await;
        let names: Vec<_> = snapshot.iter().map(|m| m.source_name.as_str()).collect();
        assert_eq!(names, vec!["alpha_vantage", "yahoo"]);
        assert!(!snapshot[0].has_samples());
        assert!(snapshot[1].has_samples());
    }

    #[test]
    fn test_percentile() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
        assert_eq!(percentile(&values, 50.0), 5.0);
        assert_eq!(percentile(&values, 99.0), 10.0);
    }
}
