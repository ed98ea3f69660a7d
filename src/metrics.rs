//! Fetch latency and success tracking per data source

use crate::types::DataSource;
use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;

/// Maximum number of samples to keep for metrics calculation
const MAX_SAMPLES: usize = 100;

/// Metrics for a single data source
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchMetrics {
    pub source: DataSource,
    /// 50th percentile latency of successful fetches, in milliseconds
    pub latency_p50_ms: f64,
    /// 99th percentile latency of successful fetches, in milliseconds
    pub latency_p99_ms: f64,
    /// Success rate (0.0 to 1.0)
    pub success_rate: f64,
    pub total_requests: u64,
    pub failed_requests: u64,
}

impl FetchMetrics {
    /// Metrics with no data
    pub fn empty(source: DataSource) -> Self {
        Self {
            source,
            latency_p50_ms: 0.0,
            latency_p99_ms: 0.0,
            success_rate: 1.0,
            total_requests: 0,
            failed_requests: 0,
        }
    }
}

#[derive(Debug, Clone)]
struct LatencySample {
    duration_ms: f64,
    success: bool,
}

/// Rolling window of fetch outcomes for one data source
#[derive(Debug, Clone)]
pub struct MetricsCollector {
    source: DataSource,
    samples: VecDeque<LatencySample>,
    total_requests: u64,
    failed_requests: u64,
}

impl MetricsCollector {
    pub fn new(source: DataSource) -> Self {
        Self {
            source,
            samples: VecDeque::with_capacity(MAX_SAMPLES),
            total_requests: 0,
            failed_requests: 0,
        }
    }

    /// Records one settled fetch, retries included in `duration`
    pub fn record(&mut self, duration: Duration, success: bool) {
        self.total_requests += 1;
        if !success {
            self.failed_requests += 1;
        }

        if self.samples.len() >= MAX_SAMPLES {
            self.samples.pop_front();
        }
        self.samples.push_back(LatencySample {
            duration_ms: duration.as_secs_f64() * 1000.0,
            success,
        });
    }

    pub fn snapshot(&self) -> FetchMetrics {
        if self.samples.is_empty() {
            return FetchMetrics::empty(self.source);
        }

        let mut latencies: Vec<f64> = self
            .samples
            .iter()
            .filter(|s| s.success)
            .map(|s| s.duration_ms)
            .collect();
        latencies.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let success_rate = if self.total_requests > 0 {
            (self.total_requests - self.failed_requests) as f64 / self.total_requests as f64
        } else {
            1.0
        };

        FetchMetrics {
            source: self.source,
            latency_p50_ms: percentile(&latencies, 50.0),
            latency_p99_ms: percentile(&latencies, 99.0),
            success_rate,
            total_requests: self.total_requests,
            failed_requests: self.failed_requests,
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collector_counts_failures() {
        let mut collector = MetricsCollector::new(DataSource::Listing);
        collector.record(Duration::from_millis(100), true);
        collector.record(Duration::from_millis(200), true);
        collector.record(Duration::from_millis(150), false);

        let metrics = collector.snapshot();
        assert_eq!(metrics.source, DataSource::Listing);
        assert_eq!(metrics.total_requests, 3);
        assert_eq!(metrics.failed_requests, 1);
        assert!(metrics.success_rate > 0.6 && metrics.success_rate < 0.7);
        // Failed samples do not contribute latency
        assert_eq!(metrics.latency_p99_ms, 200.0);
    }

    #[test]
    fn window_is_bounded() {
        let mut collector = MetricsCollector::new(DataSource::GlobalSummary);
        for i in 0..(MAX_SAMPLES + 20) {
            collector.record(Duration::from_millis(i as u64), true);
        }
        assert_eq!(collector.samples.len(), MAX_SAMPLES);
        assert_eq!(collector.snapshot().total_requests, (MAX_SAMPLES + 20) as u64);
    }

    #[test]
    fn empty_collector_reports_defaults() {
        let collector = MetricsCollector::new(DataSource::Listing);
        assert_eq!(collector.snapshot(), FetchMetrics::empty(DataSource::Listing));
    }

    #[test]
    fn test_percentile() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0];
        assert_eq!(percentile(&values, 50.0), 5.0);
        assert_eq!(percentile(&values, 99.0), 9.0);
        assert_eq!(percentile(&[], 50.0), 0.0);
    }
}
