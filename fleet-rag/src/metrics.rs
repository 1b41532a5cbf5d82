//! Query and cache counters.
//!
//! A [`MetricsCollector`] is created by whoever owns the application and handed
//! to the components that report into it; there is no global instance.

use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    query_count: u64,
    error_count: u64,
    total_response_time: Duration,
    cache_hits: u64,
    cache_misses: u64,
}

/// Thread-safe collector of query latency, error, and cache counters.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    counters: Mutex<Counters>,
}

/// Point-in-time view of a [`MetricsCollector`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub query_count: u64,
    pub error_count: u64,
    pub total_response_time_secs: f64,
    /// Mean latency of successful queries.
    pub average_response_time_secs: f64,
    pub embedding_cache_hits: u64,
    pub embedding_cache_misses: u64,
    pub cache_hit_rate: f64,
    pub error_rate: f64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_counters(&self, f: impl FnOnce(&mut Counters)) {
        // A poisoned lock only means another thread panicked mid-update;
        // counters stay usable.
        let mut guard = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard);
    }

    /// Record one query. Failed queries do not contribute to latency.
    pub fn record_query(&self, elapsed: Duration, error: bool) {
        self.with_counters(|c| {
            c.query_count += 1;
            if error {
                c.error_count += 1;
            } else {
                c.total_response_time += elapsed;
            }
        });
    }

    pub fn record_cache_hit(&self) {
        self.with_counters(|c| c.cache_hits += 1);
    }

    pub fn record_cache_miss(&self) {
        self.with_counters(|c| c.cache_misses += 1);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let c = *self.counters.lock().unwrap_or_else(|e| e.into_inner());
        let successes = c.query_count - c.error_count;
        let total_secs = c.total_response_time.as_secs_f64();
        let cache_total = c.cache_hits + c.cache_misses;
        MetricsSnapshot {
            query_count: c.query_count,
            error_count: c.error_count,
            total_response_time_secs: total_secs,
            average_response_time_secs: ratio(total_secs, successes),
            embedding_cache_hits: c.cache_hits,
            embedding_cache_misses: c.cache_misses,
            cache_hit_rate: ratio(c.cache_hits as f64, cache_total),
            error_rate: ratio(c.error_count as f64, c.query_count),
        }
    }

    pub fn reset(&self) {
        self.with_counters(|c| *c = Counters::default());
    }
}

fn ratio(numerator: f64, denominator: u64) -> f64 {
    if denominator == 0 { 0.0 } else { numerator / denominator as f64 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_collector_reports_zero_rates() {
        let snap = MetricsCollector::new().snapshot();
        assert_eq!(snap.query_count, 0);
        assert_eq!(snap.cache_hit_rate, 0.0);
        assert_eq!(snap.error_rate, 0.0);
        assert_eq!(snap.average_response_time_secs, 0.0);
    }

    #[test]
    fn averages_only_successful_queries() {
        let metrics = MetricsCollector::new();
        metrics.record_query(Duration::from_secs(2), false);
        metrics.record_query(Duration::from_secs(4), false);
        metrics.record_query(Duration::from_secs(100), true);

        let snap = metrics.snapshot();
        assert_eq!(snap.query_count, 3);
        assert_eq!(snap.error_count, 1);
        assert!((snap.average_response_time_secs - 3.0).abs() < 1e-9);
        assert!((snap.error_rate - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn cache_hit_rate_and_reset() {
        let metrics = MetricsCollector::new();
        metrics.record_cache_hit();
        metrics.record_cache_hit();
        metrics.record_cache_hit();
        metrics.record_cache_miss();
        assert!((metrics.snapshot().cache_hit_rate - 0.75).abs() < 1e-9);

        metrics.reset();
        assert_eq!(metrics.snapshot().embedding_cache_hits, 0);
    }
}
