//! In-process snapshot of everything the default [`crate::MetricLogger`]
//! implementation has recorded, readable without a real metrics backend.
//!
//! Keyed maps use `DashMap` the same way `accessgate-core`'s rate limiter
//! keys per-IP state: many concurrent writers, occasional whole-map reads.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Aggregated outcome of every interval recorded under one operation name.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct IntervalStats {
    pub completed: u64,
    pub cancelled: u64,
    pub total_duration: Duration,
}

impl IntervalStats {
    fn record_completion(&mut self, duration: Duration) {
        self.completed += 1;
        self.total_duration = self.total_duration.saturating_add(duration);
    }

    fn record_cancellation(&mut self) {
        self.cancelled += 1;
    }

    /// Mean duration of completed (non-cancelled) intervals.
    pub fn average_duration(&self) -> Duration {
        self.total_duration
            .checked_div(self.completed as u32)
            .unwrap_or_default()
    }
}

/// A point-in-time read of the registry, suitable for the operator CLI or a
/// test assertion. Maps are `BTreeMap` here (not `DashMap`) so iteration
/// order is stable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub intervals: BTreeMap<String, IntervalStats>,
    pub counts: BTreeMap<String, u64>,
    pub amounts: BTreeMap<String, i64>,
}

/// Concurrent, append-only registry backing the default logger.
#[derive(Debug, Default)]
pub struct Registry {
    intervals: DashMap<String, IntervalStats>,
    counts: DashMap<String, u64>,
    amounts: DashMap<String, i64>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_completion(&self, operation_name: &str, duration: Duration) {
        self.intervals
            .entry(operation_name.to_string())
            .or_default()
            .record_completion(duration);
    }

    pub(crate) fn record_cancellation(&self, operation_name: &str) {
        self.intervals
            .entry(operation_name.to_string())
            .or_default()
            .record_cancellation();
    }

    pub(crate) fn increment_count(&self, metric_name: &str) {
        *self.counts.entry(metric_name.to_string()).or_insert(0) += 1;
    }

    pub(crate) fn set_amount(&self, metric_name: &str, value: i64) {
        self.amounts.insert(metric_name.to_string(), value);
    }

    /// Copy the current state out into a stably-ordered snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            intervals: self
                .intervals
                .iter()
                .map(|e| (e.key().clone(), *e.value()))
                .collect(),
            counts: self
                .counts
                .iter()
                .map(|e| (e.key().clone(), *e.value()))
                .collect(),
            amounts: self
                .amounts
                .iter()
                .map(|e| (e.key().clone(), *e.value()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_completion_and_cancellation_tracked_separately() {
        let registry = Registry::new();
        registry.record_completion("GetUsers", Duration::from_millis(10));
        registry.record_completion("GetUsers", Duration::from_millis(30));
        registry.record_cancellation("GetUsers");

        let snapshot = registry.snapshot();
        let stats = snapshot.intervals["GetUsers"];
        assert_eq!(stats.completed, 2);
        assert_eq!(stats.cancelled, 1);
        assert_eq!(stats.average_duration(), Duration::from_millis(20));
    }

    #[test]
    fn test_counts_and_amounts_independent() {
        let registry = Registry::new();
        registry.increment_count("groupShardsQueried.calls");
        registry.increment_count("groupShardsQueried.calls");
        registry.set_amount("groupsMappedToGroups", 4);
        registry.set_amount("groupsMappedToGroups", 6);

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.counts["groupShardsQueried.calls"], 2);
        assert_eq!(snapshot.amounts["groupsMappedToGroups"], 6);
    }
}
