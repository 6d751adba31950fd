//! The metric logger contract and its two implementations.

use std::sync::Arc;
use tracing::{info_span, trace};

use crate::handle::IntervalHandle;
use crate::registry::{MetricsSnapshot, Registry};

/// Records interval, count, and amount metrics emitted while dispatching an
/// operation. Transport and aggregation outside this process are an
/// external collaborator's concern; this trait only covers the begin/end/
/// cancel/increment/set contract a caller dispatching work needs.
///
/// For a given handle, exactly one of `end_interval`/`cancel_interval` must
/// ever be called, never both, never neither, on every code path including
/// an early return that counts as success.
pub trait MetricLogger: Send + Sync {
    /// Start a timer for `operation_name`. `operation_name` should be stable
    /// across calls to the same logical operation so interval stats
    /// aggregate meaningfully.
    fn begin_interval(&self, operation_name: &str) -> IntervalHandle;

    /// Record the elapsed duration and mark the interval completed
    /// (success).
    fn end_interval(&self, handle: IntervalHandle);

    /// Mark the interval cancelled: no duration is recorded as a success.
    fn cancel_interval(&self, handle: IntervalHandle);

    /// Increment a monotonic counter.
    fn increment_count(&self, metric_name: &str);

    /// Record a point-in-time amount, e.g. `groupsMappedToGroups`.
    fn set_amount(&self, metric_name: &str, value: i64);
}

/// Default implementation: emits `tracing` spans/events for every call and
/// mirrors counters into an in-process [`Registry`] so tests and the
/// operator CLI can read current counts without a real metrics backend.
#[derive(Debug, Default)]
pub struct TracingMetricLogger {
    registry: Registry,
}

impl TracingMetricLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.registry.snapshot()
    }
}

impl MetricLogger for TracingMetricLogger {
    fn begin_interval(&self, operation_name: &str) -> IntervalHandle {
        trace!(operation = operation_name, "interval begin");
        IntervalHandle::new(operation_name)
    }

    fn end_interval(&self, handle: IntervalHandle) {
        let elapsed = handle.started_at.elapsed();
        let span = info_span!("interval", operation = %handle.operation_name, outcome = "completed");
        let _enter = span.enter();
        trace!(elapsed_ms = elapsed.as_millis() as u64, "interval end");
        self.registry
            .record_completion(&handle.operation_name, elapsed);
    }

    fn cancel_interval(&self, handle: IntervalHandle) {
        let span = info_span!("interval", operation = %handle.operation_name, outcome = "cancelled");
        let _enter = span.enter();
        trace!("interval cancel");
        self.registry.record_cancellation(&handle.operation_name);
    }

    fn increment_count(&self, metric_name: &str) {
        trace!(metric = metric_name, "count increment");
        self.registry.increment_count(metric_name);
    }

    fn set_amount(&self, metric_name: &str, value: i64) {
        trace!(metric = metric_name, value, "amount set");
        self.registry.set_amount(metric_name, value);
    }
}

/// Implementation that discards everything. For benchmarks and tests where
/// the overhead or presence of metrics recording is not under test.
#[derive(Debug, Default)]
pub struct NoopMetricLogger;

impl MetricLogger for NoopMetricLogger {
    fn begin_interval(&self, operation_name: &str) -> IntervalHandle {
        IntervalHandle::new(operation_name)
    }

    fn end_interval(&self, _handle: IntervalHandle) {}

    fn cancel_interval(&self, _handle: IntervalHandle) {}

    fn increment_count(&self, _metric_name: &str) {}

    fn set_amount(&self, _metric_name: &str, _value: i64) {}
}

/// Convenience for call sites that hold a `Arc<dyn MetricLogger>` and want
/// to guarantee the begin/end-or-cancel invariant via RAII instead of
/// manual bookkeeping: drop without calling `finish`/`cancel` still resolves
/// to a cancellation, so a `?`-propagated error upstream of an explicit
/// call can never leave a handle dangling.
pub struct IntervalGuard {
    logger: Arc<dyn MetricLogger>,
    handle: Option<IntervalHandle>,
}

impl IntervalGuard {
    pub fn start(logger: Arc<dyn MetricLogger>, operation_name: &str) -> Self {
        let handle = logger.begin_interval(operation_name);
        Self {
            logger,
            handle: Some(handle),
        }
    }

    /// Record success and consume the guard.
    pub fn finish(mut self) {
        if let Some(handle) = self.handle.take() {
            self.logger.end_interval(handle);
        }
    }

    /// Record cancellation and consume the guard.
    pub fn cancel(mut self) {
        if let Some(handle) = self.handle.take() {
            self.logger.cancel_interval(handle);
        }
    }
}

impl Drop for IntervalGuard {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.logger.cancel_interval(handle);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_tracing_logger_records_completion() {
        let logger = TracingMetricLogger::new();
        let handle = logger.begin_interval("GetUsers");
        logger.end_interval(handle);

        let snapshot = logger.snapshot();
        assert_eq!(snapshot.intervals["GetUsers"].completed, 1);
        assert_eq!(snapshot.intervals["GetUsers"].cancelled, 0);
    }

    #[test]
    fn test_tracing_logger_records_cancellation() {
        let logger = TracingMetricLogger::new();
        let handle = logger.begin_interval("GetUsers");
        logger.cancel_interval(handle);

        let snapshot = logger.snapshot();
        assert_eq!(snapshot.intervals["GetUsers"].completed, 0);
        assert_eq!(snapshot.intervals["GetUsers"].cancelled, 1);
    }

    #[test]
    fn test_guard_drop_without_finish_cancels() {
        let logger = Arc::new(TracingMetricLogger::new());
        {
            let _guard = IntervalGuard::start(logger.clone(), "GetUsers");
        }
        let snapshot = logger.snapshot();
        assert_eq!(snapshot.intervals["GetUsers"].cancelled, 1);
    }

    #[test]
    fn test_noop_logger_never_panics() {
        let logger = NoopMetricLogger;
        let handle = logger.begin_interval("GetUsers");
        logger.increment_count("calls");
        logger.set_amount("groupsMappedToGroups", 3);
        logger.end_interval(handle);
    }
}
