//! Metric logger contract (begin/end/cancel interval, increment count, set
//! amount) used by `accessgate-core`'s coordinator and fan-out runtime, plus
//! a default `tracing`-backed implementation and a process-wide accessor.

pub mod handle;
pub mod logger;
pub mod registry;

pub use handle::IntervalHandle;
pub use logger::{IntervalGuard, MetricLogger, NoopMetricLogger, TracingMetricLogger};
pub use registry::{IntervalStats, MetricsSnapshot, Registry};

use once_cell::sync::Lazy;
use std::sync::Arc;
use std::sync::RwLock;

static ACTIVE: Lazy<RwLock<Arc<dyn MetricLogger>>> =
    Lazy::new(|| RwLock::new(Arc::new(TracingMetricLogger::new())));

/// The process-wide metric logger. Defaults to [`TracingMetricLogger`].
pub fn logger() -> Arc<dyn MetricLogger> {
    ACTIVE.read().unwrap_or_else(|e| e.into_inner()).clone()
}

/// Replace the process-wide metric logger, e.g. with a [`NoopMetricLogger`]
/// for benchmarks.
pub fn install_logger(logger: Arc<dyn MetricLogger>) {
    *ACTIVE.write().unwrap_or_else(|e| e.into_inner()) = logger;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_default_logger_is_tracing_backed() {
        let handle = logger().begin_interval("test_op");
        logger().end_interval(handle);
    }

    #[test]
    fn test_install_logger_swaps_global() {
        install_logger(Arc::new(NoopMetricLogger));
        let handle = logger().begin_interval("test_op");
        logger().end_interval(handle);
        install_logger(Arc::new(TracingMetricLogger::new()));
    }
}
