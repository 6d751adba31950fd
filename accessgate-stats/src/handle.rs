//! Handle returned by [`crate::MetricLogger::begin_interval`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies one in-flight interval. Opaque to callers beyond passing it
/// back to `end_interval`/`cancel_interval`; exactly one of those two must
/// be called per handle, never both, never neither.
#[derive(Debug)]
pub struct IntervalHandle {
    pub(crate) id: u64,
    pub(crate) operation_name: String,
    pub(crate) started_at: Instant,
}

impl IntervalHandle {
    pub(crate) fn new(operation_name: impl Into<String>) -> Self {
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            operation_name: operation_name.into(),
            started_at: Instant::now(),
        }
    }

    pub fn operation_name(&self) -> &str {
        &self.operation_name
    }
}
