//! `with_interval_metric`: the direct helper replacing the source's nested
//! callback-threaded wrapping action (§9 design note). Begin an interval,
//! run `op`, end-and-count on success, cancel on failure — never both.

use std::future::Future;
use std::sync::Arc;

use accessgate_stats::MetricLogger;

pub async fn with_interval_metric<T, E, F, Fut>(
    logger: &Arc<dyn MetricLogger>,
    operation_name: &str,
    count_metric: &str,
    op: F,
) -> Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let handle = logger.begin_interval(operation_name);
    match op().await {
        Ok(value) => {
            logger.end_interval(handle);
            logger.increment_count(count_metric);
            Ok(value)
        }
        Err(err) => {
            logger.cancel_interval(handle);
            Err(err)
        }
    }
}
