//! Task Fan-Out Runtime (C5): dispatch N concurrent shard calls, await them
//! as they complete, fold successful results into a caller-supplied
//! accumulator, and classify failures per §4.4/§7.
//!
//! Metric cancellation is deliberately *not* wired in here. The spec's
//! source threads an interval-metric handle through the fan-out helper so
//! it can cancel on the first unclassified failure; in this crate that's
//! instead the job of [`crate::metrics::with_interval_metric`], which wraps
//! whatever `Result` a caller's fan-out produces. A fan-out that returns
//! `Err` already causes the wrapping interval to cancel — no separate
//! plumbing needed (§9 design note on callback-threaded wrapping actions).

use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinSet;

use crate::client::{self, ClientAndDescription, ShardClient};

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to {event} shard with configuration '{description}'.")]
    Wrapped {
        event: String,
        description: String,
        #[source]
        source: client::Error,
    },

    #[error(transparent)]
    Rethrown(#[from] client::Error),

    #[error("shard task panicked or was cancelled: {0}")]
    Join(String),
}

/// Which shard-call failures get swallowed as an empty contribution and
/// which get propagated verbatim instead of wrapped. Plain function
/// pointers are enough here: classification never needs to capture
/// call-site state, only match on the error variant.
pub struct ExceptionPolicy {
    pub ignore: fn(&client::Error) -> bool,
    pub rethrow: fn(&client::Error) -> bool,
}

impl Default for ExceptionPolicy {
    fn default() -> Self {
        Self {
            ignore: |_| false,
            rethrow: |_| false,
        }
    }
}

impl ExceptionPolicy {
    /// Entity-not-found / entity-type-not-found treated as empty
    /// contribution while walking reverse mappings (§4.6, §7).
    pub fn ignore_not_found() -> Self {
        Self {
            ignore: |e| {
                matches!(
                    e,
                    client::Error::EntityNotFound | client::Error::EntityTypeNotFound
                )
            },
            rethrow: |_| false,
        }
    }
}

/// `CreateTasks` for the single-client-per-shard shape: pairs each client
/// with a unit payload so it can go through the same dispatch loop as the
/// bulk-subset shape below.
pub fn tasks_from_clients(clients: Vec<ClientAndDescription>) -> Vec<(ClientAndDescription, ())> {
    clients.into_iter().map(|c| (c, ())).collect()
}

/// `AwaitTaskCompletion`: spawn one task per `(client, payload)` entry via
/// `dispatch`, await them in completion order, and fold each success into
/// `on_result`. `should_continue` runs immediately after `on_result`;
/// returning `false` aborts every other outstanding task and returns `Ok`
/// early (a deliberate short-circuit is a success path, not a failure).
///
/// Each spawned task's own output carries its shard description alongside
/// the result, so this never needs a separate task -> description map kept
/// alive across the await loop — the workaround the spec's source needed
/// for its runtime's task-identity quirk (§4.4) has no counterpart here:
/// `tokio::task::JoinSet` gives every spawned future its own abort handle
/// and its own place in the set regardless of what it returns.
pub async fn await_task_completion<T, P, F, Fut>(
    entries: Vec<(ClientAndDescription, P)>,
    event_description: &str,
    dispatch: F,
    mut on_result: impl FnMut(&T),
    mut should_continue: impl FnMut(&T) -> bool,
    policy: &ExceptionPolicy,
) -> Result<(), Error>
where
    P: Send + 'static,
    T: Send + 'static,
    F: Fn(Arc<dyn ShardClient>, P) -> Fut,
    Fut: Future<Output = Result<T, client::Error>> + Send + 'static,
{
    let mut tasks: JoinSet<(String, Result<T, client::Error>)> = JoinSet::new();
    for (entry, payload) in entries {
        let fut = dispatch(entry.client, payload);
        let description = entry.description;
        tasks.spawn(async move { (description, fut.await) });
    }

    while let Some(joined) = tasks.join_next().await {
        let (description, outcome) = match joined {
            Ok(pair) => pair,
            Err(join_err) => {
                tasks.abort_all();
                return Err(Error::Join(join_err.to_string()));
            }
        };

        match outcome {
            Ok(value) => {
                on_result(&value);
                let keep_going = should_continue(&value);
                if !keep_going {
                    tasks.abort_all();
                    return Ok(());
                }
            }
            Err(err) if (policy.ignore)(&err) => continue,
            Err(err) if (policy.rethrow)(&err) => {
                tasks.abort_all();
                return Err(Error::Rethrown(err));
            }
            Err(err) => {
                tasks.abort_all();
                return Err(Error::Wrapped {
                    event: event_description.to_string(),
                    description,
                    source: err,
                });
            }
        }
    }

    Ok(())
}
