//! Crate-wide error taxonomy. Mirrors the teacher's per-module `Error`
//! pattern: each concern gets its own enum, convertible into this one via
//! `#[from]`.

use thiserror::Error;

use crate::client::Error as ClientError;
use crate::coordinator::Error as CoordinatorError;
use crate::fanout::Error as FanoutError;
use crate::manager::Error as ManagerError;

/// Top-level error any public `accessgate-core` entry point can return.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Manager(#[from] ManagerError),

    #[error(transparent)]
    Fanout(#[from] FanoutError),

    #[error(transparent)]
    Coordinator(#[from] CoordinatorError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Config(#[from] accessgate_config::Error),

    #[error(transparent)]
    Refresh(#[from] ShardConfigurationRefreshError),
}

/// Raised by `ShardClientManager::refresh_configuration_from_document` /
/// `refresh_configuration_from_str` when the incoming payload fails to
/// parse or fails `ShardConfigurationSet`'s partition-invariant check; the
/// active snapshot is left unchanged. This is the `RefreshConfiguration`
/// contract's `ShardConfigurationRefreshException` (§4.3/§6).
#[derive(Debug, Error)]
#[error("failed to refresh shard configuration: {source}")]
pub struct ShardConfigurationRefreshError {
    #[source]
    pub source: accessgate_config::Error,
}
