//! Process-wide handle to the currently installed shard configuration.
//!
//! Mirrors the teacher's `config()` global: an `ArcSwap` so readers never
//! block behind a refresh in progress, and a `Mutex` serializing writers
//! (refreshes are rare and don't need to be lock-free against each other).

use arc_swap::ArcSwap;
use once_cell::sync::Lazy;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::Error;
use crate::loader;
use crate::segment::ShardConfigurationSet;

/// The active configuration: the document it was loaded from (for
/// diagnostics/`configcheck`) plus the derived routing table.
#[derive(Debug, Clone)]
pub struct ActiveConfig {
    pub path: PathBuf,
    pub shards: Arc<ShardConfigurationSet>,
}

impl Default for ActiveConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("accessgate.toml"),
            shards: Arc::new(ShardConfigurationSet::default()),
        }
    }
}

static ACTIVE: Lazy<ArcSwap<ActiveConfig>> =
    Lazy::new(|| ArcSwap::from_pointee(ActiveConfig::default()));
static WRITE_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// Snapshot of the process-wide active configuration.
pub fn active() -> Arc<ActiveConfig> {
    ACTIVE.load_full()
}

/// Load `path` and install it as the active configuration.
pub fn load(path: &Path) -> Result<Arc<ActiveConfig>, Error> {
    let _guard = WRITE_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let shards = loader::load_path(path)?;
    let config = Arc::new(ActiveConfig {
        path: path.to_owned(),
        shards: Arc::new(shards),
    });
    ACTIVE.store(config.clone());
    Ok(config)
}

/// Install an already-built [`ShardConfigurationSet`] as the active
/// configuration, bypassing the file loader (used by tests and by callers
/// that assemble configuration programmatically).
pub fn install(shards: ShardConfigurationSet) -> Arc<ActiveConfig> {
    let _guard = WRITE_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let config = Arc::new(ActiveConfig {
        path: active().path.clone(),
        shards: Arc::new(shards),
    });
    ACTIVE.store(config.clone());
    config
}
