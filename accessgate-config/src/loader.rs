//! Parses a shard-configuration document (TOML) into a validated
//! [`ShardConfigurationSet`].

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

use crate::element::{ElementClass, OperationKind};
use crate::error::Error;
use crate::segment::{ShardConfigurationSet, ShardRangeSegment};

/// On-disk shape of one segment in the configuration document. Field names
/// match the document format described in the shard configuration payload;
/// the loader groups these into the nested `(class, kind) -> [segment]`
/// shape `ShardConfigurationSet` needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentRecord {
    pub element_class: ElementClass,
    pub operation_kind: OperationKind,
    pub hash_range_start: i32,
    pub endpoint_uri: String,
    pub description: String,
}

impl From<SegmentRecord> for ShardRangeSegment {
    fn from(record: SegmentRecord) -> Self {
        Self {
            class: record.element_class,
            kind: record.operation_kind,
            hash_range_start: record.hash_range_start,
            endpoint_uri: record.endpoint_uri,
            description: record.description,
        }
    }
}

/// Root of the TOML document: a flat list under `[[segment]]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigDocument {
    #[serde(default, rename = "segment")]
    pub segments: Vec<SegmentRecord>,
}

/// Load a configuration document from disk and validate it into a
/// [`ShardConfigurationSet`]. Missing files are treated as an empty
/// (no-op) configuration, matching the teacher's "warn and use defaults"
/// pattern for optional config files.
pub fn load_path(path: &Path) -> Result<ShardConfigurationSet, Error> {
    match std::fs::read_to_string(path) {
        Ok(contents) => {
            info!(path = %path.display(), "loaded shard configuration");
            load_str(&contents)
        }
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "shard configuration file not found, starting with an empty routing table");
            Ok(ShardConfigurationSet::default())
        }
        Err(source) => Err(Error::Io {
            path: path.display().to_string(),
            source,
        }),
    }
}

/// Parse and validate a configuration document from an in-memory string.
pub fn load_str(contents: &str) -> Result<ShardConfigurationSet, Error> {
    let document: ConfigDocument = toml::from_str(contents)?;
    load_document(document)
}

/// Validate an already-parsed document into a [`ShardConfigurationSet`].
pub fn load_document(document: ConfigDocument) -> Result<ShardConfigurationSet, Error> {
    let segments: Vec<ShardRangeSegment> =
        document.segments.into_iter().map(Into::into).collect();
    ShardConfigurationSet::new(segments)
}
