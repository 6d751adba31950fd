//! Shard configuration: routing table, document loader, and the process-wide
//! active-configuration handle.

pub mod active;
pub mod element;
pub mod error;
pub mod loader;
pub mod segment;

pub use active::{active, install, load, ActiveConfig};
pub use element::{ElementClass, OperationKind, RoutingKey};
pub use error::Error;
pub use loader::{load_document, load_path, load_str, ConfigDocument, SegmentRecord};
pub use segment::{ShardConfigurationSet, ShardRangeSegment};
