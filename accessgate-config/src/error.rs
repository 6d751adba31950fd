use thiserror::Error;

use crate::element::{ElementClass, OperationKind};

/// Errors produced while parsing or validating a shard configuration document.
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error reading \"{path}\": {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("segment list for {class}/{kind} is empty")]
    EmptyRange {
        class: ElementClass,
        kind: OperationKind,
    },

    #[error("segment list for {class}/{kind} has overlapping ranges starting at {start}")]
    Overlap {
        class: ElementClass,
        kind: OperationKind,
        start: i32,
    },

    #[error("{kind} range for {class} must start at i32::MIN")]
    BadStart {
        class: ElementClass,
        kind: OperationKind,
    },

    #[error("Event range for {class} at start {start} has {count} endpoints, must have exactly one")]
    MultipleEventEndpoints {
        class: ElementClass,
        start: i32,
        count: usize,
    },

    #[error("Event range for {class} at start {start} has no endpoint")]
    NoEventEndpoint { class: ElementClass, start: i32 },

    #[error("Query range for {class}/{kind:?} at start {start} has no endpoints")]
    NoQueryEndpoint {
        class: ElementClass,
        kind: OperationKind,
        start: i32,
    },
}
