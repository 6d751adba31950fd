//! Element classes and operation kinds that together select a shard set.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the four data element classes the cluster shards independently.
///
/// `Entity` routing is unsharded at the [`crate::ShardConfigurationSet`]
/// level: callers fan out to every shard of `User` and `Group` rather than
/// hashing into an `Entity` range (see `GetAllClients`/`GetClients` callers
/// in `accessgate-core`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ElementClass {
    User,
    Group,
    GroupToGroupMapping,
    Entity,
}

impl fmt::Display for ElementClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::User => "User",
            Self::Group => "Group",
            Self::GroupToGroupMapping => "GroupToGroupMapping",
            Self::Entity => "Entity",
        };
        write!(f, "{}", s)
    }
}

/// Whether a shard range serves writes (`Event`) or reads (`Query`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OperationKind {
    Event,
    Query,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Event => "Event",
            Self::Query => "Query",
        };
        write!(f, "{}", s)
    }
}

/// Key used to index into the routing table: a (class, kind) pair determines
/// which set of shard ranges an operation consults.
pub type RoutingKey = (ElementClass, OperationKind);
