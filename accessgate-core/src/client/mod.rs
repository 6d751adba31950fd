//! Async Shard Client (C3): a transport-agnostic RPC surface exposing every
//! event/query operation one shard-group node serves.

pub mod fake;
pub mod http;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

pub use http::HttpShardClient;

/// Errors a [`ShardClient`] call can fail with. Transport-agnostic: callers
/// (the fan-out runtime) classify these further, not this module.
#[derive(Debug, Error)]
pub enum Error {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("shard returned malformed response: {0}")]
    Decode(String),

    #[error("entity not found")]
    EntityNotFound,

    #[error("entity type not found")]
    EntityTypeNotFound,
}

/// A client paired with the stable, human-readable description of the
/// endpoint it talks to. The description appears verbatim in wrapped error
/// messages and metric labels; callers never see a bare client.
#[derive(Clone)]
pub struct ClientAndDescription {
    pub client: Arc<dyn ShardClient>,
    pub description: String,
}

/// The full event/query surface of one shard-group node. Implementations
/// are swapped by substituting the transport (see [`http::HttpShardClient`]
/// and [`fake::FakeShardClient`]); C4–C7 only ever see this trait object.
#[async_trait]
pub trait ShardClient: Send + Sync {
    async fn add_user(&self, user: &str) -> Result<(), Error>;
    async fn remove_user(&self, user: &str) -> Result<(), Error>;
    async fn contains_user(&self, user: &str) -> Result<bool, Error>;
    async fn get_users(&self) -> Result<Vec<String>, Error>;
    async fn get_user_to_group_mappings(
        &self,
        user: &str,
        include_indirect: bool,
    ) -> Result<Vec<String>, Error>;

    async fn add_group(&self, group: &str) -> Result<(), Error>;
    async fn remove_group(&self, group: &str) -> Result<(), Error>;
    async fn contains_group(&self, group: &str) -> Result<bool, Error>;
    async fn get_groups(&self) -> Result<Vec<String>, Error>;
    async fn get_group_to_user_mappings(
        &self,
        groups: &[String],
    ) -> Result<Vec<String>, Error>;

    async fn get_groups_to_group_mappings(
        &self,
        groups: &[String],
    ) -> Result<Vec<String>, Error>;
    async fn get_group_to_group_reverse_mappings(
        &self,
        groups: &[String],
    ) -> Result<Vec<String>, Error>;

    async fn add_user_to_group_mapping(&self, user: &str, group: &str) -> Result<(), Error>;
    async fn remove_user_to_group_mapping(&self, user: &str, group: &str) -> Result<(), Error>;
    async fn add_group_to_group_mapping(&self, parent: &str, child: &str) -> Result<(), Error>;
    async fn remove_group_to_group_mapping(&self, parent: &str, child: &str)
        -> Result<(), Error>;

    async fn add_user_to_component_access(
        &self,
        user: &str,
        component: &str,
        access: &str,
    ) -> Result<(), Error>;
    async fn remove_user_to_component_access(
        &self,
        user: &str,
        component: &str,
        access: &str,
    ) -> Result<(), Error>;
    async fn add_group_to_component_access(
        &self,
        group: &str,
        component: &str,
        access: &str,
    ) -> Result<(), Error>;
    async fn remove_group_to_component_access(
        &self,
        group: &str,
        component: &str,
        access: &str,
    ) -> Result<(), Error>;

    async fn add_entity_type(&self, entity_type: &str) -> Result<(), Error>;
    async fn remove_entity_type(&self, entity_type: &str) -> Result<(), Error>;
    async fn contains_entity_type(&self, entity_type: &str) -> Result<bool, Error>;
    async fn add_entity(&self, entity_type: &str, entity: &str) -> Result<(), Error>;
    async fn remove_entity(&self, entity_type: &str, entity: &str) -> Result<(), Error>;
    async fn contains_entity(&self, entity_type: &str, entity: &str) -> Result<bool, Error>;
    async fn get_entities(&self, entity_type: &str) -> Result<Vec<String>, Error>;

    async fn add_user_to_entity_mapping(
        &self,
        user: &str,
        entity_type: &str,
        entity: &str,
    ) -> Result<(), Error>;
    async fn remove_user_to_entity_mapping(
        &self,
        user: &str,
        entity_type: &str,
        entity: &str,
    ) -> Result<(), Error>;
    async fn add_group_to_entity_mapping(
        &self,
        group: &str,
        entity_type: &str,
        entity: &str,
    ) -> Result<(), Error>;
    async fn remove_group_to_entity_mapping(
        &self,
        group: &str,
        entity_type: &str,
        entity: &str,
    ) -> Result<(), Error>;

    async fn get_user_to_entity_mappings(
        &self,
        user: &str,
        entity_type: Option<&str>,
    ) -> Result<Vec<(String, String)>, Error>;
    async fn get_group_to_entity_mappings(
        &self,
        group: &str,
        entity_type: Option<&str>,
    ) -> Result<Vec<(String, String)>, Error>;

    /// Direct user->component predicate: does `user` itself (not via any
    /// group) have `access` on `component`? Step 1 of the Coordinator's
    /// two-phase traversal (§4.6) folds this into the user's own
    /// contribution before expanding to groups.
    async fn has_user_access_to_application_component(
        &self,
        user: &str,
        component: &str,
        access: &str,
    ) -> Result<bool, Error>;
    /// Direct user->entity predicate, the entity-side analogue of
    /// [`Self::has_user_access_to_application_component`].
    async fn has_user_access_to_entity(
        &self,
        user: &str,
        entity_type: &str,
        entity: &str,
    ) -> Result<bool, Error>;

    async fn has_access_to_application_component(
        &self,
        groups: &[String],
        component: &str,
        access: &str,
    ) -> Result<bool, Error>;
    async fn has_access_to_entity(
        &self,
        groups: &[String],
        entity_type: &str,
        entity: &str,
    ) -> Result<bool, Error>;
    async fn get_application_components_accessible_by_groups(
        &self,
        groups: &[String],
    ) -> Result<Vec<String>, Error>;
    async fn get_entities_accessible_by_groups(
        &self,
        groups: &[String],
        entity_type: Option<&str>,
    ) -> Result<Vec<String>, Error>;
    async fn get_application_component_and_access_level_to_user_mappings(
        &self,
        component: &str,
        access: &str,
        include_indirect: bool,
    ) -> Result<Vec<String>, Error>;
    async fn get_entity_to_user_mappings(
        &self,
        entity_type: &str,
        entity: &str,
        include_indirect: bool,
    ) -> Result<Vec<String>, Error>;
}
