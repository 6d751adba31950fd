//! HTTP+JSON transport for [`super::ShardClient`], uniform across every
//! endpoint in the cluster. The trait boundary stays transport-agnostic so
//! an alternate wire format could replace this without touching C4–C7.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use super::{Error, ShardClient};

/// One shard-group node, addressed by base URL. Every call POSTs
/// `{endpoint}/rpc/{method}` with a JSON body and expects a JSON response.
pub struct HttpShardClient {
    endpoint: String,
    http: reqwest::Client,
}

impl HttpShardClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            http: reqwest::Client::new(),
        }
    }

    async fn invoke<P: Serialize + Send, R: DeserializeOwned>(
        &self,
        method: &str,
        params: P,
    ) -> Result<R, Error> {
        let url = format!("{}/rpc/{}", self.endpoint.trim_end_matches('/'), method);
        debug!(endpoint = %self.endpoint, method, "shard client dispatch");

        let response = self
            .http
            .post(&url)
            .json(&params)
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(classify_not_found(method));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Transport(format!("{status}: {body}")));
        }

        response
            .json::<R>()
            .await
            .map_err(|e| Error::Decode(e.to_string()))
    }
}

fn classify_not_found(method: &str) -> Error {
    if method.contains("entity_type") {
        Error::EntityTypeNotFound
    } else if method.contains("entity") {
        Error::EntityNotFound
    } else {
        Error::Transport(format!("{method}: not found"))
    }
}

#[async_trait]
impl ShardClient for HttpShardClient {
    async fn add_user(&self, user: &str) -> Result<(), Error> {
        self.invoke("add_user", json!({ "user": user })).await
    }

    async fn remove_user(&self, user: &str) -> Result<(), Error> {
        self.invoke("remove_user", json!({ "user": user })).await
    }

    async fn contains_user(&self, user: &str) -> Result<bool, Error> {
        self.invoke("contains_user", json!({ "user": user })).await
    }

    async fn get_users(&self) -> Result<Vec<String>, Error> {
        self.invoke("get_users", Value::Null).await
    }

    async fn get_user_to_group_mappings(
        &self,
        user: &str,
        include_indirect: bool,
    ) -> Result<Vec<String>, Error> {
        self.invoke(
            "get_user_to_group_mappings",
            json!({ "user": user, "include_indirect": include_indirect }),
        )
        .await
    }

    async fn add_group(&self, group: &str) -> Result<(), Error> {
        self.invoke("add_group", json!({ "group": group })).await
    }

    async fn remove_group(&self, group: &str) -> Result<(), Error> {
        self.invoke("remove_group", json!({ "group": group })).await
    }

    async fn contains_group(&self, group: &str) -> Result<bool, Error> {
        self.invoke("contains_group", json!({ "group": group }))
            .await
    }

    async fn get_groups(&self) -> Result<Vec<String>, Error> {
        self.invoke("get_groups", Value::Null).await
    }

    async fn get_group_to_user_mappings(&self, groups: &[String]) -> Result<Vec<String>, Error> {
        self.invoke(
            "get_group_to_user_mappings",
            json!({ "groups": groups }),
        )
        .await
    }

    async fn get_groups_to_group_mappings(
        &self,
        groups: &[String],
    ) -> Result<Vec<String>, Error> {
        self.invoke(
            "get_groups_to_group_mappings",
            json!({ "groups": groups }),
        )
        .await
    }

    async fn get_group_to_group_reverse_mappings(
        &self,
        groups: &[String],
    ) -> Result<Vec<String>, Error> {
        self.invoke(
            "get_group_to_group_reverse_mappings",
            json!({ "groups": groups }),
        )
        .await
    }

    async fn add_user_to_group_mapping(&self, user: &str, group: &str) -> Result<(), Error> {
        self.invoke(
            "add_user_to_group_mapping",
            json!({ "user": user, "group": group }),
        )
        .await
    }

    async fn remove_user_to_group_mapping(&self, user: &str, group: &str) -> Result<(), Error> {
        self.invoke(
            "remove_user_to_group_mapping",
            json!({ "user": user, "group": group }),
        )
        .await
    }

    async fn add_group_to_group_mapping(&self, parent: &str, child: &str) -> Result<(), Error> {
        self.invoke(
            "add_group_to_group_mapping",
            json!({ "parent": parent, "child": child }),
        )
        .await
    }

    async fn remove_group_to_group_mapping(
        &self,
        parent: &str,
        child: &str,
    ) -> Result<(), Error> {
        self.invoke(
            "remove_group_to_group_mapping",
            json!({ "parent": parent, "child": child }),
        )
        .await
    }

    async fn add_user_to_component_access(
        &self,
        user: &str,
        component: &str,
        access: &str,
    ) -> Result<(), Error> {
        self.invoke(
            "add_user_to_component_access",
            json!({ "user": user, "component": component, "access": access }),
        )
        .await
    }

    async fn remove_user_to_component_access(
        &self,
        user: &str,
        component: &str,
        access: &str,
    ) -> Result<(), Error> {
        self.invoke(
            "remove_user_to_component_access",
            json!({ "user": user, "component": component, "access": access }),
        )
        .await
    }

    async fn add_group_to_component_access(
        &self,
        group: &str,
        component: &str,
        access: &str,
    ) -> Result<(), Error> {
        self.invoke(
            "add_group_to_component_access",
            json!({ "group": group, "component": component, "access": access }),
        )
        .await
    }

    async fn remove_group_to_component_access(
        &self,
        group: &str,
        component: &str,
        access: &str,
    ) -> Result<(), Error> {
        self.invoke(
            "remove_group_to_component_access",
            json!({ "group": group, "component": component, "access": access }),
        )
        .await
    }

    async fn add_entity_type(&self, entity_type: &str) -> Result<(), Error> {
        self.invoke("add_entity_type", json!({ "entity_type": entity_type }))
            .await
    }

    async fn remove_entity_type(&self, entity_type: &str) -> Result<(), Error> {
        self.invoke(
            "remove_entity_type",
            json!({ "entity_type": entity_type }),
        )
        .await
    }

    async fn contains_entity_type(&self, entity_type: &str) -> Result<bool, Error> {
        self.invoke(
            "contains_entity_type",
            json!({ "entity_type": entity_type }),
        )
        .await
    }

    async fn add_entity(&self, entity_type: &str, entity: &str) -> Result<(), Error> {
        self.invoke(
            "add_entity",
            json!({ "entity_type": entity_type, "entity": entity }),
        )
        .await
    }

    async fn remove_entity(&self, entity_type: &str, entity: &str) -> Result<(), Error> {
        self.invoke(
            "remove_entity",
            json!({ "entity_type": entity_type, "entity": entity }),
        )
        .await
    }

    async fn contains_entity(&self, entity_type: &str, entity: &str) -> Result<bool, Error> {
        self.invoke(
            "contains_entity",
            json!({ "entity_type": entity_type, "entity": entity }),
        )
        .await
    }

    async fn get_entities(&self, entity_type: &str) -> Result<Vec<String>, Error> {
        self.invoke("get_entities", json!({ "entity_type": entity_type }))
            .await
    }

    async fn add_user_to_entity_mapping(
        &self,
        user: &str,
        entity_type: &str,
        entity: &str,
    ) -> Result<(), Error> {
        self.invoke(
            "add_user_to_entity_mapping",
            json!({ "user": user, "entity_type": entity_type, "entity": entity }),
        )
        .await
    }

    async fn remove_user_to_entity_mapping(
        &self,
        user: &str,
        entity_type: &str,
        entity: &str,
    ) -> Result<(), Error> {
        self.invoke(
            "remove_user_to_entity_mapping",
            json!({ "user": user, "entity_type": entity_type, "entity": entity }),
        )
        .await
    }

    async fn add_group_to_entity_mapping(
        &self,
        group: &str,
        entity_type: &str,
        entity: &str,
    ) -> Result<(), Error> {
        self.invoke(
            "add_group_to_entity_mapping",
            json!({ "group": group, "entity_type": entity_type, "entity": entity }),
        )
        .await
    }

    async fn remove_group_to_entity_mapping(
        &self,
        group: &str,
        entity_type: &str,
        entity: &str,
    ) -> Result<(), Error> {
        self.invoke(
            "remove_group_to_entity_mapping",
            json!({ "group": group, "entity_type": entity_type, "entity": entity }),
        )
        .await
    }

    async fn get_user_to_entity_mappings(
        &self,
        user: &str,
        entity_type: Option<&str>,
    ) -> Result<Vec<(String, String)>, Error> {
        self.invoke(
            "get_user_to_entity_mappings",
            json!({ "user": user, "entity_type": entity_type }),
        )
        .await
    }

    async fn get_group_to_entity_mappings(
        &self,
        group: &str,
        entity_type: Option<&str>,
    ) -> Result<Vec<(String, String)>, Error> {
        self.invoke(
            "get_group_to_entity_mappings",
            json!({ "group": group, "entity_type": entity_type }),
        )
        .await
    }

    async fn has_user_access_to_application_component(
        &self,
        user: &str,
        component: &str,
        access: &str,
    ) -> Result<bool, Error> {
        self.invoke(
            "has_user_access_to_application_component",
            json!({ "user": user, "component": component, "access": access }),
        )
        .await
    }

    async fn has_user_access_to_entity(
        &self,
        user: &str,
        entity_type: &str,
        entity: &str,
    ) -> Result<bool, Error> {
        self.invoke(
            "has_user_access_to_entity",
            json!({ "user": user, "entity_type": entity_type, "entity": entity }),
        )
        .await
    }

    async fn has_access_to_application_component(
        &self,
        groups: &[String],
        component: &str,
        access: &str,
    ) -> Result<bool, Error> {
        self.invoke(
            "has_access_to_application_component",
            json!({ "groups": groups, "component": component, "access": access }),
        )
        .await
    }

    async fn has_access_to_entity(
        &self,
        groups: &[String],
        entity_type: &str,
        entity: &str,
    ) -> Result<bool, Error> {
        self.invoke(
            "has_access_to_entity",
            json!({ "groups": groups, "entity_type": entity_type, "entity": entity }),
        )
        .await
    }

    async fn get_application_components_accessible_by_groups(
        &self,
        groups: &[String],
    ) -> Result<Vec<String>, Error> {
        self.invoke(
            "get_application_components_accessible_by_groups",
            json!({ "groups": groups }),
        )
        .await
    }

    async fn get_entities_accessible_by_groups(
        &self,
        groups: &[String],
        entity_type: Option<&str>,
    ) -> Result<Vec<String>, Error> {
        self.invoke(
            "get_entities_accessible_by_groups",
            json!({ "groups": groups, "entity_type": entity_type }),
        )
        .await
    }

    async fn get_application_component_and_access_level_to_user_mappings(
        &self,
        component: &str,
        access: &str,
        include_indirect: bool,
    ) -> Result<Vec<String>, Error> {
        self.invoke(
            "get_application_component_and_access_level_to_user_mappings",
            json!({ "component": component, "access": access, "include_indirect": include_indirect }),
        )
        .await
    }

    async fn get_entity_to_user_mappings(
        &self,
        entity_type: &str,
        entity: &str,
        include_indirect: bool,
    ) -> Result<Vec<String>, Error> {
        self.invoke(
            "get_entity_to_user_mappings",
            json!({ "entity_type": entity_type, "entity": entity, "include_indirect": include_indirect }),
        )
        .await
    }
}
