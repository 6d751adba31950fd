//! In-process fake implementing [`super::ShardClient`] against plain Rust
//! collections, no network I/O. Used by the `tests/` scenario suite and by
//! inline unit tests elsewhere in this crate that need a stand-in shard.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use super::{Error, ShardClient};

#[derive(Default)]
struct State {
    users: HashSet<String>,
    groups: HashSet<String>,
    user_groups: HashMap<String, HashSet<String>>,
    group_to_group: HashMap<String, HashSet<String>>,
    group_to_group_reverse: HashMap<String, HashSet<String>>,
    user_component_access: HashMap<String, HashSet<(String, String)>>,
    group_component_access: HashMap<String, HashSet<(String, String)>>,
    user_entity_access: HashMap<String, HashSet<(String, String)>>,
    group_entity_access: HashMap<String, HashSet<(String, String)>>,
    entity_types: HashSet<String>,
    entities: HashMap<String, HashSet<String>>,
}

/// Test double for one shard-group node. Every call is synchronous
/// bookkeeping against a `Mutex<State>`, optionally preceded by an
/// artificial delay (to model a slow peer, as in scenario S3) or a forced
/// failure (to model a transport error, as in scenario S4).
pub struct FakeShardClient {
    state: Mutex<State>,
    delay: Option<Duration>,
    fail_next: Mutex<Option<String>>,
    calls: Mutex<usize>,
}

impl Default for FakeShardClient {
    fn default() -> Self {
        Self {
            state: Mutex::new(State::default()),
            delay: None,
            fail_next: Mutex::new(None),
            calls: Mutex::new(0),
        }
    }
}

impl FakeShardClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of RPC calls this fake has answered so far, successful or
    /// not. Lets scenario tests assert "shard X was called exactly once"
    /// (S1) without threading a separate spy through the manager.
    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }

    /// Build a fake that sleeps for `delay` before answering every call.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Arrange for the next call to fail with a transport error carrying
    /// `message`, regardless of which method is invoked.
    pub fn fail_next_call(&self, message: impl Into<String>) {
        *self.fail_next.lock().unwrap() = Some(message.into());
    }

    /// Seed a user directly mapped to `groups`, bypassing the RPC surface.
    pub fn seed_user_groups(&self, user: &str, groups: impl IntoIterator<Item = String>) {
        let mut state = self.state.lock().unwrap();
        state.users.insert(user.to_string());
        state
            .user_groups
            .entry(user.to_string())
            .or_default()
            .extend(groups);
    }

    /// Seed a group-to-group edge directly, bypassing the RPC surface.
    pub fn seed_group_to_group(&self, parent: &str, children: impl IntoIterator<Item = String>) {
        let mut state = self.state.lock().unwrap();
        for child in children {
            state
                .group_to_group
                .entry(parent.to_string())
                .or_default()
                .insert(child.clone());
            state
                .group_to_group_reverse
                .entry(child)
                .or_default()
                .insert(parent.to_string());
        }
    }

    /// Seed a group's accessible entities directly, bypassing the RPC
    /// surface.
    pub fn seed_group_entities(
        &self,
        group: &str,
        entity_type: &str,
        entities: impl IntoIterator<Item = String>,
    ) {
        let mut state = self.state.lock().unwrap();
        state.groups.insert(group.to_string());
        for entity in entities {
            state
                .group_entity_access
                .entry(group.to_string())
                .or_default()
                .insert((entity_type.to_string(), entity));
        }
    }

    async fn before_call(&self) -> Result<(), Error> {
        *self.calls.lock().unwrap() += 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = self.fail_next.lock().unwrap().take() {
            return Err(Error::Transport(message));
        }
        Ok(())
    }
}

#[async_trait]
impl ShardClient for FakeShardClient {
    async fn add_user(&self, user: &str) -> Result<(), Error> {
        self.before_call().await?;
        self.state.lock().unwrap().users.insert(user.to_string());
        Ok(())
    }

    async fn remove_user(&self, user: &str) -> Result<(), Error> {
        self.before_call().await?;
        let mut state = self.state.lock().unwrap();
        state.users.remove(user);
        state.user_groups.remove(user);
        state.user_component_access.remove(user);
        state.user_entity_access.remove(user);
        Ok(())
    }

    async fn contains_user(&self, user: &str) -> Result<bool, Error> {
        self.before_call().await?;
        Ok(self.state.lock().unwrap().users.contains(user))
    }

    async fn get_users(&self) -> Result<Vec<String>, Error> {
        self.before_call().await?;
        Ok(self.state.lock().unwrap().users.iter().cloned().collect())
    }

    async fn get_user_to_group_mappings(
        &self,
        user: &str,
        _include_indirect: bool,
    ) -> Result<Vec<String>, Error> {
        self.before_call().await?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .user_groups
            .get(user)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .collect())
    }

    async fn add_group(&self, group: &str) -> Result<(), Error> {
        self.before_call().await?;
        self.state.lock().unwrap().groups.insert(group.to_string());
        Ok(())
    }

    async fn remove_group(&self, group: &str) -> Result<(), Error> {
        self.before_call().await?;
        let mut state = self.state.lock().unwrap();
        state.groups.remove(group);
        state.group_to_group.remove(group);
        state.group_component_access.remove(group);
        state.group_entity_access.remove(group);
        Ok(())
    }

    async fn contains_group(&self, group: &str) -> Result<bool, Error> {
        self.before_call().await?;
        Ok(self.state.lock().unwrap().groups.contains(group))
    }

    async fn get_groups(&self) -> Result<Vec<String>, Error> {
        self.before_call().await?;
        Ok(self.state.lock().unwrap().groups.iter().cloned().collect())
    }

    async fn get_group_to_user_mappings(&self, groups: &[String]) -> Result<Vec<String>, Error> {
        self.before_call().await?;
        let state = self.state.lock().unwrap();
        let wanted: HashSet<&String> = groups.iter().collect();
        Ok(state
            .user_groups
            .iter()
            .filter(|(_, gs)| gs.iter().any(|g| wanted.contains(g)))
            .map(|(u, _)| u.clone())
            .collect())
    }

    async fn get_groups_to_group_mappings(&self, groups: &[String]) -> Result<Vec<String>, Error> {
        self.before_call().await?;
        let state = self.state.lock().unwrap();
        let mut out = HashSet::new();
        for group in groups {
            if let Some(children) = state.group_to_group.get(group) {
                out.extend(children.iter().cloned());
            }
        }
        Ok(out.into_iter().collect())
    }

    async fn get_group_to_group_reverse_mappings(
        &self,
        groups: &[String],
    ) -> Result<Vec<String>, Error> {
        self.before_call().await?;
        let state = self.state.lock().unwrap();
        let mut out = HashSet::new();
        for group in groups {
            if let Some(parents) = state.group_to_group_reverse.get(group) {
                out.extend(parents.iter().cloned());
            }
        }
        Ok(out.into_iter().collect())
    }

    async fn add_user_to_group_mapping(&self, user: &str, group: &str) -> Result<(), Error> {
        self.before_call().await?;
        self.state
            .lock()
            .unwrap()
            .user_groups
            .entry(user.to_string())
            .or_default()
            .insert(group.to_string());
        Ok(())
    }

    async fn remove_user_to_group_mapping(&self, user: &str, group: &str) -> Result<(), Error> {
        self.before_call().await?;
        if let Some(groups) = self.state.lock().unwrap().user_groups.get_mut(user) {
            groups.remove(group);
        }
        Ok(())
    }

    async fn add_group_to_group_mapping(&self, parent: &str, child: &str) -> Result<(), Error> {
        self.before_call().await?;
        let mut state = self.state.lock().unwrap();
        state
            .group_to_group
            .entry(parent.to_string())
            .or_default()
            .insert(child.to_string());
        state
            .group_to_group_reverse
            .entry(child.to_string())
            .or_default()
            .insert(parent.to_string());
        Ok(())
    }

    async fn remove_group_to_group_mapping(
        &self,
        parent: &str,
        child: &str,
    ) -> Result<(), Error> {
        self.before_call().await?;
        let mut state = self.state.lock().unwrap();
        if let Some(children) = state.group_to_group.get_mut(parent) {
            children.remove(child);
        }
        if let Some(parents) = state.group_to_group_reverse.get_mut(child) {
            parents.remove(parent);
        }
        Ok(())
    }

    async fn add_user_to_component_access(
        &self,
        user: &str,
        component: &str,
        access: &str,
    ) -> Result<(), Error> {
        self.before_call().await?;
        self.state
            .lock()
            .unwrap()
            .user_component_access
            .entry(user.to_string())
            .or_default()
            .insert((component.to_string(), access.to_string()));
        Ok(())
    }

    async fn remove_user_to_component_access(
        &self,
        user: &str,
        component: &str,
        access: &str,
    ) -> Result<(), Error> {
        self.before_call().await?;
        if let Some(set) = self.state.lock().unwrap().user_component_access.get_mut(user) {
            set.remove(&(component.to_string(), access.to_string()));
        }
        Ok(())
    }

    async fn has_user_access_to_application_component(
        &self,
        user: &str,
        component: &str,
        access: &str,
    ) -> Result<bool, Error> {
        self.before_call().await?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .user_component_access
            .get(user)
            .is_some_and(|set| set.contains(&(component.to_string(), access.to_string()))))
    }

    async fn has_user_access_to_entity(
        &self,
        user: &str,
        entity_type: &str,
        entity: &str,
    ) -> Result<bool, Error> {
        self.before_call().await?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .user_entity_access
            .get(user)
            .is_some_and(|set| set.contains(&(entity_type.to_string(), entity.to_string()))))
    }

    async fn add_group_to_component_access(
        &self,
        group: &str,
        component: &str,
        access: &str,
    ) -> Result<(), Error> {
        self.before_call().await?;
        self.state
            .lock()
            .unwrap()
            .group_component_access
            .entry(group.to_string())
            .or_default()
            .insert((component.to_string(), access.to_string()));
        Ok(())
    }

    async fn remove_group_to_component_access(
        &self,
        group: &str,
        component: &str,
        access: &str,
    ) -> Result<(), Error> {
        self.before_call().await?;
        if let Some(set) = self
            .state
            .lock()
            .unwrap()
            .group_component_access
            .get_mut(group)
        {
            set.remove(&(component.to_string(), access.to_string()));
        }
        Ok(())
    }

    async fn add_entity_type(&self, entity_type: &str) -> Result<(), Error> {
        self.before_call().await?;
        self.state
            .lock()
            .unwrap()
            .entity_types
            .insert(entity_type.to_string());
        Ok(())
    }

    async fn remove_entity_type(&self, entity_type: &str) -> Result<(), Error> {
        self.before_call().await?;
        let mut state = self.state.lock().unwrap();
        state.entity_types.remove(entity_type);
        state.entities.remove(entity_type);
        Ok(())
    }

    async fn contains_entity_type(&self, entity_type: &str) -> Result<bool, Error> {
        self.before_call().await?;
        Ok(self.state.lock().unwrap().entity_types.contains(entity_type))
    }

    async fn add_entity(&self, entity_type: &str, entity: &str) -> Result<(), Error> {
        self.before_call().await?;
        self.state
            .lock()
            .unwrap()
            .entities
            .entry(entity_type.to_string())
            .or_default()
            .insert(entity.to_string());
        Ok(())
    }

    async fn remove_entity(&self, entity_type: &str, entity: &str) -> Result<(), Error> {
        self.before_call().await?;
        if let Some(set) = self.state.lock().unwrap().entities.get_mut(entity_type) {
            set.remove(entity);
        }
        Ok(())
    }

    async fn contains_entity(&self, entity_type: &str, entity: &str) -> Result<bool, Error> {
        self.before_call().await?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .entities
            .get(entity_type)
            .is_some_and(|set| set.contains(entity)))
    }

    async fn get_entities(&self, entity_type: &str) -> Result<Vec<String>, Error> {
        self.before_call().await?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .entities
            .get(entity_type)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .collect())
    }

    async fn add_user_to_entity_mapping(
        &self,
        user: &str,
        entity_type: &str,
        entity: &str,
    ) -> Result<(), Error> {
        self.before_call().await?;
        self.state
            .lock()
            .unwrap()
            .user_entity_access
            .entry(user.to_string())
            .or_default()
            .insert((entity_type.to_string(), entity.to_string()));
        Ok(())
    }

    async fn remove_user_to_entity_mapping(
        &self,
        user: &str,
        entity_type: &str,
        entity: &str,
    ) -> Result<(), Error> {
        self.before_call().await?;
        if let Some(set) = self.state.lock().unwrap().user_entity_access.get_mut(user) {
            set.remove(&(entity_type.to_string(), entity.to_string()));
        }
        Ok(())
    }

    async fn add_group_to_entity_mapping(
        &self,
        group: &str,
        entity_type: &str,
        entity: &str,
    ) -> Result<(), Error> {
        self.before_call().await?;
        self.state
            .lock()
            .unwrap()
            .group_entity_access
            .entry(group.to_string())
            .or_default()
            .insert((entity_type.to_string(), entity.to_string()));
        Ok(())
    }

    async fn remove_group_to_entity_mapping(
        &self,
        group: &str,
        entity_type: &str,
        entity: &str,
    ) -> Result<(), Error> {
        self.before_call().await?;
        if let Some(set) = self
            .state
            .lock()
            .unwrap()
            .group_entity_access
            .get_mut(group)
        {
            set.remove(&(entity_type.to_string(), entity.to_string()));
        }
        Ok(())
    }

    async fn get_user_to_entity_mappings(
        &self,
        user: &str,
        entity_type: Option<&str>,
    ) -> Result<Vec<(String, String)>, Error> {
        self.before_call().await?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .user_entity_access
            .get(user)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|(t, _)| entity_type.is_none_or(|wanted| wanted == t))
            .collect())
    }

    async fn get_group_to_entity_mappings(
        &self,
        group: &str,
        entity_type: Option<&str>,
    ) -> Result<Vec<(String, String)>, Error> {
        self.before_call().await?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .group_entity_access
            .get(group)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|(t, _)| entity_type.is_none_or(|wanted| wanted == t))
            .collect())
    }

    async fn has_access_to_application_component(
        &self,
        groups: &[String],
        component: &str,
        access: &str,
    ) -> Result<bool, Error> {
        self.before_call().await?;
        let state = self.state.lock().unwrap();
        Ok(groups.iter().any(|group| {
            state
                .group_component_access
                .get(group)
                .is_some_and(|set| set.contains(&(component.to_string(), access.to_string())))
        }))
    }

    async fn has_access_to_entity(
        &self,
        groups: &[String],
        entity_type: &str,
        entity: &str,
    ) -> Result<bool, Error> {
        self.before_call().await?;
        let state = self.state.lock().unwrap();
        Ok(groups.iter().any(|group| {
            state
                .group_entity_access
                .get(group)
                .is_some_and(|set| set.contains(&(entity_type.to_string(), entity.to_string())))
        }))
    }

    async fn get_application_components_accessible_by_groups(
        &self,
        groups: &[String],
    ) -> Result<Vec<String>, Error> {
        self.before_call().await?;
        let state = self.state.lock().unwrap();
        let mut out = HashSet::new();
        for group in groups {
            if let Some(set) = state.group_component_access.get(group) {
                out.extend(set.iter().map(|(component, _)| component.clone()));
            }
        }
        Ok(out.into_iter().collect())
    }

    async fn get_entities_accessible_by_groups(
        &self,
        groups: &[String],
        entity_type: Option<&str>,
    ) -> Result<Vec<String>, Error> {
        self.before_call().await?;
        let state = self.state.lock().unwrap();
        let mut out = HashSet::new();
        for group in groups {
            if let Some(set) = state.group_entity_access.get(group) {
                out.extend(
                    set.iter()
                        .filter(|(t, _)| entity_type.is_none_or(|wanted| wanted == t))
                        .map(|(_, entity)| entity.clone()),
                );
            }
        }
        Ok(out.into_iter().collect())
    }

    async fn get_application_component_and_access_level_to_user_mappings(
        &self,
        _component: &str,
        _access: &str,
        _include_indirect: bool,
    ) -> Result<Vec<String>, Error> {
        self.before_call().await?;
        Ok(Vec::new())
    }

    async fn get_entity_to_user_mappings(
        &self,
        _entity_type: &str,
        _entity: &str,
        _include_indirect: bool,
    ) -> Result<Vec<String>, Error> {
        self.before_call().await?;
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn test_add_then_contains_entity() {
        let client = FakeShardClient::new();
        client.add_entity("ClientAccount", "eA").await.unwrap();
        assert!(client.contains_entity("ClientAccount", "eA").await.unwrap());
        client.remove_entity("ClientAccount", "eA").await.unwrap();
        assert!(!client.contains_entity("ClientAccount", "eA").await.unwrap());
    }

    #[tokio::test]
    async fn test_fail_next_call_surfaces_as_transport_error() {
        let client = FakeShardClient::new();
        client.fail_next_call("connection reset");
        let err = client.add_user("alice").await.unwrap_err();
        assert!(matches!(err, Error::Transport(msg) if msg == "connection reset"));

        // Only the next call fails.
        client.add_user("alice").await.unwrap();
    }
}
