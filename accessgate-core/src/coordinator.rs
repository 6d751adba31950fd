//! Operation Coordinator (C6): the public façade. Chooses one of the write
//! routing patterns from §4.5 for every mutation and, for reads, one of the
//! four shapes from §4.6 — including the two-phase group-traversal queries
//! that resolve a user's (or group's) transitive group membership before
//! delegating the final partitioned dispatch to the [`QueryRouter`].

use std::collections::HashSet;
use std::sync::Arc;

use accessgate_config::{ElementClass, OperationKind};
use accessgate_stats::MetricLogger;

use crate::client::{self, ShardClient};
use crate::fanout::{self, ExceptionPolicy};
use crate::manager::ShardClientManager;
use crate::metrics::with_interval_metric;
use crate::router::QueryRouter;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Fanout(#[from] fanout::Error),
    #[error(transparent)]
    Manager(#[from] crate::manager::Error),
    #[error(transparent)]
    Router(#[from] crate::router::Error),
}

const USER_AND_GROUP: [ElementClass; 2] = [ElementClass::User, ElementClass::Group];
const USER_GROUP_AND_GG: [ElementClass; 3] = [
    ElementClass::User,
    ElementClass::Group,
    ElementClass::GroupToGroupMapping,
];

pub struct OperationCoordinator {
    manager: Arc<ShardClientManager>,
    logger: Arc<dyn MetricLogger>,
    router: QueryRouter,
}

impl OperationCoordinator {
    pub fn new(manager: Arc<ShardClientManager>, logger: Arc<dyn MetricLogger>) -> Self {
        let router = QueryRouter::new(manager.clone(), logger.clone());
        Self {
            manager,
            logger,
            router,
        }
    }

    fn event_clients(&self, classes: &[ElementClass]) -> Vec<client::ClientAndDescription> {
        classes
            .iter()
            .flat_map(|&class| self.manager.get_all_clients(class, OperationKind::Event))
            .collect()
    }

    fn query_clients(&self, classes: &[ElementClass]) -> Vec<client::ClientAndDescription> {
        classes
            .iter()
            .flat_map(|&class| self.manager.get_all_clients(class, OperationKind::Query))
            .collect()
    }

    /// Step 2 of the two-phase traversal (§4.6): expand `direct_groups` with
    /// every group reachable in a single group-to-group hop (§9 decision).
    /// The returned set always includes the input groups; a group unknown
    /// to any GroupToGroupMapping shard contributes nothing rather than
    /// erroring (§4.6 correctness requirement).
    async fn expand_groups(&self, direct_groups: &[String]) -> Result<HashSet<String>, Error> {
        let mut expanded: HashSet<String> = direct_groups.iter().cloned().collect();
        if direct_groups.is_empty() {
            return Ok(expanded);
        }

        let partitioned = self.manager.get_clients(
            ElementClass::GroupToGroupMapping,
            OperationKind::Query,
            direct_groups,
        )?;
        fanout::await_task_completion(
            partitioned,
            "retrieve group-to-group mappings for multiple groups",
            |client, subset: Vec<String>| async move {
                client.get_groups_to_group_mappings(&subset).await
            },
            |children: &Vec<String>| expanded.extend(children.iter().cloned()),
            |_| true,
            &ExceptionPolicy::default(),
        )
        .await?;
        Ok(expanded)
    }

    // ---- single-shard event writes (§4.5) ----------------------------

    pub async fn add_user(&self, user: &str) -> Result<(), Error> {
        with_interval_metric(
            &self.logger,
            "Coordinator.AddUser",
            "Coordinator.AddUser.calls",
            || async {
                let entry = self
                    .manager
                    .get_client(ElementClass::User, OperationKind::Event, user)?;
                entry
                    .client
                    .add_user(user)
                    .await
                    .map_err(|source| {
                        fanout::Error::Wrapped {
                            event: "add user to".to_string(),
                            description: entry.description.clone(),
                            source,
                        }
                        .into()
                    })
            },
        )
        .await
    }

    pub async fn add_user_to_group_mapping(&self, user: &str, group: &str) -> Result<(), Error> {
        with_interval_metric(
            &self.logger,
            "Coordinator.AddUserToGroupMapping",
            "Coordinator.AddUserToGroupMapping.calls",
            || async {
                let entry = self
                    .manager
                    .get_client(ElementClass::User, OperationKind::Event, user)?;
                entry
                    .client
                    .add_user_to_group_mapping(user, group)
                    .await
                    .map_err(|source| {
                        fanout::Error::Wrapped {
                            event: "add user-to-group mapping on".to_string(),
                            description: entry.description.clone(),
                            source,
                        }
                        .into()
                    })
            },
        )
        .await
    }

    pub async fn remove_user_to_group_mapping(
        &self,
        user: &str,
        group: &str,
    ) -> Result<(), Error> {
        with_interval_metric(
            &self.logger,
            "Coordinator.RemoveUserToGroupMapping",
            "Coordinator.RemoveUserToGroupMapping.calls",
            || async {
                let entry = self
                    .manager
                    .get_client(ElementClass::User, OperationKind::Event, user)?;
                entry
                    .client
                    .remove_user_to_group_mapping(user, group)
                    .await
                    .map_err(|source| {
                        fanout::Error::Wrapped {
                            event: "remove user-to-group mapping on".to_string(),
                            description: entry.description.clone(),
                            source,
                        }
                        .into()
                    })
            },
        )
        .await
    }

    pub async fn add_group_to_group_mapping(
        &self,
        parent: &str,
        child: &str,
    ) -> Result<(), Error> {
        with_interval_metric(
            &self.logger,
            "Coordinator.AddGroupToGroupMapping",
            "Coordinator.AddGroupToGroupMapping.calls",
            || async {
                let entry = self.manager.get_client(
                    ElementClass::GroupToGroupMapping,
                    OperationKind::Event,
                    parent,
                )?;
                entry
                    .client
                    .add_group_to_group_mapping(parent, child)
                    .await
                    .map_err(|source| {
                        fanout::Error::Wrapped {
                            event: "add group-to-group mapping on".to_string(),
                            description: entry.description.clone(),
                            source,
                        }
                        .into()
                    })
            },
        )
        .await
    }

    pub async fn remove_group_to_group_mapping(
        &self,
        parent: &str,
        child: &str,
    ) -> Result<(), Error> {
        with_interval_metric(
            &self.logger,
            "Coordinator.RemoveGroupToGroupMapping",
            "Coordinator.RemoveGroupToGroupMapping.calls",
            || async {
                let entry = self.manager.get_client(
                    ElementClass::GroupToGroupMapping,
                    OperationKind::Event,
                    parent,
                )?;
                entry
                    .client
                    .remove_group_to_group_mapping(parent, child)
                    .await
                    .map_err(|source| {
                        fanout::Error::Wrapped {
                            event: "remove group-to-group mapping on".to_string(),
                            description: entry.description.clone(),
                            source,
                        }
                        .into()
                    })
            },
        )
        .await
    }

    pub async fn add_user_to_component_access(
        &self,
        user: &str,
        component: &str,
        access: &str,
    ) -> Result<(), Error> {
        with_interval_metric(
            &self.logger,
            "Coordinator.AddUserToComponentAccess",
            "Coordinator.AddUserToComponentAccess.calls",
            || async {
                let entry = self
                    .manager
                    .get_client(ElementClass::User, OperationKind::Event, user)?;
                entry
                    .client
                    .add_user_to_component_access(user, component, access)
                    .await
                    .map_err(|source| {
                        fanout::Error::Wrapped {
                            event: "add user component access on".to_string(),
                            description: entry.description.clone(),
                            source,
                        }
                        .into()
                    })
            },
        )
        .await
    }

    pub async fn remove_user_to_component_access(
        &self,
        user: &str,
        component: &str,
        access: &str,
    ) -> Result<(), Error> {
        with_interval_metric(
            &self.logger,
            "Coordinator.RemoveUserToComponentAccess",
            "Coordinator.RemoveUserToComponentAccess.calls",
            || async {
                let entry = self
                    .manager
                    .get_client(ElementClass::User, OperationKind::Event, user)?;
                entry
                    .client
                    .remove_user_to_component_access(user, component, access)
                    .await
                    .map_err(|source| {
                        fanout::Error::Wrapped {
                            event: "remove user component access on".to_string(),
                            description: entry.description.clone(),
                            source,
                        }
                        .into()
                    })
            },
        )
        .await
    }

    pub async fn add_group_to_component_access(
        &self,
        group: &str,
        component: &str,
        access: &str,
    ) -> Result<(), Error> {
        with_interval_metric(
            &self.logger,
            "Coordinator.AddGroupToComponentAccess",
            "Coordinator.AddGroupToComponentAccess.calls",
            || async {
                let entry = self
                    .manager
                    .get_client(ElementClass::Group, OperationKind::Event, group)?;
                entry
                    .client
                    .add_group_to_component_access(group, component, access)
                    .await
                    .map_err(|source| {
                        fanout::Error::Wrapped {
                            event: "add group component access on".to_string(),
                            description: entry.description.clone(),
                            source,
                        }
                        .into()
                    })
            },
        )
        .await
    }

    pub async fn remove_group_to_component_access(
        &self,
        group: &str,
        component: &str,
        access: &str,
    ) -> Result<(), Error> {
        with_interval_metric(
            &self.logger,
            "Coordinator.RemoveGroupToComponentAccess",
            "Coordinator.RemoveGroupToComponentAccess.calls",
            || async {
                let entry = self
                    .manager
                    .get_client(ElementClass::Group, OperationKind::Event, group)?;
                entry
                    .client
                    .remove_group_to_component_access(group, component, access)
                    .await
                    .map_err(|source| {
                        fanout::Error::Wrapped {
                            event: "remove group component access on".to_string(),
                            description: entry.description.clone(),
                            source,
                        }
                        .into()
                    })
            },
        )
        .await
    }

    pub async fn add_user_to_entity_mapping(
        &self,
        user: &str,
        entity_type: &str,
        entity: &str,
    ) -> Result<(), Error> {
        with_interval_metric(
            &self.logger,
            "Coordinator.AddUserToEntityMapping",
            "Coordinator.AddUserToEntityMapping.calls",
            || async {
                let entry = self
                    .manager
                    .get_client(ElementClass::User, OperationKind::Event, user)?;
                entry
                    .client
                    .add_user_to_entity_mapping(user, entity_type, entity)
                    .await
                    .map_err(|source| {
                        fanout::Error::Wrapped {
                            event: "add user entity mapping on".to_string(),
                            description: entry.description.clone(),
                            source,
                        }
                        .into()
                    })
            },
        )
        .await
    }

    pub async fn remove_user_to_entity_mapping(
        &self,
        user: &str,
        entity_type: &str,
        entity: &str,
    ) -> Result<(), Error> {
        with_interval_metric(
            &self.logger,
            "Coordinator.RemoveUserToEntityMapping",
            "Coordinator.RemoveUserToEntityMapping.calls",
            || async {
                let entry = self
                    .manager
                    .get_client(ElementClass::User, OperationKind::Event, user)?;
                entry
                    .client
                    .remove_user_to_entity_mapping(user, entity_type, entity)
                    .await
                    .map_err(|source| {
                        fanout::Error::Wrapped {
                            event: "remove user entity mapping on".to_string(),
                            description: entry.description.clone(),
                            source,
                        }
                        .into()
                    })
            },
        )
        .await
    }

    pub async fn add_group_to_entity_mapping(
        &self,
        group: &str,
        entity_type: &str,
        entity: &str,
    ) -> Result<(), Error> {
        with_interval_metric(
            &self.logger,
            "Coordinator.AddGroupToEntityMapping",
            "Coordinator.AddGroupToEntityMapping.calls",
            || async {
                let entry = self
                    .manager
                    .get_client(ElementClass::Group, OperationKind::Event, group)?;
                entry
                    .client
                    .add_group_to_entity_mapping(group, entity_type, entity)
                    .await
                    .map_err(|source| {
                        fanout::Error::Wrapped {
                            event: "add group entity mapping on".to_string(),
                            description: entry.description.clone(),
                            source,
                        }
                        .into()
                    })
            },
        )
        .await
    }

    pub async fn remove_group_to_entity_mapping(
        &self,
        group: &str,
        entity_type: &str,
        entity: &str,
    ) -> Result<(), Error> {
        with_interval_metric(
            &self.logger,
            "Coordinator.RemoveGroupToEntityMapping",
            "Coordinator.RemoveGroupToEntityMapping.calls",
            || async {
                let entry = self
                    .manager
                    .get_client(ElementClass::Group, OperationKind::Event, group)?;
                entry
                    .client
                    .remove_group_to_entity_mapping(group, entity_type, entity)
                    .await
                    .map_err(|source| {
                        fanout::Error::Wrapped {
                            event: "remove group entity mapping on".to_string(),
                            description: entry.description.clone(),
                            source,
                        }
                        .into()
                    })
            },
        )
        .await
    }

    // ---- single-group + all-group-to-group write (§4.5) --------------

    pub async fn add_group(&self, group: &str) -> Result<(), Error> {
        with_interval_metric(
            &self.logger,
            "Coordinator.AddGroup",
            "Coordinator.AddGroup.calls",
            || async {
                let entry = self
                    .manager
                    .get_client(ElementClass::Group, OperationKind::Event, group)?;
                entry.client.add_group(group).await.map_err(|source| {
                    fanout::Error::Wrapped {
                        event: "add group to".to_string(),
                        description: entry.description.clone(),
                        source,
                    }
                })?;

                let gg_clients =
                    self.event_clients(&[ElementClass::GroupToGroupMapping]);
                fanout::await_task_completion(
                    fanout::tasks_from_clients(gg_clients),
                    "register group on",
                    |client, ()| {
                        let group = group.to_string();
                        async move { client.add_group(&group).await }
                    },
                    |_: &()| {},
                    |_| true,
                    &ExceptionPolicy::default(),
                )
                .await?;
                Ok(())
            },
        )
        .await
    }

    // ---- all-class fan-out writes (§4.5) ------------------------------

    pub async fn remove_user(&self, user: &str) -> Result<(), Error> {
        with_interval_metric(
            &self.logger,
            "Coordinator.RemoveUser",
            "Coordinator.RemoveUser.calls",
            || async {
                let clients = self.event_clients(&[ElementClass::User]);
                fanout::await_task_completion(
                    fanout::tasks_from_clients(clients),
                    "remove user from",
                    |client, ()| {
                        let user = user.to_string();
                        async move { client.remove_user(&user).await }
                    },
                    |_: &()| {},
                    |_| true,
                    &ExceptionPolicy::default(),
                )
                .await?;
                Ok(())
            },
        )
        .await
    }

    pub async fn remove_group(&self, group: &str) -> Result<(), Error> {
        with_interval_metric(
            &self.logger,
            "Coordinator.RemoveGroup",
            "Coordinator.RemoveGroup.calls",
            || async {
                let clients = self.event_clients(&USER_GROUP_AND_GG);
                fanout::await_task_completion(
                    fanout::tasks_from_clients(clients),
                    "remove group from",
                    |client, ()| {
                        let group = group.to_string();
                        async move { client.remove_group(&group).await }
                    },
                    |_: &()| {},
                    |_| true,
                    &ExceptionPolicy::default(),
                )
                .await?;
                Ok(())
            },
        )
        .await
    }

    pub async fn add_entity_type(&self, entity_type: &str) -> Result<(), Error> {
        with_interval_metric(
            &self.logger,
            "Coordinator.AddEntityType",
            "Coordinator.AddEntityType.calls",
            || async {
                let clients = self.event_clients(&USER_AND_GROUP);
                fanout::await_task_completion(
                    fanout::tasks_from_clients(clients),
                    "add entity type on",
                    |client, ()| {
                        let entity_type = entity_type.to_string();
                        async move { client.add_entity_type(&entity_type).await }
                    },
                    |_: &()| {},
                    |_| true,
                    &ExceptionPolicy::default(),
                )
                .await?;
                Ok(())
            },
        )
        .await
    }

    pub async fn add_entity(&self, entity_type: &str, entity: &str) -> Result<(), Error> {
        with_interval_metric(
            &self.logger,
            "Coordinator.AddEntity",
            "Coordinator.AddEntity.calls",
            || async {
                let clients = self.event_clients(&USER_AND_GROUP);
                fanout::await_task_completion(
                    fanout::tasks_from_clients(clients),
                    "add entity on",
                    |client, ()| {
                        let entity_type = entity_type.to_string();
                        let entity = entity.to_string();
                        async move { client.add_entity(&entity_type, &entity).await }
                    },
                    |_: &()| {},
                    |_| true,
                    &ExceptionPolicy::default(),
                )
                .await?;
                Ok(())
            },
        )
        .await
    }

    /// The internal removal primitive the `emit_metrics` design note (§9)
    /// calls for: the public [`Self::remove_entity`] runs this with
    /// `emit_metrics = true`; [`Self::remove_entity_type`]'s prepended-events
    /// loop runs it with `false` so the per-entity removals it must emit
    /// don't double-count against `Coordinator.RemoveEntity`'s own metrics.
    async fn remove_entity_impl(
        &self,
        entity_type: &str,
        entity: &str,
        emit_metrics: bool,
    ) -> Result<(), Error> {
        let op = || async {
            let clients = self.event_clients(&USER_AND_GROUP);
            fanout::await_task_completion(
                fanout::tasks_from_clients(clients),
                "remove entity on",
                |client, ()| {
                    let entity_type = entity_type.to_string();
                    let entity = entity.to_string();
                    async move { client.remove_entity(&entity_type, &entity).await }
                },
                |_: &()| {},
                |_| true,
                &ExceptionPolicy::default(),
            )
            .await?;
            Ok(())
        };

        if emit_metrics {
            with_interval_metric(
                &self.logger,
                "Coordinator.RemoveEntity",
                "Coordinator.RemoveEntity.calls",
                op,
            )
            .await
        } else {
            op().await
        }
    }

    pub async fn remove_entity(&self, entity_type: &str, entity: &str) -> Result<(), Error> {
        self.remove_entity_impl(entity_type, entity, true).await
    }

    /// Prepended-events removal (§4.5): every entity of `entity_type` is
    /// removed individually, each emitting its own `RemoveEntity` event to
    /// reverse-index holders, before the type itself is removed. The inner
    /// loop runs with `emit_metrics = false` so only the outer operation's
    /// interval and count are recorded.
    pub async fn remove_entity_type(&self, entity_type: &str) -> Result<(), Error> {
        with_interval_metric(
            &self.logger,
            "Coordinator.RemoveEntityType",
            "Coordinator.RemoveEntityType.calls",
            || async {
                let entities = self.get_entities(entity_type).await?;
                for entity in &entities {
                    self.remove_entity_impl(entity_type, entity, false).await?;
                }

                let clients = self.event_clients(&USER_AND_GROUP);
                fanout::await_task_completion(
                    fanout::tasks_from_clients(clients),
                    "remove entity type on",
                    |client, ()| {
                        let entity_type = entity_type.to_string();
                        async move { client.remove_entity_type(&entity_type).await }
                    },
                    |_: &()| {},
                    |_| true,
                    &ExceptionPolicy::default(),
                )
                .await?;
                Ok(())
            },
        )
        .await
    }

    // ---- (a) existence checks ------------------------------------------

    pub async fn contains_user(&self, user: &str) -> Result<bool, Error> {
        with_interval_metric(
            &self.logger,
            "Coordinator.ContainsUser",
            "Coordinator.ContainsUser.calls",
            || async {
                let clients = self.query_clients(&[ElementClass::User]);
                let mut found = false;
                fanout::await_task_completion(
                    fanout::tasks_from_clients(clients),
                    "check user existence on",
                    |client, ()| {
                        let user = user.to_string();
                        async move { client.contains_user(&user).await }
                    },
                    |value: &bool| found = *value,
                    |value: &bool| !*value,
                    &ExceptionPolicy::default(),
                )
                .await?;
                Ok(found)
            },
        )
        .await
    }

    pub async fn contains_group(&self, group: &str) -> Result<bool, Error> {
        Ok(self.router.contains_group(group, true).await?)
    }

    pub async fn contains_entity_type(&self, entity_type: &str) -> Result<bool, Error> {
        with_interval_metric(
            &self.logger,
            "Coordinator.ContainsEntityType",
            "Coordinator.ContainsEntityType.calls",
            || async {
                let clients = self.query_clients(&USER_AND_GROUP);
                let mut found = false;
                fanout::await_task_completion(
                    fanout::tasks_from_clients(clients),
                    "check entity type existence on",
                    |client, ()| {
                        let entity_type = entity_type.to_string();
                        async move { client.contains_entity_type(&entity_type).await }
                    },
                    |value: &bool| found = *value,
                    |value: &bool| !*value,
                    &ExceptionPolicy::default(),
                )
                .await?;
                Ok(found)
            },
        )
        .await
    }

    pub async fn contains_entity(&self, entity_type: &str, entity: &str) -> Result<bool, Error> {
        with_interval_metric(
            &self.logger,
            "Coordinator.ContainsEntity",
            "Coordinator.ContainsEntity.calls",
            || async {
                let clients = self.query_clients(&USER_AND_GROUP);
                let mut found = false;
                fanout::await_task_completion(
                    fanout::tasks_from_clients(clients),
                    "check entity existence on",
                    |client, ()| {
                        let entity_type = entity_type.to_string();
                        let entity = entity.to_string();
                        async move { client.contains_entity(&entity_type, &entity).await }
                    },
                    |value: &bool| found = *value,
                    |value: &bool| !*value,
                    &ExceptionPolicy::ignore_not_found(),
                )
                .await?;
                Ok(found)
            },
        )
        .await
    }

    // ---- (c) union lookups ----------------------------------------------

    pub async fn get_users(&self) -> Result<Vec<String>, Error> {
        with_interval_metric(
            &self.logger,
            "Coordinator.GetUsers",
            "Coordinator.GetUsers.calls",
            || async {
                let clients = self.query_clients(&[ElementClass::User]);
                let mut union = HashSet::new();
                fanout::await_task_completion(
                    fanout::tasks_from_clients(clients),
                    "retrieve users from",
                    |client, ()| async move { client.get_users().await },
                    |values: &Vec<String>| union.extend(values.iter().cloned()),
                    |_| true,
                    &ExceptionPolicy::default(),
                )
                .await?;
                Ok(union.into_iter().collect())
            },
        )
        .await
    }

    pub async fn get_groups(&self) -> Result<Vec<String>, Error> {
        Ok(self.router.get_groups(true).await?)
    }

    pub async fn get_entities(&self, entity_type: &str) -> Result<Vec<String>, Error> {
        with_interval_metric(
            &self.logger,
            "Coordinator.GetEntities",
            "Coordinator.GetEntities.calls",
            || async {
                let clients = self.query_clients(&USER_AND_GROUP);
                let mut union = HashSet::new();
                fanout::await_task_completion(
                    fanout::tasks_from_clients(clients),
                    "retrieve entities from",
                    |client, ()| {
                        let entity_type = entity_type.to_string();
                        async move { client.get_entities(&entity_type).await }
                    },
                    |values: &Vec<String>| union.extend(values.iter().cloned()),
                    |_| true,
                    &ExceptionPolicy::ignore_not_found(),
                )
                .await?;
                Ok(union.into_iter().collect())
            },
        )
        .await
    }

    /// `GetGroupToUserMappings(groups)` (S2): fan out to every User query
    /// shard, passing it the whole candidate group set, and union what
    /// comes back.
    pub async fn get_group_to_user_mappings(&self, groups: &[String]) -> Result<Vec<String>, Error> {
        with_interval_metric(
            &self.logger,
            "Coordinator.GetGroupToUserMappings",
            "Coordinator.GetGroupToUserMappings.calls",
            || async {
                let clients = self.query_clients(&[ElementClass::User]);
                let entries: Vec<_> = clients
                    .into_iter()
                    .map(|c| (c, groups.to_vec()))
                    .collect();
                let mut union = HashSet::new();
                fanout::await_task_completion(
                    entries,
                    "retrieve user mappings for multiple groups",
                    |client, subset: Vec<String>| async move {
                        client.get_group_to_user_mappings(&subset).await
                    },
                    |values: &Vec<String>| union.extend(values.iter().cloned()),
                    |_| true,
                    &ExceptionPolicy::default(),
                )
                .await?;
                Ok(union.into_iter().collect())
            },
        )
        .await
    }

    pub async fn get_application_component_and_access_level_to_user_mappings(
        &self,
        component: &str,
        access: &str,
        include_indirect: bool,
    ) -> Result<Vec<String>, Error> {
        with_interval_metric(
            &self.logger,
            "Coordinator.GetApplicationComponentAndAccessLevelToUserMappings",
            "Coordinator.GetApplicationComponentAndAccessLevelToUserMappings.calls",
            || async {
                let clients = self.query_clients(&[ElementClass::User]);
                let mut union = HashSet::new();
                fanout::await_task_completion(
                    fanout::tasks_from_clients(clients),
                    "retrieve component access mappings from",
                    |client, ()| {
                        let component = component.to_string();
                        let access = access.to_string();
                        async move {
                            client
                                .get_application_component_and_access_level_to_user_mappings(
                                    &component,
                                    &access,
                                    include_indirect,
                                )
                                .await
                        }
                    },
                    |values: &Vec<String>| union.extend(values.iter().cloned()),
                    |_| true,
                    &ExceptionPolicy::default(),
                )
                .await?;
                Ok(union.into_iter().collect())
            },
        )
        .await
    }

    pub async fn get_entity_to_user_mappings(
        &self,
        entity_type: &str,
        entity: &str,
        include_indirect: bool,
    ) -> Result<Vec<String>, Error> {
        with_interval_metric(
            &self.logger,
            "Coordinator.GetEntityToUserMappings",
            "Coordinator.GetEntityToUserMappings.calls",
            || async {
                let clients = self.query_clients(&[ElementClass::User]);
                let mut union = HashSet::new();
                fanout::await_task_completion(
                    fanout::tasks_from_clients(clients),
                    "retrieve entity mappings from",
                    |client, ()| {
                        let entity_type = entity_type.to_string();
                        let entity = entity.to_string();
                        async move {
                            client
                                .get_entity_to_user_mappings(&entity_type, &entity, include_indirect)
                                .await
                        }
                    },
                    |values: &Vec<String>| union.extend(values.iter().cloned()),
                    |_| true,
                    &ExceptionPolicy::ignore_not_found(),
                )
                .await?;
                Ok(union.into_iter().collect())
            },
        )
        .await
    }

    // ---- (b) single-key lookup / §9 open-question decision --------------

    /// `GetUserToGroupMappings(user, includeIndirectMappings)`. The shard
    /// wire call only ever answers the direct mapping (§9: marked
    /// not-implemented upstream for the indirect case); when
    /// `include_indirect` is set this resolves the indirection itself using
    /// the same single-hop expansion as step 2 of the traversal queries.
    pub async fn get_user_to_group_mappings(
        &self,
        user: &str,
        include_indirect: bool,
    ) -> Result<Vec<String>, Error> {
        with_interval_metric(
            &self.logger,
            "Coordinator.GetUserToGroupMappings",
            "Coordinator.GetUserToGroupMappings.calls",
            || async {
                let entry = self
                    .manager
                    .get_client(ElementClass::User, OperationKind::Query, user)?;
                let direct = entry
                    .client
                    .get_user_to_group_mappings(user, false)
                    .await
                    .map_err(|source| fanout::Error::Wrapped {
                        event: "retrieve group mappings for".to_string(),
                        description: entry.description.clone(),
                        source,
                    })?;

                if !include_indirect {
                    return Ok(direct);
                }

                let expanded = self.expand_groups(&direct).await?;
                self.logger.set_amount(
                    "Coordinator.GetUserToGroupMappings.groupsMappedToGroups",
                    expanded.len() as i64,
                );
                Ok(expanded.into_iter().collect())
            },
        )
        .await
    }

    // ---- (d) two-phase group-traversal queries, user-rooted --------------

    pub async fn has_access_to_application_component_for_user(
        &self,
        user: &str,
        component: &str,
        access: &str,
    ) -> Result<bool, Error> {
        with_interval_metric(
            &self.logger,
            "Coordinator.HasAccessToApplicationComponent",
            "Coordinator.HasAccessToApplicationComponent.calls",
            || async {
                let entry = self
                    .manager
                    .get_client(ElementClass::User, OperationKind::Query, user)?;
                let direct_groups = entry
                    .client
                    .get_user_to_group_mappings(user, false)
                    .await
                    .map_err(|source| fanout::Error::Wrapped {
                        event: "retrieve group mappings for".to_string(),
                        description: entry.description.clone(),
                        source,
                    })?;
                let direct_access = entry
                    .client
                    .has_user_access_to_application_component(user, component, access)
                    .await
                    .map_err(|source| fanout::Error::Wrapped {
                        event: "check direct component access for".to_string(),
                        description: entry.description.clone(),
                        source,
                    })?;

                let expanded = self.expand_groups(&direct_groups).await?;
                self.logger.set_amount(
                    "Coordinator.HasAccessToApplicationComponent.groupsMappedToGroups",
                    expanded.len() as i64,
                );

                if direct_access {
                    self.logger.set_amount(
                        "Coordinator.HasAccessToApplicationComponent.groupShardsQueried",
                        0,
                    );
                    return Ok(true);
                }

                let expanded_vec: Vec<String> = expanded.into_iter().collect();
                let outcome = self
                    .router
                    .has_access_to_application_component(&expanded_vec, component, access, false)
                    .await?;
                self.logger.set_amount(
                    "Coordinator.HasAccessToApplicationComponent.groupShardsQueried",
                    outcome.shards_queried as i64,
                );
                Ok(outcome.value)
            },
        )
        .await
    }

    pub async fn has_access_to_entity_for_user(
        &self,
        user: &str,
        entity_type: &str,
        entity: &str,
    ) -> Result<bool, Error> {
        with_interval_metric(
            &self.logger,
            "Coordinator.HasAccessToEntity",
            "Coordinator.HasAccessToEntity.calls",
            || async {
                let entry = self
                    .manager
                    .get_client(ElementClass::User, OperationKind::Query, user)?;
                let direct_groups = entry
                    .client
                    .get_user_to_group_mappings(user, false)
                    .await
                    .map_err(|source| fanout::Error::Wrapped {
                        event: "retrieve group mappings for".to_string(),
                        description: entry.description.clone(),
                        source,
                    })?;
                let direct_access = entry
                    .client
                    .has_user_access_to_entity(user, entity_type, entity)
                    .await
                    .map_err(|source| fanout::Error::Wrapped {
                        event: "check direct entity access for".to_string(),
                        description: entry.description.clone(),
                        source,
                    })?;

                let expanded = self.expand_groups(&direct_groups).await?;
                self.logger.set_amount(
                    "Coordinator.HasAccessToEntity.groupsMappedToGroups",
                    expanded.len() as i64,
                );

                if direct_access {
                    self.logger
                        .set_amount("Coordinator.HasAccessToEntity.groupShardsQueried", 0);
                    return Ok(true);
                }

                let expanded_vec: Vec<String> = expanded.into_iter().collect();
                let outcome = self
                    .router
                    .has_access_to_entity(&expanded_vec, entity_type, entity, false)
                    .await?;
                self.logger.set_amount(
                    "Coordinator.HasAccessToEntity.groupShardsQueried",
                    outcome.shards_queried as i64,
                );
                Ok(outcome.value)
            },
        )
        .await
    }

    pub async fn get_application_components_accessible_by_user(
        &self,
        user: &str,
    ) -> Result<Vec<String>, Error> {
        with_interval_metric(
            &self.logger,
            "Coordinator.GetApplicationComponentsAccessibleByUser",
            "Coordinator.GetApplicationComponentsAccessibleByUser.calls",
            || async {
                let entry = self
                    .manager
                    .get_client(ElementClass::User, OperationKind::Query, user)?;
                let direct_groups = entry
                    .client
                    .get_user_to_group_mappings(user, false)
                    .await
                    .map_err(|source| fanout::Error::Wrapped {
                        event: "retrieve group mappings for".to_string(),
                        description: entry.description.clone(),
                        source,
                    })?;

                let expanded = self.expand_groups(&direct_groups).await?;
                self.logger.set_amount(
                    "Coordinator.GetApplicationComponentsAccessibleByUser.groupsMappedToGroups",
                    expanded.len() as i64,
                );
                let expanded_vec: Vec<String> = expanded.into_iter().collect();
                let outcome = self
                    .router
                    .get_application_components_accessible_by_groups(&expanded_vec, false)
                    .await?;
                self.logger.set_amount(
                    "Coordinator.GetApplicationComponentsAccessibleByUser.groupShardsQueried",
                    outcome.shards_queried as i64,
                );
                Ok(outcome.value)
            },
        )
        .await
    }

    pub async fn get_entities_accessible_by_user(
        &self,
        user: &str,
        entity_type: Option<&str>,
    ) -> Result<Vec<String>, Error> {
        with_interval_metric(
            &self.logger,
            "Coordinator.GetEntitiesAccessibleByUser",
            "Coordinator.GetEntitiesAccessibleByUser.calls",
            || async {
                let entry = self
                    .manager
                    .get_client(ElementClass::User, OperationKind::Query, user)?;
                let direct_groups = entry
                    .client
                    .get_user_to_group_mappings(user, false)
                    .await
                    .map_err(|source| fanout::Error::Wrapped {
                        event: "retrieve group mappings for".to_string(),
                        description: entry.description.clone(),
                        source,
                    })?;

                let expanded = self.expand_groups(&direct_groups).await?;
                self.logger.set_amount(
                    "Coordinator.GetEntitiesAccessibleByUser.groupsMappedToGroups",
                    expanded.len() as i64,
                );
                let expanded_vec: Vec<String> = expanded.into_iter().collect();
                let outcome = self
                    .router
                    .get_entities_accessible_by_groups(&expanded_vec, entity_type, false)
                    .await?;
                self.logger.set_amount(
                    "Coordinator.GetEntitiesAccessibleByUser.groupShardsQueried",
                    outcome.shards_queried as i64,
                );
                Ok(outcome.value)
            },
        )
        .await
    }

    // ---- (d) two-phase group-traversal queries, group-rooted --------------
    //
    // No step 1 (no owning user to resolve); the caller already has a
    // candidate group set and only step 2 (expansion) and step 3
    // (partitioned dispatch) apply.

    pub async fn has_access_to_application_component_for_groups(
        &self,
        groups: &[String],
        component: &str,
        access: &str,
    ) -> Result<bool, Error> {
        with_interval_metric(
            &self.logger,
            "Coordinator.HasAccessToApplicationComponentForGroups",
            "Coordinator.HasAccessToApplicationComponentForGroups.calls",
            || async {
                let expanded = self.expand_groups(groups).await?;
                self.logger.set_amount(
                    "Coordinator.HasAccessToApplicationComponentForGroups.groupsMappedToGroups",
                    expanded.len() as i64,
                );
                let expanded_vec: Vec<String> = expanded.into_iter().collect();
                let outcome = self
                    .router
                    .has_access_to_application_component(&expanded_vec, component, access, false)
                    .await?;
                self.logger.set_amount(
                    "Coordinator.HasAccessToApplicationComponentForGroups.groupShardsQueried",
                    outcome.shards_queried as i64,
                );
                Ok(outcome.value)
            },
        )
        .await
    }

    pub async fn has_access_to_entity_for_groups(
        &self,
        groups: &[String],
        entity_type: &str,
        entity: &str,
    ) -> Result<bool, Error> {
        with_interval_metric(
            &self.logger,
            "Coordinator.HasAccessToEntityForGroups",
            "Coordinator.HasAccessToEntityForGroups.calls",
            || async {
                let expanded = self.expand_groups(groups).await?;
                self.logger.set_amount(
                    "Coordinator.HasAccessToEntityForGroups.groupsMappedToGroups",
                    expanded.len() as i64,
                );
                let expanded_vec: Vec<String> = expanded.into_iter().collect();
                let outcome = self
                    .router
                    .has_access_to_entity(&expanded_vec, entity_type, entity, false)
                    .await?;
                self.logger.set_amount(
                    "Coordinator.HasAccessToEntityForGroups.groupShardsQueried",
                    outcome.shards_queried as i64,
                );
                Ok(outcome.value)
            },
        )
        .await
    }

    pub async fn get_application_components_accessible_by_groups(
        &self,
        groups: &[String],
    ) -> Result<Vec<String>, Error> {
        with_interval_metric(
            &self.logger,
            "Coordinator.GetApplicationComponentsAccessibleByGroups",
            "Coordinator.GetApplicationComponentsAccessibleByGroups.calls",
            || async {
                let expanded = self.expand_groups(groups).await?;
                self.logger.set_amount(
                    "Coordinator.GetApplicationComponentsAccessibleByGroups.groupsMappedToGroups",
                    expanded.len() as i64,
                );
                let expanded_vec: Vec<String> = expanded.into_iter().collect();
                let outcome = self
                    .router
                    .get_application_components_accessible_by_groups(&expanded_vec, false)
                    .await?;
                self.logger.set_amount(
                    "Coordinator.GetApplicationComponentsAccessibleByGroups.groupShardsQueried",
                    outcome.shards_queried as i64,
                );
                Ok(outcome.value)
            },
        )
        .await
    }

    pub async fn get_entities_accessible_by_groups(
        &self,
        groups: &[String],
        entity_type: Option<&str>,
    ) -> Result<Vec<String>, Error> {
        with_interval_metric(
            &self.logger,
            "Coordinator.GetEntitiesAccessibleByGroups",
            "Coordinator.GetEntitiesAccessibleByGroups.calls",
            || async {
                let expanded = self.expand_groups(groups).await?;
                self.logger.set_amount(
                    "Coordinator.GetEntitiesAccessibleByGroups.groupsMappedToGroups",
                    expanded.len() as i64,
                );
                let expanded_vec: Vec<String> = expanded.into_iter().collect();
                let outcome = self
                    .router
                    .get_entities_accessible_by_groups(&expanded_vec, entity_type, false)
                    .await?;
                self.logger.set_amount(
                    "Coordinator.GetEntitiesAccessibleByGroups.groupShardsQueried",
                    outcome.shards_queried as i64,
                );
                Ok(outcome.value)
            },
        )
        .await
    }
}
