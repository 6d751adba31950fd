//! Query Router (C7): the group-class-only subset of the Coordinator's
//! surface. Never touches `GroupToGroupMapping` shards and never expands a
//! group set by indirection — callers hand it the exact group set to fan
//! out to. The Coordinator uses this internally for step 3 of its
//! two-phase traversal (§4.6) after resolving indirection itself; it is
//! also a standalone public type other callers can use directly for
//! queries that are already scoped to a known group set.

use std::collections::HashSet;
use std::sync::Arc;

use accessgate_config::{ElementClass, OperationKind};
use accessgate_stats::MetricLogger;

use crate::client::{self, ShardClient};
use crate::fanout::{self, ExceptionPolicy};
use crate::manager::ShardClientManager;
use crate::metrics::with_interval_metric;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Fanout(#[from] fanout::Error),
    #[error(transparent)]
    Manager(#[from] crate::manager::Error),
}

/// The value produced by a group-partitioned query together with the
/// number of distinct Group shards it actually contacted — callers need
/// the latter for the `groupShardsQueried` metric (§4.6).
pub struct GroupQueryOutcome<T> {
    pub value: T,
    pub shards_queried: usize,
}

pub struct QueryRouter {
    manager: Arc<ShardClientManager>,
    logger: Arc<dyn MetricLogger>,
}

impl QueryRouter {
    pub fn new(manager: Arc<ShardClientManager>, logger: Arc<dyn MetricLogger>) -> Self {
        Self { manager, logger }
    }

    async fn record<T, Fut>(
        &self,
        emit_metrics: bool,
        operation_name: &str,
        count_metric: &str,
        op: impl FnOnce() -> Fut,
    ) -> Result<T, Error>
    where
        Fut: std::future::Future<Output = Result<T, Error>>,
    {
        if emit_metrics {
            with_interval_metric(&self.logger, operation_name, count_metric, op).await
        } else {
            op().await
        }
    }

    pub async fn contains_group(&self, group: &str, emit_metrics: bool) -> Result<bool, Error> {
        self.record(
            emit_metrics,
            "Router.ContainsGroup",
            "Router.ContainsGroup.calls",
            || async {
                let clients = self.manager.get_all_clients(ElementClass::Group, OperationKind::Query);
                let mut found = false;
                fanout::await_task_completion(
                    fanout::tasks_from_clients(clients),
                    "check group existence on",
                    |client, ()| {
                        let group = group.to_string();
                        async move { client.contains_group(&group).await }
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

    pub async fn get_groups(&self, emit_metrics: bool) -> Result<Vec<String>, Error> {
        self.record(
            emit_metrics,
            "Router.GetGroups",
            "Router.GetGroups.calls",
            || async {
                let clients = self.manager.get_all_clients(ElementClass::Group, OperationKind::Query);
                let mut union = HashSet::new();
                fanout::await_task_completion(
                    fanout::tasks_from_clients(clients),
                    "retrieve groups from",
                    |client, ()| async move { client.get_groups().await },
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

    /// Step 3 of the Coordinator's two-phase traversal (and this router's
    /// own public surface): partition `groups` by owning Group shard and
    /// short-circuit on the first `true`.
    pub async fn has_access_to_application_component(
        &self,
        groups: &[String],
        component: &str,
        access: &str,
        emit_metrics: bool,
    ) -> Result<GroupQueryOutcome<bool>, Error> {
        if groups.is_empty() {
            return Ok(GroupQueryOutcome {
                value: false,
                shards_queried: 0,
            });
        }

        self.record(
            emit_metrics,
            "Router.HasAccessToApplicationComponent",
            "Router.HasAccessToApplicationComponent.calls",
            || async {
                let partitioned = self.manager.get_clients(
                    ElementClass::Group,
                    OperationKind::Query,
                    groups,
                )?;
                let shards_queried = partitioned.len();
                let mut found = false;
                fanout::await_task_completion(
                    partitioned,
                    "retrieve component access for multiple groups",
                    |client, subset: Vec<String>| {
                        let component = component.to_string();
                        let access = access.to_string();
                        async move {
                            client
                                .has_access_to_application_component(&subset, &component, &access)
                                .await
                        }
                    },
                    |value: &bool| found = found || *value,
                    |value: &bool| !*value,
                    &ExceptionPolicy::default(),
                )
                .await?;
                Ok(GroupQueryOutcome {
                    value: found,
                    shards_queried,
                })
            },
        )
        .await
    }

    pub async fn has_access_to_entity(
        &self,
        groups: &[String],
        entity_type: &str,
        entity: &str,
        emit_metrics: bool,
    ) -> Result<GroupQueryOutcome<bool>, Error> {
        if groups.is_empty() {
            return Ok(GroupQueryOutcome {
                value: false,
                shards_queried: 0,
            });
        }

        self.record(
            emit_metrics,
            "Router.HasAccessToEntity",
            "Router.HasAccessToEntity.calls",
            || async {
                let partitioned = self.manager.get_clients(
                    ElementClass::Group,
                    OperationKind::Query,
                    groups,
                )?;
                let shards_queried = partitioned.len();
                let mut found = false;
                fanout::await_task_completion(
                    partitioned,
                    "retrieve entity access for multiple groups",
                    |client, subset: Vec<String>| {
                        let entity_type = entity_type.to_string();
                        let entity = entity.to_string();
                        async move {
                            client
                                .has_access_to_entity(&subset, &entity_type, &entity)
                                .await
                        }
                    },
                    |value: &bool| found = found || *value,
                    |value: &bool| !*value,
                    &ExceptionPolicy::ignore_not_found(),
                )
                .await?;
                Ok(GroupQueryOutcome {
                    value: found,
                    shards_queried,
                })
            },
        )
        .await
    }

    pub async fn get_application_components_accessible_by_groups(
        &self,
        groups: &[String],
        emit_metrics: bool,
    ) -> Result<GroupQueryOutcome<Vec<String>>, Error> {
        if groups.is_empty() {
            return Ok(GroupQueryOutcome {
                value: Vec::new(),
                shards_queried: 0,
            });
        }

        self.record(
            emit_metrics,
            "Router.GetApplicationComponentsAccessibleByGroups",
            "Router.GetApplicationComponentsAccessibleByGroups.calls",
            || async {
                let partitioned = self.manager.get_clients(
                    ElementClass::Group,
                    OperationKind::Query,
                    groups,
                )?;
                let shards_queried = partitioned.len();
                let mut union = HashSet::new();
                fanout::await_task_completion(
                    partitioned,
                    "retrieve component mappings for multiple groups",
                    |client, subset: Vec<String>| async move {
                        client
                            .get_application_components_accessible_by_groups(&subset)
                            .await
                    },
                    |values: &Vec<String>| union.extend(values.iter().cloned()),
                    |_| true,
                    &ExceptionPolicy::default(),
                )
                .await?;
                Ok(GroupQueryOutcome {
                    value: union.into_iter().collect(),
                    shards_queried,
                })
            },
        )
        .await
    }

    pub async fn get_entities_accessible_by_groups(
        &self,
        groups: &[String],
        entity_type: Option<&str>,
        emit_metrics: bool,
    ) -> Result<GroupQueryOutcome<Vec<String>>, Error> {
        if groups.is_empty() {
            return Ok(GroupQueryOutcome {
                value: Vec::new(),
                shards_queried: 0,
            });
        }

        self.record(
            emit_metrics,
            "Router.GetEntitiesAccessibleByGroups",
            "Router.GetEntitiesAccessibleByGroups.calls",
            || async {
                let partitioned = self.manager.get_clients(
                    ElementClass::Group,
                    OperationKind::Query,
                    groups,
                )?;
                let shards_queried = partitioned.len();
                let mut union = HashSet::new();
                fanout::await_task_completion(
                    partitioned,
                    "retrieve entity mappings for multiple groups",
                    |client, subset: Vec<String>| {
                        let entity_type = entity_type.map(str::to_string);
                        async move {
                            client
                                .get_entities_accessible_by_groups(&subset, entity_type.as_deref())
                                .await
                        }
                    },
                    |values: &Vec<String>| union.extend(values.iter().cloned()),
                    |_| true,
                    &ExceptionPolicy::ignore_not_found(),
                )
                .await?;
                Ok(GroupQueryOutcome {
                    value: union.into_iter().collect(),
                    shards_queried,
                })
            },
        )
        .await
    }

    pub async fn get_group_to_entity_mappings(
        &self,
        group: &str,
        entity_type: Option<&str>,
        emit_metrics: bool,
    ) -> Result<Vec<(String, String)>, Error> {
        self.record(
            emit_metrics,
            "Router.GetGroupToEntityMappings",
            "Router.GetGroupToEntityMappings.calls",
            || async {
                let entry = self
                    .manager
                    .get_client(ElementClass::Group, OperationKind::Query, group)?;
                match entry.client.get_group_to_entity_mappings(group, entity_type).await {
                    Ok(mappings) => Ok(mappings),
                    Err(source) if matches!(source, client::Error::EntityTypeNotFound) => Ok(Vec::new()),
                    Err(source) => Err(fanout::Error::Wrapped {
                        event: "retrieve entity mappings for".to_string(),
                        description: entry.description.clone(),
                        source,
                    }
                    .into()),
                }
            },
        )
        .await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::client::fake::FakeShardClient;
    use crate::hash::Hashers;
    use accessgate_config::{ShardConfigurationSet, ShardRangeSegment};

    fn segment(class: ElementClass, kind: OperationKind, start: i32, desc: &str) -> ShardRangeSegment {
        ShardRangeSegment {
            class,
            kind,
            hash_range_start: start,
            endpoint_uri: format!("http://{desc}"),
            description: desc.to_string(),
        }
    }

    fn router_with_group_shards(shards: Vec<&str>) -> (QueryRouter, Vec<Arc<FakeShardClient>>) {
        let mut segments = Vec::new();
        for (i, desc) in shards.iter().enumerate() {
            let start = if i == 0 { i32::MIN } else { (i as i64 * (u32::MAX as i64 / shards.len() as i64) + i32::MIN as i64) as i32 };
            segments.push(segment(ElementClass::Group, OperationKind::Query, start, desc));
            segments.push(segment(ElementClass::Group, OperationKind::Event, start, desc));
        }
        let set = ShardConfigurationSet::new(segments).unwrap();

        let fakes: Vec<Arc<FakeShardClient>> = shards.iter().map(|_| Arc::new(FakeShardClient::new())).collect();
        let fakes_for_factory = fakes.clone();
        let shard_names: Vec<String> = shards.iter().map(|s| s.to_string()).collect();
        let factory = Arc::new(move |endpoint: &str| -> Arc<dyn crate::client::ShardClient> {
            let idx = shard_names.iter().position(|s| endpoint.contains(s.as_str())).unwrap();
            fakes_for_factory[idx].clone() as Arc<dyn crate::client::ShardClient>
        });

        let manager = Arc::new(ShardClientManager::with_factory(set, Hashers::default(), factory));
        let logger: Arc<dyn MetricLogger> = Arc::new(accessgate_stats::TracingMetricLogger::new());
        (QueryRouter::new(manager, logger), fakes)
    }

    #[tokio::test]
    async fn test_s5_style_entity_union_across_two_group_shards() {
        let (router, fakes) = router_with_group_shards(vec!["G1", "G2"]);
        fakes[0].seed_group_entities("g1", "ClientAccount", ["eA".to_string(), "eB".to_string()]);
        fakes[1].seed_group_entities("g2", "ClientAccount", ["eB".to_string(), "eC".to_string()]);

        let outcome = router
            .get_entities_accessible_by_groups(
                &["g1".to_string(), "g2".to_string()],
                Some("ClientAccount"),
                true,
            )
            .await
            .unwrap();

        let mut got = outcome.value;
        got.sort();
        assert_eq!(got, vec!["eA", "eB", "eC"]);
    }

    #[tokio::test]
    async fn test_empty_groups_skips_dispatch() {
        let (router, _fakes) = router_with_group_shards(vec!["G1"]);
        let outcome = router
            .has_access_to_application_component(&[], "Order", "Create", true)
            .await
            .unwrap();
        assert!(!outcome.value);
        assert_eq!(outcome.shards_queried, 0);
    }
}
