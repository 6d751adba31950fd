//! Shard Client Manager (C4): owns the routing table and the clients it
//! points at, and is the only thing in this crate that ever constructs one.

use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;

use accessgate_config::{ElementClass, OperationKind, ShardConfigurationSet};
use arc_swap::ArcSwap;

use crate::client::{ClientAndDescription, HttpShardClient, ShardClient};
use crate::hash::Hashers;

const ALL_CLASSES: [ElementClass; 4] = [
    ElementClass::User,
    ElementClass::Group,
    ElementClass::GroupToGroupMapping,
    ElementClass::Entity,
];
const ALL_KINDS: [OperationKind; 2] = [OperationKind::Event, OperationKind::Query];

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0} does not support single-key routing; it is unsharded and fanned out instead")]
    InvalidElementClass(ElementClass),

    #[error("no shard configured for {class}/{kind}")]
    NoShardConfigured {
        class: ElementClass,
        kind: OperationKind,
    },
}

type ClientFactory = Arc<dyn Fn(&str) -> Arc<dyn ShardClient> + Send + Sync>;

/// Owns the active [`ShardConfigurationSet`] and every live client built
/// from it. Clients are created lazily per endpoint and cached; a refresh
/// that drops an endpoint simply evicts it from the cache — any in-flight
/// call already holds its own `Arc` clone, so the underlying client is
/// dropped (disposed) only once the last such call returns. This is the
/// `Unseen -> Active -> Draining -> Disposed` lifecycle expressed through
/// ordinary Rust reference counting rather than an explicit state machine.
pub struct ShardClientManager {
    config: ArcSwap<ShardConfigurationSet>,
    hashers: Hashers,
    clients: DashMap<String, Arc<dyn ShardClient>>,
    factory: ClientFactory,
    round_robin: DashMap<(ElementClass, OperationKind, i32), AtomicUsize>,
}

impl ShardClientManager {
    /// Build a manager whose clients talk HTTP+JSON via [`HttpShardClient`].
    pub fn new(config: ShardConfigurationSet, hashers: Hashers) -> Self {
        Self::with_factory(
            config,
            hashers,
            Arc::new(|endpoint: &str| {
                Arc::new(HttpShardClient::new(endpoint)) as Arc<dyn ShardClient>
            }),
        )
    }

    /// Build a manager with a caller-supplied client factory, e.g. one
    /// producing [`crate::client::fake::FakeShardClient`] instances in tests.
    pub fn with_factory(
        config: ShardConfigurationSet,
        hashers: Hashers,
        factory: ClientFactory,
    ) -> Self {
        Self {
            config: ArcSwap::from_pointee(config),
            hashers,
            clients: DashMap::new(),
            factory,
            round_robin: DashMap::new(),
        }
    }

    fn client_for_endpoint(&self, endpoint: &str) -> Arc<dyn ShardClient> {
        if let Some(existing) = self.clients.get(endpoint) {
            return existing.clone();
        }
        let client = (self.factory)(endpoint);
        self.clients.insert(endpoint.to_string(), client.clone());
        client
    }

    fn hash_of(&self, class: ElementClass, value: &str) -> i32 {
        match class {
            ElementClass::User => self.hashers.user.hash(value),
            ElementClass::Group | ElementClass::GroupToGroupMapping => {
                self.hashers.group.hash(value)
            }
            ElementClass::Entity => unreachable!("caller must reject Entity before hashing"),
        }
    }

    /// Pick one segment among replicas for `(class, kind, hash_range_start)`
    /// via round-robin. Event ranges always have exactly one segment so
    /// this degenerates to always returning it.
    fn pick_replica<'a>(
        &self,
        class: ElementClass,
        kind: OperationKind,
        start: i32,
        segments: &'a [accessgate_config::ShardRangeSegment],
    ) -> &'a accessgate_config::ShardRangeSegment {
        if segments.len() == 1 {
            return &segments[0];
        }
        let counter = self
            .round_robin
            .entry((class, kind, start))
            .or_insert_with(|| AtomicUsize::new(0));
        let idx = counter.fetch_add(1, Ordering::Relaxed) % segments.len();
        &segments[idx]
    }

    /// `GetClient(class, kind, elementValue)`.
    pub fn get_client(
        &self,
        class: ElementClass,
        kind: OperationKind,
        element_value: &str,
    ) -> Result<ClientAndDescription, Error> {
        if class == ElementClass::Entity {
            return Err(Error::InvalidElementClass(class));
        }

        let config = self.config.load();
        let hash = self.hash_of(class, element_value);
        let segments = config.lookup(class, kind, hash);
        if segments.is_empty() {
            return Err(Error::NoShardConfigured { class, kind });
        }

        let segment = self.pick_replica(class, kind, segments[0].hash_range_start, segments);
        Ok(ClientAndDescription {
            client: self.client_for_endpoint(&segment.endpoint_uri),
            description: segment.description.clone(),
        })
    }

    /// `GetAllClients(class, kind)`: one entry per distinct endpoint.
    pub fn get_all_clients(
        &self,
        class: ElementClass,
        kind: OperationKind,
    ) -> Vec<ClientAndDescription> {
        let config = self.config.load();
        let mut seen = HashSet::new();
        config
            .all_segments(class, kind)
            .into_iter()
            .filter(|segment| seen.insert(segment.endpoint_uri.clone()))
            .map(|segment| ClientAndDescription {
                client: self.client_for_endpoint(&segment.endpoint_uri),
                description: segment.description.clone(),
            })
            .collect()
    }

    /// `GetClients(class, kind, elementValues)`: partitions `element_values`
    /// by owning endpoint. Returns one tuple per endpoint that owns at
    /// least one of the values; the union of returned subsets equals the
    /// input and the subsets are pairwise disjoint (Testable Property 3).
    pub fn get_clients(
        &self,
        class: ElementClass,
        kind: OperationKind,
        element_values: &[String],
    ) -> Result<Vec<(ClientAndDescription, Vec<String>)>, Error> {
        if class == ElementClass::Entity {
            return Err(Error::InvalidElementClass(class));
        }

        let config = self.config.load();
        let mut by_start: std::collections::BTreeMap<
            i32,
            (Vec<accessgate_config::ShardRangeSegment>, Vec<String>),
        > = std::collections::BTreeMap::new();

        for value in element_values {
            let hash = self.hash_of(class, value);
            let segments = config.lookup(class, kind, hash);
            if segments.is_empty() {
                continue;
            }
            let start = segments[0].hash_range_start;
            let entry = by_start
                .entry(start)
                .or_insert_with(|| (segments.to_vec(), Vec::new()));
            entry.1.push(value.clone());
        }

        Ok(by_start
            .into_iter()
            .map(|(start, (segments, subset))| {
                let segment = self.pick_replica(class, kind, start, &segments);
                (
                    ClientAndDescription {
                        client: self.client_for_endpoint(&segment.endpoint_uri),
                        description: segment.description.clone(),
                    },
                    subset,
                )
            })
            .collect())
    }

    /// `RefreshConfiguration(newSet)`: atomic swap. The incoming set has
    /// already passed [`ShardConfigurationSet::new`]'s partition check by
    /// construction, so there is nothing left to re-validate here beyond
    /// installing it and evicting clients for endpoints that disappeared.
    pub fn refresh_configuration(&self, new_config: ShardConfigurationSet) {
        self.config.store(Arc::new(new_config));

        let config = self.config.load();
        let mut active_endpoints = HashSet::new();
        for class in ALL_CLASSES {
            for kind in ALL_KINDS {
                for segment in config.all_segments(class, kind) {
                    active_endpoints.insert(segment.endpoint_uri.clone());
                }
            }
        }
        self.clients
            .retain(|endpoint, _| active_endpoints.contains(endpoint));
    }

    /// `RefreshConfiguration` from a raw, not-yet-validated document: the
    /// public entry point the §4.3/§6 contract describes. Parses and
    /// validates `document` into a `ShardConfigurationSet`; on failure the
    /// active snapshot is left untouched and the inner cause is wrapped in
    /// [`crate::error::ShardConfigurationRefreshError`] rather than thrown
    /// bare.
    pub fn refresh_configuration_from_document(
        &self,
        document: accessgate_config::ConfigDocument,
    ) -> Result<(), crate::error::ShardConfigurationRefreshError> {
        let new_config = accessgate_config::load_document(document)
            .map_err(|source| crate::error::ShardConfigurationRefreshError { source })?;
        self.refresh_configuration(new_config);
        Ok(())
    }

    /// As [`Self::refresh_configuration_from_document`], parsing `contents`
    /// as a TOML shard configuration document first.
    pub fn refresh_configuration_from_str(
        &self,
        contents: &str,
    ) -> Result<(), crate::error::ShardConfigurationRefreshError> {
        let new_config = accessgate_config::load_str(contents)
            .map_err(|source| crate::error::ShardConfigurationRefreshError { source })?;
        self.refresh_configuration(new_config);
        Ok(())
    }

    /// A snapshot of the currently active configuration, for callers (e.g.
    /// the operator CLI's `show-routing`) that want to inspect routing
    /// decisions without dispatching a real call.
    pub fn snapshot(&self) -> arc_swap::Guard<Arc<ShardConfigurationSet>> {
        self.config.load()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use accessgate_config::ShardRangeSegment;
    use std::sync::atomic::AtomicUsize as StdAtomicUsize;

    fn segment(class: ElementClass, kind: OperationKind, start: i32, desc: &str) -> ShardRangeSegment {
        ShardRangeSegment {
            class,
            kind,
            hash_range_start: start,
            endpoint_uri: format!("http://{desc}"),
            description: desc.to_string(),
        }
    }

    fn fake_factory() -> (ClientFactory, Arc<StdAtomicUsize>) {
        let calls = Arc::new(StdAtomicUsize::new(0));
        let calls_for_closure = calls.clone();
        let factory: ClientFactory = Arc::new(move |_endpoint: &str| {
            calls_for_closure.fetch_add(1, Ordering::SeqCst);
            Arc::new(crate::client::fake::FakeShardClient::new()) as Arc<dyn ShardClient>
        });
        (factory, calls)
    }

    #[test]
    fn test_get_client_rejects_entity_class() {
        let set = ShardConfigurationSet::new(vec![segment(
            ElementClass::User,
            OperationKind::Event,
            i32::MIN,
            "UA",
        )])
        .unwrap();
        let (factory, _) = fake_factory();
        let manager = ShardClientManager::with_factory(set, Hashers::default(), factory);
        let err = manager
            .get_client(ElementClass::Entity, OperationKind::Event, "whatever")
            .unwrap_err();
        assert!(matches!(err, Error::InvalidElementClass(_)));
    }

    #[test]
    fn test_get_client_caches_by_endpoint() {
        let set = ShardConfigurationSet::new(vec![segment(
            ElementClass::User,
            OperationKind::Event,
            i32::MIN,
            "UA",
        )])
        .unwrap();
        let (factory, calls) = fake_factory();
        let manager = ShardClientManager::with_factory(set, Hashers::default(), factory);
        manager
            .get_client(ElementClass::User, OperationKind::Event, "alice")
            .unwrap();
        manager
            .get_client(ElementClass::User, OperationKind::Event, "bob")
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_get_clients_partitions_disjointly() {
        let set = ShardConfigurationSet::new(vec![
            segment(ElementClass::Group, OperationKind::Query, i32::MIN, "G1"),
            segment(ElementClass::Group, OperationKind::Query, 0, "G2"),
        ])
        .unwrap();
        let (factory, _) = fake_factory();
        let manager = ShardClientManager::with_factory(set, Hashers::default(), factory);

        let groups: Vec<String> = vec!["g1".into(), "g2".into(), "g3".into(), "g4".into()];
        let partitioned = manager
            .get_clients(ElementClass::Group, OperationKind::Query, &groups)
            .unwrap();

        let mut seen: Vec<String> = partitioned.iter().flat_map(|(_, s)| s.clone()).collect();
        seen.sort();
        let mut expected = groups.clone();
        expected.sort();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_refresh_configuration_evicts_removed_endpoint() {
        let set = ShardConfigurationSet::new(vec![segment(
            ElementClass::User,
            OperationKind::Event,
            i32::MIN,
            "UA",
        )])
        .unwrap();
        let (factory, calls) = fake_factory();
        let manager = ShardClientManager::with_factory(set, Hashers::default(), factory);
        manager
            .get_client(ElementClass::User, OperationKind::Event, "alice")
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let new_set = ShardConfigurationSet::new(vec![segment(
            ElementClass::User,
            OperationKind::Event,
            i32::MIN,
            "UB",
        )])
        .unwrap();
        manager.refresh_configuration(new_set);

        manager
            .get_client(ElementClass::User, OperationKind::Event, "alice")
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_refresh_configuration_from_str_rejects_invalid_payload_and_keeps_active_snapshot() {
        let set = ShardConfigurationSet::new(vec![segment(
            ElementClass::User,
            OperationKind::Event,
            i32::MIN,
            "UA",
        )])
        .unwrap();
        let (factory, _) = fake_factory();
        let manager = ShardClientManager::with_factory(set, Hashers::default(), factory);

        let duplicate_event_endpoint = r#"
            [[segment]]
            element_class = "User"
            operation_kind = "Event"
            hash_range_start = -2147483648
            endpoint_uri = "http://ua.internal"
            description = "UA"

            [[segment]]
            element_class = "User"
            operation_kind = "Event"
            hash_range_start = -2147483648
            endpoint_uri = "http://ub.internal"
            description = "UB"
        "#;
        let err = manager
            .refresh_configuration_from_str(duplicate_event_endpoint)
            .unwrap_err();
        assert!(matches!(
            err.source,
            accessgate_config::Error::MultipleEventEndpoints { .. }
        ));

        let client = manager
            .get_client(ElementClass::User, OperationKind::Event, "alice")
            .unwrap();
        assert_eq!(client.description, "UA");
    }

    #[test]
    fn test_refresh_configuration_from_document_installs_valid_payload() {
        let set = ShardConfigurationSet::new(vec![segment(
            ElementClass::User,
            OperationKind::Event,
            i32::MIN,
            "UA",
        )])
        .unwrap();
        let (factory, _) = fake_factory();
        let manager = ShardClientManager::with_factory(set, Hashers::default(), factory);

        let document = accessgate_config::ConfigDocument {
            segments: vec![accessgate_config::SegmentRecord {
                element_class: ElementClass::User,
                operation_kind: OperationKind::Event,
                hash_range_start: i32::MIN,
                endpoint_uri: "http://ub.internal".into(),
                description: "UB".into(),
            }],
        };
        manager
            .refresh_configuration_from_document(document)
            .unwrap();

        let client = manager
            .get_client(ElementClass::User, OperationKind::Event, "alice")
            .unwrap();
        assert_eq!(client.description, "UB");
    }
}
