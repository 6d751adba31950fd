//! End-to-end scenario tests run against in-process fake shards — no real
//! network I/O. Each test below is a literal rendering of one of the
//! numbered scenarios checked during design: hash routing, fan-out union,
//! boolean short-circuit, wrapped shard errors, multi-hop group traversal,
//! and configuration hot-swap.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use accessgate_config::{ElementClass, OperationKind, ShardConfigurationSet, ShardRangeSegment};
use accessgate_core::client::fake::FakeShardClient;
use accessgate_core::client::ShardClient;
use accessgate_core::coordinator::OperationCoordinator;
use accessgate_core::hash::{HashGenerator, Hashers};
use accessgate_core::manager::ShardClientManager;
use accessgate_core::router::QueryRouter;
use accessgate_stats::{MetricLogger, TracingMetricLogger};

/// A hash generator that answers from a fixed lookup table, falling back to
/// a default for anything not listed. Scenarios below need exact control
/// over which shard an identifier routes to; `Crc32cHashGenerator` would
/// make that a function of the real CRC32C of the literal strings chosen,
/// which the scenarios don't care to pin.
struct LiteralHash {
    table: HashMap<String, i32>,
    default: i32,
}

impl HashGenerator for LiteralHash {
    fn hash(&self, value: &str) -> i32 {
        *self.table.get(value).unwrap_or(&self.default)
    }
}

fn segment(class: ElementClass, kind: OperationKind, start: i32, desc: &str) -> ShardRangeSegment {
    ShardRangeSegment {
        class,
        kind,
        hash_range_start: start,
        endpoint_uri: format!("http://{desc}"),
        description: desc.to_string(),
    }
}

/// S1 — route by hash. Two User-event segments split at 0; `"alice"` hashes
/// negative and must land on `UA`, `"bob"` hashes positive and must land on
/// `UB`, each exactly once.
#[tokio::test]
async fn s1_route_by_hash() {
    let ua = Arc::new(FakeShardClient::new());
    let ub = Arc::new(FakeShardClient::new());

    let set = ShardConfigurationSet::new(vec![
        segment(ElementClass::User, OperationKind::Event, i32::MIN, "UA"),
        segment(ElementClass::User, OperationKind::Event, 0, "UB"),
    ])
    .unwrap();

    let user_hash = LiteralHash {
        table: HashMap::from([("alice".to_string(), -100), ("bob".to_string(), 200)]),
        default: 0,
    };
    let hashers = Hashers {
        user: Arc::new(user_hash),
        group: Arc::new(LiteralHash { table: HashMap::new(), default: 0 }),
    };

    let ua_for_factory = ua.clone();
    let ub_for_factory = ub.clone();
    let factory = Arc::new(move |endpoint: &str| -> Arc<dyn ShardClient> {
        if endpoint.contains("UA") {
            ua_for_factory.clone() as Arc<dyn ShardClient>
        } else {
            ub_for_factory.clone() as Arc<dyn ShardClient>
        }
    });
    let manager = Arc::new(ShardClientManager::with_factory(set, hashers, factory));
    let logger: Arc<dyn MetricLogger> = Arc::new(TracingMetricLogger::new());
    let coordinator = OperationCoordinator::new(manager, logger);

    coordinator.add_user("alice").await.unwrap();
    assert_eq!(ua.call_count(), 1);
    assert_eq!(ub.call_count(), 0);

    coordinator.add_user("bob").await.unwrap();
    assert_eq!(ua.call_count(), 1);
    assert_eq!(ub.call_count(), 1);
}

/// S2 — fan-out union. Three User-query shards contribute
/// `["u1","u1"]`, `["u2","u3"]`, `[]`; the union across all three, as a set,
/// is `{"u1","u2","u3"}`.
#[tokio::test]
async fn s2_fanout_union() {
    let a = Arc::new(FakeShardClient::new());
    a.seed_user_groups("u1", ["g1".to_string()]);
    let b = Arc::new(FakeShardClient::new());
    b.seed_user_groups("u2", ["g1".to_string()]);
    b.seed_user_groups("u3", ["g1".to_string()]);
    let c = Arc::new(FakeShardClient::new());

    let set = ShardConfigurationSet::new(vec![
        segment(ElementClass::User, OperationKind::Query, i32::MIN, "A"),
        segment(ElementClass::User, OperationKind::Query, 100, "B"),
        segment(ElementClass::User, OperationKind::Query, 200, "C"),
    ])
    .unwrap();

    let (a_f, b_f, c_f) = (a.clone(), b.clone(), c.clone());
    let factory = Arc::new(move |endpoint: &str| -> Arc<dyn ShardClient> {
        if endpoint.contains("/A") {
            a_f.clone() as Arc<dyn ShardClient>
        } else if endpoint.contains("/B") {
            b_f.clone() as Arc<dyn ShardClient>
        } else {
            c_f.clone() as Arc<dyn ShardClient>
        }
    });
    let manager = Arc::new(ShardClientManager::with_factory(set, Hashers::default(), factory));
    let logger: Arc<dyn MetricLogger> = Arc::new(TracingMetricLogger::new());
    let coordinator = OperationCoordinator::new(manager, logger);

    let mut mapped = coordinator
        .get_group_to_user_mappings(&["g1".to_string(), "g2".to_string(), "g3".to_string(), "g4".to_string(), "g5".to_string(), "g6".to_string()])
        .await
        .unwrap();
    mapped.sort();
    assert_eq!(mapped, vec!["u1", "u2", "u3"]);
}

/// S3 — boolean short-circuit. Two Group-query shards, one answers `true`
/// immediately, the other is slow; the call must return `true` without
/// waiting out the slow shard, and must still report both shards as queried
/// (`groupShardsQueried = 2`) since the partition was computed up front.
#[tokio::test]
async fn s3_boolean_short_circuit() {
    let fast = Arc::new(FakeShardClient::new());
    fast.add_group_to_component_access("gFast", "Order", "Create").await.unwrap();
    let slow = Arc::new(FakeShardClient::with_delay(Duration::from_millis(200)));

    let group_hash = LiteralHash {
        table: HashMap::from([("gFast".to_string(), -10), ("gSlow".to_string(), 10)]),
        default: 0,
    };
    let hashers = Hashers {
        user: Arc::new(LiteralHash { table: HashMap::new(), default: 0 }),
        group: Arc::new(group_hash),
    };

    let set = ShardConfigurationSet::new(vec![
        segment(ElementClass::Group, OperationKind::Query, i32::MIN, "Fast"),
        segment(ElementClass::Group, OperationKind::Query, 0, "Slow"),
    ])
    .unwrap();

    let (fast_f, slow_f) = (fast.clone(), slow.clone());
    let factory = Arc::new(move |endpoint: &str| -> Arc<dyn ShardClient> {
        if endpoint.contains("Fast") {
            fast_f.clone() as Arc<dyn ShardClient>
        } else {
            slow_f.clone() as Arc<dyn ShardClient>
        }
    });
    let manager = Arc::new(ShardClientManager::with_factory(set, hashers, factory));
    let logger = Arc::new(TracingMetricLogger::new());
    let router = QueryRouter::new(manager, logger.clone());

    let start = std::time::Instant::now();
    let outcome = router
        .has_access_to_application_component(
            &["gFast".to_string(), "gSlow".to_string()],
            "Order",
            "Create",
            true,
        )
        .await
        .unwrap();

    assert!(outcome.value);
    assert_eq!(outcome.shards_queried, 2);
    assert!(start.elapsed() < Duration::from_millis(200), "must not wait for the slow shard");

    let snapshot = logger.snapshot();
    assert_eq!(snapshot.intervals["Router.HasAccessToApplicationComponent"].completed, 1);
    assert_eq!(snapshot.intervals["Router.HasAccessToApplicationComponent"].cancelled, 0);
}

/// S4 — wrapped error. One of three Group shards fails; the operation
/// surfaces a wrapped error naming that shard's description, and the
/// interval metric is cancelled rather than completed.
#[tokio::test]
async fn s4_wrapped_error_cancels_interval() {
    let g1 = Arc::new(FakeShardClient::new());
    let g2 = Arc::new(FakeShardClient::new());
    let g3 = Arc::new(FakeShardClient::new());
    g3.fail_next_call("connection reset");

    let group_hash = LiteralHash {
        table: HashMap::from([
            ("g1".to_string(), -200),
            ("g2".to_string(), 0),
            ("g3".to_string(), 200),
        ]),
        default: 0,
    };
    let hashers = Hashers {
        user: Arc::new(LiteralHash { table: HashMap::new(), default: 0 }),
        group: Arc::new(group_hash),
    };

    let set = ShardConfigurationSet::new(vec![
        segment(ElementClass::Group, OperationKind::Query, i32::MIN, "GroupShardDescription1"),
        segment(ElementClass::Group, OperationKind::Query, -100, "GroupShardDescription2"),
        segment(ElementClass::Group, OperationKind::Query, 100, "GroupShardDescription3"),
    ])
    .unwrap();

    let (f1, f2, f3) = (g1.clone(), g2.clone(), g3.clone());
    let factory = Arc::new(move |endpoint: &str| -> Arc<dyn ShardClient> {
        if endpoint.contains("Description1") {
            f1.clone() as Arc<dyn ShardClient>
        } else if endpoint.contains("Description2") {
            f2.clone() as Arc<dyn ShardClient>
        } else {
            f3.clone() as Arc<dyn ShardClient>
        }
    });
    let manager = Arc::new(ShardClientManager::with_factory(set, hashers, factory));
    let logger = Arc::new(TracingMetricLogger::new());
    let router = QueryRouter::new(manager, logger.clone());

    let err = router
        .get_entities_accessible_by_groups(
            &["g1".to_string(), "g2".to_string(), "g3".to_string()],
            Some("ClientAccount"),
            true,
        )
        .await
        .unwrap_err();

    let message = err.to_string();
    assert!(message.contains("GroupShardDescription3"), "got: {message}");

    let snapshot = logger.snapshot();
    let stats = snapshot.intervals["Router.GetEntitiesAccessibleByGroups"];
    assert_eq!(stats.completed, 0);
    assert_eq!(stats.cancelled, 1);
    assert!(!snapshot.counts.contains_key("Router.GetEntitiesAccessibleByGroups.calls"));
}

/// S5 — group traversal. `u1` maps directly to `{g1,g2}`; the group-to-group
/// shard expands that to `{g1,g2,g3,g4}`; `g1`/`g3` live on one Group shard
/// and `g2`/`g4` on another, contributing `{eA,eB}` and `{eB,eC}`
/// respectively. The union is `{eA,eB,eC}`, `groupsMappedToGroups = 4`,
/// `groupShardsQueried = 2`.
#[tokio::test]
async fn s5_group_traversal() {
    let user_shard = Arc::new(FakeShardClient::new());
    user_shard.seed_user_groups("u1", ["g1".to_string(), "g2".to_string()]);

    let gg_shard = Arc::new(FakeShardClient::new());
    gg_shard.seed_group_to_group("g1", ["g3".to_string()]);
    gg_shard.seed_group_to_group("g2", ["g4".to_string()]);

    let g1_shard = Arc::new(FakeShardClient::new());
    g1_shard.seed_group_entities("g1", "ClientAccount", ["eA".to_string(), "eB".to_string()]);
    g1_shard.seed_group_entities("g3", "ClientAccount", []);

    let g2_shard = Arc::new(FakeShardClient::new());
    g2_shard.seed_group_entities("g2", "ClientAccount", ["eB".to_string(), "eC".to_string()]);
    g2_shard.seed_group_entities("g4", "ClientAccount", []);

    let group_hash = LiteralHash {
        table: HashMap::from([
            ("g1".to_string(), -100),
            ("g3".to_string(), -50),
            ("g2".to_string(), 50),
            ("g4".to_string(), 100),
        ]),
        default: 0,
    };
    let hashers = Hashers {
        user: Arc::new(LiteralHash { table: HashMap::new(), default: 0 }),
        group: Arc::new(group_hash),
    };

    let set = ShardConfigurationSet::new(vec![
        segment(ElementClass::User, OperationKind::Event, i32::MIN, "U"),
        segment(ElementClass::User, OperationKind::Query, i32::MIN, "U"),
        segment(ElementClass::GroupToGroupMapping, OperationKind::Event, i32::MIN, "GG"),
        segment(ElementClass::GroupToGroupMapping, OperationKind::Query, i32::MIN, "GG"),
        segment(ElementClass::Group, OperationKind::Event, i32::MIN, "G1"),
        segment(ElementClass::Group, OperationKind::Query, i32::MIN, "G1"),
        segment(ElementClass::Group, OperationKind::Event, 0, "G2"),
        segment(ElementClass::Group, OperationKind::Query, 0, "G2"),
    ])
    .unwrap();

    let (user_f, gg_f, g1_f, g2_f) = (user_shard.clone(), gg_shard.clone(), g1_shard.clone(), g2_shard.clone());
    let factory = Arc::new(move |endpoint: &str| -> Arc<dyn ShardClient> {
        if endpoint.contains("GG") {
            gg_f.clone() as Arc<dyn ShardClient>
        } else if endpoint.contains("G1") {
            g1_f.clone() as Arc<dyn ShardClient>
        } else if endpoint.contains("G2") {
            g2_f.clone() as Arc<dyn ShardClient>
        } else {
            user_f.clone() as Arc<dyn ShardClient>
        }
    });
    let manager = Arc::new(ShardClientManager::with_factory(set, hashers, factory));
    let logger = Arc::new(TracingMetricLogger::new());
    let coordinator = OperationCoordinator::new(manager, logger.clone());

    let mut entities = coordinator
        .get_entities_accessible_by_user("u1", Some("ClientAccount"))
        .await
        .unwrap();
    entities.sort();
    assert_eq!(entities, vec!["eA", "eB", "eC"]);

    let snapshot = logger.snapshot();
    assert_eq!(
        snapshot.amounts["Coordinator.GetEntitiesAccessibleByUser.groupsMappedToGroups"],
        4
    );
    assert_eq!(
        snapshot.amounts["Coordinator.GetEntitiesAccessibleByUser.groupShardsQueried"],
        2
    );
}

/// S6 — refresh. A client handle captured before a refresh keeps answering
/// against the pre-refresh shard (reference-counted lifetime, §4.8); a
/// fresh lookup after the refresh gets the new shard instead.
#[tokio::test]
async fn s6_refresh_in_flight_uses_pre_refresh_snapshot() {
    let old_shard = Arc::new(FakeShardClient::new());
    old_shard.add_user("legacy_user").await.unwrap();

    let set = ShardConfigurationSet::new(vec![segment(
        ElementClass::User,
        OperationKind::Query,
        i32::MIN,
        "Old",
    )])
    .unwrap();

    let old_f = old_shard.clone();
    let new_shard = Arc::new(FakeShardClient::new());
    let new_f = new_shard.clone();
    let factory = Arc::new(move |endpoint: &str| -> Arc<dyn ShardClient> {
        if endpoint.contains("Old") {
            old_f.clone() as Arc<dyn ShardClient>
        } else {
            new_f.clone() as Arc<dyn ShardClient>
        }
    });
    let manager = Arc::new(ShardClientManager::with_factory(set, Hashers::default(), factory));

    // Simulate an in-flight operation that already captured its client.
    let captured = manager
        .get_all_clients(ElementClass::User, OperationKind::Query)
        .into_iter()
        .next()
        .unwrap();

    let new_set = ShardConfigurationSet::new(vec![segment(
        ElementClass::User,
        OperationKind::Query,
        i32::MIN,
        "New",
    )])
    .unwrap();
    manager.refresh_configuration(new_set);

    // The handle captured before the refresh still answers from the old shard.
    let users = captured.client.get_users().await.unwrap();
    assert_eq!(users, vec!["legacy_user".to_string()]);

    // A fresh lookup after the refresh uses the new snapshot instead.
    let fresh = manager
        .get_all_clients(ElementClass::User, OperationKind::Query)
        .into_iter()
        .next()
        .unwrap();
    let fresh_users = fresh.client.get_users().await.unwrap();
    assert!(fresh_users.is_empty());
}
