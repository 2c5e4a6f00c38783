//! Routing of works across shards.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use quarry_index::{
    EntityReference, Error, FieldValue, IndexManager, IndexManagerOptions, ShardId, WorkOutcome,
};

use crate::common::{BookSchema, MemoryBackend, TestIndex, explicit_settings, hash_settings};

fn keys(keys: &[&str]) -> BTreeSet<String> {
    keys.iter().map(|k| k.to_string()).collect()
}

#[tokio::test]
async fn test_hash_sharding_spreads_and_finds_documents() {
    let index = TestIndex::open(hash_settings(3)).await;
    let indexer = index.manager.create_indexer(None).unwrap();
    for i in 0..30 {
        let entity = EntityReference::new("Book", i.to_string());
        let handle = indexer.add(&entity, index.book("Title", "isbn")).await.unwrap();
        assert_eq!(handle.wait().await, WorkOutcome::Applied);
    }

    let shards = index.manager.routing().all_shards().to_vec();
    assert_eq!(shards.len(), 3);
    let sizes: Vec<usize> = shards
        .iter()
        .map(|shard| index.backend.shard(shard).visible_ids().len())
        .collect();
    assert_eq!(sizes.iter().sum::<usize>(), 30);
    assert!(sizes.iter().filter(|size| **size > 0).count() >= 2);

    let scope = index.manager.create_search_scope(None).unwrap();
    assert_eq!(scope.count().await.unwrap(), 30);
    for i in 0..30 {
        let entity = EntityReference::new("Book", i.to_string());
        assert!(scope.get(&entity).await.unwrap().is_some());
    }
}

#[tokio::test]
async fn test_delete_without_routing_key_reaches_every_shard() {
    let index = TestIndex::open(hash_settings(3)).await;
    let indexer = index.manager.create_indexer(None).unwrap();
    let entity = EntityReference::new("Book", "5");
    let handle = indexer.add(&entity, index.book("Title", "isbn")).await.unwrap();
    assert_eq!(handle.wait().await, WorkOutcome::Applied);

    let handle = indexer.delete(&entity).await.unwrap();
    assert_eq!(handle.wait().await, WorkOutcome::Applied);

    for shard in index.manager.routing().all_shards() {
        assert!(index.backend.shard(shard).log().contains(&"delete:5".to_string()));
    }
    let scope = index.manager.create_search_scope(None).unwrap();
    assert!(scope.get(&entity).await.unwrap().is_none());
}

#[tokio::test]
async fn test_explicit_routing_keys() {
    let index = TestIndex::open(explicit_settings(&["eu", "us"])).await;
    let indexer = index.manager.create_indexer(None).unwrap();
    let eu = ShardId::named("eu");
    let us = ShardId::named("us");

    let paris = EntityReference::new("Book", "paris").with_routing_key("eu");
    let boston = EntityReference::new("Book", "boston").with_routing_key("us");
    for entity in [&paris, &boston] {
        let handle = indexer.add(entity, index.book("Guide", "isbn")).await.unwrap();
        assert_eq!(handle.wait().await, WorkOutcome::Applied);
    }
    assert_eq!(index.backend.shard(&eu).visible_ids(), vec!["paris"]);
    assert_eq!(index.backend.shard(&us).visible_ids(), vec!["boston"]);

    let unrouted = indexer
        .add(&EntityReference::new("Book", "x"), index.book("Guide", "isbn"))
        .await
        .unwrap_err();
    assert!(matches!(unrouted, Error::Operation { .. }));

    let us_only = index
        .manager
        .create_search_scope(None)
        .unwrap()
        .with_routing_keys(keys(&["us"]));
    assert_eq!(us_only.count().await.unwrap(), 1);

    let workspace = index.manager.create_workspace(BTreeSet::new()).unwrap();
    let purge = workspace.purge(keys(&["eu"])).await.unwrap();
    assert_eq!(purge.wait().await, WorkOutcome::Applied);
    assert!(index.backend.shard(&eu).visible_ids().is_empty());
    assert_eq!(index.backend.shard(&us).visible_ids(), vec!["boston"]);
    assert!(!index.backend.shard(&us).log().contains(&"purge:*".to_string()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_shards_progress_independently() {
    let index = TestIndex::open(explicit_settings(&["eu", "us"])).await;
    let indexer = index.manager.create_indexer(None).unwrap();
    let held = index.backend.shard(&ShardId::named("eu")).hold().await;

    let blocked = indexer
        .add(
            &EntityReference::new("Book", "paris").with_routing_key("eu"),
            index.book("Guide", "isbn"),
        )
        .await
        .unwrap();
    let free = indexer
        .add(
            &EntityReference::new("Book", "boston").with_routing_key("us"),
            index.book("Guide", "isbn"),
        )
        .await
        .unwrap();

    let outcome = tokio::time::timeout(Duration::from_secs(5), free.wait())
        .await
        .unwrap();
    assert_eq!(outcome, WorkOutcome::Applied);
    assert!(index.backend.shard(&ShardId::named("eu")).log().is_empty());

    drop(held);
    assert_eq!(blocked.wait().await, WorkOutcome::Applied);
}

#[tokio::test]
async fn test_failed_open_stops_opened_shards() {
    let backend = MemoryBackend::new();
    backend.fail_open(ShardId::named("us"));
    let schema = BookSchema::new("books");

    let err = IndexManager::open(
        Arc::clone(&backend),
        Arc::clone(&schema.model),
        explicit_settings(&["eu", "us"]),
        IndexManagerOptions::default(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::Backend { .. }));

    assert_eq!(backend.opened(), vec![ShardId::named("eu")]);
    let log = backend.shard(&ShardId::named("eu")).log();
    assert_eq!(log, vec!["commit", "close"]);
}

#[tokio::test]
async fn test_search_term_merges_shards() {
    let index = TestIndex::open(hash_settings(4)).await;
    let indexer = index.manager.create_indexer(None).unwrap();
    for i in 0..12 {
        let isbn = if i % 3 == 0 { "wanted" } else { "other" };
        let entity = EntityReference::new("Book", i.to_string());
        let handle = indexer.add(&entity, index.book("Title", isbn)).await.unwrap();
        assert_eq!(handle.wait().await, WorkOutcome::Applied);
    }

    let scope = index.manager.create_search_scope(None).unwrap();
    let hits = scope
        .search_term("isbn", &FieldValue::Text("wanted".to_string()), 10)
        .await
        .unwrap();
    let ids: BTreeSet<String> = hits.into_iter().map(|hit| hit.document_id).collect();
    assert_eq!(ids, keys(&["0", "3", "6", "9"]));

    let limited = scope.search_all(5).await.unwrap();
    assert_eq!(limited.len(), 5);
}
