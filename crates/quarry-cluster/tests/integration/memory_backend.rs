//! The cluster backend over an in-memory cluster.

use std::collections::BTreeSet;

use quarry_cluster::{ClusterClient, ClusterSchema};
use quarry_core::LifecycleState;
use quarry_index::settings::ShardingSettings;
use quarry_index::{
    EntityReference, FieldValue, IndexSettings, MultiTenancyStrategy, ShardId,
    ShardingStrategyName, StoredField, WorkOutcome,
};

use crate::common::{ClusterIndex, debug_settings};

fn text(value: &str) -> FieldValue {
    FieldValue::Text(value.to_string())
}

#[tokio::test]
async fn test_remote_index_created_with_mappings() {
    let index = ClusterIndex::open(debug_settings()).await;
    assert_eq!(index.cluster.index_names().await, vec!["books".to_string()]);
    let mappings = index.cluster.mappings("books").await.unwrap();
    assert_eq!(mappings, ClusterSchema::build(&index.schema.model).mappings());
    assert_eq!(mappings["properties"]["reviews"]["type"], "nested");
}

#[tokio::test]
async fn test_nested_documents_round_trip_and_search() {
    let index = ClusterIndex::open(debug_settings()).await;
    let indexer = index.manager.create_indexer(None).unwrap();
    let book = EntityReference::new("Book", "1");
    let handle = indexer
        .add(&book, index.book("Guards! Guards!", "g-1", &["ann", "bob"]))
        .await
        .unwrap();
    assert_eq!(handle.wait().await, WorkOutcome::Applied);

    let scope = index.manager.create_search_scope(None).unwrap();
    let stored = scope.get(&book).await.unwrap().unwrap();
    assert_eq!(stored.first("title"), Some(&text("Guards! Guards!")));
    assert!(matches!(stored.get("reviews"), Some(StoredField::Objects(objects)) if objects.len() == 2));
    assert_eq!(stored.values_at("reviews.reviewer"), vec![&text("ann"), &text("bob")]);

    let by_reviewer = scope
        .search_term("reviews.reviewer", &text("bob"), 10)
        .await
        .unwrap();
    assert_eq!(by_reviewer.len(), 1);
    let by_title = scope.search_term("title", &text("guards"), 10).await.unwrap();
    assert_eq!(by_title.len(), 1);
    assert!(
        scope
            .search_term("title", &text("wizards"), 10)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_visibility_follows_refresh() {
    let settings = IndexSettings {
        commit_interval_ms: 60_000,
        refresh_interval_ms: 0,
        ..IndexSettings::default()
    };
    let index = ClusterIndex::open(settings).await;
    assert_eq!(index.add(None, "1", "Mort").await, WorkOutcome::Applied);

    let scope = index.manager.create_search_scope(None).unwrap();
    assert_eq!(scope.count().await.unwrap(), 0);

    let workspace = index.manager.create_workspace(BTreeSet::new()).unwrap();
    assert_eq!(workspace.refresh().unwrap().wait().await, WorkOutcome::Applied);
    assert_eq!(scope.count().await.unwrap(), 1);

    assert_eq!(workspace.flush().await.unwrap().wait().await, WorkOutcome::Applied);
    assert_eq!(
        workspace.merge_segments().unwrap().wait().await,
        WorkOutcome::Applied
    );
    let stats = index.cluster.stats("books").await.unwrap();
    assert_eq!(stats.flushes, 1);
    assert_eq!(stats.merges, 1);
}

#[tokio::test]
async fn test_hash_shards_map_to_remote_indexes() {
    let settings = IndexSettings {
        sharding: ShardingSettings {
            strategy: ShardingStrategyName::Hash,
            number_of_shards: Some(3),
            shard_identifiers: Vec::new(),
        },
        ..debug_settings()
    };
    let index = ClusterIndex::open(settings).await;
    assert_eq!(
        index.cluster.index_names().await,
        vec!["books-0", "books-1", "books-2"]
    );

    for id in 0..12 {
        let outcome = index.add(None, &id.to_string(), "Title").await;
        assert_eq!(outcome, WorkOutcome::Applied);
    }
    let scope = index.manager.create_search_scope(None).unwrap();
    assert_eq!(scope.count().await.unwrap(), 12);
    assert!(scope.get(&EntityReference::new("Book", "7")).await.unwrap().is_some());
}

#[tokio::test]
async fn test_tenant_purge_and_delete_by_query() {
    let settings = IndexSettings {
        multi_tenancy: MultiTenancyStrategy::Discriminator,
        ..debug_settings()
    };
    let index = ClusterIndex::open(settings).await;
    index.add(Some("acme"), "1", "Small Gods").await;
    index.add(Some("acme"), "2", "Eric").await;
    index.add(Some("globex"), "1", "Small Gods").await;

    let acme_only = index
        .manager
        .create_workspace(BTreeSet::from(["acme".to_string()]))
        .unwrap();
    let handle = acme_only
        .delete_by_query("title", &text("small gods"))
        .await
        .unwrap();
    assert_eq!(handle.wait().await, WorkOutcome::Applied);

    let acme = index.manager.create_search_scope(Some("acme")).unwrap();
    let globex = index.manager.create_search_scope(Some("globex")).unwrap();
    assert_eq!(acme.count().await.unwrap(), 1);
    assert_eq!(globex.count().await.unwrap(), 1);

    let handle = acme_only.purge(BTreeSet::new()).await.unwrap();
    assert_eq!(handle.wait().await, WorkOutcome::Applied);
    assert_eq!(acme.count().await.unwrap(), 0);
    assert_eq!(globex.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_purge_removes_unrefreshed_documents() {
    let settings = IndexSettings {
        commit_interval_ms: 60_000,
        refresh_interval_ms: 0,
        ..IndexSettings::default()
    };
    let index = ClusterIndex::open(settings).await;
    assert_eq!(index.add(None, "1", "Mort").await, WorkOutcome::Applied);
    assert_eq!(index.add(None, "2", "Eric").await, WorkOutcome::Applied);

    let workspace = index.manager.create_workspace(BTreeSet::new()).unwrap();
    let handle = workspace.purge(BTreeSet::new()).await.unwrap();
    assert_eq!(handle.wait().await, WorkOutcome::Applied);
    assert_eq!(workspace.refresh().unwrap().wait().await, WorkOutcome::Applied);

    let scope = index.manager.create_search_scope(None).unwrap();
    assert_eq!(scope.count().await.unwrap(), 0);
    assert_eq!(index.cluster.stats("books").await.unwrap().live, 0);
}

#[tokio::test]
async fn test_missing_remote_index_breaks_and_recovers() {
    let index = ClusterIndex::open(debug_settings()).await;
    assert!(index.cluster.drop_index("books").await);

    assert_eq!(index.add(None, "1", "Lost").await, WorkOutcome::Failed);
    assert_eq!(index.failures.failures().len(), 1);
    let serial = index.manager.serial(&ShardId::unsharded()).unwrap();
    assert!(serial.state().is_broken());

    let mappings = ClusterSchema::build(&index.schema.model).mappings();
    index.cluster.create_index("books", &mappings).await.unwrap();
    serial.recover().await.unwrap();
    assert_eq!(serial.state(), LifecycleState::Started);
    assert_eq!(index.add(None, "1", "Found").await, WorkOutcome::Applied);
}
