//! On-disk layout and reopening.

use std::sync::Arc;

use quarry_index::settings::ShardingSettings;
use quarry_index::{
    EntityReference, Error, FieldDefinition, FieldType, FieldValue, IndexManager,
    IndexManagerOptions, IndexSchemaBuilder, IndexSettings, ShardingStrategyName,
};
use quarry_tantivy::{TantivyBackend, tantivy_codecs};

use crate::common::{TantivyIndex, debug_settings};

#[tokio::test]
async fn test_documents_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let index = TantivyIndex::in_dir(dir.path(), debug_settings())
        .await
        .unwrap();
    index.add(None, "1", "Persistent", "p-1").await;
    index.manager.stop().await.unwrap();
    assert!(dir.path().join("books").join("meta.json").exists());

    let reopened = TantivyIndex::in_dir(dir.path(), debug_settings())
        .await
        .unwrap();
    let scope = reopened.manager.create_search_scope(None).unwrap();
    let stored = scope
        .get(&EntityReference::new("Book", "1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        stored.first("title"),
        Some(&FieldValue::Text("Persistent".to_string()))
    );
    reopened.manager.stop().await.unwrap();
}

#[tokio::test]
async fn test_explicit_shards_get_their_own_directories() {
    let dir = tempfile::tempdir().unwrap();
    let settings = IndexSettings {
        sharding: ShardingSettings {
            strategy: ShardingStrategyName::Explicit,
            number_of_shards: None,
            shard_identifiers: vec!["eu".to_string(), "us".to_string()],
        },
        ..debug_settings()
    };
    let index = TantivyIndex::in_dir(dir.path(), settings).await.unwrap();

    let indexer = index.manager.create_indexer(None).unwrap();
    let book = EntityReference::new("Book", "1").with_routing_key("eu");
    indexer
        .add(&book, index.book("Routed", "r-1", 10))
        .await
        .unwrap()
        .wait()
        .await;

    let scope = index.manager.create_search_scope(None).unwrap();
    assert_eq!(scope.count().await.unwrap(), 1);
    assert!(scope.get(&book).await.unwrap().is_some());
    index.manager.stop().await.unwrap();

    assert!(dir.path().join("books").join("eu").join("meta.json").exists());
    assert!(dir.path().join("books").join("us").join("meta.json").exists());
}

#[tokio::test]
async fn test_reopen_with_different_schema_fails() {
    let dir = tempfile::tempdir().unwrap();
    let index = TantivyIndex::in_dir(dir.path(), debug_settings())
        .await
        .unwrap();
    index.manager.stop().await.unwrap();

    let codecs = tantivy_codecs();
    let mut builder = IndexSchemaBuilder::new("books", &codecs);
    let root = builder.root();
    builder
        .add_field(root, "title", FieldDefinition::<String>::new(FieldType::Keyword))
        .unwrap();
    let model = builder.build().unwrap();

    let err = IndexManager::open(
        Arc::new(TantivyBackend::in_dir(dir.path())),
        model,
        debug_settings(),
        IndexManagerOptions::default(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::Schema { .. }));
}
