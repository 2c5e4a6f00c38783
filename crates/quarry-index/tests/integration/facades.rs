//! Indexing plans, workspaces and search scopes.

use std::collections::BTreeSet;

use quarry_index::{
    DocumentCommitStrategy, DocumentRefreshStrategy, EntityReference, Error, FieldValue,
    IndexSettings, StoredField, WorkOutcome,
};

use crate::common::{BookSchema, TestIndex, debug_settings};

/// Refresh only on request, commit rarely.
fn manual_refresh_settings() -> IndexSettings {
    IndexSettings {
        commit_interval_ms: 60_000,
        refresh_interval_ms: 0,
        ..IndexSettings::default()
    }
}

#[tokio::test]
async fn test_plan_executes_every_entry() {
    let index = TestIndex::open(debug_settings()).await;
    let indexer = index.manager.create_indexer(None).unwrap();
    let handle = indexer
        .add(&EntityReference::new("Book", "old"), index.book("Old", "o"))
        .await
        .unwrap();
    assert_eq!(handle.wait().await, WorkOutcome::Applied);

    let mut plan = index.manager.create_indexing_plan(None).unwrap();
    plan.add(EntityReference::new("Book", "1"), index.book("One", "1"));
    plan.add(EntityReference::new("Book", "2"), index.book("Two", "2"));
    plan.add_or_update(EntityReference::new("Book", "1"), index.book("Uno", "1"));
    plan.delete(EntityReference::new("Book", "old"));
    assert_eq!(plan.len(), 4);

    let report = plan.execute().await.unwrap();
    assert!(report.is_success());
    assert_eq!(report.applied, 4);

    let scope = index.manager.create_search_scope(None).unwrap();
    assert_eq!(scope.count().await.unwrap(), 2);
    let one = scope
        .get(&EntityReference::new("Book", "1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(one.first("title"), Some(&FieldValue::Text("Uno".to_string())));
}

#[tokio::test]
async fn test_plan_with_foreign_document_submits_nothing() {
    let index = TestIndex::open(debug_settings()).await;
    let other = BookSchema::new("other_books");

    let mut plan = index.manager.create_indexing_plan(None).unwrap();
    plan.add(EntityReference::new("Book", "1"), index.book("One", "1"));
    let mut foreign = quarry_index::DocumentElement::new(&other.model);
    foreign.add(&other.title, "Stray".to_string()).unwrap();
    plan.add(EntityReference::new("Book", "2"), foreign);

    let err = plan.execute().await.unwrap_err();
    assert!(matches!(err, Error::Assertion { .. }));
    assert!(index.log().is_empty());
}

#[tokio::test]
async fn test_conversion_failure_submits_nothing() {
    let index = TestIndex::open(debug_settings()).await;
    let indexer = index.manager.create_indexer(None).unwrap();
    let pages = index.schema.pages.clone();

    let err = indexer
        .add_with(&EntityReference::new("Book", "1"), |document| {
            document.add_raw(&pages, &FieldValue::Text("many".to_string()))
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conversion { .. }));
    assert!(index.log().is_empty());
}

#[tokio::test]
async fn test_search_projection_and_nested_objects() {
    let index = TestIndex::open(debug_settings()).await;
    let schema = &index.schema;
    let indexer = index.manager.create_indexer(None).unwrap();
    let entity = EntityReference::new("Book", "1");

    let handle = indexer
        .add_with(&entity, |document| {
            document.add(&schema.title, "Dune".to_string())?;
            document.add(&schema.pages, 412)?;
            document.add(&schema.internal_note, "reorder".to_string())?;
            let author = document.add_object(&schema.author)?;
            author.add(&schema.author_name, "Herbert".to_string())
        })
        .await
        .unwrap();
    assert_eq!(handle.wait().await, WorkOutcome::Applied);

    let scope = index.manager.create_search_scope(None).unwrap();
    let stored = scope.get(&entity).await.unwrap().unwrap();
    assert_eq!(stored.first("pages"), Some(&FieldValue::Integer(412)));
    assert!(stored.get("internal_note").is_none());
    assert!(matches!(stored.get("author"), Some(StoredField::Objects(_))));
    assert_eq!(
        stored.values_at("author.name"),
        vec![&FieldValue::Text("Herbert".to_string())]
    );
}

#[tokio::test]
async fn test_workspace_delete_by_query() {
    let index = TestIndex::open(debug_settings()).await;
    let indexer = index.manager.create_indexer(None).unwrap();
    for (id, isbn) in [("1", "drop"), ("2", "keep"), ("3", "drop")] {
        let handle = indexer
            .add(&EntityReference::new("Book", id), index.book("Title", isbn))
            .await
            .unwrap();
        assert_eq!(handle.wait().await, WorkOutcome::Applied);
    }

    let workspace = index.manager.create_workspace(BTreeSet::new()).unwrap();
    let handle = workspace
        .delete_by_query("isbn", &FieldValue::Text("drop".to_string()))
        .await
        .unwrap();
    assert_eq!(handle.wait().await, WorkOutcome::Applied);

    let scope = index.manager.create_search_scope(None).unwrap();
    assert_eq!(scope.count().await.unwrap(), 1);

    let unknown = workspace
        .delete_by_query("publisher", &FieldValue::Text("x".to_string()))
        .await
        .unwrap_err();
    assert!(matches!(unknown, Error::NotFound { .. }));
    let mistyped = workspace
        .delete_by_query("pages", &FieldValue::Text("x".to_string()))
        .await
        .unwrap_err();
    assert!(matches!(mistyped, Error::Conversion { .. }));
}

#[tokio::test]
async fn test_workspace_refresh_flush_and_merge() {
    let index = TestIndex::open(manual_refresh_settings()).await;
    let indexer = index.manager.create_indexer(None).unwrap();
    let scope = index.manager.create_search_scope(None).unwrap();

    let handle = indexer
        .add(&EntityReference::new("Book", "1"), index.book("Title", "isbn"))
        .await
        .unwrap();
    assert_eq!(handle.wait().await, WorkOutcome::Applied);
    assert_eq!(scope.count().await.unwrap(), 0);

    let workspace = index.manager.create_workspace(BTreeSet::new()).unwrap();
    assert_eq!(workspace.refresh().unwrap().wait().await, WorkOutcome::Applied);
    assert_eq!(scope.count().await.unwrap(), 1);

    assert_eq!(workspace.flush().await.unwrap().wait().await, WorkOutcome::Applied);
    assert_eq!(
        workspace.merge_segments().unwrap().wait().await,
        WorkOutcome::Applied
    );
    assert_eq!(index.log(), vec!["add:1", "refresh", "commit", "merge"]);
    assert!(index.failures.failures().is_empty());
}

#[tokio::test]
async fn test_forced_visibility_per_indexer() {
    let index = TestIndex::open(manual_refresh_settings()).await;
    let indexer = index
        .manager
        .create_indexer(None)
        .unwrap()
        .with_visibility(DocumentCommitStrategy::Force, DocumentRefreshStrategy::Force);

    let handle = indexer
        .add(&EntityReference::new("Book", "1"), index.book("Title", "isbn"))
        .await
        .unwrap();
    assert_eq!(handle.wait().await, WorkOutcome::Applied);

    let scope = index.manager.create_search_scope(None).unwrap();
    assert_eq!(scope.count().await.unwrap(), 1);
    assert_eq!(index.log(), vec!["add:1", "commit", "refresh"]);
}
