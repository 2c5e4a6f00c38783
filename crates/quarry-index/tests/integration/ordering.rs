//! Ordering of works submitted to one shard.

use std::collections::BTreeSet;
use std::sync::Arc;

use quarry_index::orchestration::wait_all;
use quarry_index::{EntityReference, FieldValue, IndexSettings, WorkOutcome};

use crate::common::{TestIndex, debug_settings};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_producers_keep_their_own_order() {
    let index = Arc::new(TestIndex::open(IndexSettings::default()).await);
    let producers = 6;
    let per_producer = 20;

    let mut tasks = Vec::new();
    for producer in 0..producers {
        let index = Arc::clone(&index);
        tasks.push(tokio::spawn(async move {
            let indexer = index.manager.create_indexer(None).unwrap();
            let mut handles = Vec::new();
            for i in 0..per_producer {
                let entity = EntityReference::new("Book", format!("p{producer}-{i}"));
                handles.push(
                    indexer
                        .add(&entity, index.book("Dune", "isbn"))
                        .await
                        .unwrap(),
                );
                handles.push(
                    indexer
                        .update(&entity, index.book("Dune Messiah", "isbn"))
                        .await
                        .unwrap(),
                );
            }
            wait_all(handles).await
        }));
    }
    for task in tasks {
        assert_eq!(task.await.unwrap(), WorkOutcome::Applied);
    }
    index.manager.stop().await.unwrap();

    let log = index.log();
    for producer in 0..producers {
        let prefix = format!("p{producer}-");
        let own: Vec<&String> = log
            .iter()
            .filter(|op| {
                op.split_once(':')
                    .is_some_and(|(_, id)| id.starts_with(&prefix))
            })
            .collect();
        let expected: Vec<String> = (0..per_producer)
            .flat_map(|i| {
                [
                    format!("add:{prefix}{i}"),
                    format!("update:{prefix}{i}"),
                ]
            })
            .collect();
        assert_eq!(own, expected.iter().collect::<Vec<_>>());
    }
    assert_eq!(log.last().map(String::as_str), Some("close"));
    assert!(log.contains(&"commit".to_string()));
}

#[tokio::test]
async fn test_purge_then_add_keeps_the_new_document() {
    let index = TestIndex::open(debug_settings()).await;
    let indexer = index.manager.create_indexer(None).unwrap();
    let old = EntityReference::new("Book", "1");
    let new = EntityReference::new("Book", "2");

    let added = indexer.add(&old, index.book("Old", "a")).await.unwrap();
    assert_eq!(added.wait().await, WorkOutcome::Applied);

    let workspace = index.manager.create_workspace(BTreeSet::new()).unwrap();
    let purge = workspace.purge(BTreeSet::new()).await.unwrap();
    let add = indexer.add(&new, index.book("New", "b")).await.unwrap();
    assert_eq!(purge.wait().await, WorkOutcome::Applied);
    assert_eq!(add.wait().await, WorkOutcome::Applied);

    let scope = index.manager.create_search_scope(None).unwrap();
    assert!(scope.get(&old).await.unwrap().is_none());
    assert!(scope.get(&new).await.unwrap().is_some());

    let log = index.log();
    let purge_at = log.iter().position(|op| op == "purge:*").unwrap();
    let add_at = log.iter().position(|op| op == "add:2").unwrap();
    assert!(purge_at < add_at);
}

#[tokio::test]
async fn test_debug_io_makes_each_write_visible() {
    let index = TestIndex::open(debug_settings()).await;
    let indexer = index.manager.create_indexer(None).unwrap();
    let scope = index.manager.create_search_scope(None).unwrap();
    let entity = EntityReference::new("Book", "42");

    let handle = indexer.add(&entity, index.book("Dune", "978-0")).await.unwrap();
    assert_eq!(handle.wait().await, WorkOutcome::Applied);
    let stored = scope.get(&entity).await.unwrap().unwrap();
    assert_eq!(stored.first("title"), Some(&FieldValue::Text("Dune".to_string())));

    let handle = indexer
        .update(&entity, index.book("Dune Messiah", "978-0"))
        .await
        .unwrap();
    assert_eq!(handle.wait().await, WorkOutcome::Applied);
    let stored = scope.get(&entity).await.unwrap().unwrap();
    assert_eq!(
        stored.first("title"),
        Some(&FieldValue::Text("Dune Messiah".to_string()))
    );
    assert_eq!(scope.count().await.unwrap(), 1);

    assert_eq!(
        index.log(),
        vec!["add:42", "commit", "refresh", "update:42", "commit", "refresh"]
    );
}

#[tokio::test]
async fn test_stop_drains_and_rejects_new_work() {
    let index = TestIndex::open(IndexSettings::default()).await;
    let indexer = index.manager.create_indexer(None).unwrap();
    let handles = vec![
        indexer
            .add(&EntityReference::new("Book", "1"), index.book("A", "a"))
            .await
            .unwrap(),
        indexer
            .add(&EntityReference::new("Book", "2"), index.book("B", "b"))
            .await
            .unwrap(),
    ];

    index.manager.stop().await.unwrap();
    assert_eq!(wait_all(handles).await, WorkOutcome::Applied);

    let log = index.log();
    assert_eq!(&log[..2], ["add:1", "add:2"]);
    assert_eq!(&log[log.len() - 2..], ["commit", "close"]);

    let late = indexer
        .add(&EntityReference::new("Book", "3"), index.book("C", "c"))
        .await;
    assert!(late.is_err());
    assert!(index.manager.create_search_scope(None).unwrap().count().await.is_err());
}
