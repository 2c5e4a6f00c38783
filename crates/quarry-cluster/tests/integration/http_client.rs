//! The HTTP client against a scripted server.

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::http::{Method, StatusCode};
use quarry_cluster::{
    ClusterBackend, ClusterClient, ClusterDocument, ClusterQuery, HttpClusterClient,
};
use quarry_core::Error;
use quarry_index::{Backend, ShardId, ShardWriter};
use serde_json::{Value, json};

use crate::common::{BookSchema, start_mock};

fn document() -> ClusterDocument {
    let Value::Object(source) = json!({"title": "Mort", "__tenant_id": "acme"}) else {
        unreachable!()
    };
    ClusterDocument {
        id: "acme_1".to_string(),
        source,
    }
}

#[tokio::test]
async fn test_index_puts_document_source() {
    let (url, mock) = start_mock().await;
    let client = HttpClusterClient::new(&url).unwrap();
    mock.respond(StatusCode::CREATED, json!({"result": "created"}));

    client.index("books", &document()).await.unwrap();

    let requests = mock.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, Method::PUT);
    assert_eq!(requests[0].path, "/books/_doc/acme_1");
    assert_eq!(requests[0].body, Some(json!({"title": "Mort", "__tenant_id": "acme"})));
}

#[tokio::test]
async fn test_get_found_and_missing_documents() {
    let (url, mock) = start_mock().await;
    let client = HttpClusterClient::new(&url).unwrap();
    mock.respond(
        StatusCode::OK,
        json!({"_id": "1", "found": true, "_source": {"title": "Mort"}}),
    );
    mock.respond(StatusCode::NOT_FOUND, json!({"_id": "2", "found": false}));

    assert_eq!(
        client.get("books", "1").await.unwrap(),
        Some(json!({"title": "Mort"}))
    );
    assert_eq!(client.get("books", "2").await.unwrap(), None);
    assert_eq!(mock.requests()[0].query.as_deref(), Some("realtime=false"));
}

#[tokio::test]
async fn test_missing_index_is_fatal_and_server_errors_are_not() {
    let (url, mock) = start_mock().await;
    let client = HttpClusterClient::new(&url).unwrap();
    mock.respond(
        StatusCode::NOT_FOUND,
        json!({"error": {"type": "index_not_found_exception", "reason": "no such index"}}),
    );
    mock.respond(StatusCode::SERVICE_UNAVAILABLE, json!({"error": "overloaded"}));

    let missing = client.refresh("books").await.unwrap_err();
    assert!(missing.is_fatal());

    let unavailable = client.flush("books").await.unwrap_err();
    assert!(matches!(unavailable, Error::Backend { .. }));
    assert!(!unavailable.is_fatal());
}

#[tokio::test]
async fn test_delete_of_missing_document_succeeds() {
    let (url, mock) = start_mock().await;
    let client = HttpClusterClient::new(&url).unwrap();
    mock.respond(StatusCode::NOT_FOUND, json!({"result": "not_found"}));

    client.delete("books", "gone").await.unwrap();
    assert_eq!(mock.requests()[0].method, Method::DELETE);
}

#[tokio::test]
async fn test_search_sends_query_and_parses_hits() {
    let (url, mock) = start_mock().await;
    let client = HttpClusterClient::new(&url).unwrap();
    mock.respond(
        StatusCode::OK,
        json!({"hits": {"hits": [
            {"_id": "acme_1", "_score": 2.5, "_source": {"title": "Mort"}},
            {"_id": "acme_2", "_score": 1.0, "_source": {"title": "Eric"}}
        ]}}),
    );
    mock.respond(StatusCode::OK, json!({"count": 7}));

    let query = ClusterQuery::match_all().for_tenant(Some("acme"));
    let hits = client.search("books", &query, 5).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].id, "acme_1");
    assert_eq!(hits[0].score, 2.5);
    assert_eq!(client.count("books", &query).await.unwrap(), 7);

    let requests = mock.requests();
    assert_eq!(requests[0].path, "/books/_search");
    let body = requests[0].body.clone().unwrap();
    assert_eq!(body["size"], 5);
    assert_eq!(body["query"], query.to_dsl());
    assert_eq!(requests[1].path, "/books/_count");
}

#[tokio::test]
async fn test_backend_creates_missing_remote_index() {
    let (url, mock) = start_mock().await;
    let client = Arc::new(HttpClusterClient::new(&url).unwrap());
    let schema = BookSchema::new();
    mock.respond(StatusCode::NOT_FOUND, json!({}));

    let backend = ClusterBackend::new(client);
    backend
        .open_shard(&schema.model, &ShardId::named("eu"))
        .await
        .unwrap();

    let requests = mock.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].method, Method::HEAD);
    assert_eq!(requests[0].path, "/books-eu");
    assert_eq!(requests[1].method, Method::PUT);
    assert_eq!(
        requests[1].body.clone().unwrap()["mappings"]["properties"]["isbn"]["type"],
        "keyword"
    );
}

#[tokio::test]
async fn test_purge_refreshes_before_deleting() {
    let (url, mock) = start_mock().await;
    let client = Arc::new(HttpClusterClient::new(&url).unwrap());
    let schema = BookSchema::new();

    let backend = ClusterBackend::new(client);
    let (mut writer, _reader) = backend
        .open_shard(&schema.model, &ShardId::unsharded())
        .await
        .unwrap();
    writer.purge(Some("acme"), &BTreeSet::new()).await.unwrap();

    let requests = mock.requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[0].method, Method::HEAD);
    assert_eq!(requests[1].method, Method::POST);
    assert_eq!(requests[1].path, "/books/_refresh");
    assert_eq!(requests[2].path, "/books/_delete_by_query");
    assert_eq!(requests[2].query.as_deref(), Some("conflicts=proceed"));
    assert_eq!(
        requests[2].body.clone().unwrap()["query"],
        ClusterQuery::match_all().for_tenant(Some("acme")).to_dsl()
    );
}

#[tokio::test]
async fn test_transport_failure_is_not_fatal() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    drop(listener);

    let client = HttpClusterClient::new(&format!("http://{address}")).unwrap();
    let err = client.refresh("books").await.unwrap_err();
    assert!(matches!(err, Error::Backend { .. }));
    assert!(!err.is_fatal());
}
