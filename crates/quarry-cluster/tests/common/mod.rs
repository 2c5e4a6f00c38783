//! Common test utilities: a book schema, an in-memory cluster index and a
//! scripted HTTP server.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use quarry_index::io::IoStrategyName;
use quarry_index::orchestration::{FailureContext, FailureHandler};
use quarry_index::schema::{FieldReference, ObjectFieldReference};
use quarry_index::{
    DocumentElement, EntityReference, FieldDefinition, FieldType, IndexManager,
    IndexManagerOptions, IndexModel, IndexSchemaBuilder, IndexSettings, ObjectStructure,
    WorkOutcome,
};
use quarry_cluster::{ClusterBackend, InMemoryCluster, json_codecs};
use serde_json::Value;

// ============================================================================
// Schema and index
// ============================================================================

pub struct BookSchema {
    pub model: Arc<IndexModel<Value>>,
    pub title: FieldReference<String, Value>,
    pub isbn: FieldReference<String, Value>,
    pub reviews: ObjectFieldReference,
    pub reviewer: FieldReference<String, Value>,
}

impl BookSchema {
    pub fn new() -> Self {
        let codecs = json_codecs();
        let mut builder = IndexSchemaBuilder::new("books", &codecs);
        let root = builder.root();
        let title = builder
            .add_field(root, "title", FieldDefinition::<String>::new(FieldType::Text))
            .unwrap();
        let isbn = builder
            .add_field(root, "isbn", FieldDefinition::<String>::new(FieldType::Keyword))
            .unwrap();
        let reviews = builder
            .add_object_field(root, "reviews", ObjectStructure::Nested, true)
            .unwrap();
        let reviewer = builder
            .add_field(
                reviews.node(),
                "reviewer",
                FieldDefinition::<String>::new(FieldType::Keyword),
            )
            .unwrap();
        Self {
            model: builder.build().unwrap(),
            title,
            isbn,
            reviews,
            reviewer,
        }
    }
}

pub fn debug_settings() -> IndexSettings {
    IndexSettings {
        io_strategy: IoStrategyName::Debug,
        ..IndexSettings::default()
    }
}

/// Failure handler that keeps work descriptions.
#[derive(Debug, Default)]
pub struct CollectingFailureHandler {
    failures: Mutex<Vec<String>>,
}

impl CollectingFailureHandler {
    pub fn failures(&self) -> Vec<String> {
        self.failures.lock().unwrap().clone()
    }
}

impl FailureHandler for CollectingFailureHandler {
    fn handle(&self, context: FailureContext) {
        self.failures.lock().unwrap().push(context.work);
    }
}

pub struct ClusterIndex {
    pub cluster: Arc<InMemoryCluster>,
    pub schema: BookSchema,
    pub manager: Arc<IndexManager<ClusterBackend<InMemoryCluster>>>,
    pub failures: Arc<CollectingFailureHandler>,
}

impl ClusterIndex {
    pub async fn open(settings: IndexSettings) -> Self {
        let cluster = Arc::new(InMemoryCluster::new());
        let schema = BookSchema::new();
        let failures = Arc::new(CollectingFailureHandler::default());
        let options = IndexManagerOptions {
            failure_handler: Some(failures.clone() as Arc<dyn FailureHandler>),
            ..IndexManagerOptions::default()
        };
        let manager = IndexManager::open(
            Arc::new(ClusterBackend::new(Arc::clone(&cluster))),
            Arc::clone(&schema.model),
            settings,
            options,
        )
        .await
        .unwrap();
        Self {
            cluster,
            schema,
            manager,
            failures,
        }
    }

    pub fn book(&self, title: &str, isbn: &str, reviewers: &[&str]) -> DocumentElement<Value> {
        let mut document = self.manager.new_document();
        document.add(&self.schema.title, title.to_string()).unwrap();
        document.add(&self.schema.isbn, isbn.to_string()).unwrap();
        for reviewer in reviewers {
            let review = document.add_object(&self.schema.reviews).unwrap();
            review.add(&self.schema.reviewer, reviewer.to_string()).unwrap();
        }
        document
    }

    /// Add a book and wait for the outcome.
    pub async fn add(&self, tenant_id: Option<&str>, id: &str, title: &str) -> WorkOutcome {
        let indexer = self.manager.create_indexer(tenant_id).unwrap();
        let handle = indexer
            .add(&EntityReference::new("Book", id), self.book(title, id, &[]))
            .await
            .unwrap();
        handle.wait().await
    }
}

// ============================================================================
// Scripted HTTP server
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub body: Option<Value>,
}

#[derive(Clone, Default)]
pub struct MockCluster {
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    responses: Arc<Mutex<VecDeque<(StatusCode, Value)>>>,
}

impl MockCluster {
    /// Queue the response to the next request; unscripted requests get
    /// `200 {}`.
    pub fn respond(&self, status: StatusCode, body: Value) {
        self.responses.lock().unwrap().push_back((status, body));
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

async fn handle(
    State(mock): State<MockCluster>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let body = if body.is_empty() {
        None
    } else {
        serde_json::from_slice(&body).ok()
    };
    mock.requests.lock().unwrap().push(RecordedRequest {
        method,
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        body,
    });
    let (status, body) = mock
        .responses
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or((StatusCode::OK, serde_json::json!({})));
    (status, Json(body))
}

/// Start a scripted server; returns its base URL.
pub async fn start_mock() -> (String, MockCluster) {
    let mock = MockCluster::default();
    let app = Router::new().fallback(handle).with_state(mock.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{address}"), mock)
}
