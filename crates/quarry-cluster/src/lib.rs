//! Remote JSON-document cluster backend for Quarry.
//!
//! Documents are JSON objects sent to a cluster through a [`ClusterClient`].
//! [`HttpClusterClient`] talks to an Elasticsearch-compatible REST API;
//! [`InMemoryCluster`] keeps everything in process.
//!
//! # Example
//!
//! ```rust,ignore
//! use quarry_cluster::{ClusterBackend, HttpClusterClient};
//!
//! let client = Arc::new(HttpClusterClient::new("http://localhost:9200")?);
//! let manager = IndexManager::open(Arc::new(ClusterBackend::new(client)), model,
//!     IndexSettings::default(), IndexManagerOptions::default()).await?;
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod backend;
pub mod client;
pub mod codec;
pub mod document;
pub mod http;
pub mod memory;
pub mod query;
pub mod reader;
pub mod schema;
pub mod writer;

pub use backend::{ClusterBackend, remote_index_name};
pub use client::{ClusterClient, ClusterHit};
pub use codec::{JsonCodec, json_codecs};
pub use document::ClusterDocument;
pub use http::{HttpClusterClient, HttpClusterConfig};
pub use memory::{InMemoryCluster, MemoryIndexStats};
pub use query::{ClusterQuery, Predicate};
pub use reader::ClusterShardReader;
pub use schema::ClusterSchema;
pub use writer::ClusterShardWriter;
