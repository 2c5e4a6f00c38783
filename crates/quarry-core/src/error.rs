//! Error types for the Quarry indexing core.
//!
//! Errors fall into four families:
//!
//! - conversion failures raised by codecs and converters, always carrying the
//!   absolute path of the field being converted;
//! - programming errors (`Assertion`), e.g. a field reference used against the
//!   wrong document node or shard resolution on an unsharded index;
//! - tenant and schema errors, surfaced synchronously to the caller;
//! - orchestration and backend errors, reported to a failure handler once a
//!   work item has been accepted.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result type alias for Quarry operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Quarry.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// I/O error tied to a filesystem location.
    #[error("I/O error at {path}: {source}")]
    IoWithPath {
        /// Path involved in the failing operation
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// I/O error without path context.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid or inconsistent configuration.
    #[error("Configuration error: {message}")]
    Config {
        /// What configuration is problematic
        message: String,
    },

    /// Malformed input text (settings files, stored sources).
    #[error("Parse error: {message}")]
    Parse {
        /// What failed to parse
        message: String,
    },

    /// A named resource does not exist.
    #[error("{kind} not found: {name}")]
    NotFound {
        /// Name of the missing resource
        name: String,
        /// Kind of resource (index, shard, field...)
        kind: String,
    },

    /// Generic failed operation.
    #[error("Operation failed: {message}")]
    Operation {
        /// What went wrong
        message: String,
    },

    /// A value could not be converted to or from its index representation.
    #[error("Conversion failed for field '{path}': {message}")]
    Conversion {
        /// Absolute path of the field
        path: String,
        /// What went wrong
        message: String,
    },

    /// Schema definition or document structure violation.
    #[error("Schema error: {message}")]
    Schema {
        /// What went wrong
        message: String,
    },

    /// Internal invariant violated; indicates a wiring bug, not bad data.
    #[error("Assertion failure: {message}")]
    Assertion {
        /// Violated invariant
        message: String,
    },

    /// Tenant identifier rejected by the multi-tenancy strategy.
    #[error("Invalid tenant: {message}")]
    Tenant {
        /// Why the tenant was rejected
        message: String,
    },

    /// An orchestrator refused a submission because of its lifecycle state.
    #[error("Orchestrator '{name}' is {state} and does not accept work")]
    OrchestratorUnavailable {
        /// Orchestrator name
        name: String,
        /// Current lifecycle state
        state: String,
    },

    /// A bounded work queue has no free capacity.
    #[error("Work queue for '{name}' is full")]
    QueueFull {
        /// Orchestrator name
        name: String,
    },

    /// Failure reported by an index backend.
    #[error("Backend error: {message}")]
    Backend {
        /// What went wrong
        message: String,
        /// Whether the backend writer is unusable after this error
        fatal: bool,
        /// Source error if available
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl Error {
    /// Creates an I/O error with path context.
    pub fn io_with_path(source: std::io::Error, path: impl AsRef<Path>) -> Self {
        Error::IoWithPath {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Creates a configuration error.
    pub fn config<S: Into<String>>(message: S) -> Self {
        Error::Config {
            message: message.into(),
        }
    }

    /// Creates a parse error.
    pub fn parse<S: Into<String>>(message: S) -> Self {
        Error::Parse {
            message: message.into(),
        }
    }

    /// Creates a not-found error.
    pub fn not_found<N: Into<String>, K: Into<String>>(name: N, kind: K) -> Self {
        Error::NotFound {
            name: name.into(),
            kind: kind.into(),
        }
    }

    /// Creates a generic operation error.
    pub fn operation<S: Into<String>>(message: S) -> Self {
        Error::Operation {
            message: message.into(),
        }
    }

    /// Creates a conversion error for the field at `path`.
    pub fn conversion<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Error::Conversion {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a schema error.
    pub fn schema<S: Into<String>>(message: S) -> Self {
        Error::Schema {
            message: message.into(),
        }
    }

    /// Creates an assertion failure.
    pub fn assertion<S: Into<String>>(message: S) -> Self {
        Error::Assertion {
            message: message.into(),
        }
    }

    /// Creates a tenant error.
    pub fn tenant<S: Into<String>>(message: S) -> Self {
        Error::Tenant {
            message: message.into(),
        }
    }

    /// Creates a recoverable backend error.
    pub fn backend<S: Into<String>>(message: S) -> Self {
        Error::Backend {
            message: message.into(),
            fatal: false,
            source: None,
        }
    }

    /// Creates a recoverable backend error with a source error.
    pub fn backend_with_source<S, E>(message: S, source: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Backend {
            message: message.into(),
            fatal: false,
            source: Some(Box::new(source)),
        }
    }

    /// Creates a backend error after which the writer must be reopened.
    pub fn backend_fatal<S: Into<String>>(message: S) -> Self {
        Error::Backend {
            message: message.into(),
            fatal: true,
            source: None,
        }
    }

    /// Returns whether this error leaves the underlying writer unusable.
    ///
    /// Orchestrators transition to a broken state on fatal errors and reject
    /// further work until the writer is reopened.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Backend { fatal: true, .. })
    }

    /// Returns whether this error signals a programming error rather than bad input.
    pub fn is_programming_error(&self) -> bool {
        matches!(self, Error::Assertion { .. })
    }
}
