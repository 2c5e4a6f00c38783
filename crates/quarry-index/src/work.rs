//! Work items: the mutation and administrative intents applied to an index.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Per-operation commit request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentCommitStrategy {
    /// Commit once this work is applied, whatever the IO strategy.
    Force,
    /// Follow the IO strategy.
    #[default]
    None,
}

/// Per-operation refresh request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentRefreshStrategy {
    /// Make the change visible to readers once this work is applied.
    Force,
    /// Follow the IO strategy.
    #[default]
    None,
}

/// Visibility requested for one work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Visibility {
    /// Commit request.
    pub commit: DocumentCommitStrategy,
    /// Refresh request.
    pub refresh: DocumentRefreshStrategy,
}

impl Visibility {
    /// Commit and refresh.
    pub fn forced() -> Self {
        Self {
            commit: DocumentCommitStrategy::Force,
            refresh: DocumentRefreshStrategy::Force,
        }
    }

    /// Create from both strategies.
    pub fn new(commit: DocumentCommitStrategy, refresh: DocumentRefreshStrategy) -> Self {
        Self { commit, refresh }
    }
}

/// Identity of an indexed entity, as given by the mapping layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityReference {
    /// Entity type name.
    pub entity_type: String,
    /// Entity id as a string.
    pub id: String,
    /// Routing key, if any.
    pub routing_key: Option<String>,
}

impl EntityReference {
    /// Reference without routing key.
    pub fn new(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            id: id.into(),
            routing_key: None,
        }
    }

    /// Set the routing key.
    pub fn with_routing_key(mut self, routing_key: impl Into<String>) -> Self {
        self.routing_key = Some(routing_key.into());
        self
    }
}

impl fmt::Display for EntityReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.entity_type, self.id)
    }
}

/// Entity and document a work item is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkTarget {
    /// Entity type name.
    pub entity_type: String,
    /// Entity id as a string.
    pub entity_id: String,
    /// Document id in the backend, tenant-qualified when needed.
    pub document_id: String,
    /// Routing key, if any.
    pub routing_key: Option<String>,
    /// Tenant the entity belongs to.
    pub tenant_id: Option<String>,
}

impl fmt::Display for WorkTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.entity_type, self.entity_id)?;
        if let Some(tenant) = &self.tenant_id {
            write!(f, "@{tenant}")?;
        }
        Ok(())
    }
}

/// Exact-value predicate on one field, with a codec-encoded value.
#[derive(Debug, Clone, PartialEq)]
pub struct TermQuery<N> {
    /// Absolute path of the field.
    pub path: String,
    /// Native value to match.
    pub value: N,
}

/// Minimal search predicate used by reads and delete-by-query.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchQuery<N> {
    /// Every document.
    MatchAll,
    /// Documents with the given value in a field.
    Term(TermQuery<N>),
}

impl<N> fmt::Display for SearchQuery<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchQuery::MatchAll => f.write_str("*"),
            SearchQuery::Term(term) => write!(f, "{}:<term>", term.path),
        }
    }
}

/// One index mutation or administrative operation.
///
/// `D` is the backend document type, `N` the backend native value type.
#[derive(Debug, Clone)]
pub enum IndexingWork<D, N> {
    /// Add a document; fails or duplicates if it exists, depending on backend.
    Add {
        /// Target entity.
        target: WorkTarget,
        /// Finalized document.
        document: D,
        /// Requested visibility.
        visibility: Visibility,
    },
    /// Replace a document.
    Update {
        /// Target entity.
        target: WorkTarget,
        /// Finalized document.
        document: D,
        /// Requested visibility.
        visibility: Visibility,
    },
    /// Remove a document.
    Delete {
        /// Target entity.
        target: WorkTarget,
        /// Requested visibility.
        visibility: Visibility,
    },
    /// Remove every document of a tenant (or all documents), optionally
    /// restricted to some routing keys.
    PurgeAll {
        /// Tenant filter.
        tenant_id: Option<String>,
        /// Routing key filter; empty for all.
        routing_keys: BTreeSet<String>,
    },
    /// Remove documents matching a term.
    DeleteByQuery {
        /// Tenant filter.
        tenant_id: Option<String>,
        /// Predicate.
        query: TermQuery<N>,
    },
    /// Make all previous writes durable.
    Flush,
    /// Make all previous writes visible to readers.
    Refresh,
    /// Merge segments.
    Optimize,
}

/// Kind of an [`IndexingWork`], for logging and dispatch tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkKind {
    /// [`IndexingWork::Add`]
    Add,
    /// [`IndexingWork::Update`]
    Update,
    /// [`IndexingWork::Delete`]
    Delete,
    /// [`IndexingWork::PurgeAll`]
    PurgeAll,
    /// [`IndexingWork::DeleteByQuery`]
    DeleteByQuery,
    /// [`IndexingWork::Flush`]
    Flush,
    /// [`IndexingWork::Refresh`]
    Refresh,
    /// [`IndexingWork::Optimize`]
    Optimize,
}

impl WorkKind {
    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkKind::Add => "add",
            WorkKind::Update => "update",
            WorkKind::Delete => "delete",
            WorkKind::PurgeAll => "purge_all",
            WorkKind::DeleteByQuery => "delete_by_query",
            WorkKind::Flush => "flush",
            WorkKind::Refresh => "refresh",
            WorkKind::Optimize => "optimize",
        }
    }
}

impl fmt::Display for WorkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<D, N> IndexingWork<D, N> {
    /// Kind of work.
    pub fn kind(&self) -> WorkKind {
        match self {
            IndexingWork::Add { .. } => WorkKind::Add,
            IndexingWork::Update { .. } => WorkKind::Update,
            IndexingWork::Delete { .. } => WorkKind::Delete,
            IndexingWork::PurgeAll { .. } => WorkKind::PurgeAll,
            IndexingWork::DeleteByQuery { .. } => WorkKind::DeleteByQuery,
            IndexingWork::Flush => WorkKind::Flush,
            IndexingWork::Refresh => WorkKind::Refresh,
            IndexingWork::Optimize => WorkKind::Optimize,
        }
    }

    /// Target entity, for entity-level works.
    pub fn target(&self) -> Option<&WorkTarget> {
        match self {
            IndexingWork::Add { target, .. }
            | IndexingWork::Update { target, .. }
            | IndexingWork::Delete { target, .. } => Some(target),
            _ => None,
        }
    }

    /// Visibility requested by this work.
    ///
    /// Flush always asks for a commit, refresh for a refresh.
    pub fn visibility(&self) -> Visibility {
        match self {
            IndexingWork::Add { visibility, .. }
            | IndexingWork::Update { visibility, .. }
            | IndexingWork::Delete { visibility, .. } => *visibility,
            IndexingWork::Flush => Visibility::new(
                DocumentCommitStrategy::Force,
                DocumentRefreshStrategy::None,
            ),
            IndexingWork::Refresh => Visibility::new(
                DocumentCommitStrategy::None,
                DocumentRefreshStrategy::Force,
            ),
            _ => Visibility::default(),
        }
    }

    /// One-line description for logs and failure reports.
    pub fn describe(&self) -> String {
        match self {
            IndexingWork::Add { target, .. }
            | IndexingWork::Update { target, .. }
            | IndexingWork::Delete { target, .. } => format!("{} {target}", self.kind()),
            IndexingWork::PurgeAll {
                tenant_id,
                routing_keys,
            } => format!(
                "purge_all tenant={} routing_keys={routing_keys:?}",
                tenant_id.as_deref().unwrap_or("*")
            ),
            IndexingWork::DeleteByQuery { tenant_id, query } => format!(
                "delete_by_query {} tenant={}",
                query.path,
                tenant_id.as_deref().unwrap_or("*")
            ),
            IndexingWork::Flush => "flush".to_string(),
            IndexingWork::Refresh => "refresh".to_string(),
            IndexingWork::Optimize => "optimize".to_string(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
