//! Arena-backed schema tree.
//!
//! Nodes live in a flat vector owned by the tree; a node refers to its parent
//! and children by [`NodeId`]. Every built tree carries a process-unique
//! [`TreeId`] so references can be checked against the tree a document was
//! created from.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use quarry_core::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::codec::FieldType;

static NEXT_TREE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a schema tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TreeId(u64);

impl TreeId {
    fn next() -> Self {
        Self(NEXT_TREE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Index of a node within its tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// The root node of every tree.
    pub const ROOT: NodeId = NodeId(0);
}

/// How an object field's children are laid out by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectStructure {
    /// Children are merged into the parent document under dotted paths.
    #[default]
    Flattened,
    /// Each child object is indexed as its own nested document.
    Nested,
}

/// Per-field indexing options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueOptions {
    /// Indexed for search.
    pub searchable: bool,
    /// Retrievable from the stored source.
    pub projectable: bool,
    /// Usable as a sort key.
    pub sortable: bool,
}

impl Default for ValueOptions {
    fn default() -> Self {
        Self {
            searchable: true,
            projectable: true,
            sortable: false,
        }
    }
}

/// What a node represents.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Top-level node of an index.
    Root,
    /// Object field with child fields.
    Object {
        /// Child layout.
        structure: ObjectStructure,
    },
    /// Leaf field holding values.
    Value {
        /// Logical type of the values.
        field_type: FieldType,
        /// Indexing options.
        options: ValueOptions,
    },
}

/// A node of the schema tree.
#[derive(Debug, Clone)]
pub struct SchemaNode {
    name: String,
    path: String,
    parent: Option<NodeId>,
    multi_valued: bool,
    kind: NodeKind,
    children: Vec<NodeId>,
}

impl SchemaNode {
    /// Name relative to the parent node; empty for the root.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Absolute dotted path; empty for the root.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Parent node, `None` for the root.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Whether the field accepts more than one value (or object).
    pub fn is_multi_valued(&self) -> bool {
        self.multi_valued
    }

    /// Node kind.
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Child nodes in declaration order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Whether the node can hold child fields.
    pub fn is_composite(&self) -> bool {
        matches!(self.kind, NodeKind::Root | NodeKind::Object { .. })
    }

    /// Field type, for value nodes.
    pub fn field_type(&self) -> Option<FieldType> {
        match self.kind {
            NodeKind::Value { field_type, .. } => Some(field_type),
            _ => None,
        }
    }
}

/// Immutable-after-build tree of schema nodes.
#[derive(Clone)]
pub struct SchemaTree {
    id: TreeId,
    nodes: Vec<SchemaNode>,
}

impl SchemaTree {
    pub(crate) fn new() -> Self {
        Self {
            id: TreeId::next(),
            nodes: vec![SchemaNode {
                name: String::new(),
                path: String::new(),
                parent: None,
                multi_valued: false,
                kind: NodeKind::Root,
                children: Vec::new(),
            }],
        }
    }

    /// Identity of this tree.
    pub fn id(&self) -> TreeId {
        self.id
    }

    /// The root node id.
    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    /// Look up a node, `None` if the id is out of range.
    pub fn get(&self, id: NodeId) -> Option<&SchemaNode> {
        self.nodes.get(id.0)
    }

    /// Look up a node by id.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not issued by this tree.
    pub fn node(&self, id: NodeId) -> &SchemaNode {
        &self.nodes[id.0]
    }

    /// Find a direct child by relative name.
    pub fn child(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.get(parent)?
            .children
            .iter()
            .copied()
            .find(|child| self.nodes[child.0].name == name)
    }

    /// Find a node by absolute path.
    pub fn find(&self, path: &str) -> Option<NodeId> {
        if path.is_empty() {
            return Some(NodeId::ROOT);
        }
        path.split('.')
            .try_fold(NodeId::ROOT, |node, segment| self.child(node, segment))
    }

    /// All value nodes, in declaration order.
    pub fn value_nodes(&self) -> impl Iterator<Item = (NodeId, &SchemaNode)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| matches!(node.kind, NodeKind::Value { .. }))
            .map(|(index, node)| (NodeId(index), node))
    }

    /// Number of nodes including the root.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree holds only its root.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    pub(crate) fn add_node(
        &mut self,
        parent: NodeId,
        name: &str,
        multi_valued: bool,
        kind: NodeKind,
    ) -> Result<NodeId> {
        if name.is_empty() || name.contains('.') {
            return Err(Error::schema(format!(
                "Invalid field name '{name}': names must be non-empty and must not contain '.'"
            )));
        }
        let parent_node = self.get(parent).ok_or_else(|| {
            Error::assertion(format!("Parent node {parent:?} does not belong to this schema"))
        })?;
        if !parent_node.is_composite() {
            return Err(Error::schema(format!(
                "Field '{}' is a value field and cannot have children",
                parent_node.path
            )));
        }
        if self.child(parent, name).is_some() {
            let path = join_path(&parent_node.path, name);
            return Err(Error::schema(format!("Duplicate field '{path}'")));
        }

        let path = join_path(&parent_node.path, name);
        let id = NodeId(self.nodes.len());
        self.nodes.push(SchemaNode {
            name: name.to_string(),
            path,
            parent: Some(parent),
            multi_valued,
            kind,
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        Ok(id)
    }
}

impl fmt::Debug for SchemaTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let paths: Vec<&str> = self.nodes.iter().skip(1).map(|n| n.path.as_str()).collect();
        f.debug_struct("SchemaTree")
            .field("id", &self.id)
            .field("paths", &paths)
            .finish()
    }
}

/// Join a parent path and a relative name.
pub fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}.{name}")
    }
}

// ============================================================================
// Tests
// ============================================================================
