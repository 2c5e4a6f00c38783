//! Remote index layout derived from an index model.
//!
//! Produces the mapping sent when a remote index is created and the
//! per-path facts queries need: whether a field is analyzed, and which
//! nested objects enclose it.

use std::collections::BTreeMap;
use std::sync::Arc;

use quarry_index::schema::{NodeId, NodeKind, SchemaTree};
use quarry_index::{FieldType, IndexModel, ObjectStructure};
use serde_json::{Map, Value, json};

/// Source field holding the tenant id.
pub const TENANT_FIELD: &str = "__tenant_id";

/// Source field holding the routing key.
pub const ROUTING_FIELD: &str = "__routing_key";

/// Query facts about one value path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathInfo {
    /// Logical type.
    pub field_type: FieldType,
    /// Whether the field is indexed.
    pub searchable: bool,
    /// Enclosing nested objects, outermost first.
    pub nested: Vec<String>,
}

impl PathInfo {
    /// Whether term values go through full-text analysis.
    pub fn is_analyzed(&self) -> bool {
        self.field_type == FieldType::Text
    }
}

/// Layout of the remote indexes of one model.
#[derive(Debug, Clone)]
pub struct ClusterSchema {
    tree: Arc<SchemaTree>,
    paths: BTreeMap<String, PathInfo>,
}

impl ClusterSchema {
    /// Derive the layout of `model`.
    pub fn build(model: &IndexModel<Value>) -> Self {
        let tree = Arc::clone(model.tree());
        let paths = model
            .fields()
            .map(|(path, mapping)| {
                let info = PathInfo {
                    field_type: mapping.field_type(),
                    searchable: mapping.options().searchable,
                    nested: nested_ancestors(&tree, mapping.node()),
                };
                (path.to_string(), info)
            })
            .collect();
        Self { tree, paths }
    }

    /// The schema tree documents follow.
    pub fn tree(&self) -> &SchemaTree {
        &self.tree
    }

    /// Query facts for a value path.
    pub fn path(&self, path: &str) -> Option<&PathInfo> {
        self.paths.get(path)
    }

    /// Mapping body for creating a remote index.
    pub fn mappings(&self) -> Value {
        let mut properties = self.properties(self.tree.root());
        properties.insert(TENANT_FIELD.to_string(), json!({"type": "keyword"}));
        properties.insert(ROUTING_FIELD.to_string(), json!({"type": "keyword"}));
        json!({
            "dynamic": "strict",
            "properties": properties,
        })
    }

    fn properties(&self, node: NodeId) -> Map<String, Value> {
        let mut properties = Map::new();
        let Some(parent) = self.tree.get(node) else {
            return properties;
        };
        for child_id in parent.children() {
            let Some(child) = self.tree.get(*child_id) else {
                continue;
            };
            let mapping = match child.kind() {
                NodeKind::Root => continue,
                NodeKind::Object { structure } => {
                    let kind = match structure {
                        ObjectStructure::Flattened => "object",
                        ObjectStructure::Nested => "nested",
                    };
                    json!({"type": kind, "properties": self.properties(*child_id)})
                }
                NodeKind::Value {
                    field_type,
                    options,
                } => {
                    let mut mapping = value_mapping(*field_type);
                    if !options.searchable {
                        mapping.insert("index".to_string(), Value::Bool(false));
                    }
                    Value::Object(mapping)
                }
            };
            properties.insert(child.name().to_string(), mapping);
        }
        properties
    }
}

fn value_mapping(field_type: FieldType) -> Map<String, Value> {
    let mapping = match field_type {
        FieldType::Keyword => json!({"type": "keyword"}),
        FieldType::Text => json!({"type": "text", "analyzer": "english"}),
        FieldType::Integer => json!({"type": "integer"}),
        FieldType::Long => json!({"type": "long"}),
        FieldType::Double => json!({"type": "double"}),
        FieldType::Boolean => json!({"type": "boolean"}),
        FieldType::Instant => json!({"type": "date", "format": "strict_date_optional_time"}),
        FieldType::LocalDate => json!({"type": "date", "format": "strict_date"}),
        FieldType::GeoPoint => json!({"type": "geo_point"}),
    };
    match mapping {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn nested_ancestors(tree: &SchemaTree, node: NodeId) -> Vec<String> {
    let mut nested = Vec::new();
    let mut current = tree.get(node).and_then(|n| n.parent());
    while let Some(id) = current {
        let Some(ancestor) = tree.get(id) else {
            break;
        };
        if matches!(
            ancestor.kind(),
            NodeKind::Object {
                structure: ObjectStructure::Nested
            }
        ) {
            nested.push(ancestor.path().to_string());
        }
        current = ancestor.parent();
    }
    nested.reverse();
    nested
}

// ============================================================================
// Tests
// ============================================================================
