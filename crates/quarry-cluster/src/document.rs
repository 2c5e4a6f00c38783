//! JSON shape of cluster documents.
//!
//! A finalized tree becomes a JSON object keyed by field name. Single-valued
//! fields are written as a scalar (or object), multi-valued fields as an
//! array, and explicitly missing objects as `null`. Fields with no value are
//! omitted. The tenant and routing key are stored under reserved names at
//! the top level.

use quarry_core::{Error, Result};
use quarry_index::schema::{NodeId, SchemaTree};
use quarry_index::{StoredField, StoredObject, WorkTarget};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::schema::{ROUTING_FIELD, TENANT_FIELD};

/// A document as sent to the cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterDocument {
    /// Document id.
    pub id: String,
    /// Document body.
    pub source: Map<String, Value>,
}

/// Build the cluster document for a finalized tree.
pub fn build_document(
    tree: &SchemaTree,
    target: &WorkTarget,
    stored: &StoredObject<Value>,
) -> Result<ClusterDocument> {
    let mut source = object_to_json(tree, tree.root(), stored)?;
    if let Some(tenant) = &target.tenant_id {
        source.insert(TENANT_FIELD.to_string(), Value::String(tenant.clone()));
    }
    if let Some(routing_key) = &target.routing_key {
        source.insert(ROUTING_FIELD.to_string(), Value::String(routing_key.clone()));
    }
    Ok(ClusterDocument {
        id: target.document_id.clone(),
        source,
    })
}

fn object_to_json(
    tree: &SchemaTree,
    node: NodeId,
    object: &StoredObject<Value>,
) -> Result<Map<String, Value>> {
    let mut json = Map::new();
    for (name, field) in object.iter() {
        let child = tree
            .child(node, name)
            .and_then(|id| tree.get(id).map(|n| (id, n)))
            .ok_or_else(|| Error::assertion(format!("Field '{name}' is not in the schema")))?;
        let (child_id, child_node) = child;
        let multi_valued = child_node.is_multi_valued();

        let value = match field {
            StoredField::Values(values) if multi_valued => Value::Array(values.clone()),
            StoredField::Values(values) => match values.first() {
                Some(value) => value.clone(),
                None => continue,
            },
            StoredField::Objects(objects) => {
                let mut items = Vec::with_capacity(objects.len());
                for object in objects {
                    items.push(match object {
                        Some(object) => Value::Object(object_to_json(tree, child_id, object)?),
                        None => Value::Null,
                    });
                }
                if multi_valued {
                    Value::Array(items)
                } else {
                    match items.into_iter().next() {
                        Some(item) => item,
                        None => continue,
                    }
                }
            }
        };
        json.insert(name.to_string(), value);
    }
    Ok(json)
}

/// Read a document body back into a finalized tree.
///
/// Reserved fields are skipped; unknown fields are a parse error.
pub fn parse_source(tree: &SchemaTree, source: &Value) -> Result<StoredObject<Value>> {
    let object = source
        .as_object()
        .ok_or_else(|| Error::parse("Document source is not a JSON object"))?;
    object_from_json(tree, tree.root(), object, true)
}

fn object_from_json(
    tree: &SchemaTree,
    node: NodeId,
    json: &Map<String, Value>,
    top_level: bool,
) -> Result<StoredObject<Value>> {
    let mut object = StoredObject::new();
    for (name, value) in json {
        if top_level && (name == TENANT_FIELD || name == ROUTING_FIELD) {
            continue;
        }
        let child_id = tree
            .child(node, name)
            .ok_or_else(|| Error::parse(format!("Unknown field '{name}' in document source")))?;
        let composite = tree.get(child_id).is_some_and(|n| n.is_composite());

        let field = if composite {
            let items: Vec<&Value> = match value {
                Value::Array(items) => items.iter().collect(),
                other => vec![other],
            };
            let mut objects = Vec::with_capacity(items.len());
            for item in items {
                objects.push(match item {
                    Value::Null => None,
                    Value::Object(child) => Some(object_from_json(tree, child_id, child, false)?),
                    _ => {
                        return Err(Error::parse(format!(
                            "Field '{name}' should hold objects"
                        )));
                    }
                });
            }
            StoredField::Objects(objects)
        } else {
            match value {
                Value::Null => continue,
                Value::Array(items) => StoredField::Values(items.clone()),
                other => StoredField::Values(vec![other.clone()]),
            }
        };
        object.insert(name.clone(), field);
    }
    Ok(object)
}

// ============================================================================
// Tests
// ============================================================================
