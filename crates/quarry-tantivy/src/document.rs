//! Conversion between finalized documents and Tantivy documents.

use quarry_core::{Error, Result};
use quarry_index::{StoredObject, WorkTarget};
use tantivy::TantivyDocument;
use tantivy::schema::{Field, Value};

use crate::codec::TantivyValue;
use crate::schema::TantivyIndexSchema;

/// Build the Tantivy document for a finalized tree.
///
/// Every value under an indexed path is added to that path's field; the
/// whole tree is stored as JSON in `_source`.
pub fn build_document(
    schema: &TantivyIndexSchema,
    target: &WorkTarget,
    source: &StoredObject<TantivyValue>,
) -> Result<TantivyDocument> {
    let mut document = TantivyDocument::new();
    document.add_text(schema.id, &target.document_id);
    if let Some(tenant) = &target.tenant_id {
        document.add_text(schema.tenant, tenant);
    }
    if let Some(routing_key) = &target.routing_key {
        document.add_text(schema.routing, routing_key);
    }
    document.add_text(schema.source, serde_json::to_string(source)?);

    for (path, value_field) in schema.value_fields() {
        for value in source.values_at(path) {
            add_value(&mut document, value_field.field, value);
        }
    }
    Ok(document)
}

fn add_value(document: &mut TantivyDocument, field: Field, value: &TantivyValue) {
    match value {
        TantivyValue::Str(text) => document.add_text(field, text),
        TantivyValue::I64(n) => document.add_i64(field, *n),
        TantivyValue::F64(n) => document.add_f64(field, *n),
        TantivyValue::Bool(b) => document.add_bool(field, *b),
        TantivyValue::Date(micros) => {
            document.add_date(field, tantivy::DateTime::from_timestamp_micros(*micros))
        }
    }
}

/// Document id of a stored Tantivy document.
pub fn document_id(schema: &TantivyIndexSchema, document: &TantivyDocument) -> Result<String> {
    document
        .get_first(schema.id)
        .and_then(|value| value.as_str())
        .map(str::to_string)
        .ok_or_else(|| Error::backend("Stored document has no _id"))
}

/// Decode the `_source` of a stored Tantivy document.
pub fn stored_source(
    schema: &TantivyIndexSchema,
    document: &TantivyDocument,
) -> Result<StoredObject<TantivyValue>> {
    let json = document
        .get_first(schema.source)
        .and_then(|value| value.as_str())
        .ok_or_else(|| Error::backend("Stored document has no _source"))?;
    serde_json::from_str(json)
        .map_err(|e| Error::parse(format!("Invalid stored source: {e}")))
}

// ============================================================================
// Tests
// ============================================================================
