//! Tantivy schema derived from an index model.
//!
//! Every index gets four metadata fields plus one field per searchable
//! value path:
//!
//! - `_id`: document id (STRING | STORED)
//! - `_tenant`: tenant id (STRING)
//! - `_routing`: routing key (STRING)
//! - `_source`: JSON of the finalized document (STORED)
//!
//! Value fields are named after their absolute path. Keyword fields are
//! raw strings, text fields use the `en_stem` analyzer, numeric and date
//! fields are indexed, and sortable fields are also FAST. The `_source`
//! field is what reads decode; value fields only serve queries.

use std::collections::BTreeMap;

use quarry_index::{FieldType, IndexModel};
use tantivy::Index;
use tantivy::schema::{
    DateOptions, Field, IndexRecordOption, NumericOptions, STORED, STRING, Schema, SchemaBuilder,
    TextFieldIndexing, TextOptions,
};
use tantivy::tokenizer::{Language, LowerCaser, SimpleTokenizer, Stemmer, TextAnalyzer};

use crate::codec::TantivyValue;

/// Name of the analyzer used for text fields.
pub const TEXT_ANALYZER: &str = "en_stem";

/// A value field and how its values are indexed.
#[derive(Debug, Clone, Copy)]
pub struct ValueField {
    /// Tantivy field handle.
    pub field: Field,
    /// Logical type.
    pub field_type: FieldType,
}

/// Tantivy schema with typed access to its fields.
#[derive(Clone)]
pub struct TantivyIndexSchema {
    schema: Schema,
    /// Document id.
    pub id: Field,
    /// Tenant id.
    pub tenant: Field,
    /// Routing key.
    pub routing: Field,
    /// Stored JSON document.
    pub source: Field,
    values: BTreeMap<String, ValueField>,
}

impl TantivyIndexSchema {
    /// Build the schema for `model`.
    pub fn build(model: &IndexModel<TantivyValue>) -> Self {
        let mut builder = SchemaBuilder::new();
        let id = builder.add_text_field("_id", STRING | STORED);
        let tenant = builder.add_text_field("_tenant", STRING);
        let routing = builder.add_text_field("_routing", STRING);
        let source = builder.add_text_field("_source", STORED);

        let text_options = TextOptions::default().set_indexing_options(
            TextFieldIndexing::default()
                .set_tokenizer(TEXT_ANALYZER)
                .set_index_option(IndexRecordOption::WithFreqsAndPositions),
        );

        let mut values = BTreeMap::new();
        for (path, mapping) in model.fields() {
            let options = mapping.options();
            if !options.searchable {
                continue;
            }
            let numeric = || {
                let numeric = NumericOptions::default().set_indexed();
                if options.sortable { numeric.set_fast() } else { numeric }
            };
            let field = match mapping.field_type() {
                FieldType::Keyword => {
                    if options.sortable {
                        builder.add_text_field(path, STRING | tantivy::schema::FAST)
                    } else {
                        builder.add_text_field(path, STRING)
                    }
                }
                FieldType::Text => builder.add_text_field(path, text_options.clone()),
                FieldType::Integer | FieldType::Long => builder.add_i64_field(path, numeric()),
                FieldType::Double => builder.add_f64_field(path, numeric()),
                FieldType::Boolean => builder.add_bool_field(path, numeric()),
                FieldType::Instant | FieldType::LocalDate => {
                    let date = DateOptions::default().set_indexed();
                    let date = if options.sortable { date.set_fast() } else { date };
                    builder.add_date_field(path, date)
                }
                // Rejected by the codec registry before a model can exist.
                FieldType::GeoPoint => continue,
            };
            values.insert(
                path.to_string(),
                ValueField {
                    field,
                    field_type: mapping.field_type(),
                },
            );
        }

        Self {
            schema: builder.build(),
            id,
            tenant,
            routing,
            source,
            values,
        }
    }

    /// The underlying Tantivy schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Indexed field for a value path, if the path is searchable.
    pub fn value_field(&self, path: &str) -> Option<ValueField> {
        self.values.get(path).copied()
    }

    /// Every indexed value path.
    pub fn value_fields(&self) -> impl Iterator<Item = (&str, ValueField)> {
        self.values.iter().map(|(path, field)| (path.as_str(), *field))
    }

    /// Register the text analyzer with an index.
    ///
    /// Must be called after creating or opening an index.
    pub fn register_tokenizers(index: &Index) {
        let en_stem = TextAnalyzer::builder(SimpleTokenizer::default())
            .filter(LowerCaser)
            .filter(Stemmer::new(Language::English))
            .build();
        index.tokenizers().register(TEXT_ANALYZER, en_stem);
    }
}

impl std::fmt::Debug for TantivyIndexSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TantivyIndexSchema")
            .field("value_fields", &self.values.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
