//! Translation of index queries into Tantivy queries.

use std::collections::BTreeSet;

use quarry_core::{Error, Result};
use quarry_index::{FieldType, SearchQuery, TermQuery};
use tantivy::query::{
    AllQuery, BooleanQuery, ConstScoreQuery, EmptyQuery, Occur, Query, TermQuery as TantivyTermQuery,
};
use tantivy::schema::{Field, IndexRecordOption};
use tantivy::tokenizer::TokenStream;
use tantivy::{Index, Term};

use crate::codec::TantivyValue;
use crate::schema::{TEXT_ANALYZER, TantivyIndexSchema};

fn keyword(field: Field, text: &str) -> Box<dyn Query> {
    Box::new(TantivyTermQuery::new(
        Term::from_field_text(field, text),
        IndexRecordOption::Basic,
    ))
}

fn filter(query: Box<dyn Query>) -> Box<dyn Query> {
    Box::new(ConstScoreQuery::new(query, 0.0))
}

/// Exact match on one field.
///
/// Text values go through the field's analyzer and every resulting token
/// must match; other values match their single term.
pub fn term_query(
    index: &Index,
    schema: &TantivyIndexSchema,
    query: &TermQuery<TantivyValue>,
) -> Result<Box<dyn Query>> {
    let value_field = schema
        .value_field(&query.path)
        .ok_or_else(|| Error::schema(format!("Field '{}' is not searchable", query.path)))?;
    let field = value_field.field;

    let terms = match (&query.value, value_field.field_type) {
        (TantivyValue::Str(text), FieldType::Text) => analyze(index, field, text)?,
        (TantivyValue::Str(text), _) => vec![Term::from_field_text(field, text)],
        (TantivyValue::I64(n), _) => vec![Term::from_field_i64(field, *n)],
        (TantivyValue::F64(n), _) => vec![Term::from_field_f64(field, *n)],
        (TantivyValue::Bool(b), _) => vec![Term::from_field_bool(field, *b)],
        (TantivyValue::Date(micros), _) => vec![Term::from_field_date_for_search(
            field,
            tantivy::DateTime::from_timestamp_micros(*micros),
        )],
    };

    let mut clauses: Vec<(Occur, Box<dyn Query>)> = terms
        .into_iter()
        .map(|term| {
            let query: Box<dyn Query> =
                Box::new(TantivyTermQuery::new(term, IndexRecordOption::WithFreqs));
            (Occur::Must, query)
        })
        .collect();
    Ok(match clauses.len() {
        0 => Box::new(EmptyQuery),
        1 => clauses.remove(0).1,
        _ => Box::new(BooleanQuery::new(clauses)),
    })
}

fn analyze(index: &Index, field: Field, text: &str) -> Result<Vec<Term>> {
    let mut analyzer = index
        .tokenizers()
        .get(TEXT_ANALYZER)
        .ok_or_else(|| Error::backend(format!("Analyzer '{TEXT_ANALYZER}' is not registered")))?;
    let mut terms = Vec::new();
    let mut stream = analyzer.token_stream(text);
    stream.process(&mut |token| terms.push(Term::from_field_text(field, &token.text)));
    Ok(terms)
}

/// Restrict `query` to a tenant and to some routing keys.
///
/// Filters do not contribute to the score.
pub fn restrict(
    query: Box<dyn Query>,
    schema: &TantivyIndexSchema,
    tenant_id: Option<&str>,
    routing_keys: &BTreeSet<String>,
) -> Box<dyn Query> {
    let mut clauses: Vec<(Occur, Box<dyn Query>)> = vec![(Occur::Must, query)];
    if let Some(tenant) = tenant_id {
        clauses.push((Occur::Must, filter(keyword(schema.tenant, tenant))));
    }
    if !routing_keys.is_empty() {
        let any_key = routing_keys
            .iter()
            .map(|key| (Occur::Should, keyword(schema.routing, key)))
            .collect();
        clauses.push((Occur::Must, filter(Box::new(BooleanQuery::new(any_key)))));
    }
    if clauses.len() == 1 {
        clauses.remove(0).1
    } else {
        Box::new(BooleanQuery::new(clauses))
    }
}

/// Query for a search request.
pub fn search_query(
    index: &Index,
    schema: &TantivyIndexSchema,
    query: &SearchQuery<TantivyValue>,
    tenant_id: Option<&str>,
) -> Result<Box<dyn Query>> {
    let base: Box<dyn Query> = match query {
        SearchQuery::MatchAll => Box::new(AllQuery),
        SearchQuery::Term(term) => term_query(index, schema, term)?,
    };
    Ok(restrict(base, schema, tenant_id, &BTreeSet::new()))
}

/// Query selecting one document by id.
pub fn id_query(schema: &TantivyIndexSchema, document_id: &str) -> Box<dyn Query> {
    keyword(schema.id, document_id)
}

/// Term on the `_id` field, for deletes.
pub fn id_term(schema: &TantivyIndexSchema, document_id: &str) -> Term {
    Term::from_field_text(schema.id, document_id)
}
