//! Cluster queries.
//!
//! A [`ClusterQuery`] is the backend's own query value: clients render it
//! to the cluster's query DSL or evaluate it directly.

use std::collections::BTreeSet;

use quarry_core::{Error, Result};
use quarry_index::{SearchQuery, TermQuery};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::schema::{ClusterSchema, ROUTING_FIELD, TENANT_FIELD};

/// What a query matches, before tenant and routing filters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Predicate {
    /// Every document.
    MatchAll,
    /// Documents whose field holds a value.
    Match {
        /// Absolute field path.
        path: String,
        /// JSON value to match.
        value: Value,
        /// Whether the value is analyzed as full text.
        analyzed: bool,
        /// Enclosing nested objects, outermost first.
        nested: Vec<String>,
    },
}

/// A predicate restricted to a tenant and to some routing keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterQuery {
    /// What to match.
    pub predicate: Predicate,
    /// Only documents of this tenant.
    pub tenant_id: Option<String>,
    /// Only documents with one of these routing keys; empty for any.
    pub routing_keys: BTreeSet<String>,
}

impl ClusterQuery {
    /// Every document.
    pub fn match_all() -> Self {
        Self {
            predicate: Predicate::MatchAll,
            tenant_id: None,
            routing_keys: BTreeSet::new(),
        }
    }

    /// Documents where a field holds a value.
    pub fn term(schema: &ClusterSchema, term: &TermQuery<Value>) -> Result<Self> {
        let info = schema
            .path(&term.path)
            .ok_or_else(|| Error::not_found(&term.path, "field"))?;
        if !info.searchable {
            return Err(Error::schema(format!("Field '{}' is not searchable", term.path)));
        }
        Ok(Self {
            predicate: Predicate::Match {
                path: term.path.clone(),
                value: term.value.clone(),
                analyzed: info.is_analyzed(),
                nested: info.nested.clone(),
            },
            tenant_id: None,
            routing_keys: BTreeSet::new(),
        })
    }

    /// Translate a search request.
    pub fn search(schema: &ClusterSchema, query: &SearchQuery<Value>) -> Result<Self> {
        match query {
            SearchQuery::MatchAll => Ok(Self::match_all()),
            SearchQuery::Term(term) => Self::term(schema, term),
        }
    }

    /// Restrict to a tenant.
    pub fn for_tenant(mut self, tenant_id: Option<&str>) -> Self {
        self.tenant_id = tenant_id.map(str::to_string);
        self
    }

    /// Restrict to routing keys.
    pub fn with_routing_keys(mut self, routing_keys: &BTreeSet<String>) -> Self {
        self.routing_keys = routing_keys.clone();
        self
    }

    /// Render as an Elasticsearch-compatible query DSL object.
    pub fn to_dsl(&self) -> Value {
        let predicate = match &self.predicate {
            Predicate::MatchAll => json!({"match_all": {}}),
            Predicate::Match {
                path,
                value,
                analyzed,
                nested,
            } => {
                let leaf = if *analyzed {
                    json!({"match": {path.as_str(): {"query": value, "operator": "and"}}})
                } else {
                    json!({"term": {path.as_str(): value}})
                };
                nested.iter().rev().fold(leaf, |query, nested_path| {
                    json!({"nested": {"path": nested_path, "query": query}})
                })
            }
        };

        let mut filters = Vec::new();
        if let Some(tenant) = &self.tenant_id {
            filters.push(json!({"term": {TENANT_FIELD: tenant}}));
        }
        if !self.routing_keys.is_empty() {
            filters.push(json!({"terms": {ROUTING_FIELD: self.routing_keys}}));
        }
        if filters.is_empty() {
            return predicate;
        }
        json!({"bool": {"must": [predicate], "filter": filters}})
    }

    /// Evaluate against a document body.
    ///
    /// Analysis is limited to lowercased alphanumeric tokens; every query
    /// token must appear in the field.
    pub fn matches(&self, source: &Map<String, Value>) -> bool {
        if let Some(tenant) = &self.tenant_id
            && source.get(TENANT_FIELD).and_then(Value::as_str) != Some(tenant.as_str())
        {
            return false;
        }
        if !self.routing_keys.is_empty() {
            let routed = source
                .get(ROUTING_FIELD)
                .and_then(Value::as_str)
                .is_some_and(|key| self.routing_keys.contains(key));
            if !routed {
                return false;
            }
        }
        match &self.predicate {
            Predicate::MatchAll => true,
            Predicate::Match {
                path,
                value,
                analyzed,
                ..
            } => {
                let mut found = Vec::new();
                collect_json(source, path, &mut found);
                if *analyzed {
                    let wanted = tokens(value.as_str().unwrap_or_default());
                    let present: BTreeSet<String> = found
                        .iter()
                        .filter_map(|v| v.as_str())
                        .flat_map(tokens)
                        .collect();
                    !wanted.is_empty() && wanted.iter().all(|token| present.contains(token))
                } else {
                    found.iter().any(|candidate| *candidate == value)
                }
            }
        }
    }
}

fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn collect_json<'a>(object: &'a Map<String, Value>, path: &str, out: &mut Vec<&'a Value>) {
    let (head, rest) = match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    };
    let Some(value) = object.get(head) else {
        return;
    };
    let items: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };
    for item in items {
        match rest {
            None if !item.is_null() => out.push(item),
            None => {}
            Some(rest) => {
                if let Value::Object(child) = item {
                    collect_json(child, rest, out);
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
