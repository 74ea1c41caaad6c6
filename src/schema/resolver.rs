//! Derive the set of schema URIs that apply to a document
//!
//! Resolution looks at three places:
//! - the document kind (`@type` containing `tm:ThingModel` selects the Thing
//!   Model schema, anything else the Thing Description schema)
//! - the JSON-LD `@context`, where strings and object values may point at
//!   extension schemas
//! - the URI scheme of `base`, mapped to a protocol binding schema
//!
//! No network I/O happens here.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use crate::config::Config;

use super::vocabulary::THING_MODEL_MARKER;

/// Whether a document is a Thing Description or a Thing Model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Description,
    Model,
}

impl DocumentKind {
    /// Detect the kind from the `@type` member
    pub fn detect(document: &Value) -> Self {
        let is_model = match document.get("@type") {
            Some(Value::String(ty)) => ty.contains(THING_MODEL_MARKER),
            Some(Value::Array(types)) => types
                .iter()
                .filter_map(Value::as_str)
                .any(|ty| ty.contains(THING_MODEL_MARKER)),
            _ => false,
        };

        if is_model {
            DocumentKind::Model
        } else {
            DocumentKind::Description
        }
    }
}

/// Maps documents to the schema URIs that should validate them
#[derive(Debug, Clone)]
pub struct SchemaResolver {
    td_schema: String,
    tm_schema: String,
    protocol_schemas: BTreeMap<String, String>,
    ignored_contexts: BTreeSet<String>,
}

impl SchemaResolver {
    pub fn new(config: &Config) -> Self {
        Self {
            td_schema: config.td_schema.clone(),
            tm_schema: config.tm_schema.clone(),
            protocol_schemas: config.protocol_schemas.clone(),
            ignored_contexts: config.ignored_contexts.iter().cloned().collect(),
        }
    }

    /// The base schema for a document kind
    pub fn base_schema(&self, kind: DocumentKind) -> &str {
        match kind {
            DocumentKind::Description => &self.td_schema,
            DocumentKind::Model => &self.tm_schema,
        }
    }

    /// Resolve the deduplicated set of schema URIs for `document`
    pub fn resolve(&self, document: &Value) -> BTreeSet<String> {
        let mut uris = BTreeSet::new();
        uris.insert(self.base_schema(DocumentKind::detect(document)).to_string());

        for candidate in context_candidates(document.get("@context")) {
            if !self.ignored_contexts.contains(candidate) {
                uris.insert(candidate.to_string());
            }
        }

        if let Some(schema) = document
            .get("base")
            .and_then(Value::as_str)
            .and_then(uri_scheme)
            .and_then(|scheme| self.protocol_schemas.get(scheme))
        {
            uris.insert(schema.clone());
        }

        uris
    }
}

/// Collect schema candidates from a `@context` value.
///
/// A string is a candidate. In an array, string elements and the string
/// values of object elements are candidates; object keys are prefixes and
/// are ignored.
fn context_candidates(context: Option<&Value>) -> Vec<&str> {
    match context {
        Some(Value::String(iri)) => vec![iri.as_str()],
        Some(Value::Array(entries)) => entries
            .iter()
            .flat_map(|entry| match entry {
                Value::String(iri) => vec![iri.as_str()],
                Value::Object(map) => map.values().filter_map(Value::as_str).collect(),
                _ => Vec::new(),
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Extract the scheme of an absolute URI
pub fn uri_scheme(uri: &str) -> Option<&str> {
    use lazy_static::lazy_static;
    use regex::Regex;

    lazy_static! {
        static ref SCHEME_RE: Regex = Regex::new(r"^([A-Za-z][A-Za-z0-9+.\-]*):").unwrap();
    }

    SCHEME_RE
        .captures(uri)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}
