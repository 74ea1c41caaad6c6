//! Thing Description validation checks
//!
//! Runs every check of a [`ValidationReport`] against one text value:
//! - `json`: the text is well-formed JSON
//! - `schema`: the document satisfies the JSON Schemas resolved for it; the
//!   base TD (or TM) schema is required, other schemas are applied when
//!   available
//! - `jsonld`: `@context` names the TD vocabulary
//! - `additional`: required members, affordances, forms, links and security
//!   definitions follow the core vocabulary, plus duplicate keys, undefined
//!   security references and repeated operations or forms

use std::collections::{BTreeMap, HashSet};

use serde_json::{Map, Value};

use crate::parser::{decode, duplicate_keys, escape_pointer_segment};
use crate::schema::vocabulary::{
    is_td_context, operations_for, AFFORDANCE_COLLECTIONS, TD_REQUIRED_MEMBERS,
    TM_REQUIRED_MEMBERS,
};
use crate::schema::{DocumentKind, SchemaEntry};

use super::report::{Finding, ReportSlot, ValidationReport};

/// Schemas resolved and fetched for one document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaSet {
    /// URI of the base TD or TM schema
    pub base: String,
    pub entries: BTreeMap<String, SchemaEntry>,
}

impl SchemaSet {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            entries: BTreeMap::new(),
        }
    }

    pub fn with_entry(mut self, uri: impl Into<String>, entry: SchemaEntry) -> Self {
        self.entries.insert(uri.into(), entry);
        self
    }
}

/// Validate a document text against `schemas`.
///
/// Malformed text fails the `json` slot and leaves every other slot `NotRun`.
/// Without a usable base schema the `schema` slot stays `NotRun` and the
/// report message says why.
pub fn validate_text(text: &str, schemas: &SchemaSet) -> ValidationReport {
    let mut report = ValidationReport::default();

    let document = match decode(text) {
        Ok(document) => document,
        Err(err) => {
            let mut finding = Finding::error(ReportSlot::Json, "", err.message.clone());
            finding.position = Some((err.line, err.column));
            report.record(ReportSlot::Json, vec![finding]);
            return report;
        }
    };
    report.record(ReportSlot::Json, Vec::new());

    match check_schemas(&document, schemas) {
        Ok(findings) => report.record(ReportSlot::Schema, findings),
        Err(message) => {
            tracing::debug!("Schema check not run: {}", message);
            report.message = Some(message);
        }
    }
    report.record(ReportSlot::JsonLd, check_context(&document));

    let mut additional = check_vocabulary(&document, DocumentKind::detect(&document));
    additional.extend(duplicate_keys(text).into_iter().map(|pointer| {
        let key = pointer.rsplit('/').next().unwrap_or_default().to_string();
        Finding::error(
            ReportSlot::Additional,
            pointer,
            format!("Duplicate key '{}'", key),
        )
    }));
    additional.extend(check_additional(&document));
    report.record(ReportSlot::Additional, additional);

    report
}

/// Apply the base schema and every other available schema.
///
/// Fails with a message when the base schema cannot be applied. Other
/// schemas that are unavailable or do not compile only produce warnings.
fn check_schemas(document: &Value, schemas: &SchemaSet) -> Result<Vec<Finding>, String> {
    let base = match schemas.entries.get(&schemas.base) {
        Some(SchemaEntry::Fetched(schema)) => schema,
        Some(SchemaEntry::Failed(err)) => {
            return Err(format!("Base schema {} is unavailable: {}", schemas.base, err))
        }
        None => return Err(format!("Base schema {} is unavailable", schemas.base)),
    };
    let validator = jsonschema::validator_for(base)
        .map_err(|err| format!("Base schema {} does not compile: {}", schemas.base, err))?;

    let mut findings = schema_violations(&validator, document);

    for (uri, entry) in &schemas.entries {
        if *uri == schemas.base {
            continue;
        }
        match entry {
            SchemaEntry::Fetched(schema) => match jsonschema::validator_for(schema) {
                Ok(validator) => findings.extend(schema_violations(&validator, document)),
                Err(err) => findings.push(Finding::warning(
                    ReportSlot::Schema,
                    "",
                    format!("Schema {} does not compile: {}", uri, err),
                )),
            },
            SchemaEntry::Failed(err) => findings.push(Finding::warning(
                ReportSlot::Schema,
                "",
                format!("Schema {} is unavailable: {}", uri, err),
            )),
        }
    }

    Ok(findings)
}

fn schema_violations(validator: &jsonschema::Validator, document: &Value) -> Vec<Finding> {
    validator
        .iter_errors(document)
        .map(|error| {
            Finding::error(
                ReportSlot::Schema,
                error.instance_path.to_string(),
                error.to_string(),
            )
        })
        .collect()
}

/// Check the document against the core vocabulary of its kind
fn check_vocabulary(document: &Value, kind: DocumentKind) -> Vec<Finding> {
    let mut findings = Vec::new();

    let root = match document.as_object() {
        Some(root) => root,
        None => {
            findings.push(vocabulary_error("", "Thing document must be a JSON object"));
            return findings;
        }
    };

    let required = match kind {
        DocumentKind::Description => TD_REQUIRED_MEMBERS,
        DocumentKind::Model => TM_REQUIRED_MEMBERS,
    };
    for member in required {
        if !root.contains_key(*member) {
            findings.push(vocabulary_error(
                "",
                format!("Missing required member '{}'", member),
            ));
        }
    }

    if root.get("title").is_some_and(|title| !title.is_string()) {
        findings.push(vocabulary_error("/title", "'title' must be a string"));
    }

    if let Some(security) = root.get("security") {
        if security_names(security).is_none() {
            findings.push(vocabulary_error(
                "/security",
                "'security' must be a string or an array of strings",
            ));
        }
    }

    if let Some(definitions) = root.get("securityDefinitions") {
        check_security_definitions(definitions, &mut findings);
    }

    if let Some(forms) = root.get("forms") {
        check_forms(forms, "/forms", None, kind, &mut findings);
    }

    for collection in AFFORDANCE_COLLECTIONS {
        if let Some(affordances) = root.get(*collection) {
            check_affordances(affordances, collection, kind, &mut findings);
        }
    }

    if let Some(links) = root.get("links") {
        check_links(links, &mut findings);
    }

    findings
}

fn check_security_definitions(definitions: &Value, findings: &mut Vec<Finding>) {
    let Some(definitions) = definitions.as_object() else {
        findings.push(vocabulary_error(
            "/securityDefinitions",
            "'securityDefinitions' must be an object",
        ));
        return;
    };

    for (name, definition) in definitions {
        let pointer = format!("/securityDefinitions/{}", escape_pointer_segment(name));
        if !definition.get("scheme").is_some_and(Value::is_string) {
            findings.push(vocabulary_error(
                pointer,
                format!("Security definition '{}' must have a string 'scheme'", name),
            ));
        }
    }
}

fn check_affordances(
    affordances: &Value,
    collection: &str,
    kind: DocumentKind,
    findings: &mut Vec<Finding>,
) {
    let pointer = format!("/{}", collection);
    let Some(affordances) = affordances.as_object() else {
        findings.push(vocabulary_error(
            pointer,
            format!("'{}' must be an object", collection),
        ));
        return;
    };

    for (name, affordance) in affordances {
        let pointer = format!("{}/{}", pointer, escape_pointer_segment(name));
        let Some(affordance) = affordance.as_object() else {
            findings.push(vocabulary_error(
                pointer,
                format!("Interaction '{}' must be an object", name),
            ));
            continue;
        };

        match affordance.get("forms") {
            Some(forms) => check_forms(
                forms,
                &format!("{}/forms", pointer),
                Some(collection),
                kind,
                findings,
            ),
            None if kind == DocumentKind::Description => findings.push(vocabulary_error(
                pointer,
                format!("Interaction '{}' must have 'forms'", name),
            )),
            None => {}
        }
    }
}

/// Check a forms array; `collection` is `None` for root-level forms.
fn check_forms(
    forms: &Value,
    pointer: &str,
    collection: Option<&str>,
    kind: DocumentKind,
    findings: &mut Vec<Finding>,
) {
    let Some(forms) = forms.as_array() else {
        findings.push(vocabulary_error(pointer, "'forms' must be an array"));
        return;
    };

    if forms.is_empty() && collection.is_some() && kind == DocumentKind::Description {
        findings.push(vocabulary_error(pointer, "'forms' must not be empty"));
    }

    let allowed = operations_for(collection);

    for (index, form) in forms.iter().enumerate() {
        let pointer = format!("{}/{}", pointer, index);
        let Some(form) = form.as_object() else {
            findings.push(vocabulary_error(pointer, "Form must be an object"));
            continue;
        };

        if !form.get("href").is_some_and(Value::is_string) {
            findings.push(vocabulary_error(
                pointer.as_str(),
                "Form must have a string 'href'",
            ));
        }

        match form.get("op") {
            None if collection.is_none() => {
                findings.push(vocabulary_error(
                    pointer.as_str(),
                    "Root-level form must have 'op'",
                ));
            }
            None => {}
            Some(op) => check_operations(op, &format!("{}/op", pointer), allowed, findings),
        }
    }
}

fn check_operations(op: &Value, pointer: &str, allowed: &[&str], findings: &mut Vec<Finding>) {
    let ops: Vec<&Value> = match op {
        Value::String(_) => vec![op],
        Value::Array(ops) if !ops.is_empty() => ops.iter().collect(),
        Value::Array(_) => {
            findings.push(vocabulary_error(pointer, "'op' must not be an empty array"));
            return;
        }
        _ => {
            findings.push(vocabulary_error(
                pointer,
                "'op' must be a string or an array of strings",
            ));
            return;
        }
    };

    for op in ops {
        match op.as_str() {
            Some(name) if allowed.contains(&name) => {}
            Some(name) => findings.push(vocabulary_error(
                pointer,
                format!("Operation '{}' is not valid here", name),
            )),
            None => findings.push(vocabulary_error(pointer, "Operation must be a string")),
        }
    }
}

fn check_links(links: &Value, findings: &mut Vec<Finding>) {
    let Some(links) = links.as_array() else {
        findings.push(vocabulary_error("/links", "'links' must be an array"));
        return;
    };

    for (index, link) in links.iter().enumerate() {
        if !link.get("href").is_some_and(Value::is_string) {
            findings.push(vocabulary_error(
                format!("/links/{}", index),
                "Link must have a string 'href'",
            ));
        }
    }
}

/// Check that `@context` names the TD vocabulary
fn check_context(document: &Value) -> Vec<Finding> {
    let message = match document.get("@context") {
        None => "Missing '@context'",
        Some(Value::String(iri)) if is_td_context(iri) => return Vec::new(),
        Some(Value::String(_)) => "'@context' must be a Thing Description context IRI",
        Some(Value::Array(entries))
            if entries
                .first()
                .and_then(Value::as_str)
                .is_some_and(is_td_context) =>
        {
            return Vec::new()
        }
        Some(Value::Array(_)) => {
            "The first '@context' entry must be a Thing Description context IRI"
        }
        Some(_) => "'@context' must be a string or an array",
    };

    let pointer = if document.get("@context").is_some() {
        "/@context"
    } else {
        ""
    };
    vec![Finding::error(ReportSlot::JsonLd, pointer, message)]
}

/// Semantic checks no schema expresses
fn check_additional(document: &Value) -> Vec<Finding> {
    let mut findings = Vec::new();
    let Some(root) = document.as_object() else {
        return findings;
    };

    if let Some(names) = root.get("security").and_then(security_names) {
        let definitions = root.get("securityDefinitions").and_then(Value::as_object);
        for name in names {
            if !definitions.is_some_and(|defs| defs.contains_key(name)) {
                findings.push(Finding::error(
                    ReportSlot::Additional,
                    "/security",
                    format!("Security scheme '{}' is not defined in 'securityDefinitions'", name),
                ));
            }
        }
    }

    for (pointer, forms) in forms_arrays(root) {
        check_repeated_forms(&pointer, forms, &mut findings);
    }

    findings
}

/// Every forms array of the document with its pointer
fn forms_arrays(root: &Map<String, Value>) -> Vec<(String, &Vec<Value>)> {
    let mut arrays = Vec::new();

    if let Some(forms) = root.get("forms").and_then(Value::as_array) {
        arrays.push(("/forms".to_string(), forms));
    }

    for collection in AFFORDANCE_COLLECTIONS {
        let Some(affordances) = root.get(*collection).and_then(Value::as_object) else {
            continue;
        };
        for (name, affordance) in affordances {
            if let Some(forms) = affordance.get("forms").and_then(Value::as_array) {
                arrays.push((
                    format!("/{}/{}/forms", collection, escape_pointer_segment(name)),
                    forms,
                ));
            }
        }
    }

    arrays
}

fn check_repeated_forms(pointer: &str, forms: &[Value], findings: &mut Vec<Finding>) {
    let mut seen = HashSet::new();

    for (index, form) in forms.iter().enumerate() {
        let form_pointer = format!("{}/{}", pointer, index);
        let ops: Vec<&str> = match form.get("op") {
            Some(Value::String(op)) => vec![op.as_str()],
            Some(Value::Array(ops)) => ops.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        };

        let mut unique: Vec<&str> = ops.clone();
        unique.sort_unstable();
        unique.dedup();
        if unique.len() != ops.len() {
            findings.push(Finding::warning(
                ReportSlot::Additional,
                format!("{}/op", form_pointer),
                "Form lists the same operation more than once",
            ));
        }

        let href = form.get("href").and_then(Value::as_str).unwrap_or_default();
        if !seen.insert((href.to_string(), unique)) {
            findings.push(Finding::warning(
                ReportSlot::Additional,
                form_pointer,
                format!("Form repeats an earlier form for '{}'", href),
            ));
        }
    }
}

/// Names listed in `security`, or `None` when the member is malformed
fn security_names(security: &Value) -> Option<Vec<&str>> {
    match security {
        Value::String(name) => Some(vec![name.as_str()]),
        Value::Array(names) => names.iter().map(Value::as_str).collect(),
        _ => None,
    }
}

fn vocabulary_error(pointer: impl Into<String>, message: impl Into<String>) -> Finding {
    Finding::error(ReportSlot::Additional, pointer, message)
}
