//! Document state and its reducer
//!
//! Every change to a document goes through [`reduce`], which returns a new
//! state instead of editing the old one. [`DocumentStore`] holds the current
//! state behind an `Arc` so readers keep a consistent snapshot while the
//! single writer moves on.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::diagnostics::ValidationReport;
use crate::parser::{decode, encode};

use super::linked::{Handle, LinkedDocumentSet, LinkedEntry};
use super::mutations::{self, FormLevel, InteractionKind, MutationError};

/// Key used for a document without a title
pub const DEFAULT_TITLE: &str = "Untitled";

/// Represents the state of a Thing document
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentState {
    /// The text as typed or regenerated
    pub text: String,
    /// Decoding of `text`, or the last good decoding while `text` is invalid
    pub parsed: Value,
    pub is_valid_json: bool,
    pub is_modified: bool,
    pub name: String,
    pub handle: Option<Handle>,
    pub linked: LinkedDocumentSet,
    /// Latest report delivered by the validation pipeline
    pub report: ValidationReport,
}

impl Default for DocumentState {
    fn default() -> Self {
        Self {
            text: String::new(),
            parsed: Value::Object(Map::new()),
            is_valid_json: true,
            is_modified: false,
            name: String::new(),
            handle: None,
            linked: LinkedDocumentSet::new(),
            report: ValidationReport::default(),
        }
    }
}

impl DocumentState {
    /// Create the empty session document
    pub fn new() -> Self {
        Self::default()
    }

    /// Title of the parsed document, or the default title
    pub fn title(&self) -> &str {
        self.parsed
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_TITLE)
    }
}

/// A change to the document
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Replace the text; `active` names the linked document the caller has
    /// selected, if any
    SetText {
        text: String,
        active: Option<String>,
    },
    SetModified(bool),
    SetName(String),
    SetHandle(Option<Handle>),
    /// Add or replace a linked document and make it active
    LinkDocument { key: String, entry: LinkedEntry },
    SelectLinkedDocument(String),
    AddForm {
        level: FormLevel,
        entity: String,
        form: Value,
    },
    RemoveForm {
        level: FormLevel,
        entity: String,
        form: Value,
        index: usize,
    },
    AddLink(Value),
    /// Remove the link at `index`, checked against `expected` when given
    RemoveLink {
        index: usize,
        expected: Option<Value>,
    },
    RemoveNamedEntity {
        kind: InteractionKind,
        name: String,
    },
    DuplicateNamedEntity {
        kind: InteractionKind,
        name: String,
    },
    UpdateValidationReport(ValidationReport),
}

impl Event {
    /// Text edit without a linked document selection
    pub fn set_text(text: impl Into<String>) -> Self {
        Event::SetText {
            text: text.into(),
            active: None,
        }
    }

    /// Whether the event can change the text
    pub fn edits_text(&self) -> bool {
        !matches!(
            self,
            Event::SetModified(_)
                | Event::SetName(_)
                | Event::SetHandle(_)
                | Event::LinkDocument { .. }
                | Event::SelectLinkedDocument(_)
                | Event::UpdateValidationReport(_)
        )
    }

    fn name(&self) -> &'static str {
        match self {
            Event::SetText { .. } => "SetText",
            Event::SetModified(_) => "SetModified",
            Event::SetName(_) => "SetName",
            Event::SetHandle(_) => "SetHandle",
            Event::LinkDocument { .. } => "LinkDocument",
            Event::SelectLinkedDocument(_) => "SelectLinkedDocument",
            Event::AddForm { .. } => "AddForm",
            Event::RemoveForm { .. } => "RemoveForm",
            Event::AddLink(_) => "AddLink",
            Event::RemoveLink { .. } => "RemoveLink",
            Event::RemoveNamedEntity { .. } => "RemoveNamedEntity",
            Event::DuplicateNamedEntity { .. } => "DuplicateNamedEntity",
            Event::UpdateValidationReport(_) => "UpdateValidationReport",
        }
    }
}

/// Compute the state that follows `event`.
///
/// Only structural edits can fail; on failure the caller keeps `state`.
pub fn reduce(state: &DocumentState, event: Event) -> Result<DocumentState, MutationError> {
    tracing::debug!("Applying {}", event.name());

    match event {
        Event::SetText { text, active } => Ok(set_text(state, text, active.as_deref())),
        Event::SetModified(is_modified) => Ok(DocumentState {
            is_modified,
            ..state.clone()
        }),
        Event::SetName(name) => Ok(DocumentState {
            name,
            ..state.clone()
        }),
        Event::SetHandle(handle) => Ok(DocumentState {
            handle,
            ..state.clone()
        }),
        Event::LinkDocument { key, entry } => {
            let mut next = state.clone();
            next.linked.insert(key.clone(), entry);
            next.linked.select(&key);
            Ok(next)
        }
        Event::SelectLinkedDocument(key) => {
            let mut next = state.clone();
            if !next.linked.select(&key) {
                tracing::debug!("No linked document '{}'", key);
            }
            Ok(next)
        }
        Event::AddForm {
            level,
            entity,
            form,
        } => mutate(state, |doc| mutations::add_form(doc, level, &entity, form)),
        Event::RemoveForm {
            level,
            entity,
            form,
            index,
        } => mutate(state, |doc| {
            mutations::remove_form(doc, level, &entity, &form, index)
        }),
        Event::AddLink(link) => mutate(state, |doc| mutations::add_link(doc, link)),
        Event::RemoveLink { index, expected } => mutate(state, |doc| {
            mutations::remove_link(doc, index, expected.as_ref())
        }),
        Event::RemoveNamedEntity { kind, name } => {
            mutate(state, |doc| mutations::remove_entity(doc, kind, &name))
        }
        Event::DuplicateNamedEntity { kind, name } => mutate(state, |doc| {
            mutations::duplicate_entity(doc, kind, &name).map(|copy| {
                tracing::debug!("Duplicated {} '{}' as '{}'", kind, name, copy);
                true
            })
        }),
        Event::UpdateValidationReport(report) => Ok(DocumentState {
            report,
            ..state.clone()
        }),
    }
}

fn set_text(state: &DocumentState, text: String, active: Option<&str>) -> DocumentState {
    if text == state.text {
        return state.clone();
    }

    let mut next = DocumentState {
        text,
        is_modified: true,
        ..state.clone()
    };

    match decode(&next.text) {
        Ok(parsed) => {
            next.parsed = parsed;
            next.is_valid_json = true;
            let title = next.title().to_string();
            next.linked.sync_active(&title, &next.parsed, active);
        }
        Err(err) => {
            tracing::debug!("Document text is not valid JSON: {}", err);
            next.is_valid_json = false;
        }
    }

    next
}

/// Run a structural edit on a copy of the parsed document and write the
/// result back through the text path.
fn mutate<F>(state: &DocumentState, edit: F) -> Result<DocumentState, MutationError>
where
    F: FnOnce(&mut Value) -> Result<bool, MutationError>,
{
    if !state.is_valid_json {
        tracing::debug!("Skipping structural edit on invalid document");
        return Ok(state.clone());
    }

    let mut document = state.parsed.clone();
    if !edit(&mut document)? {
        return Ok(state.clone());
    }

    let text = encode(&document).map_err(|err| MutationError::Serialize(err.to_string()))?;
    Ok(set_text(state, text, None))
}

/// Owner of the current document state
#[derive(Debug, Clone, Default)]
pub struct DocumentStore {
    state: Arc<DocumentState>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current state
    pub fn state(&self) -> &DocumentState {
        &self.state
    }

    /// A shared handle on the current state that later events do not affect
    pub fn snapshot(&self) -> Arc<DocumentState> {
        Arc::clone(&self.state)
    }

    /// Apply `event`; on error the current state is kept
    pub fn dispatch(&mut self, event: Event) -> Result<(), MutationError> {
        let next = reduce(&self.state, event)?;
        self.state = Arc::new(next);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    const LAMP: &str = r#"{"title":"Lamp","properties":{"on":{"forms":[{"href":"/on","op":["readproperty","writeproperty"]}]}}}"#;

    fn store_with(text: &str) -> DocumentStore {
        let mut store = DocumentStore::new();
        store.dispatch(Event::set_text(text)).unwrap();
        store
    }

    #[test]
    fn test_set_valid_text() {
        let store = store_with(LAMP);
        let state = store.state();

        assert!(state.is_valid_json);
        assert!(state.is_modified);
        assert_eq!(state.parsed, serde_json::from_str::<Value>(LAMP).unwrap());
        assert_eq!(state.linked.active(), Some("Lamp"));
    }

    #[test]
    fn test_invalid_text_keeps_parsed() {
        let mut store = store_with(LAMP);
        let before = store.state().parsed.clone();

        store.dispatch(Event::set_text("{\"title\": ")).unwrap();

        let state = store.state();
        assert!(!state.is_valid_json);
        assert!(state.is_modified);
        assert_eq!(state.parsed, before);
        assert_eq!(state.text, "{\"title\": ");
    }

    #[test]
    fn test_same_text_is_noop() {
        let mut store = store_with(LAMP);
        store.dispatch(Event::SetModified(false)).unwrap();
        let before = store.state().clone();

        store.dispatch(Event::set_text(LAMP)).unwrap();

        assert_eq!(*store.state(), before);
        assert!(!store.state().is_modified);
    }

    #[test]
    fn test_empty_text_is_empty_document() {
        let mut store = store_with(LAMP);
        store.dispatch(Event::set_text("")).unwrap();

        let state = store.state();
        assert!(state.is_valid_json);
        assert!(state.is_modified);
        assert_eq!(state.parsed, json!({}));
    }

    #[test]
    fn test_default_title_seeds_linked_set() {
        let store = store_with(r#"{"properties": {}}"#);
        assert_eq!(store.state().linked.active(), Some(DEFAULT_TITLE));
    }

    #[test]
    fn test_selected_linked_document_follows_title() {
        let mut store = store_with(LAMP);
        store
            .dispatch(Event::LinkDocument {
                key: "Fan".to_string(),
                entry: LinkedEntry::Inline(json!({"title": "Fan"})),
            })
            .unwrap();

        store
            .dispatch(Event::SetText {
                text: r#"{"title": "Ceiling fan"}"#.to_string(),
                active: Some("Fan".to_string()),
            })
            .unwrap();

        let keys: Vec<&str> = store.state().linked.keys().collect();
        assert_eq!(keys, ["Lamp", "Ceiling fan"]);
        assert_eq!(store.state().linked.active(), Some("Ceiling fan"));
    }

    #[test]
    fn test_remove_form_regenerates_text() {
        let mut store = store_with(LAMP);
        store.dispatch(Event::SetModified(false)).unwrap();

        store
            .dispatch(Event::RemoveForm {
                level: FormLevel::Properties,
                entity: "on".to_string(),
                form: json!({"href": "/on", "op": "writeproperty"}),
                index: 0,
            })
            .unwrap();

        let state = store.state();
        assert_eq!(
            state.parsed["properties"]["on"]["forms"],
            json!([{"href": "/on", "op": ["readproperty"]}])
        );
        assert_eq!(state.text, encode(&state.parsed).unwrap());
        assert!(state.text.starts_with("{\n  \"title\": \"Lamp\""));
        assert!(state.is_modified);
    }

    #[test]
    fn test_failed_mutation_keeps_state() {
        let mut store = store_with(LAMP);
        let before = store.snapshot();

        let err = store
            .dispatch(Event::RemoveNamedEntity {
                kind: InteractionKind::Properties,
                name: "brightness".to_string(),
            })
            .unwrap_err();

        assert_matches!(err, MutationError::EntityNotFound { .. });
        assert_eq!(*store.state(), *before);
    }

    #[test]
    fn test_mutation_on_invalid_document_is_noop() {
        let mut store = store_with("{ broken");
        let before = store.state().clone();

        store.dispatch(Event::AddLink(json!({"href": "/a"}))).unwrap();

        assert_eq!(*store.state(), before);
    }

    #[test]
    fn test_validation_report_does_not_touch_text() {
        let mut store = store_with(LAMP);
        store.dispatch(Event::SetModified(false)).unwrap();

        let report = ValidationReport::not_run("pending");
        store
            .dispatch(Event::UpdateValidationReport(report.clone()))
            .unwrap();

        let state = store.state();
        assert_eq!(state.report, report);
        assert_eq!(state.text, LAMP);
        assert!(!state.is_modified);
    }

    #[test]
    fn test_snapshot_is_stable() {
        let mut store = store_with(LAMP);
        let snapshot = store.snapshot();

        store.dispatch(Event::SetName("lamp.td.json".to_string())).unwrap();

        assert_eq!(snapshot.name, "");
        assert_eq!(store.state().name, "lamp.td.json");
    }

    #[test]
    fn test_duplicate_entity_event() {
        let mut store = store_with(LAMP);
        store
            .dispatch(Event::DuplicateNamedEntity {
                kind: InteractionKind::Properties,
                name: "on".to_string(),
            })
            .unwrap();

        let properties = store.state().parsed["properties"].as_object().unwrap();
        assert!(properties.contains_key("on_copy"));
    }
}
