//! Structural edit operations on a Thing document
//!
//! Each operation works on the decoded document and reports whether it
//! changed anything. Preconditions that make an edit impossible are
//! `MutationError`s; the caller applies operations to a copy, so a failed
//! operation never leaves a partial edit behind.
//!
//! Invariants kept here:
//! - `forms` and `links` stay arrays; an existing non-array member is never
//!   overwritten
//! - a form never keeps an empty `op` array; it is removed instead
//! - removal of named interactions keeps the order of the remaining ones

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Top-level interaction affordance collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionKind {
    Properties,
    Actions,
    Events,
}

impl InteractionKind {
    /// Name of the collection member at the document root
    pub fn collection(self) -> &'static str {
        match self {
            InteractionKind::Properties => "properties",
            InteractionKind::Actions => "actions",
            InteractionKind::Events => "events",
        }
    }

    fn singular(self) -> &'static str {
        match self {
            InteractionKind::Properties => "Property",
            InteractionKind::Actions => "Action",
            InteractionKind::Events => "Event",
        }
    }
}

impl fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.singular())
    }
}

/// Where a form lives: the document root or a named interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormLevel {
    Thing,
    Properties,
    Actions,
    Events,
}

impl FormLevel {
    pub fn interaction(self) -> Option<InteractionKind> {
        match self {
            FormLevel::Thing => None,
            FormLevel::Properties => Some(InteractionKind::Properties),
            FormLevel::Actions => Some(InteractionKind::Actions),
            FormLevel::Events => Some(InteractionKind::Events),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MutationError {
    #[error("Document root is not a JSON object")]
    NotAnObject,

    #[error("{kind} '{name}' does not exist")]
    EntityNotFound { kind: InteractionKind, name: String },

    #[error("Document has no '{0}'")]
    MissingCollection(&'static str),

    #[error("Link index {index} is out of range ({len} links)")]
    LinkIndexOutOfRange { index: usize, len: usize },

    #[error("The link to remove is no longer in the document")]
    LinkNotFound,

    #[error("Cannot serialize document: {0}")]
    Serialize(String),
}

/// Append `form` to the forms of the root or of an existing interaction.
///
/// A missing `forms` member is created; a non-array one is left alone.
pub fn add_form(
    document: &mut Value,
    level: FormLevel,
    entity: &str,
    form: Value,
) -> Result<bool, MutationError> {
    let root = document.as_object_mut().ok_or(MutationError::NotAnObject)?;
    let owner = match level.interaction() {
        None => root,
        Some(kind) => interaction_mut(root, kind, entity).ok_or_else(|| {
            MutationError::EntityNotFound {
                kind,
                name: entity.to_string(),
            }
        })?,
    };

    match owner
        .entry("forms")
        .or_insert_with(|| Value::Array(Vec::new()))
    {
        Value::Array(forms) => {
            forms.push(form);
            Ok(true)
        }
        _ => Ok(false),
    }
}

/// Remove the operations of `to_delete` from the form at `index`.
///
/// Each named operation removes one matching entry. Operations are matched
/// by name, never by `href`. A form left without
/// operations is removed, as is a form whose scalar `op` matches. A missing
/// forms array or an out-of-range index is a no-op.
pub fn remove_form(
    document: &mut Value,
    level: FormLevel,
    entity: &str,
    to_delete: &Value,
    index: usize,
) -> Result<bool, MutationError> {
    let Some(forms) = forms_mut(document, level, entity) else {
        return Ok(false);
    };
    let Some(form) = forms.get_mut(index) else {
        return Ok(false);
    };

    let targets = operation_names(to_delete.get("op"));
    let remove_whole = match form.get_mut("op") {
        Some(Value::Array(ops)) => {
            let before = ops.len();
            for target in &targets {
                if let Some(position) = ops.iter().position(|op| op.as_str() == Some(*target)) {
                    ops.remove(position);
                }
            }
            if ops.len() == before {
                return Ok(false);
            }
            ops.is_empty()
        }
        Some(Value::String(op)) if targets.contains(&op.as_str()) => true,
        None if targets.is_empty() => true,
        _ => return Ok(false),
    };

    if remove_whole {
        forms.remove(index);
    }
    Ok(true)
}

/// Append a link to the root `links` array
pub fn add_link(document: &mut Value, link: Value) -> Result<bool, MutationError> {
    let root = document.as_object_mut().ok_or(MutationError::NotAnObject)?;
    match root
        .entry("links")
        .or_insert_with(|| Value::Array(Vec::new()))
    {
        Value::Array(links) => {
            links.push(link);
            Ok(true)
        }
        _ => Ok(false),
    }
}

/// Remove the link at `index`.
///
/// When `expected` is given the index is checked against it first; if the
/// list changed since the index was taken, the link is looked up by value.
pub fn remove_link(
    document: &mut Value,
    index: usize,
    expected: Option<&Value>,
) -> Result<bool, MutationError> {
    let links = document
        .get_mut("links")
        .and_then(Value::as_array_mut)
        .ok_or(MutationError::MissingCollection("links"))?;

    let index = match expected {
        Some(expected) if links.get(index) != Some(expected) => links
            .iter()
            .position(|link| link == expected)
            .ok_or(MutationError::LinkNotFound)?,
        Some(_) => index,
        None if index < links.len() => index,
        None => {
            return Err(MutationError::LinkIndexOutOfRange {
                index,
                len: links.len(),
            })
        }
    };

    links.remove(index);
    Ok(true)
}

/// Delete a named interaction, keeping the order of the others
pub fn remove_entity(
    document: &mut Value,
    kind: InteractionKind,
    name: &str,
) -> Result<bool, MutationError> {
    let collection = collection_mut(document, kind)?;
    match collection.shift_remove(name) {
        Some(_) => Ok(true),
        None => Err(MutationError::EntityNotFound {
            kind,
            name: name.to_string(),
        }),
    }
}

/// Copy a named interaction under the first free `<name>_copy<n>` key.
///
/// Returns the new name.
pub fn duplicate_entity(
    document: &mut Value,
    kind: InteractionKind,
    name: &str,
) -> Result<String, MutationError> {
    let collection = collection_mut(document, kind)?;
    let copy = collection
        .get(name)
        .cloned()
        .ok_or_else(|| MutationError::EntityNotFound {
            kind,
            name: name.to_string(),
        })?;

    let mut candidate = format!("{name}_copy");
    let mut counter = 2;
    while collection.contains_key(&candidate) {
        candidate = format!("{name}_copy{counter}");
        counter += 1;
    }

    collection.insert(candidate.clone(), copy);
    Ok(candidate)
}

fn collection_mut(
    document: &mut Value,
    kind: InteractionKind,
) -> Result<&mut Map<String, Value>, MutationError> {
    document
        .get_mut(kind.collection())
        .and_then(Value::as_object_mut)
        .ok_or(MutationError::MissingCollection(kind.collection()))
}

fn interaction_mut<'a>(
    root: &'a mut Map<String, Value>,
    kind: InteractionKind,
    name: &str,
) -> Option<&'a mut Map<String, Value>> {
    root.get_mut(kind.collection())?
        .get_mut(name)?
        .as_object_mut()
}

fn forms_mut<'a>(
    document: &'a mut Value,
    level: FormLevel,
    entity: &str,
) -> Option<&'a mut Vec<Value>> {
    let root = document.as_object_mut()?;
    let owner = match level.interaction() {
        None => root,
        Some(kind) => interaction_mut(root, kind, entity)?,
    };
    owner.get_mut("forms")?.as_array_mut()
}

/// Operation names of an `op` member, scalar or array
fn operation_names(op: Option<&Value>) -> Vec<&str> {
    match op {
        Some(Value::String(op)) => vec![op.as_str()],
        Some(Value::Array(ops)) => ops.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn lamp() -> Value {
        json!({
            "title": "Lamp",
            "properties": {
                "on": {"forms": [{"href": "/on", "op": ["readproperty", "writeproperty"]}]},
                "brightness": {"forms": [{"href": "/brightness", "op": "readproperty"}]}
            },
            "actions": {"toggle": {"forms": [{"href": "/toggle"}]}}
        })
    }

    #[test]
    fn test_remove_one_of_several_operations() {
        let mut doc = lamp();
        let changed = remove_form(
            &mut doc,
            FormLevel::Properties,
            "on",
            &json!({"href": "/on", "op": "writeproperty"}),
            0,
        )
        .unwrap();

        assert!(changed);
        assert_eq!(
            doc["properties"]["on"]["forms"],
            json!([{"href": "/on", "op": ["readproperty"]}])
        );
    }

    #[test]
    fn test_remove_last_operation_removes_form() {
        let mut doc = lamp();
        for op in ["writeproperty", "readproperty"] {
            remove_form(
                &mut doc,
                FormLevel::Properties,
                "on",
                &json!({"href": "/on", "op": op}),
                0,
            )
            .unwrap();
        }

        assert_eq!(doc["properties"]["on"]["forms"], json!([]));
    }

    #[test]
    fn test_remove_drops_a_single_repeated_operation() {
        let mut doc = json!({"properties": {"on": {"forms": [
            {"href": "/on", "op": ["readproperty", "readproperty"]}
        ]}}});
        let to_delete = json!({"href": "/on", "op": "readproperty"});

        assert!(remove_form(&mut doc, FormLevel::Properties, "on", &to_delete, 0).unwrap());
        assert_eq!(
            doc["properties"]["on"]["forms"],
            json!([{"href": "/on", "op": ["readproperty"]}])
        );
    }

    #[test]
    fn test_remove_scalar_operation() {
        let mut doc = lamp();
        let to_delete = json!({"href": "/brightness", "op": "readproperty"});
        assert!(remove_form(&mut doc, FormLevel::Properties, "brightness", &to_delete, 0).unwrap());
        assert_eq!(doc["properties"]["brightness"]["forms"], json!([]));
    }

    #[test]
    fn test_remove_matches_operation_not_href() {
        let mut doc = lamp();
        let to_delete = json!({"href": "/on", "op": "observeproperty"});
        assert!(!remove_form(&mut doc, FormLevel::Properties, "on", &to_delete, 0).unwrap());
        assert_eq!(doc, lamp());
    }

    #[test]
    fn test_remove_form_without_operations() {
        let mut doc = lamp();
        assert!(remove_form(&mut doc, FormLevel::Actions, "toggle", &json!({"href": "/toggle"}), 0).unwrap());
        assert_eq!(doc["actions"]["toggle"]["forms"], json!([]));
    }

    #[test]
    fn test_remove_form_noops() {
        let mut doc = lamp();
        let to_delete = json!({"href": "/on", "op": "readproperty"});
        assert!(!remove_form(&mut doc, FormLevel::Properties, "on", &to_delete, 5).unwrap());
        assert!(!remove_form(&mut doc, FormLevel::Properties, "off", &to_delete, 0).unwrap());
        assert!(!remove_form(&mut doc, FormLevel::Thing, "", &to_delete, 0).unwrap());
        assert_eq!(doc, lamp());
    }

    #[test]
    fn test_add_then_remove_restores_forms() {
        let mut doc = lamp();
        let form = json!({"href": "/on/observe", "op": ["observeproperty", "unobserveproperty"]});

        assert!(add_form(&mut doc, FormLevel::Properties, "on", form.clone()).unwrap());
        assert_eq!(doc["properties"]["on"]["forms"].as_array().unwrap().len(), 2);

        assert!(remove_form(&mut doc, FormLevel::Properties, "on", &form, 1).unwrap());
        assert_eq!(doc, lamp());
    }

    #[test]
    fn test_add_form_to_root_creates_array() {
        let mut doc = lamp();
        let form = json!({"href": "/all", "op": "readallproperties"});
        assert!(add_form(&mut doc, FormLevel::Thing, "", form.clone()).unwrap());
        assert_eq!(doc["forms"], json!([form]));
    }

    #[test]
    fn test_add_form_keeps_non_array_member() {
        let mut doc = json!({"forms": "broken"});
        assert!(!add_form(&mut doc, FormLevel::Thing, "", json!({"href": "/"})).unwrap());
        assert_eq!(doc, json!({"forms": "broken"}));
    }

    #[test]
    fn test_add_form_requires_entity() {
        let mut doc = lamp();
        let err = add_form(&mut doc, FormLevel::Events, "overheat", json!({"href": "/x"})).unwrap_err();
        assert_matches!(err, MutationError::EntityNotFound { kind: InteractionKind::Events, .. });
        assert_eq!(err.to_string(), "Event 'overheat' does not exist");
    }

    #[test]
    fn test_add_form_entity_without_forms() {
        let mut doc = json!({"events": {"overheat": {}}});
        assert!(add_form(&mut doc, FormLevel::Events, "overheat", json!({"href": "/x"})).unwrap());
        assert_eq!(doc["events"]["overheat"]["forms"], json!([{"href": "/x"}]));
    }

    #[test]
    fn test_links() {
        let mut doc = lamp();
        assert!(add_link(&mut doc, json!({"href": "/a"})).unwrap());
        assert!(add_link(&mut doc, json!({"href": "/b"})).unwrap());
        assert!(remove_link(&mut doc, 0, None).unwrap());
        assert_eq!(doc["links"], json!([{"href": "/b"}]));

        let err = remove_link(&mut doc, 3, None).unwrap_err();
        assert_eq!(err, MutationError::LinkIndexOutOfRange { index: 3, len: 1 });
    }

    #[test]
    fn test_remove_link_revalidates_index() {
        let mut doc = json!({"links": [{"href": "/a"}, {"href": "/b"}, {"href": "/c"}]});

        // /a was removed elsewhere after the caller captured index 2 for /c
        remove_link(&mut doc, 0, None).unwrap();
        assert!(remove_link(&mut doc, 2, Some(&json!({"href": "/c"}))).unwrap());
        assert_eq!(doc["links"], json!([{"href": "/b"}]));

        let err = remove_link(&mut doc, 0, Some(&json!({"href": "/zzz"}))).unwrap_err();
        assert_eq!(err, MutationError::LinkNotFound);
    }

    #[test]
    fn test_remove_link_without_links() {
        let mut doc = lamp();
        assert_eq!(
            remove_link(&mut doc, 0, None).unwrap_err(),
            MutationError::MissingCollection("links")
        );
    }

    #[test]
    fn test_remove_entity_keeps_order() {
        let mut doc = json!({"properties": {"a": {}, "b": {}, "c": {}}});
        assert!(remove_entity(&mut doc, InteractionKind::Properties, "a").unwrap());
        let keys: Vec<&String> = doc["properties"].as_object().unwrap().keys().collect();
        assert_eq!(keys, ["b", "c"]);

        assert_matches!(
            remove_entity(&mut doc, InteractionKind::Properties, "a"),
            Err(MutationError::EntityNotFound { .. })
        );
        assert_matches!(
            remove_entity(&mut doc, InteractionKind::Events, "a"),
            Err(MutationError::MissingCollection("events"))
        );
    }

    #[test]
    fn test_duplicate_entity() {
        let mut doc = lamp();
        let first = duplicate_entity(&mut doc, InteractionKind::Actions, "toggle").unwrap();
        let second = duplicate_entity(&mut doc, InteractionKind::Actions, "toggle").unwrap();

        assert_eq!(first, "toggle_copy");
        assert_eq!(second, "toggle_copy2");
        assert_eq!(doc["actions"]["toggle_copy2"], doc["actions"]["toggle"]);
    }

    #[test]
    fn test_non_object_root() {
        let mut doc = json!([1, 2]);
        assert_eq!(
            add_link(&mut doc, json!({})).unwrap_err(),
            MutationError::NotAnObject
        );
    }
}
