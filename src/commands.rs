//! `workspace/executeCommand` requests for structural edits
//!
//! Each command takes a single object argument holding the document `uri`
//! and the parameters of the edit, e.g.
//!
//! ```json
//! {"uri": "file:///lamp.td.json", "level": "properties", "entity": "on",
//!  "form": {"href": "/on", "op": "writeproperty"}, "index": 0}
//! ```

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tower_lsp::lsp_types::Url;

use crate::document::{Event, FormLevel, InteractionKind};

pub const ADD_FORM: &str = "td.addForm";
pub const REMOVE_FORM: &str = "td.removeForm";
pub const ADD_LINK: &str = "td.addLink";
pub const REMOVE_LINK: &str = "td.removeLink";
pub const REMOVE_ENTITY: &str = "td.removeEntity";
pub const DUPLICATE_ENTITY: &str = "td.duplicateEntity";

/// Every command the server advertises
pub const COMMANDS: &[&str] = &[
    ADD_FORM,
    REMOVE_FORM,
    ADD_LINK,
    REMOVE_LINK,
    REMOVE_ENTITY,
    DUPLICATE_ENTITY,
];

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Unknown command '{0}'")]
    Unknown(String),

    #[error("Command '{0}' expects one object argument")]
    MissingArgument(String),

    #[error("Invalid arguments for '{command}': {source}")]
    InvalidArguments {
        command: String,
        #[source]
        source: serde_json::Error,
    },
}

/// A structural edit addressed to one document
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub uri: Url,
    pub event: Event,
}

#[derive(Deserialize)]
struct Target<T> {
    uri: Url,
    #[serde(flatten)]
    params: T,
}

#[derive(Deserialize)]
struct AddFormParams {
    level: FormLevel,
    #[serde(default)]
    entity: String,
    form: Value,
}

#[derive(Deserialize)]
struct RemoveFormParams {
    level: FormLevel,
    #[serde(default)]
    entity: String,
    form: Value,
    index: usize,
}

#[derive(Deserialize)]
struct AddLinkParams {
    link: Value,
}

#[derive(Deserialize)]
struct RemoveLinkParams {
    index: usize,
    #[serde(default)]
    link: Option<Value>,
}

#[derive(Deserialize)]
struct EntityParams {
    kind: InteractionKind,
    name: String,
}

/// Turn a command and its arguments into a store event
pub fn parse_command(command: &str, arguments: Vec<Value>) -> Result<Command, CommandError> {
    let (uri, event) = match command {
        ADD_FORM => {
            let (uri, p) = parse_target::<AddFormParams>(command, arguments)?;
            (
                uri,
                Event::AddForm {
                    level: p.level,
                    entity: p.entity,
                    form: p.form,
                },
            )
        }
        REMOVE_FORM => {
            let (uri, p) = parse_target::<RemoveFormParams>(command, arguments)?;
            (
                uri,
                Event::RemoveForm {
                    level: p.level,
                    entity: p.entity,
                    form: p.form,
                    index: p.index,
                },
            )
        }
        ADD_LINK => {
            let (uri, p) = parse_target::<AddLinkParams>(command, arguments)?;
            (uri, Event::AddLink(p.link))
        }
        REMOVE_LINK => {
            let (uri, p) = parse_target::<RemoveLinkParams>(command, arguments)?;
            (
                uri,
                Event::RemoveLink {
                    index: p.index,
                    expected: p.link,
                },
            )
        }
        REMOVE_ENTITY => {
            let (uri, p) = parse_target::<EntityParams>(command, arguments)?;
            (
                uri,
                Event::RemoveNamedEntity {
                    kind: p.kind,
                    name: p.name,
                },
            )
        }
        DUPLICATE_ENTITY => {
            let (uri, p) = parse_target::<EntityParams>(command, arguments)?;
            (
                uri,
                Event::DuplicateNamedEntity {
                    kind: p.kind,
                    name: p.name,
                },
            )
        }
        _ => return Err(CommandError::Unknown(command.to_string())),
    };

    Ok(Command { uri, event })
}

fn parse_target<T: DeserializeOwned>(
    command: &str,
    arguments: Vec<Value>,
) -> Result<(Url, T), CommandError> {
    let argument = arguments
        .into_iter()
        .next()
        .ok_or_else(|| CommandError::MissingArgument(command.to_string()))?;

    let target: Target<T> =
        serde_json::from_value(argument).map_err(|source| CommandError::InvalidArguments {
            command: command.to_string(),
            source,
        })?;
    Ok((target.uri, target.params))
}
