//! Server configuration
//!
//! Every field has a default, so an empty or partial YAML file is valid.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Environment variable naming the configuration file
pub const CONFIG_ENV_VAR: &str = "TD_LSP_CONFIG";

/// JSON Schema for Thing Descriptions
pub const DEFAULT_TD_SCHEMA: &str =
    "https://raw.githubusercontent.com/w3c/wot-thing-description/main/validation/td-json-schema-validation.json";

/// JSON Schema for Thing Models
pub const DEFAULT_TM_SCHEMA: &str =
    "https://raw.githubusercontent.com/w3c/wot-thing-description/main/validation/tm-json-schema-validation.json";

const BINDINGS_BASE: &str =
    "https://raw.githubusercontent.com/w3c/wot-binding-templates/main/bindings/protocols";

/// Errors raised while loading a configuration file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Settings for schema resolution and the validation pipeline
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Base schema for Thing Descriptions
    pub td_schema: String,
    /// Base schema for Thing Models
    pub tm_schema: String,
    /// URI scheme of `base` mapped to a protocol binding schema
    pub protocol_schemas: BTreeMap<String, String>,
    /// Context IRIs that never name a schema
    pub ignored_contexts: Vec<String>,
    /// Timeout for a single schema fetch
    pub fetch_timeout_ms: u64,
    /// Quiet period before an edit starts the validation pipeline
    pub debounce_ms: u64,
    /// Drop reports produced for text older than the latest dispatch
    pub discard_stale_reports: bool,
}

impl Default for Config {
    fn default() -> Self {
        let protocol_schemas = [
            ("modbus+tcp", "modbus/modbus.schema.json"),
            ("mqtt", "mqtt/mqtt.schema.json"),
            ("mqtts", "mqtt/mqtt.schema.json"),
            ("coap", "coap/coap.schema.json"),
            ("coaps", "coap/coap.schema.json"),
        ]
        .into_iter()
        .map(|(scheme, path)| (scheme.to_string(), format!("{BINDINGS_BASE}/{path}")))
        .collect();

        Self {
            td_schema: DEFAULT_TD_SCHEMA.to_string(),
            tm_schema: DEFAULT_TM_SCHEMA.to_string(),
            protocol_schemas,
            ignored_contexts: crate::schema::vocabulary::TD_CONTEXT_IRIS
                .iter()
                .map(|iri| iri.to_string())
                .collect(),
            fetch_timeout_ms: 5_000,
            debounce_ms: 150,
            discard_stale_reports: false,
        }
    }
}

impl Config {
    /// Load a configuration file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    /// Parse a YAML configuration
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// Load the file named by `TD_LSP_CONFIG`, falling back to defaults
    pub fn from_env() -> Self {
        let Some(path) = std::env::var_os(CONFIG_ENV_VAR) else {
            return Self::default();
        };

        match Self::load(Path::new(&path)) {
            Ok(config) => {
                tracing::info!("Loaded configuration from {}", Path::new(&path).display());
                config
            }
            Err(err) => {
                tracing::warn!("Ignoring configuration: {}", err);
                Self::default()
            }
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}
