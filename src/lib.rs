//! td-lsp: LSP server library for W3C Web of Things Thing Descriptions and Thing Models
//!
//! This library provides the core functionality for the td-lsp server:
//! - A document store driven by an immutable reducer, with structural edits
//!   for forms, links and interaction affordances
//! - Schema resolution from `@context` and `base`, with a shared fetch cache,
//!   and JSON Schema validation against the resolved schemas
//! - A debounced background pipeline producing validation reports
//! - Conversion of reports to LSP diagnostics
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use serde_json::json;
//! use td_lsp::diagnostics::{validate_text, CheckOutcome, DiagnosticCollector, SchemaSet};
//! use td_lsp::schema::SchemaEntry;
//!
//! let base = "https://schemas.example/td.json";
//! let schemas = SchemaSet::new(base).with_entry(
//!     base,
//!     SchemaEntry::Fetched(Arc::new(json!({"properties": {"title": {"type": "string"}}}))),
//! );
//!
//! let text = r#"{"@context": "https://www.w3.org/2022/wot/td/v1.1", "title": 3}"#;
//! let report = validate_text(text, &schemas);
//! assert_eq!(report.json, CheckOutcome::Passed);
//! assert_eq!(report.schema, CheckOutcome::Failed);
//!
//! let mut collector = DiagnosticCollector::new();
//! collector.add_report(&report, text);
//! let diagnostics = collector.into_diagnostics();
//! assert!(!diagnostics.is_empty());
//! ```

pub mod commands;
pub mod config;
pub mod diagnostics;
pub mod document;
pub mod parser;
pub mod pipeline;
pub mod schema;
pub mod session;

mod backend;

pub use backend::{Backend, SchemasResolved, SchemasResolvedParams};
