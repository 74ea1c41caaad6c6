//! Diagnostics module for validation and reporting

mod collector;
mod report;
mod validator;

pub use collector::{DiagnosticCollector, LineIndex};
pub use report::{CheckOutcome, Finding, ReportSlot, Severity, ValidationReport};
pub use validator::{validate_text, SchemaSet};
