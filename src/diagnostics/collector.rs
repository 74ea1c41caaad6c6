//! Conversion of validation reports into LSP diagnostics

use serde_json::Value;
use tower_lsp::lsp_types::{Diagnostic, DiagnosticSeverity, NumberOrString, Position, Range};

use crate::parser::decode;

use super::report::{Finding, ReportSlot, Severity, ValidationReport};

const SOURCE: &str = "td-lsp";

/// Collects diagnostics for one document
#[derive(Debug, Default)]
pub struct DiagnosticCollector {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticCollector {
    /// Create a new empty collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an error diagnostic
    pub fn add_error(&mut self, message: String, line: u32, column: u32, code: Option<&str>) {
        self.push(DiagnosticSeverity::ERROR, message, line, column, code);
    }

    /// Add a warning diagnostic
    pub fn add_warning(&mut self, message: String, line: u32, column: u32, code: Option<&str>) {
        self.push(DiagnosticSeverity::WARNING, message, line, column, code);
    }

    /// Add every finding of `report`, locating pointers inside `text`
    pub fn add_report(&mut self, report: &ValidationReport, text: &str) {
        let line_index = LineIndex::new(text);

        for finding in &report.findings {
            let (line, column) = finding
                .position
                .unwrap_or_else(|| (line_index.locate(&finding.pointer), 0));
            let code = Some(slot_code(finding));

            match finding.severity {
                Severity::Error => self.add_error(finding.message.clone(), line, column, code),
                Severity::Warning => self.add_warning(finding.message.clone(), line, column, code),
            }
        }
    }

    /// Convert into the final list of diagnostics
    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    fn push(
        &mut self,
        severity: DiagnosticSeverity,
        message: String,
        line: u32,
        column: u32,
        code: Option<&str>,
    ) {
        self.diagnostics.push(Diagnostic {
            range: Range {
                start: Position {
                    line,
                    character: column,
                },
                end: Position {
                    line,
                    character: column,
                },
            },
            severity: Some(severity),
            code: code.map(|code| NumberOrString::String(code.to_string())),
            code_description: None,
            source: Some(SOURCE.to_string()),
            message,
            related_information: None,
            tags: None,
            data: None,
        });
    }
}

fn slot_code(finding: &Finding) -> &'static str {
    match finding.slot {
        ReportSlot::Json => "json",
        ReportSlot::Schema => "schema",
        ReportSlot::JsonLd => "jsonld",
        ReportSlot::Additional => "additional",
    }
}

/// Simple line index for finding member positions in text
pub struct LineIndex {
    lines: Vec<String>,
    /// Decoded text, used to tell array indices from object keys
    document: Option<Value>,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        Self {
            lines: text.lines().map(|l| l.to_string()).collect(),
            document: decode(text).ok(),
        }
    }

    /// Find the first line at or after `from` that declares member `key`
    fn find_key(&self, key: &str, from: usize) -> Option<usize> {
        let quoted = format!("\"{}\"", key);
        self.lines
            .iter()
            .enumerate()
            .skip(from)
            .find(|(_, line)| {
                line.match_indices(&quoted).any(|(start, _)| {
                    line[start + quoted.len()..].trim_start().starts_with(':')
                })
            })
            .map(|(i, _)| i)
    }

    /// Line of the member a JSON pointer designates.
    ///
    /// Object keys are searched in order, each one after the line of its
    /// parent; array indices are skipped, so an element resolves to the
    /// line of its enclosing member. Without a decoded document every
    /// numeric segment counts as an index.
    pub fn locate(&self, pointer: &str) -> u32 {
        let mut line = 0usize;
        let mut node = self.document.as_ref();

        for segment in pointer.split('/').skip(1) {
            let key = segment.replace("~1", "/").replace("~0", "~");
            let is_index = match node {
                Some(Value::Array(_)) => true,
                Some(_) => false,
                None => key.parse::<usize>().is_ok(),
            };
            node = node.and_then(|value| match value {
                Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
                Value::Object(members) => members.get(&key),
                _ => None,
            });

            if is_index {
                continue;
            }
            match self.find_key(&key, line) {
                Some(found) => line = found,
                None => break,
            }
        }

        u32::try_from(line).unwrap_or(u32::MAX)
    }
}
