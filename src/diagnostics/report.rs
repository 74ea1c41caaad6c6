//! Validation report produced by the validation task

use serde::{Deserialize, Serialize};

/// Outcome of one check
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckOutcome {
    #[default]
    NotRun,
    Passed,
    Failed,
}

/// The independent checks a report carries a slot for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportSlot {
    /// The text is well-formed JSON
    Json,
    /// The document satisfies the JSON Schemas resolved for it
    Schema,
    /// The JSON-LD context names the TD vocabulary
    JsonLd,
    /// Core vocabulary rules and semantic checks
    Additional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A single problem found by a check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub slot: ReportSlot,
    pub severity: Severity,
    pub message: String,
    /// JSON pointer of the offending member, `""` for the document root
    pub pointer: String,
    /// Exact position (line, column), when the check knows it
    pub position: Option<(u32, u32)>,
}

impl Finding {
    pub fn error(slot: ReportSlot, pointer: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            slot,
            severity: Severity::Error,
            message: message.into(),
            pointer: pointer.into(),
            position: None,
        }
    }

    pub fn warning(
        slot: ReportSlot,
        pointer: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(slot, pointer, message)
        }
    }
}

/// Result of validating one text value.
///
/// Every slot is always present; a check that could not run stays `NotRun`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub json: CheckOutcome,
    pub schema: CheckOutcome,
    pub jsonld: CheckOutcome,
    pub additional: CheckOutcome,
    pub findings: Vec<Finding>,
    /// Free-form note, e.g. why the checks did not run
    pub message: Option<String>,
}

impl ValidationReport {
    /// A report whose checks could not run at all
    pub fn not_run(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn outcome(&self, slot: ReportSlot) -> CheckOutcome {
        match slot {
            ReportSlot::Json => self.json,
            ReportSlot::Schema => self.schema,
            ReportSlot::JsonLd => self.jsonld,
            ReportSlot::Additional => self.additional,
        }
    }

    pub fn set_outcome(&mut self, slot: ReportSlot, outcome: CheckOutcome) {
        match slot {
            ReportSlot::Json => self.json = outcome,
            ReportSlot::Schema => self.schema = outcome,
            ReportSlot::JsonLd => self.jsonld = outcome,
            ReportSlot::Additional => self.additional = outcome,
        }
    }

    /// Record the findings of a check that ran; it fails on any error.
    pub fn record(&mut self, slot: ReportSlot, findings: Vec<Finding>) {
        let failed = findings
            .iter()
            .any(|f| f.slot == slot && f.severity == Severity::Error);
        self.set_outcome(
            slot,
            if failed {
                CheckOutcome::Failed
            } else {
                CheckOutcome::Passed
            },
        );
        self.findings.extend(findings);
    }

    /// Whether any check that ran failed
    pub fn has_failures(&self) -> bool {
        [
            ReportSlot::Json,
            ReportSlot::Schema,
            ReportSlot::JsonLd,
            ReportSlot::Additional,
        ]
        .into_iter()
        .any(|slot| self.outcome(slot) == CheckOutcome::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_fully_not_run() {
        let report = ValidationReport::default();
        assert_eq!(report.json, CheckOutcome::NotRun);
        assert_eq!(report.schema, CheckOutcome::NotRun);
        assert_eq!(report.jsonld, CheckOutcome::NotRun);
        assert_eq!(report.additional, CheckOutcome::NotRun);
        assert!(!report.has_failures());
    }

    #[test]
    fn test_record_warnings_pass() {
        let mut report = ValidationReport::default();
        report.record(
            ReportSlot::Additional,
            vec![Finding::warning(ReportSlot::Additional, "/forms/0", "dup")],
        );
        assert_eq!(report.additional, CheckOutcome::Passed);
        assert_eq!(report.findings.len(), 1);
    }

    #[test]
    fn test_record_errors_fail() {
        let mut report = ValidationReport::default();
        report.record(
            ReportSlot::Schema,
            vec![Finding::error(ReportSlot::Schema, "", "missing title")],
        );
        assert_eq!(report.schema, CheckOutcome::Failed);
        assert!(report.has_failures());
    }

    #[test]
    fn test_serialized_shape() {
        let report = ValidationReport::not_run("worker crashed");
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["json"], "not-run");
        assert_eq!(value["additional"], "not-run");
        assert_eq!(value["message"], "worker crashed");
    }
}
