//! One edited document: its store and the coordinator guarding its pipeline

use crate::diagnostics::ValidationReport;
use crate::document::{DocumentState, DocumentStore, Event, MutationError};
use crate::pipeline::{DebounceCoordinator, Ticket};

#[derive(Debug)]
pub struct Session {
    store: DocumentStore,
    coordinator: DebounceCoordinator,
    /// Editor version of the text, if the client tracks one
    version: Option<i32>,
}

impl Session {
    pub fn new(coordinator: DebounceCoordinator) -> Self {
        Self {
            store: DocumentStore::new(),
            coordinator,
            version: None,
        }
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn state(&self) -> &DocumentState {
        self.store.state()
    }

    pub fn version(&self) -> Option<i32> {
        self.version
    }

    pub fn set_version(&mut self, version: Option<i32>) {
        self.version = version;
    }

    /// Apply an event to the store.
    ///
    /// Returns a ticket when the resulting text has to go through the
    /// pipeline. Validation reports never produce one.
    pub fn apply(&mut self, event: Event) -> Result<Option<Ticket>, MutationError> {
        let edits_text = event.edits_text();
        self.store.dispatch(event)?;

        if !edits_text {
            return Ok(None);
        }
        Ok(self.coordinator.schedule(&self.store.state().text))
    }

    /// Store a report delivered for pipeline run `sequence`.
    ///
    /// Returns false when the coordinator discards it as stale.
    pub fn deliver_report(&mut self, sequence: u64, report: ValidationReport) -> bool {
        if !self.coordinator.accepts(sequence) {
            tracing::debug!(
                "Discarding report {} (latest {})",
                sequence,
                self.coordinator.latest()
            );
            return false;
        }
        self.store
            .dispatch(Event::UpdateValidationReport(report))
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CheckOutcome;
    use crate::document::{FormLevel, InteractionKind};
    use serde_json::json;
    use std::time::Duration;

    fn session(discard_stale: bool) -> Session {
        Session::new(DebounceCoordinator::new(Duration::ZERO, discard_stale))
    }

    #[test]
    fn test_text_edit_schedules_once() {
        let mut session = session(false);
        let ticket = session.apply(Event::set_text("{}")).unwrap();
        assert_eq!(ticket.map(|t| t.sequence()), Some(1));

        assert!(session.apply(Event::set_text("{}")).unwrap().is_none());
        assert!(session.apply(Event::SetModified(false)).unwrap().is_none());
    }

    #[test]
    fn test_invalid_text_is_still_scheduled() {
        let mut session = session(false);
        assert!(session.apply(Event::set_text("{ broken")).unwrap().is_some());
        assert!(!session.state().is_valid_json);
    }

    #[test]
    fn test_report_does_not_reschedule() {
        let mut session = session(false);
        session.apply(Event::set_text("{}")).unwrap();

        let mut report = ValidationReport::default();
        report.json = CheckOutcome::Passed;
        assert!(session.deliver_report(1, report.clone()));
        assert_eq!(session.state().report, report);

        let ticket = session
            .apply(Event::UpdateValidationReport(ValidationReport::default()))
            .unwrap();
        assert!(ticket.is_none());
    }

    #[test]
    fn test_structural_edit_schedules_regenerated_text() {
        let mut session = session(false);
        session
            .apply(Event::set_text(r#"{"properties": {"on": {}}}"#))
            .unwrap();

        let ticket = session
            .apply(Event::AddForm {
                level: FormLevel::Properties,
                entity: "on".to_string(),
                form: json!({"href": "/on", "op": "readproperty"}),
            })
            .unwrap();
        assert_eq!(ticket.map(|t| t.sequence()), Some(2));

        // the editor echoes the regenerated text back
        let echoed = session.state().text.clone();
        assert!(session.apply(Event::set_text(echoed)).unwrap().is_none());
    }

    #[test]
    fn test_failed_edit_schedules_nothing() {
        let mut session = session(false);
        session.apply(Event::set_text("{}")).unwrap();

        let result = session.apply(Event::RemoveNamedEntity {
            kind: InteractionKind::Actions,
            name: "missing".to_string(),
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_stale_reports() {
        let mut lenient = session(false);
        lenient.apply(Event::set_text("a")).unwrap();
        lenient.apply(Event::set_text("b")).unwrap();
        assert!(lenient.deliver_report(1, ValidationReport::default()));

        let mut strict = session(true);
        strict.apply(Event::set_text("a")).unwrap();
        strict.apply(Event::set_text("b")).unwrap();
        assert!(!strict.deliver_report(1, ValidationReport::default()));
        assert!(strict.deliver_report(2, ValidationReport::default()));
    }
}
