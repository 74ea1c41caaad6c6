//! Background validation pipeline
//!
//! Every dispatched text value starts two independent tasks that share
//! nothing but the text and the schema cache:
//! - the schema task resolves and fetches the schemas that apply
//! - the validation task resolves the same schemas, then runs the checks
//!   against them and produces a report
//!
//! Results come back as [`PipelineEvent`]s over an unbounded channel. Only
//! reports are meant for the document store; resolved schemas are for the
//! presentation layer.

mod debounce;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;

use crate::diagnostics::{validate_text, SchemaSet, ValidationReport};
use crate::parser::decode;
use crate::schema::{
    fetch_all, DocumentKind, SchemaCache, SchemaEntry, SchemaFetcher, SchemaResolver,
};

pub use debounce::{DebounceCoordinator, Ticket};

/// Check run by the validation task on a blocking worker
pub type CheckFn = Arc<dyn Fn(&str, &SchemaSet) -> ValidationReport + Send + Sync>;

/// Result of one pipeline task for the document identified by `key`
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    Schemas {
        key: String,
        sequence: u64,
        schemas: BTreeMap<String, SchemaEntry>,
    },
    Report {
        key: String,
        sequence: u64,
        report: ValidationReport,
    },
}

/// Spawns schema and validation tasks for dispatched text
#[derive(Clone)]
pub struct Pipeline {
    resolver: Arc<SchemaResolver>,
    cache: Arc<SchemaCache>,
    fetcher: Arc<dyn SchemaFetcher>,
    check: CheckFn,
    events: mpsc::UnboundedSender<PipelineEvent>,
}

impl Pipeline {
    /// Create a pipeline and the receiver its results arrive on
    pub fn new(
        resolver: SchemaResolver,
        cache: Arc<SchemaCache>,
        fetcher: Arc<dyn SchemaFetcher>,
    ) -> (Self, mpsc::UnboundedReceiver<PipelineEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let pipeline = Self {
            resolver: Arc::new(resolver),
            cache,
            fetcher,
            check: Arc::new(validate_text),
            events,
        };
        (pipeline, receiver)
    }

    /// Replace the check run by the validation task
    pub fn with_check(mut self, check: CheckFn) -> Self {
        self.check = check;
        self
    }

    pub fn cache(&self) -> &Arc<SchemaCache> {
        &self.cache
    }

    /// Run both tasks for `text` once the ticket's quiet period has passed.
    ///
    /// Must be called from within a tokio runtime.
    pub fn dispatch(&self, key: String, ticket: Ticket, text: Arc<str>) {
        let pipeline = self.clone();

        tokio::spawn(async move {
            if !ticket.settle().await {
                tracing::debug!("Pipeline run {} for {} superseded", ticket.sequence(), key);
                return;
            }
            let sequence = ticket.sequence();
            tracing::debug!("Pipeline run {} for {}", sequence, key);

            tokio::spawn(
                pipeline
                    .clone()
                    .run_schema_task(key.clone(), sequence, Arc::clone(&text)),
            );
            tokio::spawn(pipeline.run_validation_task(key, sequence, text));
        });
    }

    /// Resolve the schemas for `document` and fetch the ones not cached
    async fn schemas_for(&self, document: &Value) -> SchemaSet {
        let base = self.resolver.base_schema(DocumentKind::detect(document));
        let uris = self.resolver.resolve(document);

        SchemaSet {
            base: base.to_string(),
            entries: fetch_all(&self.cache, Arc::clone(&self.fetcher), &uris).await,
        }
    }

    async fn run_schema_task(self, key: String, sequence: u64, text: Arc<str>) {
        let document = match decode(&text) {
            Ok(document) => document,
            Err(err) => {
                tracing::debug!("Skipping schema resolution for {}: {}", key, err);
                return;
            }
        };

        let schemas = self.schemas_for(&document).await.entries;
        self.send(PipelineEvent::Schemas {
            key,
            sequence,
            schemas,
        });
    }

    async fn run_validation_task(self, key: String, sequence: u64, text: Arc<str>) {
        let schemas = match decode(&text) {
            Ok(document) => self.schemas_for(&document).await,
            Err(_) => SchemaSet::default(),
        };

        let check = Arc::clone(&self.check);
        let report = match tokio::task::spawn_blocking(move || check(&text, &schemas)).await {
            Ok(report) => report,
            Err(err) => {
                tracing::warn!("Validation task for {} failed: {}", key, err);
                ValidationReport::not_run(format!("Validation did not complete: {}", err))
            }
        };

        self.send(PipelineEvent::Report {
            key,
            sequence,
            report,
        });
    }

    fn send(&self, event: PipelineEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("Pipeline receiver dropped");
        }
    }
}
