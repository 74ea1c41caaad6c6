//! LSP Backend implementation

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{mpsc, Mutex, RwLock};
use tower_lsp::jsonrpc::{Error as RpcError, Result};
use tower_lsp::lsp_types::notification::Notification;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer};

use crate::commands::{parse_command, COMMANDS};
use crate::config::Config;
use crate::diagnostics::DiagnosticCollector;
use crate::document::{Event, Handle, LinkedEntry};
use crate::pipeline::{DebounceCoordinator, Pipeline, PipelineEvent, Ticket};
use crate::schema::{SchemaCache, SchemaFetcher, SchemaResolver};
use crate::session::Session;

type Sessions = Arc<RwLock<HashMap<Url, Session>>>;

/// Sent to the client whenever the schemas of a document are resolved
pub enum SchemasResolved {}

impl Notification for SchemasResolved {
    type Params = SchemasResolvedParams;
    const METHOD: &'static str = "td/schemasResolved";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemasResolvedParams {
    pub uri: Url,
    /// Schema content by URI, `null` where the fetch failed
    pub schemas: BTreeMap<String, Option<Value>>,
}

/// The LSP backend that handles all language server requests
pub struct Backend {
    /// The LSP client for sending notifications
    client: Client,
    config: Config,
    /// Map of document URIs to their editing session
    sessions: Sessions,
    pipeline: Pipeline,
    /// Pipeline results, taken by the listener once the client is ready
    events: Mutex<Option<mpsc::UnboundedReceiver<PipelineEvent>>>,
}

impl Backend {
    /// Create a new backend instance
    pub fn new(client: Client, config: Config, fetcher: Arc<dyn SchemaFetcher>) -> Self {
        let (pipeline, events) = Pipeline::new(
            SchemaResolver::new(&config),
            Arc::new(SchemaCache::new()),
            fetcher,
        );

        Self {
            client,
            config,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            pipeline,
            events: Mutex::new(Some(events)),
        }
    }

    /// Apply events to the session of `uri`, creating it if needed.
    ///
    /// Returns the ticket of the last event that asked for validation
    /// together with the resulting text.
    async fn apply(&self, uri: &Url, version: Option<i32>, events: Vec<Event>) -> (Option<Ticket>, String) {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .entry(uri.clone())
            .or_insert_with(|| Session::new(DebounceCoordinator::from_config(&self.config)));

        if version.is_some() {
            session.set_version(version);
        }

        let mut ticket = None;
        for event in events {
            match session.apply(event) {
                Ok(Some(scheduled)) => ticket = Some(scheduled),
                Ok(None) => {}
                Err(err) => tracing::warn!("Edit of {} failed: {}", uri, err),
            }
        }

        (ticket, session.state().text.clone())
    }

    /// Start the validation pipeline for `text` if a ticket was issued
    fn dispatch(&self, uri: &Url, ticket: Option<Ticket>, text: &str) {
        if let Some(ticket) = ticket {
            self.pipeline
                .dispatch(uri.to_string(), ticket, Arc::from(text));
        }
    }

    /// Forward pipeline results to the sessions and the client
    async fn start_listener(&self) {
        let Some(mut events) = self.events.lock().await.take() else {
            return;
        };
        let client = self.client.clone();
        let sessions = Arc::clone(&self.sessions);

        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                handle_pipeline_event(&client, &sessions, event).await;
            }
            tracing::debug!("Pipeline listener stopped");
        });
    }

    /// Run a structural edit command against an open document
    async fn run_command(&self, uri: Url, event: Event) -> std::result::Result<(), String> {
        let (old_text, new_text, ticket) = {
            let mut sessions = self.sessions.write().await;
            let session = sessions
                .get_mut(&uri)
                .ok_or_else(|| format!("Document {} is not open", uri))?;

            let old_text = session.state().text.clone();
            let ticket = session.apply(event).map_err(|err| err.to_string())?;
            (old_text, session.state().text.clone(), ticket)
        };

        self.dispatch(&uri, ticket, &new_text);

        if old_text != new_text {
            let edit = full_text_edit(&uri, &old_text, new_text);
            match self.client.apply_edit(edit).await {
                Ok(response) if !response.applied => {
                    tracing::warn!("Client rejected edit of {}", uri);
                }
                Ok(_) => {}
                Err(err) => tracing::warn!("Failed to send edit of {}: {}", uri, err),
            }
        }

        Ok(())
    }
}

async fn handle_pipeline_event(client: &Client, sessions: &Sessions, event: PipelineEvent) {
    match event {
        PipelineEvent::Report {
            key,
            sequence,
            report,
        } => {
            let Ok(uri) = Url::parse(&key) else {
                return;
            };

            let (diagnostics, version) = {
                let mut sessions = sessions.write().await;
                let Some(session) = sessions.get_mut(&uri) else {
                    tracing::debug!("Report for closed document {}", uri);
                    return;
                };
                if !session.deliver_report(sequence, report) {
                    return;
                }

                let state = session.state();
                let mut collector = DiagnosticCollector::new();
                collector.add_report(&state.report, &state.text);
                (collector.into_diagnostics(), session.version())
            };

            client.publish_diagnostics(uri, diagnostics, version).await;
        }
        PipelineEvent::Schemas { key, schemas, .. } => {
            let Ok(uri) = Url::parse(&key) else {
                return;
            };
            if !sessions.read().await.contains_key(&uri) {
                return;
            }

            let schemas = schemas
                .into_iter()
                .map(|(schema_uri, entry)| (schema_uri, entry.schema().cloned()))
                .collect();
            client
                .send_notification::<SchemasResolved>(SchemasResolvedParams { uri, schemas })
                .await;
        }
    }
}

/// Display key of a document opened from `uri`
fn file_name(uri: &Url) -> String {
    uri.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty())
        .map(String::from)
        .unwrap_or_else(|| uri.to_string())
}

/// Position just past the end of `text`
fn end_position(text: &str) -> Position {
    let line = text.matches('\n').count();
    let last_line = text.rsplit('\n').next().unwrap_or_default();
    Position::new(
        u32::try_from(line).unwrap_or(u32::MAX),
        u32::try_from(last_line.encode_utf16().count()).unwrap_or(u32::MAX),
    )
}

/// An edit replacing the whole of `old_text`
fn full_text_edit(uri: &Url, old_text: &str, new_text: String) -> WorkspaceEdit {
    let edit = TextEdit {
        range: Range::new(Position::new(0, 0), end_position(old_text)),
        new_text,
    };
    WorkspaceEdit {
        changes: Some(HashMap::from([(uri.clone(), vec![edit])])),
        ..Default::default()
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, _: InitializeParams) -> Result<InitializeResult> {
        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Options(
                    TextDocumentSyncOptions {
                        open_close: Some(true),
                        change: Some(TextDocumentSyncKind::FULL),
                        save: Some(TextDocumentSyncSaveOptions::Supported(true)),
                        ..Default::default()
                    },
                )),
                execute_command_provider: Some(ExecuteCommandOptions {
                    commands: COMMANDS.iter().map(|c| c.to_string()).collect(),
                    work_done_progress_options: Default::default(),
                }),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: "td-lsp".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        self.start_listener().await;
        tracing::info!("Server initialized");
    }

    async fn shutdown(&self) -> Result<()> {
        tracing::info!("Server shutting down");
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let uri = params.text_document.uri;
        let text = params.text_document.text;
        let version = params.text_document.version;

        tracing::debug!("Document opened: {}", uri);

        let name = file_name(&uri);
        let handle = Handle(uri.to_string());
        let events = vec![
            Event::SetName(name.clone()),
            Event::SetHandle(Some(handle.clone())),
            Event::LinkDocument {
                key: name,
                entry: LinkedEntry::Handle(handle),
            },
            Event::set_text(text),
            Event::SetModified(false),
        ];

        let (ticket, text) = self.apply(&uri, Some(version), events).await;
        self.dispatch(&uri, ticket, &text);
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        let version = params.text_document.version;

        // Get the full text from the changes (we use FULL sync)
        if let Some(change) = params.content_changes.into_iter().next() {
            tracing::debug!("Document changed: {}", uri);

            let (ticket, text) = self
                .apply(&uri, Some(version), vec![Event::set_text(change.text)])
                .await;
            self.dispatch(&uri, ticket, &text);
        }
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        let uri = params.text_document.uri;
        tracing::debug!("Document saved: {}", uri);

        if self.sessions.read().await.contains_key(&uri) {
            self.apply(&uri, None, vec![Event::SetModified(false)]).await;
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        tracing::debug!("Document closed: {}", uri);

        // Remove document from our state
        {
            let mut sessions = self.sessions.write().await;
            sessions.remove(&uri);
        }

        // Clear diagnostics for this document
        self.client.publish_diagnostics(uri, vec![], None).await;
    }

    async fn execute_command(&self, params: ExecuteCommandParams) -> Result<Option<Value>> {
        let command = parse_command(&params.command, params.arguments)
            .map_err(|err| RpcError::invalid_params(err.to_string()))?;

        tracing::debug!("Executing {} on {}", params.command, command.uri);

        if let Err(message) = self.run_command(command.uri, command.event).await {
            self.client.show_message(MessageType::ERROR, message).await;
        }
        Ok(None)
    }
}
