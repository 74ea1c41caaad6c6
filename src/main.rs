//! td-lsp: LSP server for W3C Web of Things Thing Descriptions and Thing Models

use std::sync::Arc;

use tower_lsp::{LspService, Server};
use tracing_subscriber::EnvFilter;

use td_lsp::config::Config;
use td_lsp::schema::HttpSchemaFetcher;
use td_lsp::Backend;

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting td-lsp server");

    let config = Config::from_env();
    let fetcher = match HttpSchemaFetcher::new(config.fetch_timeout()) {
        Ok(fetcher) => Arc::new(fetcher),
        Err(err) => {
            tracing::error!("Cannot create schema fetcher: {}", err);
            std::process::exit(1);
        }
    };

    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = LspService::new(move |client| Backend::new(client, config, fetcher));
    Server::new(stdin, stdout, socket).serve(service).await;
}
