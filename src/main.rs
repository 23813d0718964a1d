// slack-audit - local audit log of Slack posts and reactions
//
// A browser shim forwards every outgoing request it observes to this daemon.
// Writes to Slack's chat.postMessage / reactions.add / reactions.remove are
// turned into audit records, enriched from the tab's rendered page where
// possible, and appended to a local SQLite log that a side-panel UI reads.
//
// Architecture:
// - API server (axum): intercept feed, page snapshots, log query + SSE stream
// - Parser: endpoint table + body decoding into pending events
// - Correlation: one page agent task per tab, reached over mpsc/oneshot
// - Pipeline: classify inline, enrich + persist in a spawned task
// - Storage: append-only SQLite, per-operation connections

mod api;
mod cli;
mod config;
mod correlation;
mod events;
mod logging;
mod parser;
mod pipeline;
mod startup;
mod storage;
mod util;

use anyhow::{Context, Result};
use clap::Parser as _;
use config::Config;
use correlation::{DomResolver, PageRegistry};
use parser::Classifier;
use pipeline::AuditPipeline;
use std::sync::Arc;
use storage::LogStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Subcommands (logs, config) run and exit without starting the daemon
    let cli = cli::Cli::parse();
    if cli::handle_cli(&cli).await? {
        return Ok(());
    }

    // Ensure config template exists (helps users discover options)
    Config::ensure_config_exists();
    let config = Config::from_env()?;

    // The guard must be kept alive for the duration of the program to ensure logs flush
    let _file_guard = logging::init(&config.logging);

    let store = Arc::new(
        LogStore::open(&config.storage.db_path, config.notify_buffer)
            .context("Failed to open audit log")?,
    );

    let classifier = Classifier::slack().context("Invalid endpoint table")?;
    let pages = Arc::new(PageRegistry::new(
        DomResolver::slack(),
        config.correlation.mailbox_size,
    ));
    let pipeline = Arc::new(AuditPipeline::new(
        classifier,
        pages.clone(),
        store,
        config.correlation.enabled,
    ));

    if !config.correlation.enabled {
        tracing::info!("Correlation disabled: records will carry request fields only");
    }

    let state = api::AppState::new(pipeline, pages);

    // Oneshot so ctrl-c can stop the server gracefully
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let mut server = tokio::spawn(api::start_server(config.bind_addr, state, shutdown_rx));

    startup::print_startup(&config);
    tracing::info!("Ready. Waiting for intercepted requests...");

    tokio::select! {
        result = &mut server => {
            // Server stopped on its own (bind failure, serve error)
            return result.context("Server task panicked")?;
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for ctrl-c")?;
        }
    }

    tracing::info!("Shutting down...");

    // If the send fails, the server has already shut down
    let _ = shutdown_tx.send(());
    server.await.context("Server task panicked")??;

    tracing::info!("Shutdown complete");
    Ok(())
}
