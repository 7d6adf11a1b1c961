///
/// This module implements the CLI for tap-sentry: command parsing, wiring of
/// the core components, and the async `run` entrypoint used by `main()` and
/// the integration tests.
///
/// All extraction logic lives in the [`tap-sentry-core`] crate. This module
/// only builds the transport, client, bookmark store and engine from the
/// loaded config, then drives [`SyncEngine::sync_all`].
///
/// stdout carries Singer messages only; everything human-readable goes
/// through `tracing` to stderr.
///
/// [`tap-sentry-core`]: ../../tap-sentry-core/
use crate::load_config::{load_config, load_state, parse_streams};
use crate::schemas::load_descriptors;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tap_sentry_core::auth::Authenticator;
use tap_sentry_core::bookmarks::{BookmarkState, BookmarkStore};
use tap_sentry_core::client::{ReqwestTransport, SentryClient};
use tap_sentry_core::contract::StateWriter;
use tap_sentry_core::output::SingerWriter;
use tap_sentry_core::synchronise::SyncEngine;

/// CLI for tap-sentry: extract Sentry resources as a Singer message stream.
#[derive(Parser)]
#[clap(
    name = "tap-sentry",
    version,
    about = "Extract Sentry projects, issues, events, users and teams as Singer messages"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sync the configured streams and write Singer messages to stdout
    Sync {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,

        /// State file from a previous run; its bookmarks are never moved backwards
        #[clap(long)]
        state: Option<PathBuf>,

        /// Only sync this stream (repeatable); defaults to the streams in the config
        #[clap(long = "stream")]
        streams: Vec<String>,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Sync {
            config,
            state,
            streams,
        } => {
            let config = load_config(config)?;
            let selected = if streams.is_empty() {
                config.streams.clone()
            } else {
                parse_streams(&streams)?
            };
            let descriptors = load_descriptors(
                config.schemas_dir.as_deref(),
                &selected,
                &config.key_properties,
            )?;
            let prior = match state {
                Some(path) => load_state(path)?,
                None => BookmarkState::default(),
            };

            let writer = Arc::new(SingerWriter::stdout());
            let bookmarks = Arc::new(BookmarkStore::with_state(prior, writer.clone()));
            let transport = ReqwestTransport::new(
                Authenticator::new(config.credential.clone()),
                config.client.request_timeout,
            )?;
            let client = SentryClient::new(transport, config.client.clone())?;
            let engine = SyncEngine::new(
                client,
                writer.clone(),
                bookmarks.clone(),
                config.sync.clone(),
            );

            tracing::info!(command = "sync", streams = ?selected, "Starting synchronisation");
            match engine.sync_all(&descriptors).await {
                Ok(report) => {
                    writer.write_state(&bookmarks.snapshot())?;
                    tracing::info!(command = "sync", ?report, "Synchronisation complete");
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(command = "sync", error = %e, "Synchronisation failed");
                    Err(e.into())
                }
            }
        }
    }
}
