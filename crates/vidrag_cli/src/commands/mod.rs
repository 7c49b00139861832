//! CLI command definitions.
//!
//! Each subcommand maps to one way of driving a video session against the
//! backend API.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use vidrag_client::HttpBackend;
use vidrag_core::{SessionFacade, SessionState, SessionStatus};

use crate::config::AppConfig;
use crate::display;

pub mod chat;
pub mod health;
pub mod ingest;
pub mod status;

/// vidrag - ask questions about videos
#[derive(Parser)]
#[command(name = "vidrag")]
#[command(version, about = "vidrag - ingest videos and ask questions about them")]
#[command(long_about = r#"
vidrag submits a video to the ingestion backend, follows its processing,
and then answers questions about it with links to the supporting moments.

COMMANDS:
  ingest   → Submit a video and follow processing until it is ready
  chat     → Ingest (or attach to) a video, then ask questions interactively
  status   → Show the processing status of a submitted video
  health   → Check that the backend is reachable

ENVIRONMENT:
  VIDRAG_API_URL            Backend base URL (default http://localhost:8000)
  VIDRAG_POLL_INTERVAL_MS   Delay between status polls
  VIDRAG_MAX_POLL_SECS      Give up polling after this long (0 = never)
  RUST_LOG                  Log filter

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Configuration error
  4 - Backend unavailable
  5 - Ingestion failed
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to a TOML config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Backend base URL (overrides config and VIDRAG_API_URL)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Submit a video for ingestion
    Ingest(ingest::IngestArgs),

    /// Chat about a video
    Chat(chat::ChatArgs),

    /// Show the processing status of a video
    Status(status::StatusArgs),

    /// Check backend health
    Health,
}

/// Options shared by every command.
pub struct CommandContext {
    pub config: AppConfig,
    pub quiet: bool,
}

impl CommandContext {
    pub fn backend(&self) -> Result<HttpBackend> {
        HttpBackend::new(&self.config.api).context("Invalid API configuration")
    }

    pub fn session(&self) -> Result<SessionFacade> {
        Ok(SessionFacade::new(
            Arc::new(self.backend()?),
            self.config.session.clone(),
        ))
    }
}

/// Print progress until the session leaves Processing; returns the settled state.
pub async fn follow_ingestion(facade: &SessionFacade, quiet: bool) -> SessionState {
    let mut updates = facade.subscribe();
    let mut last_line = String::new();

    loop {
        let state = updates.borrow_and_update().clone();
        if state.status != SessionStatus::Processing {
            return state;
        }

        let line = display::progress_line(&state);
        if !quiet && line != last_line {
            println!("{}", line);
            last_line = line;
        }

        if updates.changed().await.is_err() {
            return facade.snapshot();
        }
    }
}

/// Print the outcome of a settled ingestion; errors if it did not become Ready.
pub fn report_settled(state: &SessionState) -> Result<()> {
    match state.status {
        SessionStatus::Ready => {
            println!("✅ Video processed successfully!");
            if let Some(metadata) = &state.metadata {
                println!("{}", display::metadata_block(metadata));
            }
            Ok(())
        }
        SessionStatus::Error => anyhow::bail!(
            "Ingestion failed: {}",
            state.last_error.as_deref().unwrap_or("Unknown error")
        ),
        other => anyhow::bail!("Ingestion did not finish (status: {})", other),
    }
}
