//! vidrag CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments
//! - 3: Configuration error
//! - 4: Backend unavailable
//! - 5: Ingestion failed

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod config;
mod display;

use commands::{Cli, CommandContext, Commands};
use config::AppConfig;

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const CONFIG_ERROR: u8 = 3;
    pub const BACKEND_UNAVAILABLE: u8 = 4;
    pub const INGESTION_FAILED: u8 = 5;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.quiet);

    let config = match AppConfig::load(cli.config.as_deref(), cli.api_url.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Error: {:#}", e);
            return ExitCode::from(ExitCodes::CONFIG_ERROR);
        }
    };

    let ctx = CommandContext {
        config,
        quiet: cli.quiet,
    };

    let result = match cli.command {
        Commands::Ingest(args) => commands::ingest::execute(args, ctx).await,
        Commands::Chat(args) => commands::chat::execute(args, ctx).await,
        Commands::Status(args) => commands::status::execute(args, ctx).await,
        Commands::Health => commands::health::execute(ctx).await,
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("❌ Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let level = if verbose {
        "vidrag=debug"
    } else if quiet {
        "vidrag=warn"
    } else {
        "vidrag=info"
    };

    let mut filter = EnvFilter::from_default_env();
    for directive in ["warn", level] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    // A subscriber may already be installed; keep it.
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    let msg = format!("{:#}", e).to_lowercase();

    if msg.contains("ingestion failed") || msg.contains("ingestion did not finish") {
        ExitCodes::INGESTION_FAILED
    } else if msg.contains("config") {
        ExitCodes::CONFIG_ERROR
    } else if msg.contains("backend unavailable")
        || msg.contains("could not reach backend")
        || msg.contains("timed out")
    {
        ExitCodes::BACKEND_UNAVAILABLE
    } else if msg.contains("argument") || msg.contains("not found") {
        ExitCodes::INVALID_ARGS
    } else {
        ExitCodes::GENERAL_ERROR
    }
}
