// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use magnify::commands::{self, SyncOutcome};
use magnify::{EngineKind, Magnify, MagnifyConfig};

#[derive(Parser, Debug)]
#[command(name = "magnify", version, about = "Full-text search index tooling")]
struct Cli {
    /// JSON configuration file
    #[arg(short, long, env = "MAGNIFY_CONFIG")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Push configured index settings to the search backend
    SyncIndexSettings {
        /// Engine to sync, defaults to the configured default
        #[arg(long, value_enum)]
        engine: Option<EngineKind>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .compact()
        .init();

    let cli = Cli::parse();

    let config = match MagnifyConfig::from_file(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    let magnify = Magnify::new(config);

    match cli.command {
        Command::SyncIndexSettings { engine } => {
            let kind = engine.unwrap_or(magnify.config().default);
            let engine = match magnify.engine_for(kind) {
                Ok(engine) => engine,
                Err(e) => {
                    error!("{}", e);
                    return ExitCode::FAILURE;
                }
            };

            match commands::sync_index_settings(engine.as_ref()).await {
                Ok(SyncOutcome::Synced) => {
                    info!(engine = %kind, "Settings synced");
                    ExitCode::SUCCESS
                }
                Ok(SyncOutcome::Unsupported { backend }) => {
                    info!("Index settings sync is not supported by this backend ({})", backend);
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    error!("{}", e);
                    ExitCode::FAILURE
                }
            }
        }
    }
}
