// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// docscan — field document scanner
//
// Entry point. Initialises logging, loads the scanner configuration and
// dispatches to the chosen subcommand.

mod commands;
mod upload;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use docscan_core::error::Result;
use docscan_core::guidance::humanize_error;

use commands::ScanOptions;

#[derive(Parser)]
#[command(name = "docscan")]
#[command(about = "Check, straighten and save photographed paper documents")]
#[command(version)]
struct Cli {
    /// Scanner configuration (JSON). Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether a photo is good enough to submit.
    Validate {
        /// Photo to check.
        file: PathBuf,
    },

    /// Run camera frames through a live scanning session.
    Scan {
        /// Frames to replay, in order. Played in a loop.
        #[arg(required = true)]
        frames: Vec<PathBuf>,

        /// Directory that receives scanned_doc.jpg.
        #[arg(long, default_value = ".")]
        out: PathBuf,

        /// Manual rotation applied before saving, in degrees.
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        rotate: i32,

        /// Device orientation reported at capture, in degrees.
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        device_rotation: i32,

        /// Capture anyway after this long without a steady document.
        #[arg(long, default_value_t = 10_000)]
        timeout_ms: u64,
    },

    /// Print the effective configuration as JSON.
    Config {
        /// Also write it to this file.
        #[arg(long)]
        write: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "docscan failed");
            let human = humanize_error(&err);
            eprintln!("{}\n{}", human.message, human.suggestion);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Validate { file } => {
            let validation = commands::validate(&file, &config)?;
            println!("{}", serde_json::to_string_pretty(&validation)?);
        }
        Commands::Scan {
            frames,
            out,
            rotate,
            device_rotation,
            timeout_ms,
        } => {
            let options = ScanOptions {
                frames,
                out,
                rotate,
                device_rotation,
                timeout: Duration::from_millis(timeout_ms),
            };
            let result = commands::scan(options, config).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Config { write } => {
            if let Some(path) = write {
                config.save(&path)?;
                tracing::info!(path = %path.display(), "configuration written");
            }
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }
    Ok(())
}
