// SPDX-License-Identifier: GPL-3.0-only

//! Offline inspection of recorded device snapshots

mod config;
mod logging;
mod report;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::config::{Config, LoggingLevel};

#[derive(Parser)]
#[command(name = "storage-admin")]
#[command(about = "Inspect device snapshots and operation availability", long_about = None)]
struct Cli {
    /// Config file; defaults to $XDG_CONFIG_HOME/storage-admin/storage-admin.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the configured log level
    #[arg(long, global = true, value_enum)]
    log_level: Option<LoggingLevel>,

    /// Print JSON instead of a table
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Derived state of every device in a snapshot dump
    Inspect {
        /// `admin_disk_info` payload or pulse, as JSON
        snapshot: PathBuf,
    },
    /// Which operations are available for a device/destination selection
    Capabilities {
        snapshot: PathBuf,
        #[arg(long)]
        device: Option<String>,
        /// Destination id from the config (e.g. "nas")
        #[arg(long)]
        destination: Option<String>,
    },
    /// Print the effective configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    logging::init(&config);

    match cli.command {
        Commands::Inspect { snapshot } => {
            let pulse = report::load_snapshot(&snapshot)?;
            tracing::info!(path = %snapshot.display(), timestamp = %pulse.timestamp, "snapshot loaded");
            let rows = report::device_rows(&pulse.data, &config.orchestrator);
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                report::print_rows(&rows);
            }
        }
        Commands::Capabilities {
            snapshot,
            device,
            destination,
        } => {
            let pulse = report::load_snapshot(&snapshot)?;
            let report = report::capabilities(
                pulse,
                config.orchestrator,
                device.as_deref(),
                destination.as_deref(),
            )?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                report::print_capabilities(&report);
            }
        }
        Commands::Config => {
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                print!("{}", config.to_toml()?);
            }
        }
    }

    Ok(())
}
