//! # mavparam
//!
//! CLI tool for exercising MAVLink parameter sync.
//!
//! Every command runs the sync engine against a simulated vehicle.
//!
//! ## Commands
//!
//! - `refresh`: Read the whole parameter table
//! - `write`: Change parameters and push them to the vehicle
//! - `area`: Write, read or clear a memory area
//! - `status`: Show configuration and engine status
//!
//! ## Example
//!
//! ```bash
//! # Read everything, losing two parameters on the way
//! mavparam refresh --lose 2 --lose 5
//!
//! # Change two parameters
//! mavparam write RTL_ALT=2500 WPNAV_SPEED=750
//!
//! # Commit memory area 2
//! mavparam area write 2
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use mavparam_types::MemoryAreaAction;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::{area, refresh, status, write};

/// CLI tool for exercising MAVLink parameter sync.
#[derive(Parser, Debug)]
#[command(name = "mavparam")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./mavparam.toml when present)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Override the target system id
    #[arg(long, global = true)]
    system: Option<u8>,

    /// Override the target component id
    #[arg(long, global = true)]
    component: Option<u8>,

    /// Debug-level logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Read every parameter from the vehicle
    Refresh {
        /// Make the simulated vehicle drop this parameter index once
        #[arg(long)]
        lose: Vec<u16>,
    },

    /// Set parameters locally and write them to the vehicle
    Write {
        /// Assignments as NAME=VALUE
        #[arg(required = true)]
        assignments: Vec<String>,
    },

    /// Run a memory-area operation
    Area {
        /// write, read (or load), clear
        action: MemoryAreaAction,

        /// Memory area identifier
        area_id: u8,

        /// Make the simulated vehicle answer with this result code
        #[arg(long)]
        result: Option<u8>,
    },

    /// Show configuration and engine status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = config::resolve(cli.config.as_deref(), cli.system, cli.component)?;

    match cli.command {
        Commands::Refresh { lose } => {
            refresh::run(config, &lose).await?;
        }
        Commands::Write { assignments } => {
            write::run(config, &assignments).await?;
        }
        Commands::Area {
            action,
            area_id,
            result,
        } => {
            area::run(config, action, area_id, result).await?;
        }
        Commands::Status => {
            status::run(config).await?;
        }
    }

    Ok(())
}

/// Install the log subscriber; `RUST_LOG` wins unless `--verbose` is given.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
