// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Warden CLI
//!
//! The `warden` binary hosts the remediation agent.
//!
//! ## Commands
//!
//! - `warden serve` - HTTP API with run streaming and the approval endpoint
//! - `warden run` - one remediation run in-process, or against a server
//! - `warden gate list|show|approve|reject` - approval gates on a server
//! - `warden config show|validate|generate` - configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use warden::commands::{self, ConfigCommand, GateCommand, RunArgs, ServeArgs};
use warden_core::domain::config::WardenConfig;

/// Warden - constrained remediation loop for SRE incidents
#[derive(Parser)]
#[command(name = "warden")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "WARDEN_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); defaults to the config value
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Server URL for commands that talk to a running `warden serve`
    #[arg(
        long,
        global = true,
        env = "WARDEN_SERVER",
        default_value = "http://127.0.0.1:8088"
    )]
    server: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API server
    Serve(ServeArgs),

    /// Run one remediation cycle and stream its events
    Run(RunArgs),

    /// Inspect and decide approval gates
    Gate {
        #[command(subcommand)]
        command: GateCommand,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = WardenConfig::load_or_default(cli.config.clone())
        .context("Failed to load configuration")?;
    let logging = &config.spec.observability.logging;
    init_logging(
        cli.log_level.as_deref().unwrap_or(&logging.level),
        &logging.format,
    )?;

    match cli.command {
        Some(Commands::Serve(args)) => commands::serve::execute(args, config).await,
        Some(Commands::Run(args)) => commands::run::execute(args, config, &cli.server).await,
        Some(Commands::Gate { command }) => {
            commands::gate::handle_command(command, &cli.server).await
        }
        Some(Commands::Config { command }) => {
            commands::config::handle_command(command, cli.config).await
        }
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber; `RUST_LOG` wins over `level`.
fn init_logging(level: &str, format: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if format.eq_ignore_ascii_case("json") {
        builder.json().with_current_span(false).init();
    } else {
        builder.with_target(false).compact().init();
    }

    Ok(())
}
