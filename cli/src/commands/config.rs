// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use warden_core::domain::config::{ExecutorMode, StorageBackend, WardenConfig};

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path
        #[arg(short, long, default_value = "./warden-config.yaml")]
        output: PathBuf,

        /// Include examples and comments
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, examples } => generate(output, examples).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = WardenConfig::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;
    let spec = &config.spec;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        match &config_override {
            Some(path) => println!("  1. --config flag: {}", path.display()),
            None => println!("  1. --config flag: {}", "(not set)".dimmed()),
        }
        println!(
            "  2. WARDEN_CONFIG_PATH: {}",
            std::env::var("WARDEN_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./warden-config.yaml");
        println!("  4. ~/.warden/config.yaml");
        println!("  5. /etc/warden/config.yaml");
        println!();
    }

    println!("{}", "Current configuration:".bold());
    println!("  Name: {}", config.metadata.name);
    println!();

    println!("{}", "LLM Providers:".bold());
    if spec.llm_providers.is_empty() {
        println!("  {}", "(none - reasoning uses fallbacks)".dimmed());
    }
    for provider in &spec.llm_providers {
        let state = if provider.enabled { "" } else { " [disabled]" };
        println!("  {} ({}){}", provider.name.bold(), provider.provider_type, state);
        println!("    Endpoint: {}", provider.endpoint);
        for model in &provider.models {
            println!("      - {} -> {}", model.alias, model.model);
        }
    }
    println!(
        "  Alias: {}  Retries: {}  Call timeout: {:?}",
        spec.reasoning.model_alias, spec.reasoning.max_retries, spec.reasoning.call_timeout
    );
    if let Some(fallback) = &spec.reasoning.fallback_provider {
        println!("  Fallback provider: {}", fallback);
    }
    println!();

    println!("{}", "Detection:".bold());
    println!("  Lookback: {:?}", spec.detector.lookback);
    println!("  Error threshold: {}", spec.detector.error_count_threshold);
    println!(
        "  Synthetic fallback: {}",
        if spec.detector.synthetic_fallback { "on" } else { "off" }
    );
    println!();

    println!("{}", "Approval gate:".bold());
    println!("  Timeout: {:?}", spec.gate.timeout);
    println!("  Poll interval: {:?}", spec.gate.poll_interval);
    println!();

    println!("{}", "Policy:".bold());
    println!("  Max scale factor: {}", spec.policy.max_scale_factor);
    println!("  Max spend: {}", spec.policy.max_spend);
    println!("  Production markers: {}", spec.policy.production_markers.join(", "));
    println!();

    println!("{}", "Executor:".bold());
    let mode = match spec.executor.mode {
        ExecutorMode::DryRun => "dry-run".yellow(),
        ExecutorMode::Command => "command".red(),
    };
    println!("  Mode: {}", mode);
    println!("  Allowed commands: {}", spec.executor.allowed_commands.join(", "));
    println!();

    println!("{}", "Storage:".bold());
    match spec.storage.backend {
        StorageBackend::Memory => println!("  Backend: memory"),
        StorageBackend::Postgres => println!("  Backend: postgres"),
    }
    println!();

    println!("{}", "API:".bold());
    println!("  Listen: {}:{}", spec.api.bind_address, spec.api.port);

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = WardenConfig::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf, with_examples: bool) -> Result<()> {
    let sample = if with_examples {
        CONFIG_WITH_EXAMPLES
    } else {
        CONFIG_MINIMAL
    };

    std::fs::write(&output, sample)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}

const CONFIG_MINIMAL: &str = include_str!("../../templates/config-minimal.yaml");
const CONFIG_WITH_EXAMPLES: &str = include_str!("../../templates/config-with-examples.yaml");
