// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Ambient Propagation CLI
//!
//! The `ambient` binary manages the propagation configuration and runs a probe
//! that pushes tasks through the executor adapter and reports what each worker
//! thread observed.
//!
//! ## Commands
//!
//! - `ambient config show|validate|generate` - Configuration management
//! - `ambient probe` - Submit tasks and report the context each worker ran in

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use ambient_core::domain::config::LoggingSettings;
use ambient_core::infrastructure::executor::build_runtime;
use ambient_core::PropagationConfigManifest;

mod commands;

use commands::{ConfigCommand, ProbeArgs};

/// Ambient context propagation for worker pools
#[derive(Parser)]
#[command(name = "ambient")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "AMBIENT_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); defaults to spec.logging.level
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Submit tasks through the executor and report the propagated context
    #[command(name = "probe")]
    Probe(ProbeArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // A broken config file is reported by the command that needs it; logging
    // still comes up with defaults so `config validate` can explain it.
    let config = PropagationConfigManifest::load_or_default(cli.config.clone());
    let logging = config
        .as_ref()
        .map(|c| c.spec.logging.clone())
        .unwrap_or_default();
    init_logging(cli.log_level.as_deref().unwrap_or(&logging.level), &logging)?;

    match cli.command {
        Some(Commands::Config { command }) => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context("Failed to start runtime")?;
            runtime.block_on(commands::config::handle_command(command, cli.config))
        }
        Some(Commands::Probe(args)) => {
            let config = config.context("Failed to load configuration")?;
            let runtime = build_runtime(&config.spec.executor)
                .context("Failed to start executor runtime")?;
            runtime.block_on(commands::probe::run(args, &config))
        }
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str, logging: &LoggingSettings) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_file(false)
        .with_line_number(false);

    if logging.format == "json" {
        builder.json().with_thread_names(true).init();
    } else {
        builder.with_thread_ids(false).compact().init();
    }

    Ok(())
}
