//! WARDEN demo CLI.
//!
//! Runs one or all of the demo scenarios against a fully wired permission
//! stack: agent directory, access patterns, rule engine, router, and the
//! hash-chained security auditor.
//!
//! Usage:
//!   cargo run -p demo -- run-all
//!   cargo run -p demo -- editor
//!   cargo run -p demo -- security
//!   cargo run -p demo -- routing
//!   cargo run -p demo -- --config my-warden.toml run-all

mod runtime;
mod scenarios;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use warden_contracts::error::WardenResult;
use warden_policy::config::WardenConfig;

use crate::runtime::DEFAULT_CONFIG;
use crate::scenarios::{editor, routing, security};

// ── CLI definition ────────────────────────────────────────────────────────────

/// WARDEN: permission decisions for cooperating agents.
#[derive(Parser)]
#[command(
    name = "demo",
    about = "WARDEN agent permission runtime demo",
    long_about = "Runs WARDEN demo scenarios showing directory ownership, access patterns,\n\
                  override rules, tool gating, routing, and the security audit chain."
)]
struct Cli {
    /// TOML configuration to load instead of the embedded default.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run every scenario in sequence.
    RunAll,
    /// Scenario 1: Editor agent (patterns, override rules, audit log).
    Editor,
    /// Scenario 2: Security validation (path traversal, credentials, report).
    Security,
    /// Scenario 3: Routing (endpoints, path ownership, tool gate, stats).
    Routing,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // Set RUST_LOG=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    print_banner();

    let result = match load_config(cli.config.as_deref()) {
        Ok(config) => match cli.command {
            Command::RunAll => run_all(&config).await,
            Command::Editor => editor::run_scenario(&config).await,
            Command::Security => security::run_scenario(&config).await,
            Command::Routing => routing::run_scenario(&config).await,
        },
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => {
            println!("All selected scenarios completed successfully.");
        }
        Err(e) => {
            eprintln!("Demo error: {}", e);
            std::process::exit(1);
        }
    }
}

fn load_config(path: Option<&std::path::Path>) -> WardenResult<WardenConfig> {
    match path {
        Some(path) => WardenConfig::from_file(path),
        None => WardenConfig::from_toml_str(DEFAULT_CONFIG),
    }
}

// ── Scenario dispatch ─────────────────────────────────────────────────────────

async fn run_all(config: &WardenConfig) -> WardenResult<()> {
    editor::run_scenario(config).await?;
    security::run_scenario(config).await?;
    routing::run_scenario(config).await?;
    Ok(())
}

// ── Banner ────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("WARDEN — Agent Permission Runtime");
    println!("=================================");
    println!();
    println!("Decision pipeline per request:");
    println!("  [1] Router resolves the agent (explicit target, path owner, endpoint)");
    println!("  [2] Access patterns decide; highest priority wins");
    println!("  [3] Override rules apply when they outrank the pattern decision");
    println!("  [4] Tool gate: the agent must hold the tool the operation needs");
    println!("  [5] Handler runs ONLY after steps 2-4 allow; every decision is audited");
    println!();
}
