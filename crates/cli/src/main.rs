// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orchard CLI.
//!
//! Thin glue over the library crates: project registration, the daemon,
//! the orchestrator loop, and read-only status/log views.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "orchard", version, about = "Multi-agent coding orchestrator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage registered projects
    Project {
        #[command(subcommand)]
        command: ProjectCommands,
    },
    /// Run the terminal daemon in the foreground
    Daemon,
    /// Run the orchestrator loop for a project
    Run {
        /// Project path (defaults to the current directory)
        #[arg(long)]
        project: Option<PathBuf>,
        /// Run exactly one tick and exit
        #[arg(long)]
        once: bool,
    },
    /// Show worktrees, sessions, and the merge queue
    Status {
        #[arg(long)]
        project: Option<PathBuf>,
    },
    /// Show recent activity as formatted log lines
    Logs {
        #[arg(long)]
        project: Option<PathBuf>,
        #[arg(long, default_value_t = 50)]
        limit: u32,
    },
    /// Send a chat message to the orchestrator
    Send {
        #[arg(long)]
        project: Option<PathBuf>,
        message: String,
    },
}

#[derive(Subcommand)]
enum ProjectCommands {
    /// Register a project (idempotent on path)
    Add {
        path: PathBuf,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        repo_url: Option<String>,
    },
    /// List registered projects
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Project { command } => match command {
            ProjectCommands::Add {
                path,
                name,
                repo_url,
            } => commands::project::add(&path, name.as_deref(), repo_url.as_deref()),
            ProjectCommands::List => commands::project::list(),
        },
        Commands::Daemon => commands::daemon::run().await,
        Commands::Run { project, once } => {
            commands::run::run(&resolve_project(project)?, once).await
        }
        Commands::Status { project } => commands::status::show(&resolve_project(project)?).await,
        Commands::Logs { project, limit } => {
            commands::logs::show(&resolve_project(project)?, limit)
        }
        Commands::Send { project, message } => {
            commands::chat::send(&resolve_project(project)?, &message)
        }
    }
}

fn resolve_project(path: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    let path = match path {
        Some(path) => path,
        None => std::env::current_dir()?,
    };
    Ok(std::fs::canonicalize(&path)?)
}
