// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orchard Terminal Daemon (orchardd)
//!
//! Background process that owns PTY subprocesses and multicasts their
//! output to WebSocket clients.
//!
//! Architecture:
//! - Listener task: accepts connections, one task per client
//! - Session manager: sole owner of PTY session records

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::fs::OpenOptions;
use std::path::PathBuf;

use fs2::FileExt;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use orchard_daemon::{listener, SessionManager};

const DEFAULT_PORT: u16 = 9782;
/// Rotate the log at startup once it exceeds this size.
const LOG_ROTATE_BYTES: u64 = 10 * 1024 * 1024;

struct Config {
    state_dir: PathBuf,
    log_path: PathBuf,
    lock_path: PathBuf,
    port: u16,
}

impl Config {
    fn load() -> Result<Self, String> {
        let state_dir = match std::env::var_os("ORCHARD_STATE_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => dirs::home_dir()
                .ok_or("cannot resolve home directory")?
                .join(".orchard"),
        };
        std::fs::create_dir_all(&state_dir)
            .map_err(|e| format!("cannot create state dir: {}", e))?;
        let port = std::env::var("ORCHARD_DAEMON_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);
        Ok(Self {
            log_path: state_dir.join("orchardd.log"),
            lock_path: state_dir.join("orchardd.lock"),
            state_dir,
            port,
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Handle info flags before any config/lock acquisition
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("orchardd {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("orchardd {}", env!("CARGO_PKG_VERSION"));
                println!("Orchard Terminal Daemon - owns PTY sessions for coding agents");
                println!();
                println!("USAGE:");
                println!("    orchardd");
                println!();
                println!("The daemon is typically started by the `orchard` CLI and listens");
                println!("on a local WebSocket (ORCHARD_DAEMON_PORT, default {}).", DEFAULT_PORT);
                println!();
                println!("OPTIONS:");
                println!("    -h, --help       Print help information");
                println!("    -v, --version    Print version information");
                return Ok(());
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: orchardd [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    let config = Config::load()?;

    rotate_log_if_needed(&config.log_path);

    // Single-instance enforcement via advisory lock. The file is only
    // truncated after the lock is held, so a losing daemon never wipes
    // the winner's pid.
    let mut lock_file = OpenOptions::new()
        .create(true)
        .write(true)
        .open(&config.lock_path)?;
    if lock_file.try_lock_exclusive().is_err() {
        let pid = std::fs::read_to_string(&config.lock_path).unwrap_or_default();
        eprintln!("orchardd is already running (pid {})", pid.trim());
        std::process::exit(1);
    }
    use std::io::Write;
    lock_file.set_len(0)?;
    let _ = writeln!(lock_file, "{}", std::process::id());

    let _log_guard = setup_logging(&config)?;
    info!(state_dir = %config.state_dir.display(), port = config.port, "starting orchardd");

    let manager = SessionManager::new();

    let bind_addr = format!("127.0.0.1:{}", config.port);
    let socket = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(%bind_addr, "listening");

    let listener_task = tokio::spawn(listener::run(socket, std::sync::Arc::clone(&manager)));

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    tokio::select! {
        _ = sigterm.recv() => info!("SIGTERM received"),
        _ = sigint.recv() => info!("SIGINT received"),
    }

    // Destroy sessions before exit so agent shells don't outlive us.
    manager.destroy_all();
    listener_task.abort();
    info!("shutdown complete");
    Ok(())
}

/// Move an oversized log aside so each daemon generation starts small.
fn rotate_log_if_needed(log_path: &std::path::Path) {
    if let Ok(meta) = std::fs::metadata(log_path) {
        if meta.len() > LOG_ROTATE_BYTES {
            let rotated = log_path.with_extension("log.1");
            if let Err(e) = std::fs::rename(log_path, &rotated) {
                eprintln!("warning: log rotation failed: {}", e);
            }
        }
    }
}

fn setup_logging(
    config: &Config,
) -> Result<tracing_appender::non_blocking::WorkerGuard, Box<dyn std::error::Error>> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_path)?;
    let (writer, guard) = tracing_appender::non_blocking(file);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        error!("tracing subscriber already installed");
    }
    Ok(guard)
}
