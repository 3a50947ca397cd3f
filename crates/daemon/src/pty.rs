// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One pseudo-terminal subprocess.
//!
//! The blocking PTY reader runs on its own thread, bridged into tokio via
//! an unbounded channel. Flow control works by parking that thread: while
//! paused it holds no buffers, so backpressure lands on the kernel PTY
//! buffer and ultimately on the shell.

use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use portable_pty::{native_pty_system, ChildKiller, CommandBuilder, MasterPty, PtySize};
use thiserror::Error;
use tokio::sync::mpsc;

pub const DEFAULT_COLS: u16 = 120;
pub const DEFAULT_ROWS: u16 = 30;

#[derive(Debug, Error)]
pub enum PtyError {
    #[error("failed to open pty: {0}")]
    Open(String),

    #[error("failed to spawn shell: {0}")]
    Spawn(String),

    #[error("pty write failed: {0}")]
    Write(#[from] std::io::Error),
}

/// What the reader thread observed.
#[derive(Debug)]
pub enum PtyOutput {
    Data(Vec<u8>),
    /// Reader hit EOF; the child has exited (or the master was closed).
    Eof,
}

/// Pause gate shared between the manager and the reader thread.
#[derive(Default)]
pub struct PauseGate {
    paused: Mutex<bool>,
    cond: Condvar,
}

impl PauseGate {
    pub fn pause(&self) {
        *self.paused.lock() = true;
    }

    pub fn resume(&self) {
        let mut paused = self.paused.lock();
        *paused = false;
        self.cond.notify_all();
    }

    pub fn is_paused(&self) -> bool {
        *self.paused.lock()
    }

    /// Block the calling (reader) thread while paused.
    fn wait_if_paused(&self) {
        let mut paused = self.paused.lock();
        while *paused {
            self.cond.wait(&mut paused);
        }
    }
}

/// A spawned shell with its reader thread already running.
pub struct PtyProcess {
    master: Box<dyn MasterPty + Send>,
    writer: Box<dyn std::io::Write + Send>,
    killer: Box<dyn ChildKiller + Send + Sync>,
    pub pause_gate: Arc<PauseGate>,
    pub output_rx: Option<mpsc::UnboundedReceiver<PtyOutput>>,
    pub exit_rx: Option<tokio::sync::oneshot::Receiver<i32>>,
}

impl PtyProcess {
    /// Spawn the user's shell (fallback `/bin/sh`) in `cwd` at 120x30
    /// with `TERM=xterm-256color` and `COLORTERM=truecolor`.
    pub fn spawn(cwd: &Path) -> Result<Self, PtyError> {
        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows: DEFAULT_ROWS,
                cols: DEFAULT_COLS,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| PtyError::Open(e.to_string()))?;

        let shell = std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string());
        let mut cmd = CommandBuilder::new(shell);
        cmd.cwd(cwd);
        cmd.env("TERM", "xterm-256color");
        cmd.env("COLORTERM", "truecolor");

        let mut child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| PtyError::Spawn(e.to_string()))?;
        // Close our copy of the slave so reader EOF tracks child exit.
        drop(pair.slave);

        let killer = child.clone_killer();
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| PtyError::Open(e.to_string()))?;
        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| PtyError::Open(e.to_string()))?;

        let pause_gate = Arc::new(PauseGate::default());
        let (output_tx, output_rx) = mpsc::unbounded_channel();
        let gate = Arc::clone(&pause_gate);
        std::thread::spawn(move || read_loop(reader, &gate, &output_tx));

        let (exit_tx, exit_rx) = tokio::sync::oneshot::channel();
        std::thread::spawn(move || {
            let code = match child.wait() {
                Ok(status) => status.exit_code() as i32,
                Err(_) => -1,
            };
            let _ = exit_tx.send(code);
        });

        Ok(Self {
            master: pair.master,
            writer,
            killer,
            pause_gate,
            output_rx: Some(output_rx),
            exit_rx: Some(exit_rx),
        })
    }

    pub fn write(&mut self, data: &[u8]) -> Result<(), PtyError> {
        self.writer.write_all(data)?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn resize(&self, cols: u16, rows: u16) -> bool {
        self.master
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .is_ok()
    }

    /// SIGKILL the process group. Best-effort; the exit watcher reports
    /// the final status.
    pub fn kill(&mut self) {
        // Unpark the reader first so it can observe EOF and exit.
        self.pause_gate.resume();
        let _ = self.killer.kill();
    }
}

fn read_loop(
    mut reader: Box<dyn Read + Send>,
    gate: &PauseGate,
    output_tx: &mpsc::UnboundedSender<PtyOutput>,
) {
    let mut buf = [0u8; 8192];
    loop {
        gate.wait_if_paused();
        match reader.read(&mut buf) {
            Ok(0) | Err(_) => {
                let _ = output_tx.send(PtyOutput::Eof);
                return;
            }
            Ok(n) => {
                if output_tx.send(PtyOutput::Data(buf[..n].to_vec())).is_err() {
                    // Session record is gone; stop reading.
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pause_gate_round_trip() {
        let gate = PauseGate::default();
        assert!(!gate.is_paused());
        gate.pause();
        assert!(gate.is_paused());
        gate.resume();
        assert!(!gate.is_paused());
    }

    #[test]
    fn test_paused_reader_blocks_until_resume() {
        let gate = Arc::new(PauseGate::default());
        gate.pause();

        let gate2 = Arc::clone(&gate);
        let handle = std::thread::spawn(move || {
            gate2.wait_if_paused();
            true
        });

        std::thread::sleep(std::time::Duration::from_millis(50));
        assert!(!handle.is_finished());

        gate.resume();
        assert!(handle.join().unwrap_or(false));
    }
}
