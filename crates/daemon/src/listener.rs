// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener task for handling WebSocket connections.
//!
//! The listener runs in a spawned task, accepting connections and
//! handling each on its own task without blocking the session manager.
//! Every connection gets an outbound frame channel; a writer task drains
//! it into the socket so slow consumers never block the manager.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::protocol::{Event, Request};
use crate::sessions::{ClientId, FrameSender, SessionManager};

/// Connected clients, for agent-event fan-out.
type ClientRegistry = Arc<Mutex<HashMap<ClientId, FrameSender>>>;

/// Accept loop. Runs until the socket is closed.
pub async fn run(listener: TcpListener, manager: Arc<SessionManager>) {
    let clients: ClientRegistry = Arc::new(Mutex::new(HashMap::new()));
    let next_client_id = Arc::new(AtomicU64::new(1));

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let client_id = next_client_id.fetch_add(1, Ordering::Relaxed);
                debug!(client_id, %addr, "connection accepted");
                let manager = Arc::clone(&manager);
                let clients = Arc::clone(&clients);
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, client_id, manager, clients).await {
                        debug!(client_id, error = %e, "connection closed");
                    }
                });
            }
            Err(e) => error!("accept error: {}", e),
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    client_id: ClientId,
    manager: Arc<SessionManager>,
    clients: ClientRegistry,
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    let ws = tokio_tungstenite::accept_async(stream).await?;
    let (mut sink, mut source) = ws.split();

    let (frame_tx, mut frame_rx) = mpsc::unbounded_channel::<String>();
    clients.lock().insert(client_id, frame_tx.clone());

    let writer = tokio::spawn(async move {
        while let Some(frame) = frame_rx.recv().await {
            if sink.send(Message::text(frame)).await.is_err() {
                break;
            }
        }
    });

    while let Some(message) = source.next().await {
        let message = match message {
            Ok(m) => m,
            Err(e) => {
                debug!(client_id, error = %e, "read error");
                break;
            }
        };
        let text = match message {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };
        match serde_json::from_str::<Request>(text.as_str()) {
            Ok(request) => {
                handle_request(request, client_id, &frame_tx, &manager, &clients);
            }
            Err(e) => {
                warn!(client_id, error = %e, "unparseable frame dropped");
            }
        }
    }

    // Subscribers are silently dropped on socket close.
    manager.remove_client(client_id);
    clients.lock().remove(&client_id);
    writer.abort();
    info!(client_id, "client disconnected");
    Ok(())
}

fn handle_request(
    request: Request,
    client_id: ClientId,
    frame_tx: &FrameSender,
    manager: &Arc<SessionManager>,
    clients: &ClientRegistry,
) {
    match request {
        Request::Ping { request_id } => {
            reply(frame_tx, &Event::Pong { request_id });
        }

        Request::Status { request_id } => {
            reply(
                frame_tx,
                &Event::Status {
                    request_id,
                    session_count: manager.list().len(),
                    uptime_ms: manager.uptime_ms(),
                },
            );
        }

        Request::SessionCreate {
            request_id,
            worktree_id,
            project_path: _,
            cwd,
            initial_command,
        } => match Arc::clone(manager).create(worktree_id, &cwd, initial_command) {
            Ok(session) => reply(frame_tx, &Event::SessionCreated { request_id, session }),
            Err(e) => reply(
                frame_tx,
                &Event::SessionError {
                    request_id,
                    error: e.to_string(),
                },
            ),
        },

        Request::SessionDestroy {
            request_id,
            session_id,
        } => {
            if manager.destroy(&session_id) {
                reply(
                    frame_tx,
                    &Event::SessionDestroyed {
                        request_id,
                        session_id,
                    },
                );
            } else {
                reply(
                    frame_tx,
                    &Event::SessionError {
                        request_id,
                        error: format!("session not found: {}", session_id),
                    },
                );
            }
        }

        Request::SessionList { request_id } => {
            reply(
                frame_tx,
                &Event::SessionList {
                    request_id,
                    sessions: manager.list(),
                },
            );
        }

        Request::SessionGet {
            request_id,
            session_id,
        } => match manager.get(&session_id) {
            Some(session) => reply(frame_tx, &Event::SessionInfo { request_id, session }),
            None => reply(
                frame_tx,
                &Event::SessionError {
                    request_id,
                    error: format!("session not found: {}", session_id),
                },
            ),
        },

        Request::Subscribe {
            request_id,
            session_id,
        } => match manager.subscribe(&session_id, client_id, frame_tx.clone()) {
            Some(lines) => reply(
                frame_tx,
                &Event::TerminalScrollback {
                    request_id,
                    session_id,
                    lines,
                },
            ),
            None => reply(
                frame_tx,
                &Event::SessionError {
                    request_id,
                    error: format!("session not found: {}", session_id),
                },
            ),
        },

        Request::Unsubscribe { session_id } => {
            manager.unsubscribe(&session_id, client_id);
        }

        Request::Input { session_id, data } => {
            if !manager.write(&session_id, &data) {
                debug!(%session_id, "input for unknown session dropped");
            }
        }

        Request::Resize {
            session_id,
            cols,
            rows,
        } => {
            if !manager.resize(&session_id, cols, rows) {
                debug!(%session_id, "resize for unknown session dropped");
            }
        }

        Request::Ack { session_id, count } => {
            manager.ack(&session_id, count);
        }

        // Agent notifications fan out to every other connected client.
        Request::AgentTaskComplete {
            session_id,
            worktree_id,
        } => {
            fan_out(
                clients,
                client_id,
                &Event::AgentTaskComplete {
                    session_id,
                    worktree_id,
                },
            );
        }

        Request::AgentRateLimited { rate_limit } => {
            fan_out(clients, client_id, &Event::AgentRateLimited { rate_limit });
        }

        Request::AgentRateLimitCleared {
            session_id,
            worktree_id,
        } => {
            fan_out(
                clients,
                client_id,
                &Event::AgentRateLimitCleared {
                    session_id,
                    worktree_id,
                },
            );
        }

        Request::AgentReady {
            session_id,
            worktree_id,
        } => {
            fan_out(
                clients,
                client_id,
                &Event::AgentReady {
                    session_id,
                    worktree_id,
                },
            );
        }
    }
}

fn reply(frame_tx: &FrameSender, event: &Event) {
    match serde_json::to_string(event) {
        Ok(frame) => {
            let _ = frame_tx.send(frame);
        }
        Err(e) => warn!(error = %e, "failed to serialise reply"),
    }
}

/// Send `event` to every connected client except the originator.
fn fan_out(clients: &ClientRegistry, origin: ClientId, event: &Event) {
    let frame = match serde_json::to_string(event) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(error = %e, "failed to serialise agent event");
            return;
        }
    };
    for (id, sender) in clients.lock().iter() {
        if *id != origin {
            let _ = sender.send(frame.clone());
        }
    }
}
