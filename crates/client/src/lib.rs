// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon client: WebSocket RPC/event plexer.
//!
//! Outbound requests carry a freshly-allocated request id; inbound
//! reply-family frames are routed to the matching pending-request
//! promise. Unsolicited frames fan out to (a) an event bus and (b) the
//! per-session subscriber channels. A circuit breaker gates connect
//! attempts and requests; `request` wraps `request_once` in
//! retry-with-backoff for transient failures.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use orchard_core::{
    calculate_backoff_delay, retry, CircuitBreaker, RetryPolicy, SessionId, WorktreeId,
};
use orchard_daemon::protocol::{Event, RateLimitInfo, Request, SessionInfo};

/// Per-request reply deadline.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
/// Default deadline for [`DaemonClient::wait_for_agent_ready`].
pub const AGENT_READY_TIMEOUT: Duration = Duration::from_secs(30);

const RECONNECT_BASE_MS: u64 = 1_000;
const RECONNECT_MAX_MS: u64 = 30_000;
const REQUEST_RETRY_ATTEMPTS: u32 = 3;
const REQUEST_RETRY_BASE_MS: u64 = 500;
const REQUEST_RETRY_MAX_MS: u64 = 5_000;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("not connected to daemon")]
    NotConnected,

    #[error("Request timeout")]
    Timeout,

    #[error("circuit breaker is open")]
    CircuitOpen,

    #[error("connection closed")]
    ConnectionClosed,

    /// `session:error` reply from the daemon.
    #[error("{0}")]
    Daemon(String),

    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),
}

impl ClientError {
    /// Transient failures worth retrying: timeouts and connection-level
    /// errors, but never an open breaker.
    pub fn is_retryable(&self) -> bool {
        let msg = self.to_string().to_lowercase();
        (msg.contains("timeout") || msg.contains("not connected") || msg.contains("connection"))
            && !msg.contains("circuit breaker")
    }
}

type PendingMap = Mutex<HashMap<String, oneshot::Sender<Event>>>;
type SessionSubs = Mutex<HashMap<SessionId, Vec<mpsc::UnboundedSender<Event>>>>;

struct Shared {
    url: String,
    /// Sender into the active connection's writer task, when connected.
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
    pending: PendingMap,
    session_subs: SessionSubs,
    breaker: Mutex<CircuitBreaker>,
    event_tx: broadcast::Sender<Event>,
    connected_tx: watch::Sender<bool>,
    reconnect_attempt: AtomicU32,
    request_counter: AtomicU64,
    shutdown: CancellationToken,
}

/// Reconnecting daemon client. Construction initiates the connect loop.
pub struct DaemonClient {
    shared: Arc<Shared>,
    connected_rx: watch::Receiver<bool>,
}

impl DaemonClient {
    /// Create a client for `ws://127.0.0.1:<port>` and start connecting.
    pub fn connect(url: impl Into<String>) -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(256);
        let (connected_tx, connected_rx) = watch::channel(false);
        let shared = Arc::new(Shared {
            url: url.into(),
            outbound: Mutex::new(None),
            pending: Mutex::new(HashMap::new()),
            session_subs: Mutex::new(HashMap::new()),
            breaker: Mutex::new(CircuitBreaker::new(5, 30_000, 2)),
            event_tx,
            connected_tx,
            reconnect_attempt: AtomicU32::new(0),
            request_counter: AtomicU64::new(0),
            shutdown: CancellationToken::new(),
        });

        tokio::spawn(connection_loop(Arc::clone(&shared)));

        Arc::new(Self {
            shared,
            connected_rx,
        })
    }

    pub fn is_connected(&self) -> bool {
        *self.connected_rx.borrow()
    }

    /// Wait until the client reports a live connection.
    pub async fn wait_connected(&self, timeout: Duration) -> Result<(), ClientError> {
        let mut rx = self.connected_rx.clone();
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if *rx.borrow() {
                return Ok(());
            }
            let remaining = deadline
                .checked_duration_since(tokio::time::Instant::now())
                .ok_or(ClientError::Timeout)?;
            if tokio::time::timeout(remaining, rx.changed()).await.is_err() {
                return Err(ClientError::Timeout);
            }
        }
    }

    /// Subscribe to the unsolicited event bus (all frame types).
    pub fn events(&self) -> broadcast::Receiver<Event> {
        self.shared.event_tx.subscribe()
    }

    /// Serialisable breaker state, for status surfaces.
    pub fn breaker_snapshot(&self) -> orchard_core::BreakerSnapshot {
        self.shared.breaker.lock().snapshot()
    }

    /// Stop the reconnect loop and drop the connection.
    pub fn close(&self) {
        self.shared.shutdown.cancel();
        *self.shared.outbound.lock() = None;
        let _ = self.shared.connected_tx.send(false);
    }

    fn next_request_id(&self) -> String {
        let n = self.shared.request_counter.fetch_add(1, Ordering::Relaxed);
        format!("req-{}", n)
    }

    /// Single attempt: rejects immediately when disconnected or the
    /// breaker is open; times out after [`REQUEST_TIMEOUT`].
    pub async fn request_once(&self, request: Request) -> Result<Event, ClientError> {
        if !self.shared.breaker.lock().allows_request() {
            return Err(ClientError::CircuitOpen);
        }
        let sender = self
            .shared
            .outbound
            .lock()
            .clone()
            .ok_or(ClientError::NotConnected)?;

        let request_id = request_id_of(&request)
            .ok_or_else(|| ClientError::UnexpectedReply("request has no request id".into()))?
            .to_string();
        let frame = serde_json::to_string(&request)
            .map_err(|e| ClientError::UnexpectedReply(e.to_string()))?;

        let (reply_tx, reply_rx) = oneshot::channel();
        self.shared.pending.lock().insert(request_id.clone(), reply_tx);

        if sender.send(frame).is_err() {
            self.shared.pending.lock().remove(&request_id);
            return Err(ClientError::NotConnected);
        }

        match tokio::time::timeout(REQUEST_TIMEOUT, reply_rx).await {
            Ok(Ok(Event::SessionError { error, .. })) => {
                self.shared.breaker.lock().record_success();
                Err(ClientError::Daemon(error))
            }
            Ok(Ok(event)) => {
                self.shared.breaker.lock().record_success();
                Ok(event)
            }
            Ok(Err(_)) => {
                // Pending promise dropped: connection went down.
                Err(ClientError::ConnectionClosed)
            }
            Err(_) => {
                self.shared.pending.lock().remove(&request_id);
                self.shared.breaker.lock().record_failure();
                Err(ClientError::Timeout)
            }
        }
    }

    /// [`Self::request_once`] wrapped in retry-with-backoff for
    /// transient failures (3 attempts, 500 ms base, 5 s cap).
    pub async fn request(&self, request: Request) -> Result<Event, ClientError> {
        let policy: RetryPolicy<ClientError> = RetryPolicy {
            max_attempts: REQUEST_RETRY_ATTEMPTS,
            base_delay_ms: REQUEST_RETRY_BASE_MS,
            max_delay_ms: REQUEST_RETRY_MAX_MS,
            multiplier: 2.0,
            is_retryable: Box::new(ClientError::is_retryable),
            on_retry: Some(Box::new(|attempt, err| {
                debug!(attempt, error = %err, "retrying daemon request");
            })),
        };
        retry(&policy, || self.request_once(request.clone())).await
    }

    // ---- Typed RPC surface ----

    pub async fn ping(&self) -> Result<(), ClientError> {
        match self
            .request(Request::Ping {
                request_id: self.next_request_id(),
            })
            .await?
        {
            Event::Pong { .. } => Ok(()),
            other => Err(ClientError::UnexpectedReply(other.type_tag().to_string())),
        }
    }

    pub async fn create_session(
        &self,
        worktree_id: WorktreeId,
        project_path: &Path,
        cwd: &Path,
        initial_command: Option<String>,
    ) -> Result<SessionInfo, ClientError> {
        match self
            .request(Request::SessionCreate {
                request_id: self.next_request_id(),
                worktree_id,
                project_path: project_path.to_path_buf(),
                cwd: cwd.to_path_buf(),
                initial_command,
            })
            .await?
        {
            Event::SessionCreated { session, .. } => Ok(session),
            other => Err(ClientError::UnexpectedReply(other.type_tag().to_string())),
        }
    }

    pub async fn destroy_session(&self, session_id: SessionId) -> Result<(), ClientError> {
        match self
            .request(Request::SessionDestroy {
                request_id: self.next_request_id(),
                session_id,
            })
            .await?
        {
            Event::SessionDestroyed { .. } => Ok(()),
            other => Err(ClientError::UnexpectedReply(other.type_tag().to_string())),
        }
    }

    pub async fn list_sessions(&self) -> Result<Vec<SessionInfo>, ClientError> {
        match self
            .request(Request::SessionList {
                request_id: self.next_request_id(),
            })
            .await?
        {
            Event::SessionList { sessions, .. } => Ok(sessions),
            other => Err(ClientError::UnexpectedReply(other.type_tag().to_string())),
        }
    }

    pub async fn get_session(&self, session_id: SessionId) -> Result<SessionInfo, ClientError> {
        match self
            .request(Request::SessionGet {
                request_id: self.next_request_id(),
                session_id,
            })
            .await?
        {
            Event::SessionInfo { session, .. } => Ok(session),
            other => Err(ClientError::UnexpectedReply(other.type_tag().to_string())),
        }
    }

    /// Subscribe to a session's terminal stream. The returned channel
    /// first yields the `terminal:scrollback` snapshot, then live
    /// frames. Subscriptions survive reconnects.
    pub async fn subscribe_session(
        &self,
        session_id: SessionId,
    ) -> Result<mpsc::UnboundedReceiver<Event>, ClientError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.shared
            .session_subs
            .lock()
            .entry(session_id)
            .or_default()
            .push(tx.clone());

        let scrollback = self
            .request(Request::Subscribe {
                request_id: self.next_request_id(),
                session_id,
            })
            .await?;
        let _ = tx.send(scrollback);
        Ok(rx)
    }

    /// Drop all local subscribers for a session and tell the daemon.
    pub fn unsubscribe_session(&self, session_id: SessionId) {
        self.shared.session_subs.lock().remove(&session_id);
        self.send_fire_and_forget(&Request::Unsubscribe { session_id });
    }

    pub fn send_input(&self, session_id: SessionId, data: &str) {
        self.send_fire_and_forget(&Request::Input {
            session_id,
            data: data.to_string(),
        });
    }

    pub fn resize(&self, session_id: SessionId, cols: u16, rows: u16) {
        self.send_fire_and_forget(&Request::Resize {
            session_id,
            cols,
            rows,
        });
    }

    pub fn ack(&self, session_id: SessionId, count: u32) {
        self.send_fire_and_forget(&Request::Ack { session_id, count });
    }

    /// Post an agent-side notification for fan-out to other clients
    /// (used by the worktree tool server).
    pub fn notify_agent_ready(&self, session_id: SessionId, worktree_id: WorktreeId) {
        self.send_fire_and_forget(&Request::AgentReady {
            session_id,
            worktree_id,
        });
    }

    pub fn notify_task_complete(&self, session_id: SessionId, worktree_id: WorktreeId) {
        self.send_fire_and_forget(&Request::AgentTaskComplete {
            session_id,
            worktree_id,
        });
    }

    pub fn notify_rate_limited(&self, session_id: SessionId, worktree_id: WorktreeId) {
        self.send_fire_and_forget(&Request::AgentRateLimited {
            rate_limit: RateLimitInfo {
                session_id,
                worktree_id,
            },
        });
    }

    /// Resolve on the next `agent:ready` for `session_id`; reject on
    /// timeout.
    pub async fn wait_for_agent_ready(
        &self,
        session_id: SessionId,
        timeout: Duration,
    ) -> Result<(), ClientError> {
        let mut events = self.events();
        let wait = async {
            loop {
                match events.recv().await {
                    Ok(Event::AgentReady {
                        session_id: ready_id,
                        ..
                    }) if ready_id == session_id => return Ok(()),
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(ClientError::ConnectionClosed)
                    }
                }
            }
        };
        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| ClientError::Timeout)?
    }

    fn send_fire_and_forget(&self, request: &Request) {
        let sender = self.shared.outbound.lock().clone();
        let Some(sender) = sender else {
            debug!("fire-and-forget dropped: not connected");
            return;
        };
        if let Ok(frame) = serde_json::to_string(request) {
            let _ = sender.send(frame);
        }
    }
}

impl Drop for DaemonClient {
    fn drop(&mut self) {
        self.shared.shutdown.cancel();
    }
}

fn request_id_of(request: &Request) -> Option<&str> {
    match request {
        Request::Ping { request_id }
        | Request::Status { request_id }
        | Request::SessionCreate { request_id, .. }
        | Request::SessionDestroy { request_id, .. }
        | Request::SessionList { request_id }
        | Request::SessionGet { request_id, .. }
        | Request::Subscribe { request_id, .. } => Some(request_id),
        _ => None,
    }
}

/// Connect loop: exponential backoff between attempts (1 s base, 30 s
/// cap), breaker-gated, with re-subscription after each reconnect.
async fn connection_loop(shared: Arc<Shared>) {
    loop {
        if shared.shutdown.is_cancelled() {
            return;
        }
        if !shared.breaker.lock().allows_request() {
            // Breaker open: suppress connect attempts until it decays.
            tokio::time::sleep(Duration::from_millis(250)).await;
            continue;
        }

        match connect_async(shared.url.as_str()).await {
            Ok((ws, _)) => {
                info!(url = %shared.url, "connected to daemon");
                shared.breaker.lock().record_success();
                shared.reconnect_attempt.store(0, Ordering::Relaxed);
                run_connection(&shared, ws).await;
                // Connection ended: flush pending requests and record
                // the failure for the breaker.
                shared.pending.lock().clear();
                *shared.outbound.lock() = None;
                let _ = shared.connected_tx.send(false);
                shared.breaker.lock().record_failure();
                warn!(url = %shared.url, "daemon connection lost");
            }
            Err(e) => {
                shared.breaker.lock().record_failure();
                debug!(url = %shared.url, error = %e, "connect failed");
            }
        }

        if shared.shutdown.is_cancelled() {
            return;
        }
        let attempt = shared.reconnect_attempt.fetch_add(1, Ordering::Relaxed);
        let delay = calculate_backoff_delay(attempt, RECONNECT_BASE_MS, RECONNECT_MAX_MS, 2.0);
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(delay)) => {}
            _ = shared.shutdown.cancelled() => return,
        }
    }
}

async fn run_connection(
    shared: &Arc<Shared>,
    ws: tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
) {
    let (mut sink, mut source) = ws.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
    *shared.outbound.lock() = Some(outbound_tx.clone());
    let _ = shared.connected_tx.send(true);

    // Re-subscribe every session that still has live client subscribers.
    {
        let mut subs = shared.session_subs.lock();
        subs.retain(|_, senders| {
            senders.retain(|s| !s.is_closed());
            !senders.is_empty()
        });
        for session_id in subs.keys() {
            let n = shared.request_counter.fetch_add(1, Ordering::Relaxed);
            let request = Request::Subscribe {
                request_id: format!("req-{}", n),
                session_id: *session_id,
            };
            if let Ok(frame) = serde_json::to_string(&request) {
                let _ = outbound_tx.send(frame);
            }
        }
    }

    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            if sink.send(Message::text(frame)).await.is_err() {
                break;
            }
        }
    });

    loop {
        let message = tokio::select! {
            m = source.next() => m,
            _ = shared.shutdown.cancelled() => break,
        };
        let Some(Ok(message)) = message else { break };
        let Message::Text(text) = message else {
            continue;
        };
        match serde_json::from_str::<Event>(text.as_str()) {
            Ok(event) => route_inbound(shared, event),
            Err(e) => debug!(error = %e, "unparseable frame dropped"),
        }
    }

    writer.abort();
}

/// Route one inbound frame: reply-family frames complete their pending
/// request; everything else fans out to the bus and session subscribers.
fn route_inbound(shared: &Arc<Shared>, event: Event) {
    if let Some(request_id) = event.request_id() {
        if let Some(reply_tx) = shared.pending.lock().remove(request_id) {
            let _ = reply_tx.send(event);
            return;
        }
        // Reply with no pending request (e.g. re-subscribe scrollback):
        // fall through to fan-out so session subscribers still see it.
    }

    if let Some(session_id) = event.session_id() {
        let mut subs = shared.session_subs.lock();
        if let Some(senders) = subs.get_mut(&session_id) {
            senders.retain(|s| s.send(event.clone()).is_ok());
        }
    }

    let _ = shared.event_tx.send(event);
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
