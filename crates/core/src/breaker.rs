// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Circuit breaker for the daemon RPC path.
//!
//! Three-state FSM: **closed** (healthy) → **open** after
//! `failure_threshold` consecutive failures → **half-open** once
//! `reset_timeout_ms` has elapsed since the last failure → **closed**
//! again after `success_threshold` probe successes. Any failure while
//! half-open re-opens the circuit.

use serde::{Deserialize, Serialize};

use crate::clock::epoch_ms_now;

/// Observable breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitState {
    /// Healthy: requests allowed.
    Closed,
    /// Tripped: requests blocked until the reset timeout expires.
    Open,
    /// Reset timeout expired: probe requests allowed.
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half-open",
        };
        write!(f, "{}", s)
    }
}

/// Serialisable snapshot of breaker internals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub failure_count: u32,
    pub last_failure_time: Option<u64>,
}

/// Consecutive-failure circuit breaker.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    reset_timeout_ms: u64,
    success_threshold: u32,
    failure_count: u32,
    success_count: u32,
    last_failure_time: Option<u64>,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, reset_timeout_ms: u64, success_threshold: u32) -> Self {
        Self {
            failure_threshold,
            reset_timeout_ms,
            success_threshold,
            failure_count: 0,
            success_count: 0,
            last_failure_time: None,
        }
    }

    /// Current state. Open circuits decay to half-open once the reset
    /// timeout has elapsed since the last failure.
    pub fn state(&self) -> CircuitState {
        if self.failure_count < self.failure_threshold {
            return CircuitState::Closed;
        }
        let last = self.last_failure_time.unwrap_or(0);
        if epoch_ms_now().saturating_sub(last) >= self.reset_timeout_ms {
            CircuitState::HalfOpen
        } else {
            CircuitState::Open
        }
    }

    /// Whether a request should be allowed through right now.
    pub fn allows_request(&self) -> bool {
        self.state() != CircuitState::Open
    }

    /// Record a successful call.
    ///
    /// In closed state this resets the failure counter. In half-open it
    /// counts toward `success_threshold`; reaching it closes the circuit.
    pub fn record_success(&mut self) {
        match self.state() {
            CircuitState::Closed => {
                self.failure_count = 0;
                self.success_count = 0;
            }
            CircuitState::HalfOpen => {
                self.success_count += 1;
                if self.success_count >= self.success_threshold {
                    self.failure_count = 0;
                    self.success_count = 0;
                    self.last_failure_time = None;
                }
            }
            CircuitState::Open => {}
        }
    }

    /// Record a failed call.
    ///
    /// In closed state, reaching `failure_threshold` consecutive failures
    /// opens the circuit. In half-open, any failure re-opens it.
    pub fn record_failure(&mut self) {
        let was_half_open = self.state() == CircuitState::HalfOpen;
        self.failure_count = if was_half_open {
            // Re-open: keep the count at the threshold so state() stays tripped.
            self.success_count = 0;
            self.failure_count.max(self.failure_threshold)
        } else {
            self.failure_count + 1
        };
        self.last_failure_time = Some(epoch_ms_now());
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    /// Serialisable view of the breaker.
    pub fn snapshot(&self) -> BreakerSnapshot {
        BreakerSnapshot {
            state: self.state(),
            failure_count: self.failure_count,
            last_failure_time: self.last_failure_time,
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(5, 30_000, 2)
    }
}

#[cfg(test)]
#[path = "breaker_tests.rs"]
mod tests;
