// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Backoff and circuit-breaker behaviour.

use orchard_core::{calculate_backoff_delay, CircuitBreaker, CircuitState};

#[test]
fn backoff_delay_stays_in_jitter_band() {
    // min(1000 * 2^3, 30000) = 8000; jitter ±20% → [6400, 9600].
    for _ in 0..200 {
        let delay = calculate_backoff_delay(3, 1000, 30000, 2.0);
        assert!((6400..=9600).contains(&delay), "delay {} out of band", delay);
    }
}

#[test]
fn breaker_walks_the_full_state_machine() {
    let mut breaker = CircuitBreaker::new(3, 100, 2);
    assert_eq!(breaker.state(), CircuitState::Closed);

    breaker.record_failure();
    breaker.record_failure();
    breaker.record_failure();
    assert_eq!(breaker.state(), CircuitState::Open);

    std::thread::sleep(std::time::Duration::from_millis(120));
    assert_eq!(breaker.state(), CircuitState::HalfOpen);

    breaker.record_success();
    assert_eq!(breaker.state(), CircuitState::HalfOpen);
    breaker.record_success();
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(breaker.failure_count(), 0);
}

#[test]
fn breaker_success_in_closed_resets_consecutive_failures() {
    let mut breaker = CircuitBreaker::new(3, 60_000, 1);
    breaker.record_failure();
    breaker.record_failure();
    breaker.record_success();
    breaker.record_failure();
    breaker.record_failure();
    // Never three *consecutive* failures, so still closed.
    assert_eq!(breaker.state(), CircuitState::Closed);
}
