//! Circuit breaker guarding the authoritative catalog.
//!
//! Explicit Closed/Open/HalfOpen state machine. Closed counts call
//! outcomes in a sliding window and trips on a failure-rate threshold;
//! Open fails fast for a cooldown period; HalfOpen admits a bounded number
//! of trial calls, closing on enough successes and reopening (with a fresh
//! cooldown) on any failure.

use crate::config::BreakerConfig;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{info, warn};

/// Returned by [`CircuitBreaker::try_acquire`] when the call must not be
/// attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("circuit breaker is open")]
pub struct BreakerRejected;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

struct Inner {
    state: BreakerState,
    /// Most recent call outcomes while Closed; `true` is a failure.
    window: VecDeque<bool>,
    opened_at: Option<Instant>,
    probes_in_flight: u32,
    probe_successes: u32,
}

pub struct CircuitBreaker {
    config: BreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                window: VecDeque::new(),
                opened_at: None,
                probes_in_flight: 0,
                probe_successes: 0,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> BreakerState {
        self.lock().state
    }

    /// Ask permission to attempt the protected call. The caller must report
    /// the attempt's outcome through `record_success`/`record_failure`.
    pub fn try_acquire(&self) -> Result<(), BreakerRejected> {
        let mut inner = self.lock();
        match inner.state {
            BreakerState::Closed => Ok(()),
            BreakerState::Open => {
                let cooled_down = inner
                    .opened_at
                    .is_some_and(|at| at.elapsed() >= self.config.cooldown);
                if !cooled_down {
                    return Err(BreakerRejected);
                }
                info!("Circuit breaker half-open, admitting trial calls");
                inner.state = BreakerState::HalfOpen;
                inner.probes_in_flight = 1;
                inner.probe_successes = 0;
                Ok(())
            }
            BreakerState::HalfOpen => {
                if inner.probes_in_flight >= self.config.half_open_max_probes {
                    return Err(BreakerRejected);
                }
                inner.probes_in_flight += 1;
                Ok(())
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.lock();
        match inner.state {
            BreakerState::Closed => self.push_outcome(&mut inner, false),
            BreakerState::HalfOpen => {
                inner.probes_in_flight = inner.probes_in_flight.saturating_sub(1);
                inner.probe_successes += 1;
                if inner.probe_successes >= self.config.half_open_required_successes {
                    info!("Circuit breaker closed");
                    inner.state = BreakerState::Closed;
                    inner.window.clear();
                    inner.opened_at = None;
                    inner.probes_in_flight = 0;
                    inner.probe_successes = 0;
                }
            }
            // A late result from before the last reopen; the cooldown clock
            // must not be touched by it.
            BreakerState::Open => {}
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.lock();
        match inner.state {
            BreakerState::Closed => {
                self.push_outcome(&mut inner, true);
                let calls = inner.window.len();
                if calls >= self.config.min_calls {
                    let failures = inner.window.iter().filter(|failed| **failed).count();
                    let rate = failures as f64 / calls as f64;
                    if rate >= self.config.failure_rate_threshold {
                        warn!(
                            failures,
                            calls, "Circuit breaker opened, failing fast"
                        );
                        inner.state = BreakerState::Open;
                        inner.opened_at = Some(Instant::now());
                        inner.window.clear();
                    }
                }
            }
            BreakerState::HalfOpen => {
                warn!("Trial call failed, circuit breaker reopened");
                inner.state = BreakerState::Open;
                inner.opened_at = Some(Instant::now());
                inner.probes_in_flight = 0;
                inner.probe_successes = 0;
            }
            BreakerState::Open => {}
        }
    }

    fn push_outcome(&self, inner: &mut Inner, failed: bool) {
        inner.window.push_back(failed);
        while inner.window.len() > self.config.window_size {
            inner.window.pop_front();
        }
    }
}
