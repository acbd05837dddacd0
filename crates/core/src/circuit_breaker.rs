//! A three-state circuit breaker guarding the upstream search client.
//!
//! State lives behind a single mutex so `allow`/`record_success`/
//! `record_failure` can be called from any task without races. There is
//! no explicit "half-open" variant in the state struct itself: once
//! `open_until` has passed, the next `allow()` simply returns `true`
//! again, and the call's own success/failure decides whether the
//! breaker re-closes or re-opens.

use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct BreakerState {
    failure_count: u32,
    open_until: Option<Instant>,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    threshold: u32,
    open_duration: Duration,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, open_seconds: u64) -> Self {
        Self {
            threshold: threshold.max(1),
            open_duration: Duration::from_secs(open_seconds.max(5)),
            state: Mutex::new(BreakerState {
                failure_count: 0,
                open_until: None,
            }),
        }
    }

    /// Whether a new upstream call may be attempted right now.
    pub fn allow(&self) -> bool {
        let state = self.state.lock().expect("circuit breaker mutex poisoned");
        match state.open_until {
            Some(until) => Instant::now() >= until,
            None => true,
        }
    }

    /// Call after a successful upstream request: resets failure count and
    /// clears the open window.
    pub fn record_success(&self) {
        let mut state = self.state.lock().expect("circuit breaker mutex poisoned");
        state.failure_count = 0;
        state.open_until = None;
    }

    /// Call after a failed upstream request. Trips the breaker once the
    /// failure count reaches the threshold; the count is *not* reset on
    /// tripping, only on a subsequent success.
    pub fn record_failure(&self) {
        let mut state = self.state.lock().expect("circuit breaker mutex poisoned");
        state.failure_count += 1;
        if state.failure_count >= self.threshold {
            state.open_until = Some(Instant::now() + self.open_duration);
        }
    }
}
