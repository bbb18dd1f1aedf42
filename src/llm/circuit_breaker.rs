//! Circuit breaker for a model endpoint

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,   // Normal operation
    Open,     // Failing, reject calls
    HalfOpen, // Admitting trial calls
}

#[derive(Debug)]
struct BreakerEntry {
    state: BreakerState,
    consecutive_failures: usize,
    opened_at: Option<Instant>,
}

/// Circuit breaker configuration
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: usize,
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
        }
    }
}

/// Breaker guarding one model client.
///
/// Opens after `failure_threshold` consecutive failed calls. Once
/// `reset_timeout` has elapsed it goes half-open and admits every caller
/// until one of them reports back: a success closes it, a failure reopens it.
/// Concurrent callers in the half-open window are not limited to one.
pub struct CircuitBreaker {
    entry: Mutex<BreakerEntry>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            entry: Mutex::new(BreakerEntry {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                opened_at: None,
            }),
            config,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerEntry> {
        self.entry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Whether calls should be rejected right now
    pub fn is_open(&self) -> bool {
        let mut entry = self.lock();
        match entry.state {
            BreakerState::Closed | BreakerState::HalfOpen => false,
            BreakerState::Open => {
                let cooled_down = entry
                    .opened_at
                    .map(|at| at.elapsed() >= self.config.reset_timeout)
                    .unwrap_or(true);
                if cooled_down {
                    entry.state = BreakerState::HalfOpen;
                }
                !cooled_down
            }
        }
    }

    pub fn mark_success(&self) {
        let mut entry = self.lock();
        entry.state = BreakerState::Closed;
        entry.consecutive_failures = 0;
        entry.opened_at = None;
    }

    pub fn mark_failure(&self) {
        let mut entry = self.lock();
        entry.consecutive_failures += 1;

        // A failed probe reopens immediately
        if entry.state == BreakerState::HalfOpen
            || entry.consecutive_failures >= self.config.failure_threshold
        {
            entry.state = BreakerState::Open;
            entry.opened_at = Some(Instant::now());
        }
    }

    pub fn state(&self) -> BreakerState {
        self.lock().state
    }

    pub fn consecutive_failures(&self) -> usize {
        self.lock().consecutive_failures
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}
