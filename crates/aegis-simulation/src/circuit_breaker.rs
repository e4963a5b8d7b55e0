//! Aegis Simulation Circuit Breaker
//!
//! Per-endpoint breaker driven by simulated failures.
//!
//! ```text
//! Closed --(failures >= threshold)--> Open
//! Open   --(open_duration elapsed)--> HalfOpen
//! HalfOpen --success--> Closed
//! HalfOpen --failure--> Open
//! ```
//!
//! Time is passed in by the caller so transitions are deterministic.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Configuration
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub open_duration_ms: u64,
}

/// Longest time a breaker may stay open before probing: 24 hours.
pub const MAX_OPEN_DURATION_MS: u64 = 86_400_000;

impl CircuitBreakerConfig {
    /// Bound the config to usable values: at least one failure to trip and
    /// an open window no longer than [`MAX_OPEN_DURATION_MS`].
    pub fn clamped(self) -> Self {
        Self {
            failure_threshold: self.failure_threshold.max(1),
            open_duration_ms: self.open_duration_ms.min(MAX_OPEN_DURATION_MS),
        }
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_duration_ms: 30_000,
        }
    }
}

// =============================================================================
// Circuit Breaker
// =============================================================================

/// Snapshot for status reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CircuitBreakerStatus {
    pub state: CircuitState,
    pub failure_count: u32,
    pub failure_threshold: u32,
    pub open_duration_ms: u64,
    pub opened_at: Option<DateTime<Utc>>,
    pub half_open_at: Option<DateTime<Utc>>,
    pub trips: u64,
}

#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: CircuitState,
    failure_count: u32,
    opened_at: Option<DateTime<Utc>>,
    trips: u64,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config: config.clamped(),
            state: CircuitState::Closed,
            failure_count: 0,
            opened_at: None,
            trips: 0,
        }
    }

    pub fn config(&self) -> CircuitBreakerConfig {
        self.config
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    pub fn set_config(&mut self, config: CircuitBreakerConfig) {
        self.config = config.clamped();
    }

    fn open_duration(&self) -> Duration {
        Duration::milliseconds(self.config.open_duration_ms.min(MAX_OPEN_DURATION_MS) as i64)
    }

    fn half_open_at(&self) -> Option<DateTime<Utc>> {
        self.opened_at
            .and_then(|opened_at| opened_at.checked_add_signed(self.open_duration()))
    }

    /// Resolve a pending Open -> HalfOpen transition and return the state.
    pub fn check(&mut self, now: DateTime<Utc>) -> CircuitState {
        if self.state == CircuitState::Open {
            if let Some(half_open_at) = self.half_open_at() {
                if now >= half_open_at {
                    tracing::info!("circuit breaker half-open");
                    self.state = CircuitState::HalfOpen;
                }
            }
        }
        self.state
    }

    /// State without resolving timers.
    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn record_success(&mut self) {
        match self.state {
            CircuitState::Closed => self.failure_count = 0,
            CircuitState::HalfOpen => {
                tracing::info!("circuit breaker closed");
                self.state = CircuitState::Closed;
                self.failure_count = 0;
                self.opened_at = None;
            }
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&mut self, now: DateTime<Utc>) {
        self.failure_count = self.failure_count.saturating_add(1);
        match self.state {
            CircuitState::Closed if self.failure_count >= self.config.failure_threshold => self.trip(now),
            CircuitState::HalfOpen => self.trip(now),
            _ => {}
        }
    }

    /// Force the breaker open.
    pub fn trip(&mut self, now: DateTime<Utc>) {
        tracing::warn!(failures = self.failure_count, "circuit breaker opened");
        self.state = CircuitState::Open;
        self.opened_at = Some(now);
        self.trips += 1;
    }

    pub fn reset(&mut self) {
        self.state = CircuitState::Closed;
        self.failure_count = 0;
        self.opened_at = None;
    }

    pub fn status(&self) -> CircuitBreakerStatus {
        CircuitBreakerStatus {
            state: self.state,
            failure_count: self.failure_count,
            failure_threshold: self.config.failure_threshold,
            open_duration_ms: self.config.open_duration_ms,
            opened_at: self.opened_at,
            half_open_at: self.half_open_at(),
            trips: self.trips,
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

// =============================================================================
// Tests
// =============================================================================
