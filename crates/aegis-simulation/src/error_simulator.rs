//! Aegis Simulation Error Simulator
//!
//! Probabilistic HTTP fault injection with per-endpoint circuit breakers.
//!
//! Key Features:
//! - Global and per-endpoint error rates
//! - Pattern rules for timeouts on reads, auth failures on tag mutations
//!   and rate limiting on writes
//! - Weighted error table shaped like real failures, with retryable flags
//! - Rolling 24h error history feeding statistics
//! - Normally distributed artificial latency
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStatus, CircuitState};
use crate::random::RandomSource;
use aegis_common::HistorianError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};

const HISTORY_WINDOW_HOURS: i64 = 24;
const MAX_HISTORY: usize = 10_000;

// =============================================================================
// Error Table
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    InternalServerError,
    ServiceUnavailable,
    GatewayTimeout,
    BadGateway,
    RateLimited,
    Unauthorized,
    Forbidden,
    DatabaseError,
    CircuitOpen,
}

/// Row of the error table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorSpec {
    pub status_code: u16,
    pub message: &'static str,
    pub code: &'static str,
    pub retryable: bool,
}

impl ErrorKind {
    /// Kinds drawn when no pattern rule applies, with relative weights.
    pub const WEIGHTED: [(ErrorKind, u32); 8] = [
        (ErrorKind::InternalServerError, 30),
        (ErrorKind::ServiceUnavailable, 20),
        (ErrorKind::GatewayTimeout, 15),
        (ErrorKind::BadGateway, 10),
        (ErrorKind::RateLimited, 10),
        (ErrorKind::DatabaseError, 7),
        (ErrorKind::Unauthorized, 5),
        (ErrorKind::Forbidden, 3),
    ];

    pub fn spec(&self) -> ErrorSpec {
        match self {
            ErrorKind::InternalServerError => ErrorSpec {
                status_code: 500,
                message: "Internal server error",
                code: "INTERNAL_ERROR",
                retryable: false,
            },
            ErrorKind::ServiceUnavailable => ErrorSpec {
                status_code: 503,
                message: "Service temporarily unavailable",
                code: "SERVICE_UNAVAILABLE",
                retryable: true,
            },
            ErrorKind::GatewayTimeout => ErrorSpec {
                status_code: 504,
                message: "Request timed out",
                code: "TIMEOUT",
                retryable: true,
            },
            ErrorKind::BadGateway => ErrorSpec {
                status_code: 502,
                message: "Upstream collector returned an invalid response",
                code: "BAD_GATEWAY",
                retryable: true,
            },
            ErrorKind::RateLimited => ErrorSpec {
                status_code: 429,
                message: "Too many requests",
                code: "RATE_LIMITED",
                retryable: true,
            },
            ErrorKind::Unauthorized => ErrorSpec {
                status_code: 401,
                message: "Authentication failed",
                code: "UNAUTHORIZED",
                retryable: false,
            },
            ErrorKind::Forbidden => ErrorSpec {
                status_code: 403,
                message: "Insufficient permissions",
                code: "FORBIDDEN",
                retryable: false,
            },
            ErrorKind::DatabaseError => ErrorSpec {
                status_code: 500,
                message: "Archive storage error",
                code: "DATABASE_ERROR",
                retryable: true,
            },
            ErrorKind::CircuitOpen => ErrorSpec {
                status_code: 503,
                message: "Circuit breaker is open",
                code: "CIRCUIT_OPEN",
                retryable: true,
            },
        }
    }

    pub fn to_error(&self) -> HistorianError {
        let spec = self.spec();
        HistorianError::Simulated {
            status_code: spec.status_code,
            code: spec.code.to_string(),
            message: spec.message.to_string(),
            retryable: spec.retryable,
        }
    }

    fn weighted(rng: &mut dyn RandomSource) -> ErrorKind {
        let total: u32 = Self::WEIGHTED.iter().map(|(_, w)| w).sum();
        let mut pick = rng.next_f64() * total as f64;
        for (kind, weight) in Self::WEIGHTED {
            if pick < weight as f64 {
                return kind;
            }
            pick -= weight as f64;
        }
        ErrorKind::InternalServerError
    }
}

// =============================================================================
// Configuration
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct LatencyConfig {
    pub enabled: bool,
    pub mean_ms: f64,
    pub std_dev_ms: f64,
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mean_ms: 50.0,
            std_dev_ms: 20.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ErrorSimulatorConfig {
    pub enabled: bool,
    pub global_error_rate: f64,
    /// Keyed by `METHOD:path` or bare path.
    pub endpoint_rates: BTreeMap<String, f64>,
    /// Applied to query, recent and aggregate reads.
    pub timeout_rate: f64,
    /// Applied to tag mutations.
    pub auth_failure_rate: f64,
    /// Applied to data writes.
    pub rate_limit_rate: f64,
    pub latency: LatencyConfig,
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for ErrorSimulatorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            global_error_rate: 0.0,
            endpoint_rates: BTreeMap::new(),
            timeout_rate: 0.0,
            auth_failure_rate: 0.0,
            rate_limit_rate: 0.0,
            latency: LatencyConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

impl ErrorSimulatorConfig {
    fn clamp_rates(&mut self) {
        self.global_error_rate = self.global_error_rate.clamp(0.0, 1.0);
        self.timeout_rate = self.timeout_rate.clamp(0.0, 1.0);
        self.auth_failure_rate = self.auth_failure_rate.clamp(0.0, 1.0);
        self.rate_limit_rate = self.rate_limit_rate.clamp(0.0, 1.0);
        for rate in self.endpoint_rates.values_mut() {
            *rate = rate.clamp(0.0, 1.0);
        }
        self.latency.mean_ms = self.latency.mean_ms.max(0.0);
        self.latency.std_dev_ms = self.latency.std_dev_ms.max(0.0);
        self.circuit_breaker = self.circuit_breaker.clamped();
    }
}

// =============================================================================
// History & Statistics
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ErrorRecord {
    pub timestamp: DateTime<Utc>,
    pub endpoint: String,
    pub kind: ErrorKind,
    pub status_code: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ErrorStats {
    pub requests_evaluated: u64,
    pub errors_injected: u64,
    pub errors_last_24h: usize,
    pub errors_last_hour: usize,
    pub error_rate: f64,
    pub by_code: BTreeMap<String, u64>,
    pub by_endpoint: BTreeMap<String, u64>,
    pub open_circuits: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ErrorSimulatorStatus {
    pub config: ErrorSimulatorConfig,
    pub circuit_breakers: BTreeMap<String, CircuitBreakerStatus>,
}

/// Why a request was chosen to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultTrigger {
    CircuitOpen,
    Pattern(ErrorKind),
    Random,
}

// =============================================================================
// Error Simulator
// =============================================================================

#[derive(Debug, Default)]
pub struct ErrorSimulator {
    config: ErrorSimulatorConfig,
    breakers: HashMap<String, CircuitBreaker>,
    history: VecDeque<ErrorRecord>,
    requests_evaluated: u64,
    errors_injected: u64,
}

pub fn endpoint_key(method: &str, path: &str) -> String {
    format!("{}:{}", method.to_ascii_uppercase(), path)
}

fn is_query_endpoint(path: &str) -> bool {
    path.starts_with("/data/query") || path.starts_with("/data/recent") || path.starts_with("/data/aggregate")
}

fn is_auth_sensitive(method: &str, path: &str) -> bool {
    path.starts_with("/tags") && !method.eq_ignore_ascii_case("GET")
}

fn is_write_endpoint(path: &str) -> bool {
    path.starts_with("/data/write")
}

impl ErrorSimulator {
    pub fn new(config: ErrorSimulatorConfig) -> Self {
        let mut sim = Self::default();
        sim.configure(config);
        sim
    }

    pub fn config(&self) -> &ErrorSimulatorConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Replace the configuration. Existing breakers adopt the new breaker settings.
    pub fn configure(&mut self, mut config: ErrorSimulatorConfig) {
        config.clamp_rates();
        for breaker in self.breakers.values_mut() {
            breaker.set_config(config.circuit_breaker);
        }
        tracing::info!(
            enabled = config.enabled,
            global_rate = config.global_error_rate,
            "error simulation configured"
        );
        self.config = config;
    }

    fn error_rate_for(&self, method: &str, path: &str) -> f64 {
        let rates = &self.config.endpoint_rates;
        rates
            .get(&endpoint_key(method, path))
            .or_else(|| rates.get(path))
            .copied()
            .unwrap_or(self.config.global_error_rate)
    }

    fn breaker(&mut self, key: &str) -> &mut CircuitBreaker {
        let config = self.config.circuit_breaker;
        self.breakers
            .entry(key.to_string())
            .or_insert_with(|| CircuitBreaker::new(config))
    }

    /// Decide whether this request fails. An open breaker always fails;
    /// otherwise the endpoint rate and the pattern rules are drawn in turn.
    /// A request that passes counts as a success for its breaker.
    pub fn should_simulate_error(
        &mut self,
        rng: &mut dyn RandomSource,
        method: &str,
        path: &str,
        now: DateTime<Utc>,
    ) -> Option<FaultTrigger> {
        if !self.config.enabled {
            return None;
        }
        self.requests_evaluated += 1;

        let key = endpoint_key(method, path);
        if self.breaker(&key).check(now) == CircuitState::Open {
            return Some(FaultTrigger::CircuitOpen);
        }

        let trigger = if rng.chance(self.error_rate_for(method, path)) {
            Some(FaultTrigger::Random)
        } else if is_query_endpoint(path) && rng.chance(self.config.timeout_rate) {
            Some(FaultTrigger::Pattern(ErrorKind::GatewayTimeout))
        } else if is_auth_sensitive(method, path) && rng.chance(self.config.auth_failure_rate) {
            Some(FaultTrigger::Pattern(ErrorKind::Unauthorized))
        } else if is_write_endpoint(path) && rng.chance(self.config.rate_limit_rate) {
            Some(FaultTrigger::Pattern(ErrorKind::RateLimited))
        } else {
            None
        };

        let breaker = self.breaker(&key);
        match trigger {
            Some(_) => breaker.record_failure(now),
            None => breaker.record_success(),
        }
        trigger
    }

    /// Materialize a fault and record it in the rolling history.
    pub fn generate_error(
        &mut self,
        rng: &mut dyn RandomSource,
        method: &str,
        path: &str,
        trigger: FaultTrigger,
        now: DateTime<Utc>,
    ) -> HistorianError {
        let kind = match trigger {
            FaultTrigger::CircuitOpen => ErrorKind::CircuitOpen,
            FaultTrigger::Pattern(kind) => kind,
            FaultTrigger::Random => ErrorKind::weighted(rng),
        };
        let spec = kind.spec();

        self.errors_injected += 1;
        self.history.push_back(ErrorRecord {
            timestamp: now,
            endpoint: endpoint_key(method, path),
            kind,
            status_code: spec.status_code,
        });
        self.prune_history(now);

        tracing::debug!(method, path, code = spec.code, "simulated error injected");
        kind.to_error()
    }

    /// Both steps at once.
    pub fn evaluate(
        &mut self,
        rng: &mut dyn RandomSource,
        method: &str,
        path: &str,
        now: DateTime<Utc>,
    ) -> Option<HistorianError> {
        let trigger = self.should_simulate_error(rng, method, path, now)?;
        Some(self.generate_error(rng, method, path, trigger, now))
    }

    /// Artificial latency, normally distributed and floored at zero.
    pub fn simulate_latency(&self, rng: &mut dyn RandomSource) -> Option<std::time::Duration> {
        let latency = &self.config.latency;
        if !self.config.enabled || !latency.enabled {
            return None;
        }
        let millis = rng.normal(latency.mean_ms, latency.std_dev_ms).max(0.0);
        Some(std::time::Duration::from_micros((millis * 1_000.0) as u64))
    }

    fn prune_history(&mut self, now: DateTime<Utc>) {
        let cutoff = now - Duration::hours(HISTORY_WINDOW_HOURS);
        while self
            .history
            .front()
            .map_or(false, |r| r.timestamp < cutoff || self.history.len() > MAX_HISTORY)
        {
            self.history.pop_front();
        }
    }

    pub fn history(&self) -> impl Iterator<Item = &ErrorRecord> {
        self.history.iter()
    }

    // -------------------------------------------------------------------------
    // Circuit Breaker Control
    // -------------------------------------------------------------------------

    pub fn trip_circuit(&mut self, method: &str, path: &str, now: DateTime<Utc>) {
        self.breaker(&endpoint_key(method, path)).trip(now);
    }

    /// Close one breaker, or all of them when no endpoint is given.
    pub fn reset_circuit(&mut self, endpoint: Option<(&str, &str)>) -> usize {
        match endpoint {
            Some((method, path)) => match self.breakers.get_mut(&endpoint_key(method, path)) {
                Some(breaker) => {
                    breaker.reset();
                    1
                }
                None => 0,
            },
            None => {
                self.breakers.values_mut().for_each(CircuitBreaker::reset);
                self.breakers.len()
            }
        }
    }

    pub fn set_circuit_config(&mut self, config: CircuitBreakerConfig) {
        let config = config.clamped();
        self.config.circuit_breaker = config;
        for breaker in self.breakers.values_mut() {
            breaker.set_config(config);
        }
    }

    pub fn circuit_state(&mut self, method: &str, path: &str, now: DateTime<Utc>) -> Option<CircuitState> {
        self.breakers
            .get_mut(&endpoint_key(method, path))
            .map(|b| b.check(now))
    }

    // -------------------------------------------------------------------------
    // Reporting
    // -------------------------------------------------------------------------

    pub fn status(&mut self, now: DateTime<Utc>) -> ErrorSimulatorStatus {
        let circuit_breakers = self
            .breakers
            .iter_mut()
            .map(|(key, breaker)| {
                breaker.check(now);
                (key.clone(), breaker.status())
            })
            .collect();
        ErrorSimulatorStatus {
            config: self.config.clone(),
            circuit_breakers,
        }
    }

    pub fn stats(&mut self, now: DateTime<Utc>) -> ErrorStats {
        self.prune_history(now);

        let hour_ago = now - Duration::hours(1);
        let mut by_code = BTreeMap::new();
        let mut by_endpoint = BTreeMap::new();
        for record in &self.history {
            *by_code.entry(record.kind.spec().code.to_string()).or_insert(0) += 1;
            *by_endpoint.entry(record.endpoint.clone()).or_insert(0) += 1;
        }

        let open_circuits = self
            .breakers
            .values_mut()
            .map(|b| b.check(now))
            .filter(|state| *state != CircuitState::Closed)
            .count();

        ErrorStats {
            requests_evaluated: self.requests_evaluated,
            errors_injected: self.errors_injected,
            errors_last_24h: self.history.len(),
            errors_last_hour: self.history.iter().filter(|r| r.timestamp >= hour_ago).count(),
            error_rate: if self.requests_evaluated == 0 {
                0.0
            } else {
                self.errors_injected as f64 / self.requests_evaluated as f64
            },
            by_code,
            by_endpoint,
            open_circuits,
        }
    }

    /// Clear breakers, history and counters. Configuration is kept.
    pub fn reset(&mut self) {
        self.breakers.clear();
        self.history.clear();
        self.requests_evaluated = 0;
        self.errors_injected = 0;
    }
}

// =============================================================================
// Tests
// =============================================================================
