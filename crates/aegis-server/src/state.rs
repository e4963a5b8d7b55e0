//! Aegis Server State
//!
//! Application state shared across request handlers: the historian engine,
//! the simulation context that drives scenarios, and the fault injector
//! consulted by the middleware chain.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::config::ServerConfig;
use aegis_common::HistorianError;
use aegis_historian::{DataPoint, HistorianEngine};
use aegis_simulation::{
    EdgeCaseSimulator, ErrorSimulator, RandomSource, RequestDecision, SeededRandom,
    SimulatedResponse, SimulationContext,
};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

// =============================================================================
// Application State
// =============================================================================

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub engine: Arc<HistorianEngine>,
    pub simulation: Arc<Mutex<SimulationContext>>,
    pub faults: Arc<Mutex<FaultInjector>>,
    pub started_at: DateTime<Utc>,
    requests_served: Arc<AtomicU64>,
}

impl AppState {
    /// Create new application state with the given configuration.
    pub fn new(config: ServerConfig) -> Self {
        let engine = HistorianEngine::with_config(config.historian.engine_config());

        let seed = config.simulation.seed;
        let tick_interval = Duration::milliseconds(config.simulation.tick_interval_ms as i64);
        let simulation = SimulationContext::new(
            Box::new(SeededRandom::from_seed(seed)),
            Utc::now(),
            tick_interval,
        );

        let faults = FaultInjector::new(
            Box::new(SeededRandom::from_seed(seed.map(|s| s.wrapping_add(1)))),
            ErrorSimulator::new(config.simulation.errors.simulator_config()),
        );

        tracing::info!(
            max_data_points = config.historian.max_data_points,
            seeded = seed.is_some(),
            "historian state initialized"
        );

        Self {
            config: Arc::new(config),
            engine: Arc::new(engine),
            simulation: Arc::new(Mutex::new(simulation)),
            faults: Arc::new(Mutex::new(faults)),
            started_at: Utc::now(),
            requests_served: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn record_request(&self) {
        self.requests_served.fetch_add(1, Ordering::Relaxed);
    }

    pub fn requests_served(&self) -> u64 {
        self.requests_served.load(Ordering::Relaxed)
    }

    pub fn uptime_secs(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }

    /// Run active data edge cases over points leaving the server.
    pub fn transform_outgoing(&self, points: Vec<DataPoint>) -> Vec<DataPoint> {
        self.faults.lock().transform(points)
    }
}

// =============================================================================
// Fault Injector
// =============================================================================

/// What the middleware should do with a request.
#[derive(Debug)]
pub enum InterceptAction {
    Continue,
    Fail(HistorianError),
    Respond(SimulatedResponse),
}

/// Fault decision plus any delay applied before the response is sent.
#[derive(Debug)]
pub struct Intercept {
    pub action: InterceptAction,
    pub delay: Option<std::time::Duration>,
}

/// Error simulator and edge cases behind one RNG.
pub struct FaultInjector {
    rng: Box<dyn RandomSource>,
    pub edge_cases: EdgeCaseSimulator,
    pub errors: ErrorSimulator,
}

impl FaultInjector {
    pub fn new(rng: Box<dyn RandomSource>, errors: ErrorSimulator) -> Self {
        Self {
            rng,
            edge_cases: EdgeCaseSimulator::new(),
            errors,
        }
    }

    pub fn rng(&mut self) -> &mut dyn RandomSource {
        self.rng.as_mut()
    }

    /// Latency first, then the error simulator, then request edge cases.
    pub fn intercept(&mut self, method: &str, path: &str, now: DateTime<Utc>) -> Intercept {
        let rng = self.rng.as_mut();
        let latency = self.errors.simulate_latency(rng);

        if let Some(error) = self.errors.evaluate(rng, method, path, now) {
            return Intercept {
                action: InterceptAction::Fail(error),
                delay: latency,
            };
        }

        match self.edge_cases.handle_request(rng) {
            RequestDecision::Respond(response) => Intercept {
                action: InterceptAction::Respond(response),
                delay: latency,
            },
            RequestDecision::Continue { delay } => Intercept {
                action: InterceptAction::Continue,
                delay: match (latency, delay) {
                    (Some(a), Some(b)) => Some(a + b),
                    (a, b) => a.or(b),
                },
            },
        }
    }

    pub fn transform(&mut self, points: Vec<DataPoint>) -> Vec<DataPoint> {
        self.edge_cases.apply_data_edge_cases(self.rng.as_mut(), points)
    }
}

// =============================================================================
// Tests
// =============================================================================
