//! Aegis Simulation - Plant Data and Fault Simulation
//!
//! Generates realistic industrial telemetry for the historian and injects
//! the failures a client has to survive. All randomness flows through a
//! single injectable source so runs are reproducible.
//!
//! Key Features:
//! - White, pink, brown and blue noise with a layered sensor model
//! - Trend library combined with equipment output by influence mode
//! - Equipment state machines for CNC, press, thermal and inspection cells
//! - Scenario catalog that back-fills history through the write path
//! - Data and request edge cases, error injection and circuit breakers
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

pub mod random;
pub mod noise;
pub mod trend;
pub mod equipment;
pub mod context;
pub mod scenario;
pub mod edge_cases;
pub mod circuit_breaker;
pub mod error_simulator;

pub use random::{RandomSource, SeededRandom, SequenceRandom};
pub use noise::{Environment, NoiseColor, NoiseGenerator, SensorNoiseProfile};
pub use trend::{Influence, TrendDefinition, TrendGenerator, TrendKind};
pub use equipment::{EquipmentKind, GeneratorState, Phase, RealisticDataGenerator};
pub use context::{SimulationClock, SimulationContext};
pub use scenario::{catalog, ScenarioInfo, ScenarioKind, ScenarioLoader, ScenarioReport};
pub use edge_cases::{EdgeCaseScenario, EdgeCaseSimulator, EdgeCaseStatus, RequestDecision, SimulatedResponse};
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStatus, CircuitState, MAX_OPEN_DURATION_MS,
};
pub use error_simulator::{
    ErrorKind, ErrorSimulator, ErrorSimulatorConfig, ErrorSimulatorStatus, ErrorStats, FaultTrigger,
    LatencyConfig,
};
