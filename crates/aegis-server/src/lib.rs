//! Aegis Server - Historian REST Surface
//!
//! HTTP front end for the historian surrogate. Exposes tag management, the
//! write and read paths, aggregation, plant scenarios and simulator control
//! behind a middleware chain that can inject realistic faults.
//!
//! Key Features:
//! - PascalCase JSON envelope shared by every endpoint
//! - Basic authentication
//! - Error simulation with per-endpoint circuit breakers
//! - Data and request edge cases
//! - Background retention sweep
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use config::{BasicAuthConfig, HistorianConfig, ServerConfig, SimulationSettings};
pub use handlers::{ApiError, ApiResponse, WriteResponse};
pub use router::create_router;
pub use state::{AppState, FaultInjector};
