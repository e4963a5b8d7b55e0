//! Aegis Server Configuration
//!
//! Server configuration for binding, HTTP limits, the historian store and the
//! simulators. Loadable from a TOML file; every field has a default.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use aegis_common::{HistorianError, Result};
use aegis_historian::aggregation::DEFAULT_MAX_BUCKETS;
use aegis_historian::query::{MAX_RECENT, MAX_RESULTS_CAP};
use aegis_historian::{EngineConfig, StoreConfig};
use aegis_simulation::{ErrorSimulatorConfig, LatencyConfig};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

// =============================================================================
// Server Configuration
// =============================================================================

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
    pub body_limit_bytes: usize,
    pub enable_cors: bool,
    /// Basic auth credentials. Requests are open when unset.
    pub auth: Option<BasicAuthConfig>,
    pub historian: HistorianConfig,
    pub simulation: SimulationSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            request_timeout_secs: 30,
            body_limit_bytes: 10 * 1024 * 1024, // 10MB
            enable_cors: true,
            auth: None,
            historian: HistorianConfig::default(),
            simulation: SimulationSettings::default(),
        }
    }
}

impl ServerConfig {
    /// Create a new server config with the specified host and port.
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
            ..Default::default()
        }
    }

    /// Load from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            HistorianError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: ServerConfig = toml::from_str(contents)
            .map_err(|e| HistorianError::Configuration(format!("invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.historian.max_data_points == 0 {
            return Err(HistorianError::Configuration(
                "historian.max_data_points must be at least 1".to_string(),
            ));
        }
        if self.historian.max_results_cap > MAX_RESULTS_CAP {
            return Err(HistorianError::Configuration(format!(
                "historian.max_results_cap must not exceed {}",
                MAX_RESULTS_CAP
            )));
        }
        if self.historian.default_max_results > self.historian.max_results_cap {
            return Err(HistorianError::Configuration(
                "historian.default_max_results must not exceed historian.max_results_cap".to_string(),
            ));
        }
        if self.historian.max_recent > MAX_RECENT {
            return Err(HistorianError::Configuration(format!(
                "historian.max_recent must not exceed {}",
                MAX_RECENT
            )));
        }
        if self.simulation.tick_interval_ms == 0 {
            return Err(HistorianError::Configuration(
                "simulation.tick_interval_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Get the socket address for binding.
    pub fn socket_addr(&self) -> SocketAddr {
        format!("{}:{}", self.host, self.port)
            .parse()
            .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], self.port)))
    }

    pub fn with_auth(mut self, username: &str, password: &str) -> Self {
        self.auth = Some(BasicAuthConfig {
            username: username.to_string(),
            password: password.to_string(),
        });
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        if seed.is_some() {
            self.simulation.seed = seed;
        }
        self
    }

    pub fn with_max_data_points(mut self, max: Option<usize>) -> Self {
        if let Some(max) = max {
            self.historian.max_data_points = max;
        }
        self
    }
}

// =============================================================================
// Basic Auth
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasicAuthConfig {
    pub username: String,
    pub password: String,
}

// =============================================================================
// Historian Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistorianConfig {
    pub max_data_points: usize,
    pub default_max_results: usize,
    pub max_results_cap: usize,
    pub max_recent: usize,
    pub max_buckets: usize,
    pub retention_sweep_interval_secs: u64,
}

impl Default for HistorianConfig {
    fn default() -> Self {
        let store = StoreConfig::default();
        Self {
            max_data_points: store.max_data_points,
            default_max_results: store.default_max_results,
            max_results_cap: store.max_results_cap,
            max_recent: store.max_recent,
            max_buckets: DEFAULT_MAX_BUCKETS,
            retention_sweep_interval_secs: 60,
        }
    }
}

impl HistorianConfig {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            store: StoreConfig {
                max_data_points: self.max_data_points,
                default_max_results: self.default_max_results,
                max_results_cap: self.max_results_cap,
                max_recent: self.max_recent,
            },
            max_buckets: self.max_buckets,
        }
    }
}

// =============================================================================
// Simulation Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    /// Fixed RNG seed; entropy when unset.
    pub seed: Option<u64>,
    pub tick_interval_ms: u64,
    /// Ticks back-filled when a scenario load does not say otherwise.
    pub default_scenario_ticks: u64,
    pub max_scenario_ticks: u64,
    pub errors: ErrorDefaults,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            seed: None,
            tick_interval_ms: 1_000,
            default_scenario_ticks: 300,
            max_scenario_ticks: 86_400,
            errors: ErrorDefaults::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorDefaults {
    pub enabled: bool,
    pub global_error_rate: f64,
    pub latency_enabled: bool,
    pub latency_mean_ms: f64,
    pub latency_std_dev_ms: f64,
}

impl Default for ErrorDefaults {
    fn default() -> Self {
        let latency = LatencyConfig::default();
        Self {
            enabled: false,
            global_error_rate: 0.0,
            latency_enabled: latency.enabled,
            latency_mean_ms: latency.mean_ms,
            latency_std_dev_ms: latency.std_dev_ms,
        }
    }
}

impl ErrorDefaults {
    pub fn simulator_config(&self) -> ErrorSimulatorConfig {
        ErrorSimulatorConfig {
            enabled: self.enabled,
            global_error_rate: self.global_error_rate,
            latency: LatencyConfig {
                enabled: self.latency_enabled,
                mean_ms: self.latency_mean_ms,
                std_dev_ms: self.latency_std_dev_ms,
            },
            ..Default::default()
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
