//! Aegis Simulation Edge Cases
//!
//! Independently toggleable fault scenarios. Data scenarios mutate or
//! synthesize pathological samples; request scenarios intercept the HTTP
//! boundary and either let the request continue (possibly delayed) or answer
//! it with a simulated response. Active scenarios compose in catalog order.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::random::RandomSource;
use aegis_common::{HistorianError, Result};
use aegis_historian::{DataPoint, Quality, TagValue};
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

// =============================================================================
// Scenario Catalog
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeCaseScenario {
    NullValues,
    ExtremeValues,
    TimestampEdges,
    CorruptedData,
    MemoryPressure,
    MalformedResponses,
    ConnectionDrops,
    SlowResponses,
}

impl EdgeCaseScenario {
    pub const ALL: [EdgeCaseScenario; 8] = [
        EdgeCaseScenario::NullValues,
        EdgeCaseScenario::ExtremeValues,
        EdgeCaseScenario::TimestampEdges,
        EdgeCaseScenario::CorruptedData,
        EdgeCaseScenario::MemoryPressure,
        EdgeCaseScenario::MalformedResponses,
        EdgeCaseScenario::ConnectionDrops,
        EdgeCaseScenario::SlowResponses,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EdgeCaseScenario::NullValues => "null_values",
            EdgeCaseScenario::ExtremeValues => "extreme_values",
            EdgeCaseScenario::TimestampEdges => "timestamp_edges",
            EdgeCaseScenario::CorruptedData => "corrupted_data",
            EdgeCaseScenario::MemoryPressure => "memory_pressure",
            EdgeCaseScenario::MalformedResponses => "malformed_responses",
            EdgeCaseScenario::ConnectionDrops => "connection_drops",
            EdgeCaseScenario::SlowResponses => "slow_responses",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            EdgeCaseScenario::NullValues => "Replaces 10% of values with null at quality 0",
            EdgeCaseScenario::ExtremeValues => "Substitutes 5% of values with numeric extremes",
            EdgeCaseScenario::TimestampEdges => "Moves 5% of samples to boundary timestamps",
            EdgeCaseScenario::CorruptedData => "Corrupts 2% of values into garbage strings",
            EdgeCaseScenario::MemoryPressure => "Fails 10% of requests with a storage exhaustion error",
            EdgeCaseScenario::MalformedResponses => "Answers 10% of requests with truncated JSON",
            EdgeCaseScenario::ConnectionDrops => "Drops 5% of requests without a body",
            EdgeCaseScenario::SlowResponses => "Delays 20% of responses by 2-8 seconds",
        }
    }

    /// Per-point mutation probability for data scenarios.
    pub fn data_probability(&self) -> Option<f64> {
        match self {
            EdgeCaseScenario::NullValues => Some(0.10),
            EdgeCaseScenario::ExtremeValues => Some(0.05),
            EdgeCaseScenario::TimestampEdges => Some(0.05),
            EdgeCaseScenario::CorruptedData => Some(0.02),
            _ => None,
        }
    }

    /// Per-request trigger probability for request scenarios.
    pub fn request_probability(&self) -> Option<f64> {
        match self {
            EdgeCaseScenario::MemoryPressure => Some(0.10),
            EdgeCaseScenario::MalformedResponses => Some(0.10),
            EdgeCaseScenario::ConnectionDrops => Some(0.05),
            EdgeCaseScenario::SlowResponses => Some(0.20),
            _ => None,
        }
    }

    pub fn has_data_generator(&self) -> bool {
        self.data_probability().is_some()
    }
}

impl FromStr for EdgeCaseScenario {
    type Err = HistorianError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        EdgeCaseScenario::ALL
            .into_iter()
            .find(|k| k.name() == normalized)
            .ok_or_else(|| HistorianError::UnknownScenario(s.to_string()))
    }
}

impl fmt::Display for EdgeCaseScenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

const EXTREME_VALUES: [f64; 8] = [
    f64::MAX,
    f64::MIN,
    f64::MIN_POSITIVE,
    -f64::MIN_POSITIVE,
    1e308,
    -1e308,
    0.0,
    -0.0,
];

const CORRUPTED_VALUES: [&str; 6] = [
    "\u{0}\u{1}\u{2}",
    "NaN",
    "0xDEADBEEF",
    "{\"broken\":",
    "\u{FFFD}\u{FFFD}",
    "1.2.3",
];

fn edge_timestamps() -> Vec<DateTime<Utc>> {
    [
        Utc.timestamp_opt(0, 0).single(),
        Utc.timestamp_millis_opt(1).single(),
        Utc.with_ymd_and_hms(2038, 1, 19, 3, 14, 7).single(),
        Utc.with_ymd_and_hms(2024, 2, 29, 12, 0, 0).single(),
        Utc.with_ymd_and_hms(2016, 12, 31, 23, 59, 59).single(),
        Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59).single(),
    ]
    .into_iter()
    .flatten()
    .collect()
}

// =============================================================================
// Request Interception
// =============================================================================

/// Response produced by a request scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedResponse {
    pub status_code: u16,
    pub body: String,
    pub content_type: &'static str,
    pub close_connection: bool,
}

/// What the request chain decided.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestDecision {
    /// Let the handler run; delay the finished response.
    Continue { delay: Option<std::time::Duration> },
    Respond(SimulatedResponse),
}

impl RequestDecision {
    pub fn proceed() -> Self {
        RequestDecision::Continue { delay: None }
    }
}

// =============================================================================
// Edge Case Simulator
// =============================================================================

/// Status entry for listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EdgeCaseStatus {
    pub name: String,
    pub description: String,
    pub active: bool,
    pub transforms_data: bool,
    pub intercepts_requests: bool,
}

#[derive(Debug, Default)]
pub struct EdgeCaseSimulator {
    active: BTreeSet<EdgeCaseScenario>,
    points_mutated: u64,
    requests_intercepted: u64,
}

impl EdgeCaseSimulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn activate(&mut self, scenario: EdgeCaseScenario) -> bool {
        let added = self.active.insert(scenario);
        if added {
            tracing::info!(scenario = scenario.name(), "edge case activated");
        }
        added
    }

    pub fn deactivate(&mut self, scenario: EdgeCaseScenario) -> bool {
        self.active.remove(&scenario)
    }

    pub fn deactivate_all(&mut self) {
        self.active.clear();
    }

    pub fn is_active(&self, scenario: EdgeCaseScenario) -> bool {
        self.active.contains(&scenario)
    }

    pub fn active(&self) -> Vec<EdgeCaseScenario> {
        self.active.iter().copied().collect()
    }

    pub fn status(&self) -> Vec<EdgeCaseStatus> {
        EdgeCaseScenario::ALL
            .into_iter()
            .map(|s| EdgeCaseStatus {
                name: s.name().to_string(),
                description: s.description().to_string(),
                active: self.is_active(s),
                transforms_data: s.data_probability().is_some(),
                intercepts_requests: s.request_probability().is_some(),
            })
            .collect()
    }

    pub fn points_mutated(&self) -> u64 {
        self.points_mutated
    }

    pub fn requests_intercepted(&self) -> u64 {
        self.requests_intercepted
    }

    /// Run every active data scenario over the batch in order. With nothing
    /// active the batch is returned untouched.
    pub fn apply_data_edge_cases(&mut self, rng: &mut dyn RandomSource, mut points: Vec<DataPoint>) -> Vec<DataPoint> {
        let scenarios: Vec<EdgeCaseScenario> = self.active.iter().copied().collect();
        for scenario in scenarios {
            let Some(probability) = scenario.data_probability() else {
                continue;
            };
            for point in points.iter_mut() {
                if rng.chance(probability) {
                    Self::mutate(rng, scenario, point);
                    self.points_mutated += 1;
                }
            }
        }
        points
    }

    fn mutate(rng: &mut dyn RandomSource, scenario: EdgeCaseScenario, point: &mut DataPoint) {
        match scenario {
            EdgeCaseScenario::NullValues => {
                point.value = TagValue::Null;
                point.quality = Quality::BAD;
            }
            EdgeCaseScenario::ExtremeValues => {
                point.value = TagValue::Float(EXTREME_VALUES[rng.index(EXTREME_VALUES.len())]);
            }
            EdgeCaseScenario::TimestampEdges => {
                let catalog = edge_timestamps();
                point.timestamp = catalog[rng.index(catalog.len())];
            }
            EdgeCaseScenario::CorruptedData => {
                point.value = TagValue::String(CORRUPTED_VALUES[rng.index(CORRUPTED_VALUES.len())].to_string());
            }
            _ => {}
        }
    }

    /// Produce `count` pathological samples for a tag, cycling through the
    /// scenario's fixed catalog.
    pub fn generate_edge_case_data(
        &self,
        scenario: EdgeCaseScenario,
        tag_name: &str,
        count: usize,
        start: DateTime<Utc>,
    ) -> Result<Vec<DataPoint>> {
        if !scenario.has_data_generator() {
            return Err(HistorianError::Configuration(format!(
                "edge case {} does not generate data",
                scenario
            )));
        }

        let timestamps = edge_timestamps();
        let points = (0..count)
            .map(|i| {
                let ts = start + Duration::seconds(i as i64);
                match scenario {
                    EdgeCaseScenario::NullValues => DataPoint::null(tag_name, ts),
                    EdgeCaseScenario::ExtremeValues => {
                        DataPoint::good(tag_name, ts, EXTREME_VALUES[i % EXTREME_VALUES.len()])
                    }
                    EdgeCaseScenario::TimestampEdges => {
                        DataPoint::good(tag_name, timestamps[i % timestamps.len()], 0.0)
                    }
                    _ => DataPoint::new(
                        tag_name,
                        ts,
                        CORRUPTED_VALUES[i % CORRUPTED_VALUES.len()],
                        Quality::UNCERTAIN,
                    ),
                }
            })
            .collect();
        Ok(points)
    }

    /// Run the active request scenarios. The first scenario that answers
    /// wins; delays from continuing scenarios accumulate.
    pub fn handle_request(&mut self, rng: &mut dyn RandomSource) -> RequestDecision {
        let mut total_delay: Option<std::time::Duration> = None;

        let scenarios: Vec<EdgeCaseScenario> = self.active.iter().copied().collect();
        for scenario in scenarios {
            let Some(probability) = scenario.request_probability() else {
                continue;
            };
            if !rng.chance(probability) {
                continue;
            }
            self.requests_intercepted += 1;

            let response = match scenario {
                EdgeCaseScenario::MemoryPressure => SimulatedResponse {
                    status_code: 503,
                    body: serde_json::json!({
                        "Success": false,
                        "Error": {
                            "Code": "MEMORY_PRESSURE",
                            "Message": "Insufficient memory to complete request",
                            "Retryable": true,
                        },
                        "Timestamp": Utc::now(),
                    })
                    .to_string(),
                    content_type: "application/json",
                    close_connection: false,
                },
                EdgeCaseScenario::MalformedResponses => SimulatedResponse {
                    status_code: 200,
                    body: "{\"Success\":true,\"Data\":[{\"TagName\":\"".to_string(),
                    content_type: "application/json",
                    close_connection: false,
                },
                EdgeCaseScenario::ConnectionDrops => SimulatedResponse {
                    status_code: 502,
                    body: String::new(),
                    content_type: "text/plain",
                    close_connection: true,
                },
                EdgeCaseScenario::SlowResponses => {
                    let millis = rng.uniform(2_000.0, 8_000.0) as u64;
                    let delay = std::time::Duration::from_millis(millis);
                    total_delay = Some(total_delay.unwrap_or_default() + delay);
                    continue;
                }
                _ => continue,
            };

            tracing::debug!(scenario = scenario.name(), status = response.status_code, "request intercepted");
            return RequestDecision::Respond(response);
        }

        RequestDecision::Continue { delay: total_delay }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::{SeededRandom, SequenceRandom};

    fn sample_points(n: usize) -> Vec<DataPoint> {
        let t0 = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        (0..n)
            .map(|i| DataPoint::good("TEMP", t0 + Duration::seconds(i as i64), i as f64))
            .collect()
    }

    #[test]
    fn test_parse_scenarios() {
        assert_eq!("null_values".parse::<EdgeCaseScenario>().unwrap(), EdgeCaseScenario::NullValues);
        assert_eq!("Slow-Responses".parse::<EdgeCaseScenario>().unwrap(), EdgeCaseScenario::SlowResponses);
        assert!("gremlins".parse::<EdgeCaseScenario>().is_err());
    }

    #[test]
    fn test_deactivate_all_is_identity() {
        let mut sim = EdgeCaseSimulator::new();
        let mut rng = SeededRandom::new(1);
        for scenario in EdgeCaseScenario::ALL {
            sim.activate(scenario);
        }
        sim.deactivate_all();

        let points = sample_points(500);
        assert_eq!(sim.apply_data_edge_cases(&mut rng, points.clone()), points);
        assert_eq!(sim.handle_request(&mut rng), RequestDecision::proceed());
    }

    #[test]
    fn test_null_injection_rate() {
        let mut sim = EdgeCaseSimulator::new();
        let mut rng = SeededRandom::new(2);
        sim.activate(EdgeCaseScenario::NullValues);

        let mutated = sim.apply_data_edge_cases(&mut rng, sample_points(10_000));
        let nulls = mutated.iter().filter(|p| p.value.is_null()).count();

        assert!((800..1200).contains(&nulls), "nulls {}", nulls);
        assert!(mutated.iter().filter(|p| p.value.is_null()).all(|p| p.quality.is_bad()));
    }

    #[test]
    fn test_sequential_composition() {
        let mut sim = EdgeCaseSimulator::new();
        sim.activate(EdgeCaseScenario::NullValues);
        sim.activate(EdgeCaseScenario::CorruptedData);

        // Every draw triggers, so nulls are then overwritten by corruption.
        let mut rng = SequenceRandom::constant(0.0);
        let mutated = sim.apply_data_edge_cases(&mut rng, sample_points(3));

        assert!(mutated.iter().all(|p| matches!(p.value, TagValue::String(_))));
        assert!(mutated.iter().all(|p| p.quality.is_bad()));
        assert_eq!(sim.points_mutated(), 6);
    }

    #[test]
    fn test_generate_cycles_catalog() {
        let sim = EdgeCaseSimulator::new();
        let t0 = Utc::now();

        let extremes = sim
            .generate_edge_case_data(EdgeCaseScenario::ExtremeValues, "T", 10, t0)
            .unwrap();
        assert_eq!(extremes.len(), 10);
        assert_eq!(extremes[0].value, TagValue::Float(f64::MAX));
        assert_eq!(extremes[8].value, TagValue::Float(f64::MAX));

        let stamps = sim
            .generate_edge_case_data(EdgeCaseScenario::TimestampEdges, "T", 2, t0)
            .unwrap();
        assert_eq!(stamps[0].timestamp.timestamp(), 0);

        assert!(sim
            .generate_edge_case_data(EdgeCaseScenario::SlowResponses, "T", 1, t0)
            .is_err());
    }

    #[test]
    fn test_request_chain() {
        let mut sim = EdgeCaseSimulator::new();
        sim.activate(EdgeCaseScenario::SlowResponses);

        let mut rng = SequenceRandom::new(vec![0.1, 0.5]);
        match sim.handle_request(&mut rng) {
            RequestDecision::Continue { delay: Some(delay) } => {
                assert_eq!(delay, std::time::Duration::from_millis(5_000));
            }
            other => panic!("expected delay, got {:?}", other),
        }

        sim.activate(EdgeCaseScenario::ConnectionDrops);
        let mut rng = SequenceRandom::constant(0.01);
        match sim.handle_request(&mut rng) {
            RequestDecision::Respond(response) => {
                assert_eq!(response.status_code, 502);
                assert!(response.close_connection);
            }
            other => panic!("expected response, got {:?}", other),
        }
        assert_eq!(sim.requests_intercepted(), 2);
    }
}
