//! Aegis Simulation Scenarios
//!
//! Closed catalog of plant scenarios. Loading one resets the simulation
//! context, registers equipment and trends, creates any missing tags and
//! back-fills history through the historian's normal write path.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::context::SimulationContext;
use crate::equipment::{EquipmentKind, SIMULATOR_COLLECTOR};
use crate::trend::{Influence, SawtoothDirection, SineCycle, TrendDefinition, TrendKind};
use aegis_common::{HistorianError, Result};
use aegis_historian::{CompressionType, HistorianEngine, PointWrite, Tag};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// Scenario Kind
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioKind {
    CncProduction,
    PressLine,
    ThermalProcess,
    QualityInspection,
    FullPlant,
}

/// A trend a scenario installs, relative to the back-fill start.
#[derive(Debug, Clone)]
pub struct ScenarioTrend {
    pub tag_name: &'static str,
    pub units: &'static str,
    pub kind: TrendKind,
    pub duration_secs: f64,
    pub influence: Influence,
    pub noise_level: f64,
}

impl ScenarioKind {
    pub const ALL: [ScenarioKind; 5] = [
        ScenarioKind::CncProduction,
        ScenarioKind::PressLine,
        ScenarioKind::ThermalProcess,
        ScenarioKind::QualityInspection,
        ScenarioKind::FullPlant,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ScenarioKind::CncProduction => "cnc_production",
            ScenarioKind::PressLine => "press_line",
            ScenarioKind::ThermalProcess => "thermal_process",
            ScenarioKind::QualityInspection => "quality_inspection",
            ScenarioKind::FullPlant => "full_plant",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ScenarioKind::CncProduction => "Two CNC mills cutting parts with gradual tool wear",
            ScenarioKind::PressLine => "Hydraulic press cycling with shift-driven oil temperature",
            ScenarioKind::ThermalProcess => "Heat treatment oven ramping, soaking and cooling",
            ScenarioKind::QualityInspection => "Inline gauge measuring diameters with drift",
            ScenarioKind::FullPlant => "Every machine type plus plant utilities",
        }
    }

    pub fn equipment(&self) -> Vec<(&'static str, EquipmentKind)> {
        match self {
            ScenarioKind::CncProduction => vec![
                ("CNC-01", EquipmentKind::CncMill),
                ("CNC-02", EquipmentKind::CncMill),
            ],
            ScenarioKind::PressLine => vec![("PRESS-01", EquipmentKind::HydraulicPress)],
            ScenarioKind::ThermalProcess => vec![("OVEN-01", EquipmentKind::ThermalProcess)],
            ScenarioKind::QualityInspection => vec![("QC-01", EquipmentKind::QualityStation)],
            ScenarioKind::FullPlant => vec![
                ("CNC-01", EquipmentKind::CncMill),
                ("CNC-02", EquipmentKind::CncMill),
                ("PRESS-01", EquipmentKind::HydraulicPress),
                ("OVEN-01", EquipmentKind::ThermalProcess),
                ("QC-01", EquipmentKind::QualityStation),
            ],
        }
    }

    pub fn trends(&self) -> Vec<ScenarioTrend> {
        let ambient = ScenarioTrend {
            tag_name: "PLANT.AmbientTemperature",
            units: "degC",
            kind: TrendKind::MultiSinusoidal {
                offset: 24.0,
                cycles: vec![
                    SineCycle { amplitude: 4.0, period_secs: 86_400.0, phase: 0.0 },
                    SineCycle { amplitude: 1.0, period_secs: 28_800.0, phase: 0.0 },
                ],
            },
            duration_secs: 86_400.0,
            influence: Influence::Override,
            noise_level: 0.002,
        };

        match self {
            ScenarioKind::CncProduction => vec![ScenarioTrend {
                tag_name: "CNC-01.SpindleLoad",
                units: "%",
                kind: TrendKind::Linear { start: 1.0, end: 1.1 },
                duration_secs: 3_600.0,
                influence: Influence::Multiplicative,
                noise_level: 0.0,
            }],
            ScenarioKind::PressLine => vec![ScenarioTrend {
                tag_name: "PRESS-01.OilTemperature",
                units: "degC",
                kind: TrendKind::Sinusoidal { offset: 0.0, amplitude: 3.0, phase: 0.0 },
                duration_secs: 28_800.0,
                influence: Influence::Additive,
                noise_level: 0.0,
            }],
            ScenarioKind::ThermalProcess => vec![ScenarioTrend {
                tag_name: "OVEN-01.ExhaustFlow",
                units: "m3/h",
                kind: TrendKind::RandomWalk {
                    start: 120.0,
                    step: 2.0,
                    min: 90.0,
                    max: 150.0,
                    reset_probability: 0.001,
                },
                duration_secs: 1.0,
                influence: Influence::Override,
                noise_level: 0.0,
            }],
            ScenarioKind::QualityInspection => vec![ScenarioTrend {
                tag_name: "QC-01.GaugeTemperature",
                units: "degC",
                kind: TrendKind::Sawtooth {
                    min: 20.0,
                    max: 22.0,
                    period_secs: 1_800.0,
                    direction: SawtoothDirection::Rising,
                },
                duration_secs: 1.0,
                influence: Influence::Override,
                noise_level: 0.001,
            }],
            ScenarioKind::FullPlant => {
                let mut trends = vec![
                    ambient,
                    ScenarioTrend {
                        tag_name: "PLANT.CompressedAirPressure",
                        units: "bar",
                        kind: TrendKind::StepFunction {
                            base: 6.5,
                            step_size: 0.3,
                            step_secs: 900.0,
                            randomize: true,
                        },
                        duration_secs: 1.0,
                        influence: Influence::Override,
                        noise_level: 0.005,
                    },
                    ScenarioTrend {
                        tag_name: "PLANT.PowerDemand",
                        units: "kW",
                        kind: TrendKind::ExponentialApproach {
                            start: 50.0,
                            end: 420.0,
                            time_constant_secs: 600.0,
                        },
                        duration_secs: 1.0,
                        influence: Influence::Override,
                        noise_level: 0.01,
                    },
                ];
                for kind in [
                    ScenarioKind::CncProduction,
                    ScenarioKind::PressLine,
                    ScenarioKind::ThermalProcess,
                    ScenarioKind::QualityInspection,
                ] {
                    trends.extend(kind.trends());
                }
                trends
            }
        }
    }
}

impl FromStr for ScenarioKind {
    type Err = HistorianError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        ScenarioKind::ALL
            .into_iter()
            .find(|k| k.name() == normalized)
            .ok_or_else(|| HistorianError::UnknownScenario(s.to_string()))
    }
}

impl fmt::Display for ScenarioKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Catalog entry for listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScenarioInfo {
    pub name: String,
    pub description: String,
    pub equipment: Vec<String>,
    pub trend_tags: Vec<String>,
}

impl From<ScenarioKind> for ScenarioInfo {
    fn from(kind: ScenarioKind) -> Self {
        Self {
            name: kind.name().to_string(),
            description: kind.description().to_string(),
            equipment: kind.equipment().into_iter().map(|(id, _)| id.to_string()).collect(),
            trend_tags: kind.trends().into_iter().map(|t| t.tag_name.to_string()).collect(),
        }
    }
}

pub fn catalog() -> Vec<ScenarioInfo> {
    ScenarioKind::ALL.into_iter().map(ScenarioInfo::from).collect()
}

// =============================================================================
// Scenario Loader
// =============================================================================

/// Summary of a scenario load.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScenarioReport {
    pub scenario: String,
    pub equipment: Vec<String>,
    pub tags_created: usize,
    pub trends_installed: usize,
    pub ticks: u64,
    pub points_generated: usize,
    pub points_written: usize,
    pub points_stored: usize,
    pub points_failed: usize,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

pub struct ScenarioLoader;

impl ScenarioLoader {
    /// Load a scenario and back-fill `ticks` ticks ending at `end`.
    pub fn load(
        kind: ScenarioKind,
        engine: &HistorianEngine,
        context: &mut SimulationContext,
        ticks: u64,
        end: DateTime<Utc>,
    ) -> Result<ScenarioReport> {
        let tick_interval = context.clock.tick_interval;
        let origin = end - Duration::milliseconds(tick_interval.num_milliseconds() * ticks as i64);

        context.reset();
        context.clock.origin = origin;

        let mut report = ScenarioReport {
            scenario: kind.name().to_string(),
            ticks,
            start_time: Some(origin),
            ..Default::default()
        };

        for (equipment_id, equipment_kind) in kind.equipment() {
            context.add_equipment(equipment_id, equipment_kind);
            report.equipment.push(equipment_id.to_string());
        }

        let trends = kind.trends();
        let mut tags = context.generator.tag_definitions();
        for trend in &trends {
            context.set_trend(
                trend.tag_name,
                TrendDefinition::new(trend.kind.clone(), origin, trend.duration_secs)
                    .with_influence(trend.influence)
                    .with_noise(trend.noise_level),
            );
            if !tags.iter().any(|t| t.name == trend.tag_name) {
                tags.push(
                    Tag::float(trend.tag_name)
                        .with_description(format!("{} trend", kind.name()))
                        .with_units(trend.units)
                        .with_collector(SIMULATOR_COLLECTOR)
                        .with_compression(CompressionType::SwingingDoor, 0.01),
                );
            }
        }
        report.trends_installed = trends.len();

        for tag in tags {
            if !engine.registry().contains(&tag.name) {
                engine.create_tag(tag)?;
                report.tags_created += 1;
            }
        }

        for _ in 0..ticks {
            let points = context.tick();
            report.points_generated += points.len();
            let result = engine.write_batch(points.into_iter().map(PointWrite::from).collect());
            report.points_written += result.points_written;
            report.points_stored += result.points_stored;
            report.points_failed += result.points_failed;
        }
        report.end_time = Some(context.clock.now());

        tracing::info!(
            scenario = kind.name(),
            ticks,
            generated = report.points_generated,
            stored = report.points_stored,
            "scenario loaded"
        );
        Ok(report)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::SeededRandom;
    use aegis_historian::TimeSeriesQuery;

    fn context() -> SimulationContext {
        SimulationContext::new(Box::new(SeededRandom::new(17)), Utc::now(), Duration::seconds(1))
    }

    #[test]
    fn test_parse_scenario() {
        assert_eq!("cnc_production".parse::<ScenarioKind>().unwrap(), ScenarioKind::CncProduction);
        assert_eq!("Full-Plant".parse::<ScenarioKind>().unwrap(), ScenarioKind::FullPlant);
        assert_eq!(
            "moon_base".parse::<ScenarioKind>().unwrap_err(),
            HistorianError::UnknownScenario("moon_base".into())
        );
    }

    #[test]
    fn test_catalog_lists_every_scenario() {
        let catalog = catalog();
        assert_eq!(catalog.len(), 5);
        assert!(catalog.iter().any(|s| s.name == "full_plant" && s.equipment.len() == 5));
    }

    #[test]
    fn test_load_backfills_through_write_path() {
        let engine = HistorianEngine::new();
        let mut ctx = context();
        let end = DateTime::from_timestamp(1_700_003_600, 0).unwrap();

        let report = ScenarioLoader::load(ScenarioKind::CncProduction, &engine, &mut ctx, 120, end).unwrap();

        assert_eq!(report.tags_created, 16);
        assert_eq!(report.points_generated, 120 * 16);
        assert_eq!(report.points_failed, 0);
        assert_eq!(report.points_written, report.points_generated);
        assert!(report.points_stored > 0);
        assert_eq!(report.end_time, Some(end));

        let query = TimeSeriesQuery::new(["CNC-01.State"], end - Duration::hours(1), end);
        let result = engine.query(&query).unwrap();
        assert_eq!(result.points_for("CNC-01.State").unwrap().len(), 120);
    }

    #[test]
    fn test_reload_does_not_duplicate_tags() {
        let engine = HistorianEngine::new();
        let mut ctx = context();
        let end = Utc::now();

        ScenarioLoader::load(ScenarioKind::PressLine, &engine, &mut ctx, 10, end).unwrap();
        let report = ScenarioLoader::load(ScenarioKind::PressLine, &engine, &mut ctx, 10, end).unwrap();

        assert_eq!(report.tags_created, 0);
        assert_eq!(
            engine.registry().len(),
            EquipmentKind::HydraulicPress.parameters().len()
        );
    }

    #[test]
    fn test_full_plant_creates_standalone_trend_tags() {
        let engine = HistorianEngine::new();
        let mut ctx = context();

        let report = ScenarioLoader::load(ScenarioKind::FullPlant, &engine, &mut ctx, 5, Utc::now()).unwrap();

        assert_eq!(report.equipment.len(), 5);
        assert!(engine.registry().contains("PLANT.PowerDemand"));
        assert!(engine.registry().contains("OVEN-01.ExhaustFlow"));
        assert!(engine.registry().contains("CNC-01.SpindleLoad"));
        assert_eq!(report.points_failed, 0);
    }
}
