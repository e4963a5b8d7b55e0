//! Aegis Simulation Equipment
//!
//! Equipment state machines that turn a simulation tick into one sample per
//! monitored parameter. Each machine type has its own phase cycle with
//! probabilistic transitions and phase-conditioned output ranges.
//!
//! Samples are degraded to quality 50 or below while an alarm is active or
//! the machine is in maintenance.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::noise::{Environment, NoiseGenerator, SensorNoiseProfile};
use crate::random::RandomSource;
use crate::trend::TrendGenerator;
use aegis_historian::{CompressionType, DataPoint, DataType, Quality, Tag, TagValue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Collector name recorded on simulator-owned tags.
pub const SIMULATOR_COLLECTOR: &str = "simulator";

const UNPLANNED_MAINTENANCE_PROBABILITY: f64 = 0.001;

// =============================================================================
// Equipment Kind
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EquipmentKind {
    CncMill,
    HydraulicPress,
    ThermalProcess,
    QualityStation,
}

/// A monitored parameter of a machine type.
#[derive(Debug, Clone, Copy)]
pub struct ParameterSpec {
    pub name: &'static str,
    pub data_type: DataType,
    pub units: &'static str,
    pub deviation: f64,
    /// Sensor noise amplitude and resolution for analog channels.
    pub noise: Option<(f64, f64)>,
}

const fn analog(name: &'static str, units: &'static str, deviation: f64, amplitude: f64, resolution: f64) -> ParameterSpec {
    ParameterSpec {
        name,
        data_type: DataType::Float,
        units,
        deviation,
        noise: Some((amplitude, resolution)),
    }
}

const fn counter(name: &'static str) -> ParameterSpec {
    ParameterSpec {
        name,
        data_type: DataType::Integer,
        units: "count",
        deviation: 0.0,
        noise: None,
    }
}

const STATE: ParameterSpec = ParameterSpec {
    name: "State",
    data_type: DataType::String,
    units: "",
    deviation: 0.0,
    noise: None,
};

const CNC_PARAMETERS: &[ParameterSpec] = &[
    analog("SpindleSpeed", "RPM", 5.0, 2.0, 1.0),
    analog("FeedRate", "mm/min", 2.0, 0.5, 0.1),
    analog("SpindleLoad", "%", 0.5, 0.3, 0.1),
    analog("Vibration", "mm/s", 0.05, 0.02, 0.01),
    analog("CoolantTemperature", "degC", 0.2, 0.1, 0.1),
    analog("ToolWear", "%", 0.5, 0.0, 0.1),
    counter("PartCount"),
    STATE,
];

const PRESS_PARAMETERS: &[ParameterSpec] = &[
    analog("HydraulicPressure", "bar", 1.0, 0.8, 0.1),
    analog("RamPosition", "mm", 0.5, 0.1, 0.1),
    analog("Tonnage", "t", 2.0, 1.0, 0.5),
    analog("OilTemperature", "degC", 0.2, 0.1, 0.1),
    counter("CycleCount"),
    STATE,
];

const THERMAL_PARAMETERS: &[ParameterSpec] = &[
    analog("ZoneTemperature", "degC", 1.0, 0.5, 0.1),
    analog("Setpoint", "degC", 0.0, 0.0, 1.0),
    analog("HeaterOutput", "%", 1.0, 0.5, 0.1),
    STATE,
];

const INSPECTION_PARAMETERS: &[ParameterSpec] = &[
    analog("MeasuredDiameter", "mm", 0.001, 0.0005, 0.0001),
    analog("Deviation", "mm", 0.001, 0.0, 0.0001),
    counter("InspectedCount"),
    counter("RejectCount"),
    analog("PassRate", "%", 0.1, 0.0, 0.01),
    STATE,
];

impl EquipmentKind {
    pub fn parameters(&self) -> &'static [ParameterSpec] {
        match self {
            EquipmentKind::CncMill => CNC_PARAMETERS,
            EquipmentKind::HydraulicPress => PRESS_PARAMETERS,
            EquipmentKind::ThermalProcess => THERMAL_PARAMETERS,
            EquipmentKind::QualityStation => INSPECTION_PARAMETERS,
        }
    }

    pub fn parameter(&self, name: &str) -> Option<&'static ParameterSpec> {
        self.parameters().iter().find(|p| p.name == name)
    }

    /// Sensor noise for an analog channel on this machine. Moving machinery
    /// couples a slow structural vibration into its readings.
    pub fn noise_profile(&self, amplitude: f64, resolution: f64) -> SensorNoiseProfile {
        let profile = SensorNoiseProfile::industrial(amplitude, resolution);
        match self {
            EquipmentKind::CncMill => profile.with_vibration(amplitude * 0.5, 0.1),
            EquipmentKind::HydraulicPress => profile.with_vibration(amplitude * 0.8, 0.05),
            EquipmentKind::ThermalProcess => profile.with_vibration(amplitude * 0.1, 0.02),
            EquipmentKind::QualityStation => profile,
        }
    }

    /// Tag definitions for one machine, named `{equipment_id}.{parameter}`.
    pub fn tag_definitions(&self, equipment_id: &str) -> Vec<Tag> {
        self.parameters()
            .iter()
            .map(|p| {
                let compression = if p.deviation > 0.0 {
                    CompressionType::SwingingDoor
                } else {
                    CompressionType::None
                };
                Tag::new(format!("{}.{}", equipment_id, p.name), p.data_type)
                    .with_description(format!("{} {} {}", self, equipment_id, p.name))
                    .with_units(p.units)
                    .with_collector(SIMULATOR_COLLECTOR)
                    .with_compression(compression, p.deviation)
            })
            .collect()
    }
}

impl fmt::Display for EquipmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EquipmentKind::CncMill => "CNC mill",
            EquipmentKind::HydraulicPress => "Hydraulic press",
            EquipmentKind::ThermalProcess => "Thermal process",
            EquipmentKind::QualityStation => "Quality station",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Phases
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CncPhase {
    Idle,
    Setup,
    Cutting,
    Rapid,
    ToolChange,
    Completed,
    Maintenance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PressPhase {
    Idle,
    Approach,
    Pressing,
    Dwell,
    Return,
    Maintenance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThermalPhase {
    Idle,
    RampUp,
    Soak,
    Cooldown,
    Maintenance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InspectionPhase {
    Idle,
    Loading,
    Measuring,
    Reporting,
    Maintenance,
}

/// Current phase of any machine type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Cnc(CncPhase),
    Press(PressPhase),
    Thermal(ThermalPhase),
    Inspection(InspectionPhase),
}

impl Phase {
    pub fn initial(kind: EquipmentKind) -> Self {
        match kind {
            EquipmentKind::CncMill => Phase::Cnc(CncPhase::Idle),
            EquipmentKind::HydraulicPress => Phase::Press(PressPhase::Idle),
            EquipmentKind::ThermalProcess => Phase::Thermal(ThermalPhase::Idle),
            EquipmentKind::QualityStation => Phase::Inspection(InspectionPhase::Idle),
        }
    }

    /// Relative vibration the machine produces in this phase.
    pub fn vibration_level(&self) -> f64 {
        match self {
            Phase::Cnc(CncPhase::Cutting) => 1.5,
            Phase::Cnc(CncPhase::Rapid) => 1.0,
            Phase::Cnc(CncPhase::ToolChange) => 0.6,
            Phase::Cnc(CncPhase::Setup) => 0.3,
            Phase::Press(PressPhase::Pressing) => 2.0,
            Phase::Press(PressPhase::Approach) | Phase::Press(PressPhase::Return) => 0.8,
            Phase::Press(PressPhase::Dwell) => 0.5,
            Phase::Thermal(ThermalPhase::RampUp)
            | Phase::Thermal(ThermalPhase::Soak)
            | Phase::Thermal(ThermalPhase::Cooldown) => 0.3,
            Phase::Inspection(InspectionPhase::Measuring) => 0.1,
            _ => 0.05,
        }
    }

    pub fn is_maintenance(&self) -> bool {
        matches!(
            self,
            Phase::Cnc(CncPhase::Maintenance)
                | Phase::Press(PressPhase::Maintenance)
                | Phase::Thermal(ThermalPhase::Maintenance)
                | Phase::Inspection(InspectionPhase::Maintenance)
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Phase::Cnc(p) => match p {
                CncPhase::Idle => "IDLE",
                CncPhase::Setup => "SETUP",
                CncPhase::Cutting => "CUTTING",
                CncPhase::Rapid => "RAPID",
                CncPhase::ToolChange => "TOOL_CHANGE",
                CncPhase::Completed => "COMPLETED",
                CncPhase::Maintenance => "MAINTENANCE",
            },
            Phase::Press(p) => match p {
                PressPhase::Idle => "IDLE",
                PressPhase::Approach => "APPROACH",
                PressPhase::Pressing => "PRESSING",
                PressPhase::Dwell => "DWELL",
                PressPhase::Return => "RETURN",
                PressPhase::Maintenance => "MAINTENANCE",
            },
            Phase::Thermal(p) => match p {
                ThermalPhase::Idle => "IDLE",
                ThermalPhase::RampUp => "RAMP_UP",
                ThermalPhase::Soak => "SOAK",
                ThermalPhase::Cooldown => "COOLDOWN",
                ThermalPhase::Maintenance => "MAINTENANCE",
            },
            Phase::Inspection(p) => match p {
                InspectionPhase::Idle => "IDLE",
                InspectionPhase::Loading => "LOADING",
                InspectionPhase::Measuring => "MEASURING",
                InspectionPhase::Reporting => "REPORTING",
                InspectionPhase::Maintenance => "MAINTENANCE",
            },
        }
    }
}

// =============================================================================
// Generator State
// =============================================================================

/// Mutable per-machine state advanced on every tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorState {
    pub equipment_id: String,
    pub kind: EquipmentKind,
    pub phase: Phase,
    pub ticks_in_phase: u32,
    pub cycle_progress: u32,
    pub parts_completed: u64,
    pub parts_rejected: u64,
    pub tool_wear: f64,
    pub temperature: f64,
    pub setpoint: f64,
    pub gauge_offset: f64,
    pub last_measurement: f64,
    pub alarm_active: bool,
}

impl GeneratorState {
    pub fn new(equipment_id: impl Into<String>, kind: EquipmentKind) -> Self {
        Self {
            equipment_id: equipment_id.into(),
            kind,
            phase: Phase::initial(kind),
            ticks_in_phase: 0,
            cycle_progress: 0,
            parts_completed: 0,
            parts_rejected: 0,
            tool_wear: 0.0,
            temperature: 25.0,
            setpoint: 25.0,
            gauge_offset: 0.0,
            last_measurement: NOMINAL_DIAMETER,
            alarm_active: false,
        }
    }

    /// Quality degrades while alarmed or under maintenance.
    pub fn is_degraded(&self) -> bool {
        self.alarm_active || self.phase.is_maintenance()
    }

    fn enter(&mut self, phase: Phase) {
        if phase != self.phase {
            tracing::trace!(equipment = %self.equipment_id, from = self.phase.name(), to = phase.name(), "phase change");
            self.phase = phase;
            self.ticks_in_phase = 0;
        }
    }

    fn relax_temperature(&mut self, target: f64, rate: f64) {
        self.temperature += (target - self.temperature) * rate;
    }

    /// Advance one tick and return the clean readings for every parameter.
    pub fn step(&mut self, rng: &mut dyn RandomSource, environment: &Environment) -> Vec<(&'static str, TagValue)> {
        self.ticks_in_phase += 1;
        match self.phase {
            Phase::Cnc(phase) => self.step_cnc(rng, phase, environment),
            Phase::Press(phase) => self.step_press(rng, phase, environment),
            Phase::Thermal(phase) => self.step_thermal(rng, phase, environment),
            Phase::Inspection(phase) => self.step_inspection(rng, phase),
        }
    }

    // -------------------------------------------------------------------------
    // CNC Mill
    // -------------------------------------------------------------------------

    fn step_cnc(&mut self, rng: &mut dyn RandomSource, phase: CncPhase, environment: &Environment) -> Vec<(&'static str, TagValue)> {
        let running = matches!(phase, CncPhase::Setup | CncPhase::Cutting | CncPhase::Rapid | CncPhase::ToolChange);

        let next = if running && rng.chance(UNPLANNED_MAINTENANCE_PROBABILITY) {
            tracing::debug!(equipment = %self.equipment_id, "unplanned maintenance");
            self.alarm_active = true;
            CncPhase::Maintenance
        } else {
            match phase {
                CncPhase::Idle if rng.chance(0.02) => CncPhase::Setup,
                CncPhase::Idle => CncPhase::Idle,
                CncPhase::Setup if self.ticks_in_phase >= 5 => CncPhase::Cutting,
                CncPhase::Setup => CncPhase::Setup,
                CncPhase::Cutting => {
                    self.cycle_progress += 1;
                    self.tool_wear = (self.tool_wear + 0.002).min(1.0);
                    if self.tool_wear >= 1.0 {
                        CncPhase::ToolChange
                    } else if self.cycle_progress >= 40 {
                        self.parts_completed += 1;
                        self.cycle_progress = 0;
                        CncPhase::Completed
                    } else if rng.chance(0.1) {
                        CncPhase::Rapid
                    } else {
                        CncPhase::Cutting
                    }
                }
                CncPhase::Rapid => {
                    self.cycle_progress += 1;
                    if self.ticks_in_phase >= 2 {
                        CncPhase::Cutting
                    } else {
                        CncPhase::Rapid
                    }
                }
                CncPhase::ToolChange if self.ticks_in_phase >= 3 => {
                    self.tool_wear = 0.0;
                    CncPhase::Cutting
                }
                CncPhase::ToolChange => CncPhase::ToolChange,
                CncPhase::Completed => CncPhase::Idle,
                CncPhase::Maintenance if self.ticks_in_phase >= 20 => {
                    self.alarm_active = false;
                    self.tool_wear = 0.0;
                    CncPhase::Idle
                }
                CncPhase::Maintenance => CncPhase::Maintenance,
            }
        };
        self.enter(Phase::Cnc(next));

        let (spindle, feed, load, vibration, coolant_target) = match next {
            CncPhase::Cutting => (
                rng.normal(1200.0, 10.0),
                rng.normal(250.0, 5.0),
                55.0 + 30.0 * self.tool_wear + rng.normal(0.0, 3.0),
                2.5 + 3.0 * self.tool_wear,
                35.0,
            ),
            CncPhase::Rapid => (rng.normal(360.0, 5.0), 5000.0, 10.0, 1.0, 30.0),
            CncPhase::Setup => (0.0, 0.0, 2.0, 0.3, environment.temperature_c),
            _ => (0.0, 0.0, 0.0, 0.2, environment.temperature_c),
        };
        self.relax_temperature(coolant_target, 0.02);

        if next != CncPhase::Maintenance {
            self.alarm_active = load > 90.0;
        }

        vec![
            ("SpindleSpeed", TagValue::Float(spindle)),
            ("FeedRate", TagValue::Float(feed)),
            ("SpindleLoad", TagValue::Float(load.clamp(0.0, 100.0))),
            ("Vibration", TagValue::Float(vibration)),
            ("CoolantTemperature", TagValue::Float(self.temperature)),
            ("ToolWear", TagValue::Float(self.tool_wear * 100.0)),
            ("PartCount", TagValue::Integer(self.parts_completed as i64)),
            ("State", TagValue::String(self.phase.name().to_string())),
        ]
    }

    // -------------------------------------------------------------------------
    // Hydraulic Press
    // -------------------------------------------------------------------------

    fn step_press(&mut self, rng: &mut dyn RandomSource, phase: PressPhase, environment: &Environment) -> Vec<(&'static str, TagValue)> {
        let running = !matches!(phase, PressPhase::Idle | PressPhase::Maintenance);

        let next = if running && rng.chance(UNPLANNED_MAINTENANCE_PROBABILITY) {
            self.alarm_active = true;
            PressPhase::Maintenance
        } else {
            match phase {
                PressPhase::Idle if rng.chance(0.05) => PressPhase::Approach,
                PressPhase::Approach if self.ticks_in_phase >= 5 => PressPhase::Pressing,
                PressPhase::Pressing if self.ticks_in_phase >= 3 => PressPhase::Dwell,
                PressPhase::Dwell if self.ticks_in_phase >= 2 => PressPhase::Return,
                PressPhase::Return if self.ticks_in_phase >= 4 => {
                    self.parts_completed += 1;
                    PressPhase::Idle
                }
                PressPhase::Maintenance if self.ticks_in_phase >= 30 => {
                    self.alarm_active = false;
                    PressPhase::Idle
                }
                other => other,
            }
        };
        self.enter(Phase::Press(next));

        let ticks = f64::from(self.ticks_in_phase);
        let (pressure, ram) = match next {
            PressPhase::Approach => (25.0, (300.0 - 50.0 * ticks).max(50.0)),
            PressPhase::Pressing => {
                let spike = if rng.chance(0.005) { 40.0 } else { 0.0 };
                (rng.normal(180.0, 4.0) + spike, 48.0)
            }
            PressPhase::Dwell => (175.0, 48.0),
            PressPhase::Return => (30.0, (50.0 + 62.5 * ticks).min(300.0)),
            _ => (5.0, 300.0),
        };
        let tonnage = match next {
            PressPhase::Pressing | PressPhase::Dwell => pressure * 2.5,
            _ => 0.0,
        };

        let oil_target = if running { 45.0 } else { environment.temperature_c + 10.0 };
        self.relax_temperature(oil_target, 0.01);

        if next != PressPhase::Maintenance {
            self.alarm_active = pressure > 210.0;
        }

        vec![
            ("HydraulicPressure", TagValue::Float(pressure)),
            ("RamPosition", TagValue::Float(ram)),
            ("Tonnage", TagValue::Float(tonnage)),
            ("OilTemperature", TagValue::Float(self.temperature)),
            ("CycleCount", TagValue::Integer(self.parts_completed as i64)),
            ("State", TagValue::String(self.phase.name().to_string())),
        ]
    }

    // -------------------------------------------------------------------------
    // Thermal Process
    // -------------------------------------------------------------------------

    fn step_thermal(&mut self, rng: &mut dyn RandomSource, phase: ThermalPhase, environment: &Environment) -> Vec<(&'static str, TagValue)> {
        let ambient = environment.temperature_c;
        let heating = matches!(phase, ThermalPhase::RampUp | ThermalPhase::Soak);

        let next = if heating && rng.chance(UNPLANNED_MAINTENANCE_PROBABILITY) {
            self.alarm_active = true;
            ThermalPhase::Maintenance
        } else {
            match phase {
                ThermalPhase::Idle if rng.chance(0.01) => {
                    self.setpoint = 850.0;
                    ThermalPhase::RampUp
                }
                ThermalPhase::RampUp if self.setpoint - self.temperature <= 5.0 => ThermalPhase::Soak,
                ThermalPhase::Soak if self.ticks_in_phase >= 60 => {
                    self.parts_completed += 1;
                    ThermalPhase::Cooldown
                }
                ThermalPhase::Cooldown if self.temperature < ambient + 20.0 => ThermalPhase::Idle,
                ThermalPhase::Maintenance if self.ticks_in_phase >= 40 => {
                    self.alarm_active = false;
                    ThermalPhase::Idle
                }
                other => other,
            }
        };
        self.enter(Phase::Thermal(next));

        let heater = match next {
            ThermalPhase::RampUp => {
                self.relax_temperature(self.setpoint, 0.05);
                100.0
            }
            ThermalPhase::Soak => {
                let excursion = if rng.chance(0.002) { 30.0 } else { 0.0 };
                self.temperature = self.setpoint + rng.normal(0.0, 1.0) + excursion;
                (35.0 + rng.normal(0.0, 2.0)).clamp(0.0, 100.0)
            }
            _ => {
                self.setpoint = ambient;
                self.relax_temperature(ambient, 0.03);
                0.0
            }
        };

        if next != ThermalPhase::Maintenance {
            self.alarm_active = self.temperature > self.setpoint + 25.0;
        }

        vec![
            ("ZoneTemperature", TagValue::Float(self.temperature)),
            ("Setpoint", TagValue::Float(self.setpoint)),
            ("HeaterOutput", TagValue::Float(heater)),
            ("State", TagValue::String(self.phase.name().to_string())),
        ]
    }

    // -------------------------------------------------------------------------
    // Quality Station
    // -------------------------------------------------------------------------

    fn step_inspection(&mut self, rng: &mut dyn RandomSource, phase: InspectionPhase) -> Vec<(&'static str, TagValue)> {
        self.gauge_offset += rng.symmetric(0.0005);

        let next = if phase != InspectionPhase::Maintenance && rng.chance(UNPLANNED_MAINTENANCE_PROBABILITY) {
            self.alarm_active = true;
            InspectionPhase::Maintenance
        } else {
            match phase {
                InspectionPhase::Idle if rng.chance(0.1) => InspectionPhase::Loading,
                InspectionPhase::Loading if self.ticks_in_phase >= 2 => InspectionPhase::Measuring,
                InspectionPhase::Measuring => {
                    self.last_measurement = rng.normal(NOMINAL_DIAMETER + self.gauge_offset, 0.015);
                    if self.ticks_in_phase >= 3 {
                        self.cycle_progress += 1;
                        if (self.last_measurement - NOMINAL_DIAMETER).abs() > DIAMETER_TOLERANCE {
                            self.parts_rejected += 1;
                        } else {
                            self.parts_completed += 1;
                        }
                        InspectionPhase::Reporting
                    } else {
                        InspectionPhase::Measuring
                    }
                }
                InspectionPhase::Reporting => InspectionPhase::Idle,
                InspectionPhase::Maintenance if self.ticks_in_phase >= 15 => {
                    // Recalibration.
                    self.gauge_offset = 0.0;
                    self.alarm_active = false;
                    InspectionPhase::Idle
                }
                other => other,
            }
        };
        self.enter(Phase::Inspection(next));

        let inspected = self.parts_completed + self.parts_rejected;
        let pass_rate = if inspected == 0 {
            100.0
        } else {
            self.parts_completed as f64 / inspected as f64 * 100.0
        };
        if next != InspectionPhase::Maintenance {
            self.alarm_active = inspected >= 20 && pass_rate < 90.0;
        }

        vec![
            ("MeasuredDiameter", TagValue::Float(self.last_measurement)),
            ("Deviation", TagValue::Float(self.last_measurement - NOMINAL_DIAMETER)),
            ("InspectedCount", TagValue::Integer(inspected as i64)),
            ("RejectCount", TagValue::Integer(self.parts_rejected as i64)),
            ("PassRate", TagValue::Float(pass_rate)),
            ("State", TagValue::String(self.phase.name().to_string())),
        ]
    }
}

const NOMINAL_DIAMETER: f64 = 25.0;
const DIAMETER_TOLERANCE: f64 = 0.05;

// =============================================================================
// Realistic Data Generator
// =============================================================================

/// Drives every registered machine and shapes its readings into samples.
#[derive(Debug, Default)]
pub struct RealisticDataGenerator {
    equipment: BTreeMap<String, GeneratorState>,
}

impl RealisticDataGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a machine. Re-registering resets its state.
    pub fn add_equipment(&mut self, equipment_id: impl Into<String>, kind: EquipmentKind) {
        let equipment_id = equipment_id.into();
        self.equipment
            .insert(equipment_id.clone(), GeneratorState::new(equipment_id, kind));
    }

    pub fn remove_equipment(&mut self, equipment_id: &str) -> Option<GeneratorState> {
        self.equipment.remove(equipment_id)
    }

    pub fn state(&self, equipment_id: &str) -> Option<&GeneratorState> {
        self.equipment.get(equipment_id)
    }

    pub fn state_mut(&mut self, equipment_id: &str) -> Option<&mut GeneratorState> {
        self.equipment.get_mut(equipment_id)
    }

    pub fn states(&self) -> impl Iterator<Item = &GeneratorState> {
        self.equipment.values()
    }

    pub fn len(&self) -> usize {
        self.equipment.len()
    }

    pub fn is_empty(&self) -> bool {
        self.equipment.is_empty()
    }

    /// Tag definitions for every registered machine.
    pub fn tag_definitions(&self) -> Vec<Tag> {
        self.equipment
            .values()
            .flat_map(|s| s.kind.tag_definitions(&s.equipment_id))
            .collect()
    }

    /// Advance every machine one tick and emit one sample per parameter.
    ///
    /// Numeric readings pass through the tag's trend, then sensor noise.
    pub fn tick(
        &mut self,
        rng: &mut dyn RandomSource,
        noise: &mut NoiseGenerator,
        trends: &mut TrendGenerator,
        environment: &Environment,
        timestamp: DateTime<Utc>,
    ) -> Vec<DataPoint> {
        let mut points = Vec::new();

        for state in self.equipment.values_mut() {
            let readings = state.step(rng, environment);
            let degraded = state.is_degraded();
            let machine_environment = Environment {
                vibration_level: environment.vibration_level * state.phase.vibration_level(),
                ..*environment
            };

            for (parameter, value) in readings {
                let tag_name = format!("{}.{}", state.equipment_id, parameter);
                let value = match value {
                    TagValue::Float(clean) => {
                        let trended = trends.apply(rng, &tag_name, clean, timestamp);
                        let noisy = match state.kind.parameter(parameter).and_then(|p| p.noise) {
                            Some((amplitude, resolution)) if amplitude > 0.0 => {
                                let profile = state.kind.noise_profile(amplitude, resolution);
                                noise.apply_sensor_noise(rng, &tag_name, trended, &profile, &machine_environment, timestamp)
                            }
                            _ => trended,
                        };
                        TagValue::Float(noisy)
                    }
                    other => other,
                };

                let quality = if degraded {
                    Quality::clamped(50 - (rng.next_f64() * 30.0) as i64)
                } else {
                    Quality::GOOD
                };

                points.push(DataPoint::new(tag_name, timestamp, value, quality));
            }
        }

        points
    }

    /// Put every machine back in its initial state.
    pub fn reset(&mut self) {
        for state in self.equipment.values_mut() {
            *state = GeneratorState::new(state.equipment_id.clone(), state.kind);
        }
    }

    /// Remove every machine.
    pub fn clear(&mut self) {
        self.equipment.clear();
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::{SeededRandom, SequenceRandom};

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_tag_definitions() {
        let tags = EquipmentKind::CncMill.tag_definitions("CNC-01");
        assert_eq!(tags.len(), CNC_PARAMETERS.len());
        assert!(tags.iter().any(|t| t.name == "CNC-01.SpindleSpeed" && t.engineering_units == "RPM"));
        let state = tags.iter().find(|t| t.name == "CNC-01.State").unwrap();
        assert_eq!(state.data_type, DataType::String);
        assert!(tags.iter().all(|t| t.collector.as_deref() == Some(SIMULATOR_COLLECTOR)));
    }

    #[test]
    fn test_cnc_leaves_idle_and_cuts() {
        let mut state = GeneratorState::new("CNC-01", EquipmentKind::CncMill);
        let env = Environment::default();
        // 0.01 < 2% leaves idle; never trips maintenance (first draw each tick
        // while running is the maintenance check, 0.01 >= 0.1%).
        let mut rng = SequenceRandom::new(vec![0.01, 0.5, 0.5, 0.5]);

        state.step(&mut rng, &env);
        assert_eq!(state.phase, Phase::Cnc(CncPhase::Setup));

        for _ in 0..5 {
            state.step(&mut rng, &env);
        }
        assert_eq!(state.phase, Phase::Cnc(CncPhase::Cutting));
    }

    #[test]
    fn test_cnc_spindle_speed_by_phase() {
        let env = Environment::default();
        let mut rng = SequenceRandom::constant(0.5);

        let mut cutting = GeneratorState::new("CNC-01", EquipmentKind::CncMill);
        cutting.phase = Phase::Cnc(CncPhase::Cutting);
        let readings = cutting.step(&mut rng, &env);
        let spindle = readings[0].1.as_f64().unwrap();
        assert!((spindle - 1200.0).abs() < 50.0, "cutting spindle {}", spindle);

        let mut rapid = GeneratorState::new("CNC-02", EquipmentKind::CncMill);
        rapid.phase = Phase::Cnc(CncPhase::Rapid);
        let readings = rapid.step(&mut rng, &env);
        let spindle = readings[0].1.as_f64().unwrap();
        assert!((spindle - 360.0).abs() < 30.0, "rapid spindle {}", spindle);

        let mut idle = GeneratorState::new("CNC-03", EquipmentKind::CncMill);
        let readings = idle.step(&mut rng, &env);
        assert_eq!(readings[0].1.as_f64(), Some(0.0));
    }

    #[test]
    fn test_unplanned_maintenance_degrades_quality() {
        let mut generator = RealisticDataGenerator::new();
        generator.add_equipment("CNC-01", EquipmentKind::CncMill);
        generator.state_mut("CNC-01").unwrap().phase = Phase::Cnc(CncPhase::Cutting);

        let mut rng = SequenceRandom::new(vec![0.0005, 0.5]);
        let mut noise = NoiseGenerator::new();
        let mut trends = TrendGenerator::new();
        let points = generator.tick(&mut rng, &mut noise, &mut trends, &Environment::default(), t0());

        assert_eq!(generator.state("CNC-01").unwrap().phase, Phase::Cnc(CncPhase::Maintenance));
        assert!(points.iter().all(|p| p.quality.value() <= 50));
        assert!(points.iter().any(|p| p.value == TagValue::String("MAINTENANCE".into())));
    }

    #[test]
    fn test_tick_emits_one_point_per_parameter() {
        let mut generator = RealisticDataGenerator::new();
        generator.add_equipment("CNC-01", EquipmentKind::CncMill);
        generator.add_equipment("PRESS-01", EquipmentKind::HydraulicPress);
        generator.add_equipment("OVEN-01", EquipmentKind::ThermalProcess);
        generator.add_equipment("QC-01", EquipmentKind::QualityStation);

        let mut rng = SeededRandom::new(9);
        let mut noise = NoiseGenerator::new();
        let mut trends = TrendGenerator::new();
        let expected = generator.tag_definitions().len();

        for i in 0..200 {
            let ts = t0() + chrono::Duration::seconds(i);
            let points = generator.tick(&mut rng, &mut noise, &mut trends, &Environment::default(), ts);
            assert_eq!(points.len(), expected);
            assert!(points.iter().all(|p| p.timestamp == ts));
        }
    }

    #[test]
    fn test_moving_machines_carry_vibration() {
        let cnc = EquipmentKind::CncMill.noise_profile(1.0, 0.01);
        let press = EquipmentKind::HydraulicPress.noise_profile(1.0, 0.01);
        let qc = EquipmentKind::QualityStation.noise_profile(1.0, 0.01);

        assert!(cnc.vibration.is_some());
        assert!(press.vibration.unwrap().amplitude > cnc.vibration.unwrap().amplitude);
        assert!(qc.vibration.is_none());

        assert!(Phase::Cnc(CncPhase::Cutting).vibration_level() > Phase::Cnc(CncPhase::Idle).vibration_level());
        assert!(Phase::Press(PressPhase::Pressing).vibration_level() > Phase::Press(PressPhase::Dwell).vibration_level());
    }

    #[test]
    fn test_press_completes_cycles() {
        let mut state = GeneratorState::new("PRESS-01", EquipmentKind::HydraulicPress);
        let env = Environment::default();
        let mut rng = SequenceRandom::new(vec![0.01, 0.5]);

        for _ in 0..200 {
            state.step(&mut rng, &env);
        }
        assert!(state.parts_completed > 0);
        assert!(!state.alarm_active);
    }

    #[test]
    fn test_thermal_ramp_reaches_soak() {
        let mut state = GeneratorState::new("OVEN-01", EquipmentKind::ThermalProcess);
        let env = Environment::default();
        let mut rng = SequenceRandom::new(vec![0.005, 0.5]);

        let mut saw_soak = false;
        for _ in 0..500 {
            state.step(&mut rng, &env);
            if state.phase == Phase::Thermal(ThermalPhase::Soak) {
                saw_soak = true;
                break;
            }
        }
        assert!(saw_soak);
        assert!(state.temperature > 800.0);
    }

    #[test]
    fn test_reset_restores_initial_state() {
        let mut generator = RealisticDataGenerator::new();
        generator.add_equipment("QC-01", EquipmentKind::QualityStation);
        generator.state_mut("QC-01").unwrap().parts_completed = 12;

        generator.reset();
        assert_eq!(generator.state("QC-01").unwrap().parts_completed, 0);
        assert_eq!(generator.len(), 1);
    }
}
