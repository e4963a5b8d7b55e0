//! Aegis Simulation Noise
//!
//! Colored noise sources and the layered sensor noise model used to make
//! synthetic process values look like real instrument readings.
//!
//! Stage order for the sensor model: base colored noise, temperature
//! scaling, EMI, vibration, drift, burst, aging, quantization. Every stage
//! except quantization adds to the running value.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::random::RandomSource;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::f64::consts::TAU;

const PINK_OCTAVES: u32 = 6;
const BROWN_DECAY: f64 = 0.999;
const BROWN_STEP: f64 = 0.1;
const REFERENCE_TEMPERATURE_C: f64 = 25.0;
const RECALIBRATION_PROBABILITY: f64 = 0.0001;

// =============================================================================
// Noise Color
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoiseColor {
    White,
    Pink,
    Brown,
    Blue,
}

// =============================================================================
// Sensor Noise Profile
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaseNoise {
    pub color: NoiseColor,
    pub amplitude: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmiNoise {
    pub amplitude: f64,
    pub line_frequency_hz: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VibrationNoise {
    pub amplitude: f64,
    pub frequency_hz: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DriftNoise {
    /// Maximum random-walk step per sample.
    pub step: f64,
    /// Absolute bound on accumulated drift.
    pub limit: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BurstNoise {
    pub probability: f64,
    pub amplitude: f64,
}

/// Which noise stages apply to a sensor. Absent stages are skipped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorNoiseProfile {
    pub base: Option<BaseNoise>,
    /// Fractional increase of base noise per degree above 25 C.
    pub temperature_coefficient: Option<f64>,
    pub emi: Option<EmiNoise>,
    pub vibration: Option<VibrationNoise>,
    pub drift: Option<DriftNoise>,
    pub burst: Option<BurstNoise>,
    /// Pink noise amplitude before aging amplification.
    pub aging_amplitude: Option<f64>,
    pub resolution: Option<f64>,
}

impl SensorNoiseProfile {
    /// Profile with white base noise and quantization only.
    pub fn simple(amplitude: f64, resolution: f64) -> Self {
        Self {
            base: Some(BaseNoise {
                color: NoiseColor::White,
                amplitude,
            }),
            resolution: Some(resolution),
            ..Default::default()
        }
    }

    /// Typical industrial analog input: pink floor, 2%/C thermal scaling,
    /// 60 Hz pickup, slow drift and the occasional spike. Vibration is added
    /// per machine type with [`SensorNoiseProfile::with_vibration`].
    pub fn industrial(amplitude: f64, resolution: f64) -> Self {
        Self {
            base: Some(BaseNoise {
                color: NoiseColor::Pink,
                amplitude,
            }),
            temperature_coefficient: Some(0.02),
            emi: Some(EmiNoise {
                amplitude: amplitude * 0.2,
                line_frequency_hz: 60.0,
            }),
            vibration: None,
            drift: Some(DriftNoise {
                step: amplitude * 0.01,
                limit: amplitude * 2.0,
            }),
            burst: Some(BurstNoise {
                probability: 0.001,
                amplitude: amplitude * 10.0,
            }),
            aging_amplitude: Some(amplitude * 0.1),
            resolution: Some(resolution),
        }
    }

    pub fn with_vibration(mut self, amplitude: f64, frequency_hz: f64) -> Self {
        self.vibration = Some(VibrationNoise {
            amplitude,
            frequency_hz,
        });
        self
    }
}

/// Ambient conditions the noise model reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    pub temperature_c: f64,
    /// Scales vibration-correlated noise; 1.0 is nominal.
    pub vibration_level: f64,
    pub age_hours: f64,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            temperature_c: REFERENCE_TEMPERATURE_C,
            vibration_level: 1.0,
            age_hours: 0.0,
        }
    }
}

// =============================================================================
// Noise Generator
// =============================================================================

/// Noise sources. Brown, blue and drift noise keep per-key state.
#[derive(Debug, Default)]
pub struct NoiseGenerator {
    brown: HashMap<String, f64>,
    blue: HashMap<String, f64>,
    drift: HashMap<String, f64>,
}

impl NoiseGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uniform noise in `[-amplitude, amplitude)`.
    pub fn white(&self, rng: &mut dyn RandomSource, amplitude: f64) -> f64 {
        rng.symmetric(amplitude)
    }

    /// Six octaves of white noise halving in amplitude, averaged.
    pub fn pink(&self, rng: &mut dyn RandomSource, amplitude: f64) -> f64 {
        let sum: f64 = (0..PINK_OCTAVES)
            .map(|octave| rng.symmetric(amplitude / f64::from(1u32 << octave)))
            .sum();
        sum / f64::from(PINK_OCTAVES)
    }

    /// Leaky integrated white noise.
    pub fn brown(&mut self, rng: &mut dyn RandomSource, key: &str, amplitude: f64) -> f64 {
        let step = rng.symmetric(amplitude) * BROWN_STEP;
        let state = self.brown.entry(key.to_string()).or_insert(0.0);
        *state = *state * BROWN_DECAY + step;
        *state
    }

    /// First difference of white noise.
    pub fn blue(&mut self, rng: &mut dyn RandomSource, key: &str, amplitude: f64) -> f64 {
        let white = rng.symmetric(amplitude);
        let previous = self.blue.insert(key.to_string(), white).unwrap_or(0.0);
        (white - previous) * 0.5
    }

    pub fn colored(&mut self, rng: &mut dyn RandomSource, key: &str, color: NoiseColor, amplitude: f64) -> f64 {
        match color {
            NoiseColor::White => self.white(rng, amplitude),
            NoiseColor::Pink => self.pink(rng, amplitude),
            NoiseColor::Brown => self.brown(rng, key, amplitude),
            NoiseColor::Blue => self.blue(rng, key, amplitude),
        }
    }

    /// Current accumulated drift for a sensor.
    pub fn drift_of(&self, key: &str) -> f64 {
        self.drift.get(key).copied().unwrap_or(0.0)
    }

    /// Layer the profile's noise stages onto a clean value.
    pub fn apply_sensor_noise(
        &mut self,
        rng: &mut dyn RandomSource,
        key: &str,
        clean_value: f64,
        profile: &SensorNoiseProfile,
        environment: &Environment,
        timestamp: DateTime<Utc>,
    ) -> f64 {
        let t = timestamp.timestamp_millis() as f64 / 1000.0;
        let mut value = clean_value;

        if let Some(base) = profile.base {
            let mut noise = self.colored(rng, key, base.color, base.amplitude);
            if let Some(coefficient) = profile.temperature_coefficient {
                let excess = (environment.temperature_c - REFERENCE_TEMPERATURE_C).max(0.0);
                noise *= 1.0 + coefficient * excess;
            }
            value += noise;
        }

        if let Some(emi) = profile.emi {
            // Acquisition is not locked to the line cycle.
            let sample_offset = rng.next_f64();
            let phase = TAU * (emi.line_frequency_hz * t + sample_offset);
            value += emi.amplitude * phase.sin() + (emi.amplitude / 3.0) * (3.0 * phase).sin();
        }

        if let Some(vibration) = profile.vibration {
            value += vibration.amplitude
                * environment.vibration_level
                * (TAU * vibration.frequency_hz * t).sin();
        }

        if let Some(drift) = profile.drift {
            let step = rng.symmetric(drift.step);
            let recalibrate = rng.chance(RECALIBRATION_PROBABILITY);
            let state = self.drift.entry(key.to_string()).or_insert(0.0);
            *state = (*state + step).clamp(-drift.limit, drift.limit);
            if recalibrate {
                *state *= 0.1;
            }
            value += *state;
        }

        if let Some(burst) = profile.burst {
            if rng.chance(burst.probability) {
                value += rng.symmetric(burst.amplitude);
            }
        }

        if let Some(amplitude) = profile.aging_amplitude {
            let aging = 1.0 + (environment.age_hours.max(0.0) / 1000.0).powf(1.5);
            value += self.pink(rng, amplitude * aging);
        }

        if let Some(resolution) = profile.resolution.filter(|r| *r > 0.0) {
            value = (value / resolution).round() * resolution;
        }

        value
    }

    /// Forget all accumulated state.
    pub fn reset(&mut self) {
        self.brown.clear();
        self.blue.clear();
        self.drift.clear();
    }
}

// =============================================================================
// Tests
// =============================================================================
