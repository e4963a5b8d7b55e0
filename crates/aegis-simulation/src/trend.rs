//! Aegis Simulation Trends
//!
//! Waveform recipes bound to tag names. A trend produces a value for any
//! timestamp and is combined with the equipment model's base value through
//! its influence mode.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::random::RandomSource;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::f64::consts::TAU;

// =============================================================================
// Trend Kinds
// =============================================================================

/// One component of a multi-sinusoidal trend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SineCycle {
    pub amplitude: f64,
    pub period_secs: f64,
    pub phase: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SawtoothDirection {
    Rising,
    Falling,
}

/// Waveform shape and its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrendKind {
    /// Interpolates start to end over the trend duration.
    Linear { start: f64, end: f64 },
    /// One full period per trend duration.
    Sinusoidal { offset: f64, amplitude: f64, phase: f64 },
    MultiSinusoidal { offset: f64, cycles: Vec<SineCycle> },
    /// `start * e^(rate * t)`, clamped at `end`.
    Exponential { start: f64, rate: f64, end: f64 },
    /// RC charge curve from start toward end.
    ExponentialApproach { start: f64, end: f64, time_constant_secs: f64 },
    RandomWalk { start: f64, step: f64, min: f64, max: f64, reset_probability: f64 },
    Sawtooth { min: f64, max: f64, period_secs: f64, direction: SawtoothDirection },
    /// Alternating-sign steps around `base`.
    StepFunction { base: f64, step_size: f64, step_secs: f64, randomize: bool },
}

/// How a trend value combines with the generator's base value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Influence {
    Additive,
    Multiplicative,
    Override,
}

// =============================================================================
// Trend Definition
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendDefinition {
    pub kind: TrendKind,
    pub started_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub influence: Influence,
    /// Proportional noise added after combination, as a fraction of the value.
    pub noise_level: f64,
}

impl TrendDefinition {
    pub fn new(kind: TrendKind, started_at: DateTime<Utc>, duration_secs: f64) -> Self {
        Self {
            kind,
            started_at,
            duration_secs,
            influence: Influence::Override,
            noise_level: 0.0,
        }
    }

    pub fn with_influence(mut self, influence: Influence) -> Self {
        self.influence = influence;
        self
    }

    pub fn with_noise(mut self, noise_level: f64) -> Self {
        self.noise_level = noise_level;
        self
    }

    fn elapsed_secs(&self, timestamp: DateTime<Utc>) -> f64 {
        ((timestamp - self.started_at).num_milliseconds() as f64 / 1000.0).max(0.0)
    }
}

// =============================================================================
// Trend Generator
// =============================================================================

/// Process-wide trend map plus the state random walks and steps accumulate.
#[derive(Debug, Default)]
pub struct TrendGenerator {
    trends: HashMap<String, TrendDefinition>,
    walks: HashMap<String, f64>,
    steps: HashMap<String, (i64, f64)>,
}

impl TrendGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a trend to a tag, replacing any previous one.
    pub fn set_trend(&mut self, tag_name: impl Into<String>, trend: TrendDefinition) {
        let tag_name = tag_name.into();
        self.walks.remove(&tag_name);
        self.steps.remove(&tag_name);
        self.trends.insert(tag_name, trend);
    }

    pub fn remove_trend(&mut self, tag_name: &str) -> Option<TrendDefinition> {
        self.walks.remove(tag_name);
        self.steps.remove(tag_name);
        self.trends.remove(tag_name)
    }

    pub fn get(&self, tag_name: &str) -> Option<&TrendDefinition> {
        self.trends.get(tag_name)
    }

    pub fn tag_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.trends.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.trends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trends.is_empty()
    }

    /// Raw trend value at `timestamp`, before influence and noise.
    pub fn value(&mut self, rng: &mut dyn RandomSource, tag_name: &str, timestamp: DateTime<Utc>) -> Option<f64> {
        let trend = self.trends.get(tag_name)?;
        let t = trend.elapsed_secs(timestamp);
        let duration = trend.duration_secs.max(f64::EPSILON);

        let value = match &trend.kind {
            TrendKind::Linear { start, end } => {
                let progress = (t / duration).clamp(0.0, 1.0);
                start + (end - start) * progress
            }
            TrendKind::Sinusoidal { offset, amplitude, phase } => {
                offset + amplitude * (TAU * t / duration + phase).sin()
            }
            TrendKind::MultiSinusoidal { offset, cycles } => {
                offset
                    + cycles
                        .iter()
                        .map(|c| c.amplitude * (TAU * t / c.period_secs.max(f64::EPSILON) + c.phase).sin())
                        .sum::<f64>()
            }
            TrendKind::Exponential { start, rate, end } => {
                let raw = start * (rate * t).exp();
                if *rate >= 0.0 {
                    raw.min(*end)
                } else {
                    raw.max(*end)
                }
            }
            TrendKind::ExponentialApproach { start, end, time_constant_secs } => {
                let tau = time_constant_secs.max(f64::EPSILON);
                end + (start - end) * (-t / tau).exp()
            }
            TrendKind::RandomWalk { start, step, min, max, reset_probability } => {
                let (start, step, min, max, reset_probability) = (*start, *step, *min, *max, *reset_probability);
                let delta = rng.symmetric(step);
                let reset = rng.chance(reset_probability);
                let state = self.walks.entry(tag_name.to_string()).or_insert(start);
                *state = if reset { start } else { (*state + delta).clamp(min, max) };
                *state
            }
            TrendKind::Sawtooth { min, max, period_secs, direction } => {
                let period = period_secs.max(f64::EPSILON);
                let fraction = (t % period) / period;
                match direction {
                    SawtoothDirection::Rising => min + (max - min) * fraction,
                    SawtoothDirection::Falling => max - (max - min) * fraction,
                }
            }
            TrendKind::StepFunction { base, step_size, step_secs, randomize } => {
                let (base, step_size, randomize) = (*base, *step_size, *randomize);
                let index = (t / step_secs.max(f64::EPSILON)).floor() as i64;
                let sign = if index % 2 == 0 { 1.0 } else { -1.0 };

                let cached = self.steps.get(tag_name).copied();
                let magnitude = match cached {
                    Some((cached_index, magnitude)) if cached_index == index => magnitude,
                    _ => {
                        let magnitude = if randomize {
                            step_size * rng.uniform(0.5, 1.5)
                        } else {
                            step_size
                        };
                        self.steps.insert(tag_name.to_string(), (index, magnitude));
                        magnitude
                    }
                };
                base + sign * magnitude
            }
        };

        Some(value)
    }

    /// Combine the tag's trend with a base value and add proportional noise.
    /// Tags without a trend return the base value unchanged.
    pub fn apply(&mut self, rng: &mut dyn RandomSource, tag_name: &str, base: f64, timestamp: DateTime<Utc>) -> f64 {
        let Some(trend_value) = self.value(rng, tag_name, timestamp) else {
            return base;
        };
        let Some(trend) = self.trends.get(tag_name) else {
            return base;
        };

        let combined = match trend.influence {
            Influence::Additive => base + trend_value,
            Influence::Multiplicative => base * trend_value,
            Influence::Override => trend_value,
        };

        if trend.noise_level > 0.0 {
            combined + rng.symmetric(combined.abs() * trend.noise_level)
        } else {
            combined
        }
    }

    /// Clear random-walk and step state but keep the definitions.
    pub fn reset_state(&mut self) {
        self.walks.clear();
        self.steps.clear();
    }

    /// Remove every trend.
    pub fn clear(&mut self) {
        self.trends.clear();
        self.reset_state();
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::{SeededRandom, SequenceRandom};
    use chrono::Duration;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn value_at(kind: TrendKind, duration: f64, secs: i64) -> f64 {
        let mut trends = TrendGenerator::new();
        let mut rng = SequenceRandom::constant(0.5);
        trends.set_trend("T", TrendDefinition::new(kind, t0(), duration));
        trends.value(&mut rng, "T", t0() + Duration::seconds(secs)).unwrap()
    }

    #[test]
    fn test_linear_clamps_progress() {
        let kind = TrendKind::Linear { start: 0.0, end: 100.0 };
        assert_eq!(value_at(kind.clone(), 100.0, 25), 25.0);
        assert_eq!(value_at(kind, 100.0, 500), 100.0);
    }

    #[test]
    fn test_sinusoidal() {
        let kind = TrendKind::Sinusoidal { offset: 50.0, amplitude: 10.0, phase: 0.0 };
        assert!((value_at(kind.clone(), 100.0, 25) - 60.0).abs() < 1e-9);
        assert!((value_at(kind, 100.0, 75) - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_multi_sinusoidal_sums_cycles() {
        let kind = TrendKind::MultiSinusoidal {
            offset: 20.0,
            cycles: vec![
                SineCycle { amplitude: 5.0, period_secs: 400.0, phase: 0.0 },
                SineCycle { amplitude: 1.0, period_secs: 100.0, phase: 0.0 },
            ],
        };
        assert!((value_at(kind, 1.0, 100) - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_exponential_clamped() {
        let kind = TrendKind::Exponential { start: 1.0, rate: 0.1, end: 5.0 };
        assert!((value_at(kind.clone(), 1.0, 10) - 1.0f64.exp()).abs() < 1e-9);
        assert_eq!(value_at(kind, 1.0, 100), 5.0);
    }

    #[test]
    fn test_exponential_approach() {
        let kind = TrendKind::ExponentialApproach { start: 20.0, end: 120.0, time_constant_secs: 60.0 };
        let one_tau = value_at(kind.clone(), 1.0, 60);
        assert!((one_tau - (120.0 - 100.0 * (-1.0f64).exp())).abs() < 1e-9);
        assert!(value_at(kind, 1.0, 6000) > 119.99);
    }

    #[test]
    fn test_sawtooth_directions() {
        let rising = TrendKind::Sawtooth { min: 0.0, max: 10.0, period_secs: 10.0, direction: SawtoothDirection::Rising };
        let falling = TrendKind::Sawtooth { min: 0.0, max: 10.0, period_secs: 10.0, direction: SawtoothDirection::Falling };
        assert_eq!(value_at(rising, 1.0, 13), 3.0);
        assert_eq!(value_at(falling, 1.0, 13), 7.0);
    }

    #[test]
    fn test_step_function_alternates() {
        let kind = TrendKind::StepFunction { base: 100.0, step_size: 5.0, step_secs: 10.0, randomize: false };
        assert_eq!(value_at(kind.clone(), 1.0, 5), 105.0);
        assert_eq!(value_at(kind, 1.0, 15), 95.0);
    }

    #[test]
    fn test_random_walk_bounded_and_resets() {
        let mut trends = TrendGenerator::new();
        let mut rng = SeededRandom::new(5);
        let kind = TrendKind::RandomWalk { start: 50.0, step: 5.0, min: 40.0, max: 60.0, reset_probability: 0.01 };
        trends.set_trend("W", TrendDefinition::new(kind, t0(), 1.0));

        for i in 0..1000 {
            let v = trends.value(&mut rng, "W", t0() + Duration::seconds(i)).unwrap();
            assert!((40.0..=60.0).contains(&v));
        }

        trends.reset_state();
        let mut up = SequenceRandom::new(vec![0.75, 0.9]);
        assert_eq!(trends.value(&mut up, "W", t0()).unwrap(), 52.5);
    }

    #[test]
    fn test_influence_modes() {
        let mut trends = TrendGenerator::new();
        let mut rng = SequenceRandom::constant(0.5);
        let kind = TrendKind::Linear { start: 2.0, end: 2.0 };

        trends.set_trend("A", TrendDefinition::new(kind.clone(), t0(), 1.0).with_influence(Influence::Additive));
        trends.set_trend("M", TrendDefinition::new(kind.clone(), t0(), 1.0).with_influence(Influence::Multiplicative));
        trends.set_trend("O", TrendDefinition::new(kind, t0(), 1.0));

        assert_eq!(trends.apply(&mut rng, "A", 10.0, t0()), 12.0);
        assert_eq!(trends.apply(&mut rng, "M", 10.0, t0()), 20.0);
        assert_eq!(trends.apply(&mut rng, "O", 10.0, t0()), 2.0);
        assert_eq!(trends.apply(&mut rng, "NONE", 10.0, t0()), 10.0);
    }

    #[test]
    fn test_proportional_noise() {
        let mut trends = TrendGenerator::new();
        let mut rng = SequenceRandom::constant(1.0);
        let kind = TrendKind::Linear { start: 100.0, end: 100.0 };
        trends.set_trend("N", TrendDefinition::new(kind, t0(), 1.0).with_noise(0.1));

        let v = trends.apply(&mut rng, "N", 0.0, t0());
        assert!((v - 110.0).abs() < 1e-6);
    }
}
