//! Aegis Simulation Context
//!
//! Owns all generator state for one simulation run: randomness, noise
//! accumulators, trends, equipment state, environment and the clock.
//! Independent contexts never share state.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::equipment::{EquipmentKind, RealisticDataGenerator};
use crate::noise::{Environment, NoiseGenerator};
use crate::random::{RandomSource, SeededRandom};
use crate::trend::{Influence, TrendDefinition, TrendGenerator};
use aegis_historian::{DataPoint, Quality, TagValue};
use chrono::{DateTime, Duration, Utc};

// =============================================================================
// Simulation Clock
// =============================================================================

/// Discrete clock: `origin + ticks * tick_interval`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationClock {
    pub origin: DateTime<Utc>,
    pub tick_interval: Duration,
    pub ticks: u64,
}

impl SimulationClock {
    pub fn new(origin: DateTime<Utc>, tick_interval: Duration) -> Self {
        Self {
            origin,
            tick_interval,
            ticks: 0,
        }
    }

    /// Current simulated time.
    pub fn now(&self) -> DateTime<Utc> {
        let ticks = i64::try_from(self.ticks).unwrap_or(i64::MAX);
        let elapsed_ms = self.tick_interval.num_milliseconds().saturating_mul(ticks);
        self.origin
            .checked_add_signed(Duration::milliseconds(elapsed_ms))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Move forward one tick and return the new time.
    pub fn advance(&mut self) -> DateTime<Utc> {
        self.ticks += 1;
        self.now()
    }

    pub fn rewind(&mut self) {
        self.ticks = 0;
    }
}

// =============================================================================
// Simulation Context
// =============================================================================

/// Explicit state for a simulation run.
pub struct SimulationContext {
    rng: Box<dyn RandomSource>,
    pub noise: NoiseGenerator,
    pub trends: TrendGenerator,
    pub generator: RealisticDataGenerator,
    pub environment: Environment,
    pub clock: SimulationClock,
}

impl SimulationContext {
    pub fn new(rng: Box<dyn RandomSource>, origin: DateTime<Utc>, tick_interval: Duration) -> Self {
        Self {
            rng,
            noise: NoiseGenerator::new(),
            trends: TrendGenerator::new(),
            generator: RealisticDataGenerator::new(),
            environment: Environment::default(),
            clock: SimulationClock::new(origin, tick_interval),
        }
    }

    /// Context backed by a seeded RNG, one-second ticks starting now.
    pub fn seeded(seed: u64) -> Self {
        Self::new(Box::new(SeededRandom::new(seed)), Utc::now(), Duration::seconds(1))
    }

    pub fn rng(&mut self) -> &mut dyn RandomSource {
        self.rng.as_mut()
    }

    pub fn add_equipment(&mut self, equipment_id: impl Into<String>, kind: EquipmentKind) {
        self.generator.add_equipment(equipment_id, kind);
    }

    pub fn set_trend(&mut self, tag_name: impl Into<String>, trend: TrendDefinition) {
        self.trends.set_trend(tag_name, trend);
    }

    /// Trend-only tags that no machine emits.
    pub fn standalone_trend_tags(&self) -> Vec<String> {
        let equipment_tags: Vec<String> = self
            .generator
            .tag_definitions()
            .into_iter()
            .map(|t| t.name)
            .collect();
        self.trends
            .tag_names()
            .into_iter()
            .filter(|name| !equipment_tags.contains(name))
            .collect()
    }

    /// Emit samples at the current clock time, then advance the clock.
    pub fn tick(&mut self) -> Vec<DataPoint> {
        let timestamp = self.clock.now();
        let rng = self.rng.as_mut();

        let mut points = self.generator.tick(
            rng,
            &mut self.noise,
            &mut self.trends,
            &self.environment,
            timestamp,
        );

        for tag_name in self.standalone_trend_tags() {
            let rng = self.rng.as_mut();
            let base = match self.trends.get(&tag_name).map(|t| t.influence) {
                Some(Influence::Multiplicative) => 1.0,
                _ => 0.0,
            };
            let value = self.trends.apply(rng, &tag_name, base, timestamp);
            points.push(DataPoint::new(tag_name, timestamp, TagValue::Float(value), Quality::GOOD));
        }

        self.clock.advance();
        points
    }

    /// Rewind the clock and clear accumulated generator state. Trend
    /// definitions and registered equipment stay in place.
    pub fn reset_time(&mut self) {
        self.clock.rewind();
        self.noise.reset();
        self.trends.reset_state();
        self.generator.reset();
    }

    /// Drop equipment and trends as well.
    pub fn reset(&mut self) {
        self.reset_time();
        self.trends.clear();
        self.generator.clear();
        self.environment = Environment::default();
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trend::TrendKind;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn context(seed: u64) -> SimulationContext {
        SimulationContext::new(Box::new(SeededRandom::new(seed)), t0(), Duration::seconds(1))
    }

    #[test]
    fn test_clock_advances() {
        let mut clock = SimulationClock::new(t0(), Duration::seconds(5));
        assert_eq!(clock.advance(), t0() + Duration::seconds(5));
        assert_eq!(clock.advance(), t0() + Duration::seconds(10));
        clock.rewind();
        assert_eq!(clock.now(), t0());
    }

    #[test]
    fn test_clock_beyond_i32_ticks() {
        let mut clock = SimulationClock::new(t0(), Duration::milliseconds(1));
        clock.ticks = 3_000_000_000;
        assert_eq!(clock.now(), t0() + Duration::seconds(3_000_000));

        clock.ticks = u64::MAX;
        assert_eq!(clock.now(), DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn test_standalone_trend_tags_are_emitted() {
        let mut ctx = context(1);
        ctx.add_equipment("CNC-01", EquipmentKind::CncMill);
        ctx.set_trend(
            "PLANT.Ambient",
            TrendDefinition::new(TrendKind::Linear { start: 20.0, end: 20.0 }, t0(), 60.0),
        );

        let points = ctx.tick();
        let ambient = points.iter().find(|p| p.tag_name == "PLANT.Ambient").unwrap();
        assert_eq!(ambient.value, TagValue::Float(20.0));
        assert_eq!(ctx.clock.now(), t0() + Duration::seconds(1));
    }

    #[test]
    fn test_same_seed_same_output() {
        let mut a = context(42);
        let mut b = context(42);
        for ctx in [&mut a, &mut b] {
            ctx.add_equipment("CNC-01", EquipmentKind::CncMill);
            ctx.add_equipment("OVEN-01", EquipmentKind::ThermalProcess);
        }

        for _ in 0..50 {
            assert_eq!(a.tick(), b.tick());
        }
    }

    #[test]
    fn test_reset_time_clears_state() {
        let mut ctx = context(3);
        ctx.add_equipment("PRESS-01", EquipmentKind::HydraulicPress);
        for _ in 0..500 {
            ctx.tick();
        }

        ctx.reset_time();
        assert_eq!(ctx.clock.ticks, 0);
        assert_eq!(ctx.generator.state("PRESS-01").unwrap().parts_completed, 0);

        ctx.reset();
        assert!(ctx.generator.is_empty());
        assert!(ctx.trends.is_empty());
    }
}
