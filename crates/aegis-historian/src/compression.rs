//! Aegis Historian Compression
//!
//! Exception/compression filtering applied on write. Decides whether an
//! incoming sample carries new information relative to the last stored
//! sample of its tag, using either a plain deadband or swinging-door
//! trending over the tag's compression deviation.
//!
//! The swinging door keeps two slopes pivoting on the reference point offset
//! by plus and minus the deviation. Every discarded sample narrows the doors;
//! a sample is stored once the doors would cross, which means no straight
//! line from the reference can represent all samples seen since within the
//! deviation band.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::types::{CompressionType, DataPoint, Quality, Tag};

// =============================================================================
// Compression Decision
// =============================================================================

/// Outcome of evaluating a candidate sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionDecision {
    Store,
    Discard,
}

// =============================================================================
// Compression State
// =============================================================================

/// Last stored sample that the doors pivot on.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Reference {
    timestamp_ms: i64,
    value: f64,
    quality: Quality,
}

/// Per-tag compression state owned by the store.
#[derive(Debug, Clone)]
pub struct CompressionState {
    reference: Option<Reference>,
    upper_slope: f64,
    lower_slope: f64,
    pending: usize,
}

impl CompressionState {
    pub fn new() -> Self {
        Self {
            reference: None,
            upper_slope: f64::NEG_INFINITY,
            lower_slope: f64::INFINITY,
            pending: 0,
        }
    }

    /// Forget the reference so the next sample is always stored.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Number of samples discarded since the last stored one.
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Timestamp of the current reference sample in milliseconds.
    pub fn reference_timestamp_ms(&self) -> Option<i64> {
        self.reference.map(|r| r.timestamp_ms)
    }

    fn rebase(&mut self, timestamp_ms: i64, value: f64, quality: Quality) {
        self.reference = Some(Reference {
            timestamp_ms,
            value,
            quality,
        });
        self.upper_slope = f64::NEG_INFINITY;
        self.lower_slope = f64::INFINITY;
        self.pending = 0;
    }
}

impl Default for CompressionState {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Compressor
// =============================================================================

/// Stateless compression filter. State lives in [`CompressionState`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Compressor;

impl Compressor {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate a candidate and update the tag's compression state.
    pub fn process(
        &self,
        tag: &Tag,
        state: &mut CompressionState,
        point: &DataPoint,
    ) -> CompressionDecision {
        let timestamp_ms = point.timestamp_millis();

        let value = match point.value.as_f64() {
            Some(v) if tag.is_compressible() => v,
            _ => {
                // Uncompressed tags and null samples are always kept. A null
                // newer than the reference breaks the trend.
                let is_newer = state
                    .reference_timestamp_ms()
                    .map_or(true, |ts| timestamp_ms > ts);
                if is_newer {
                    match point.value.as_f64() {
                        Some(v) => state.rebase(timestamp_ms, v, point.quality),
                        None => state.reset(),
                    }
                }
                return CompressionDecision::Store;
            }
        };

        let reference = match state.reference {
            Some(reference) => reference,
            None => {
                state.rebase(timestamp_ms, value, point.quality);
                return CompressionDecision::Store;
            }
        };

        // Out-of-order samples bypass the filter and leave the reference alone.
        if timestamp_ms < reference.timestamp_ms {
            return CompressionDecision::Store;
        }
        if timestamp_ms == reference.timestamp_ms || point.quality != reference.quality {
            state.rebase(timestamp_ms, value, point.quality);
            return CompressionDecision::Store;
        }

        let deviation = tag.compression_deviation;
        let within_deadband = (value - reference.value).abs() <= deviation;

        let decision = match tag.compression_type {
            CompressionType::None => CompressionDecision::Store,
            CompressionType::Deadband => {
                if within_deadband {
                    CompressionDecision::Discard
                } else {
                    CompressionDecision::Store
                }
            }
            CompressionType::SwingingDoor => {
                let elapsed_secs = (timestamp_ms - reference.timestamp_ms) as f64 / 1000.0;
                let upper = (value - reference.value - deviation) / elapsed_secs;
                let lower = (value - reference.value + deviation) / elapsed_secs;

                if state.pending == 0 {
                    if within_deadband {
                        state.upper_slope = upper;
                        state.lower_slope = lower;
                        CompressionDecision::Discard
                    } else {
                        CompressionDecision::Store
                    }
                } else {
                    let next_upper = state.upper_slope.max(upper);
                    let next_lower = state.lower_slope.min(lower);
                    if next_upper <= next_lower {
                        state.upper_slope = next_upper;
                        state.lower_slope = next_lower;
                        CompressionDecision::Discard
                    } else {
                        CompressionDecision::Store
                    }
                }
            }
        };

        match decision {
            CompressionDecision::Store => state.rebase(timestamp_ms, value, point.quality),
            CompressionDecision::Discard => state.pending += 1,
        }

        decision
    }
}

// =============================================================================
// Tests
// =============================================================================
