//! Aegis Utils - Utility Functions
//!
//! Common helpers shared by the historian and the REST surface: parsing
//! historian-style interval strings ("1h", "15m", "500ms") and formatting
//! durations back into the same notation.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::error::{HistorianError, Result};
use chrono::Duration;

// =============================================================================
// Interval Parsing
// =============================================================================

const INTERVAL_UNITS: &[(&str, i64)] = &[
    ("ms", 1),
    ("s", 1_000),
    ("m", 60_000),
    ("h", 3_600_000),
    ("d", 86_400_000),
    ("w", 604_800_000),
];

/// Widest accepted interval: 3650 days.
pub const MAX_INTERVAL_MILLIS: i64 = 315_360_000_000;

/// Parse an interval such as `1h`, `15m`, `30s`, `250ms` or `2d`.
///
/// A bare number is interpreted as seconds. Zero and negative intervals are
/// rejected, as are intervals wider than [`MAX_INTERVAL_MILLIS`].
pub fn parse_interval(s: &str) -> Result<Duration> {
    let trimmed = s.trim().to_ascii_lowercase();
    if trimmed.is_empty() {
        return Err(HistorianError::InvalidInterval("empty interval".to_string()));
    }

    let split_at = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (num_str, unit) = trimmed.split_at(split_at);
    let unit = unit.trim();

    let amount: f64 = num_str
        .parse()
        .map_err(|_| HistorianError::InvalidInterval(s.to_string()))?;

    let unit_millis = if unit.is_empty() {
        1_000
    } else {
        INTERVAL_UNITS
            .iter()
            .find(|(suffix, _)| *suffix == unit)
            .map(|(_, millis)| *millis)
            .ok_or_else(|| HistorianError::InvalidInterval(s.to_string()))?
    };

    let raw = (amount * unit_millis as f64).round();
    if !raw.is_finite() || raw > MAX_INTERVAL_MILLIS as f64 {
        return Err(HistorianError::InvalidInterval(format!(
            "{} exceeds the maximum of {}",
            s,
            format_interval(Duration::milliseconds(MAX_INTERVAL_MILLIS))
        )));
    }
    let millis = raw as i64;
    if millis <= 0 {
        return Err(HistorianError::InvalidInterval(format!(
            "{} must be positive",
            s
        )));
    }

    Ok(Duration::milliseconds(millis))
}

/// Format a duration using the largest unit that divides it exactly.
pub fn format_interval(duration: Duration) -> String {
    let millis = duration.num_milliseconds();
    if millis == 0 {
        return "0s".to_string();
    }

    for (suffix, unit_millis) in INTERVAL_UNITS.iter().rev() {
        if millis % unit_millis == 0 {
            return format!("{}{}", millis / unit_millis, suffix);
        }
    }

    format!("{}ms", millis)
}

// =============================================================================
// Tests
// =============================================================================
