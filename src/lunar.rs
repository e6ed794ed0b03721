//! Moon-phase arithmetic for the lamp.
//!
//! The phase is taken as the fraction of the mean synodic month elapsed since a
//! reference new moon (2000-01-06 18:14 UTC). That fraction is bucketed into twelve
//! lamp phases, and each lamp phase maps to a six-segment light pattern.
//! Accuracy: a few hours against published new/full moon times, which is well
//! inside one lamp bucket (~2.5 days).

use crate::{LightPattern, Switch};
use chrono::{DateTime, TimeZone, Utc};
use thiserror::Error;

use Switch::{Off as O, On as I};

/// Mean synodic month in seconds.
pub const LUNAR_CYCLE_SECONDS: f64 = 29.530_587_705_76 * 86_400.0;

/// Number of discrete phases the lamp can show.
pub const PHASE_COUNT: u8 = 12;

/// Phase number reserved for the "error/unknown" pattern.
pub const ERROR_PHASE: i8 = -1;

/// Errors from phase conversions.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PhaseError {
    /// Fraction outside `[0, 1)` (or NaN); indicates a caller bug.
    #[error("phase fraction {0} is outside [0, 1)")]
    Domain(f64),

    /// Phase number with no entry in the pattern table.
    #[error("no light pattern for phase number {0}")]
    UnknownPhase(i8),
}

/// Reference new moon, 2000-01-06 18:14 UTC.
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2000, 1, 6, 18, 14, 0)
        .single()
        .expect("reference epoch is a valid UTC instant")
}

/// Fraction of the lunar cycle elapsed at `now`, in `[0, 1)`.
///
/// Instants before the epoch wrap around, so the result is total over all timestamps.
pub fn phase_fraction(now: DateTime<Utc>) -> f64 {
    let elapsed = (now - epoch()).num_milliseconds() as f64 / 1000.0;
    let fraction = elapsed.rem_euclid(LUNAR_CYCLE_SECONDS) / LUNAR_CYCLE_SECONDS;
    // rem_euclid can round up to the divisor for tiny negative inputs
    if fraction >= 1.0 {
        0.0
    } else {
        fraction
    }
}

/// Bucket a phase fraction into one of the twelve lamp phases.
///
/// Computes `round(12 * fraction) mod 12`. Halves round away from zero
/// (`f64::round`), so exactly half a bucket rounds up and anything from
/// `11.5 / 12` up wraps to phase 0.
pub fn phase_number(fraction: f64) -> Result<u8, PhaseError> {
    if !(0.0..1.0).contains(&fraction) {
        return Err(PhaseError::Domain(fraction));
    }
    let bucket = (f64::from(PHASE_COUNT) * fraction).round() as u8;
    Ok(bucket % PHASE_COUNT)
}

/// Light pattern for a phase number in `[-1, 11]`.
///
/// Segments light from the far end while waxing and go dark from the near end
/// while waning; `-1` is the alternating error pattern.
pub fn light_pattern(phase_number: i8) -> Result<LightPattern, PhaseError> {
    let pattern = match phase_number {
        -1 => [I, O, I, O, I, O],
        0 => [O, O, O, O, O, O],
        1 => [O, O, O, O, O, I],
        2 => [O, O, O, O, I, I],
        3 => [O, O, O, I, I, I],
        4 => [O, O, I, I, I, I],
        5 => [O, I, I, I, I, I],
        6 => [I, I, I, I, I, I],
        7 => [I, I, I, I, I, O],
        8 => [I, I, I, I, O, O],
        9 => [I, I, I, O, O, O],
        10 => [I, I, O, O, O, O],
        11 => [I, O, O, O, O, O],
        other => return Err(PhaseError::UnknownPhase(other)),
    };
    Ok(pattern)
}

/// Upper fraction bound of each named phase, in order.
const PHASE_NAMES: [(&str, f64); 9] = [
    ("New", 0.033_863_193_308_711),
    ("Waxing Crescent", 0.216_136_806_691_289),
    ("First Quarter", 0.283_863_193_308_711),
    ("Waxing Gibbous", 0.466_136_806_691_289),
    ("Full", 0.533_863_193_308_711),
    ("Waning Gibbous", 0.716_136_806_691_289),
    ("Last Quarter", 0.783_863_193_308_711),
    ("Waning Crescent", 0.966_136_806_691_289),
    ("New", 1.0),
];

/// Human-readable name of the phase at `fraction`.
pub fn phase_name(fraction: f64) -> Result<&'static str, PhaseError> {
    if !(0.0..1.0).contains(&fraction) {
        return Err(PhaseError::Domain(fraction));
    }
    PHASE_NAMES
        .iter()
        .find(|(_, max)| fraction <= *max)
        .map(|(name, _)| *name)
        .ok_or(PhaseError::Domain(fraction))
}
