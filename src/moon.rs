//! # Moon Phase Screen
//!
//! Shows a lunar phase as a six-segment light pattern on the strip. The phase can be
//! the real one for "now", a fixed phase number, or a cycle that steps through all
//! twelve phases (one per render), which is handy for checking the wiring.
//!
//! Longer strips stretch the six segments evenly; pixel `j` of `n` shows segment
//! `j * 6 / n`.

use crate::config::ConfigError;
use crate::lamp::{Lamp, BLACK};
use crate::lunar::{self, ERROR_PHASE, PHASE_COUNT};
use crate::screen::{RenderError, Visual};
use crate::{LightPattern, RGB8, SEGMENTS};
use chrono::{DateTime, Local, Utc};

/// Color of a lit segment.
pub const MOON_WHITE: RGB8 = RGB8 { r: 255, g: 255, b: 255 };

/// Where the phase to show comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseMode {
    /// Computed from the current time.
    Current,
    /// Always the given phase number (`-1` shows the error pattern).
    Fixed(i8),
    /// Advance one phase per render.
    Cycle,
}

impl PhaseMode {
    pub fn parse(name: &str, phase_number: Option<i8>) -> Result<Self, ConfigError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "current" => Ok(PhaseMode::Current),
            "cycle" => Ok(PhaseMode::Cycle),
            "fixed" => phase_number
                .map(PhaseMode::Fixed)
                .ok_or(ConfigError::MissingParameter("phase_number")),
            other => Err(ConfigError::InvalidPhaseMode(other.to_string())),
        }
    }
}

/// Moon-phase visual.
#[derive(Debug, Clone)]
pub struct MoonScreen {
    mode: PhaseMode,
    on_color: RGB8,
    /// Last phase shown; drives cycle mode.
    current_phase: i8,
}

impl MoonScreen {
    pub fn new(mode: PhaseMode) -> Self {
        Self {
            mode,
            on_color: MOON_WHITE,
            current_phase: ERROR_PHASE,
        }
    }

    /// The alternating pattern shown when another screen fails.
    pub fn error() -> Self {
        Self::new(PhaseMode::Fixed(ERROR_PHASE))
    }

    pub fn current_phase(&self) -> i8 {
        self.current_phase
    }

    /// Phase number to show next.
    fn next_phase(&self, now: DateTime<Local>) -> Result<i8, RenderError> {
        let phase = match self.mode {
            PhaseMode::Current => {
                let fraction = lunar::phase_fraction(now.with_timezone(&Utc));
                let number = lunar::phase_number(fraction)?;
                log::debug!(
                    "Moon phase {:.3} ({}) -> lamp phase {}",
                    fraction,
                    lunar::phase_name(fraction)?,
                    number
                );
                number as i8
            }
            PhaseMode::Fixed(number) => number,
            PhaseMode::Cycle => (self.current_phase + 1).rem_euclid(PHASE_COUNT as i8),
        };
        Ok(phase)
    }
}

/// Spread a six-segment pattern over `num_leds` pixels.
pub fn pattern_colors(pattern: &LightPattern, num_leds: usize, on_color: RGB8) -> Vec<RGB8> {
    (0..num_leds)
        .map(|j| {
            let segment = j * SEGMENTS / num_leds.max(1);
            if pattern[segment.min(SEGMENTS - 1)].is_on() {
                on_color
            } else {
                BLACK
            }
        })
        .collect()
}

impl Visual for MoonScreen {
    fn render(&mut self, lamp: &mut Lamp, now: DateTime<Local>) -> Result<bool, RenderError> {
        let phase = self.next_phase(now)?;
        let pattern = lunar::light_pattern(phase)?;
        lamp.set_leds(&pattern_colors(&pattern, lamp.num_leds(), self.on_color))?;
        self.current_phase = phase;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lamp::RecordingOutput;
    use crate::Switch::{Off as O, On as I};
    use chrono::TimeZone;

    fn lamp(num_leds: usize) -> (Lamp, RecordingOutput) {
        let output = RecordingOutput::default();
        (Lamp::new(Box::new(output.clone()), num_leds, false), output)
    }

    fn lit(frame: &[RGB8]) -> Vec<bool> {
        frame.iter().map(|c| *c != BLACK).collect()
    }

    #[test]
    fn test_new_moon_is_dark() {
        let (mut lamp, _) = lamp(6);
        let new_moon = Utc.with_ymd_and_hms(2024, 1, 11, 11, 57, 0).unwrap().with_timezone(&Local);
        let mut screen = MoonScreen::new(PhaseMode::Current);

        assert!(screen.render(&mut lamp, new_moon).unwrap());
        assert_eq!(screen.current_phase(), 0);
        assert!(lamp.is_dark());
    }

    #[test]
    fn test_full_moon_is_fully_lit() {
        let (mut lamp, _) = lamp(6);
        let full_moon = Utc.with_ymd_and_hms(2024, 1, 25, 17, 54, 0).unwrap().with_timezone(&Local);
        let mut screen = MoonScreen::new(PhaseMode::Current);

        screen.render(&mut lamp, full_moon).unwrap();
        assert_eq!(screen.current_phase(), 6);
        assert_eq!(lamp.current_frame(), &[MOON_WHITE; 6]);
    }

    #[test]
    fn test_cycle_starts_at_new_and_wraps() {
        let (mut lamp, _) = lamp(6);
        let now = Local::now();
        let mut screen = MoonScreen::new(PhaseMode::Cycle);

        let mut seen = Vec::new();
        for _ in 0..13 {
            screen.render(&mut lamp, now).unwrap();
            seen.push(screen.current_phase());
        }
        assert_eq!(seen, vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 0]);
    }

    #[test]
    fn test_error_pattern() {
        let (mut lamp, _) = lamp(6);
        MoonScreen::error().render(&mut lamp, Local::now()).unwrap();
        assert_eq!(lit(lamp.current_frame()), vec![true, false, true, false, true, false]);
    }

    #[test]
    fn test_unknown_fixed_phase_fails_without_drawing() {
        let (mut lamp, output) = lamp(6);
        let err = MoonScreen::new(PhaseMode::Fixed(12))
            .render(&mut lamp, Local::now())
            .unwrap_err();
        assert!(matches!(err, RenderError::Phase(lunar::PhaseError::UnknownPhase(12))));
        assert!(output.frames().is_empty());
    }

    #[test]
    fn test_pattern_stretches_over_longer_strip() {
        let colors = pattern_colors(&[O, O, O, I, I, I], 12, MOON_WHITE);
        assert_eq!(
            lit(&colors),
            vec![false, false, false, false, false, false, true, true, true, true, true, true]
        );
    }

    #[test]
    fn test_phase_mode_parse() {
        assert_eq!(PhaseMode::parse("current", None).unwrap(), PhaseMode::Current);
        assert_eq!(PhaseMode::parse("fixed", Some(3)).unwrap(), PhaseMode::Fixed(3));
        assert!(matches!(PhaseMode::parse("fixed", None), Err(ConfigError::MissingParameter(_))));
        assert!(matches!(PhaseMode::parse("hold", None), Err(ConfigError::InvalidPhaseMode(_))));
    }
}
