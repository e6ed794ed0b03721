//! # Moon Lamp Core Library
//!
//! This library drives an addressable-LED "moon lamp" on a Raspberry Pi. It computes
//! the lunar phase (or another ambient metric such as weather or a sports schedule)
//! and renders it onto a short strip of pixels, cycling through a rotation of
//! "screens" while the lamp's on/off window says it should be lit.
//!
//! ## Design Philosophy
//!
//! ### One Owner for the Strip
//! - **Single pixel output**: every visual draws onto one shared [`lamp::Lamp`], which the
//!   rotation loop owns and lends out for each render
//! - **Composition over hierarchy**: moon, weather, sports and flag visuals are independent
//!   types implementing [`screen::Visual`], not subclasses of a lamp
//! - **No globals**: the "current phase" for cycle mode and the active on/off window both live
//!   on the structs that mutate them
//!
//! ### Scheduling
//! The lamp is gated by one of five modes (see [`window::Mode`]):
//! - **on / off**: always lit, or switched off immediately
//! - **timer**: lit for a fixed length, then off for good
//! - **day_only**: lit between two wall-clock hours every day
//! - **with_moon**: lit while the moon is above the horizon
//!
//! Sleeping is cooperative and interruptible through [`clock::Clock`], so SIGINT/SIGTERM stop
//! the lamp cleanly even during a multi-hour wait for the next window.
//!
//! ## Core Types
//!
//! - [`Switch`]: state of one segment in a moon light pattern
//! - [`LightPattern`]: the six-segment pattern for a phase number

use serde::{Deserialize, Serialize};

// Module declarations
pub mod args;
pub mod cache;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod flag;
pub mod lamp;
pub mod lunar;
pub mod moon;
pub mod rotation;
pub mod screen;
pub mod sports;
pub mod twilight;
pub mod weather;
pub mod window;

#[cfg(test)]
mod tests;

pub use smart_leds::RGB8;

/// Number of physical segments on the original moon lamp.
pub const SEGMENTS: usize = 6;

/// State of a single lamp segment.
///
/// # Example
/// ```
/// use moon_lamp_lib::Switch;
///
/// assert!(Switch::On.is_on());
/// assert_eq!(Switch::Off.to_string(), "off");
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Switch {
    On,
    Off,
}

impl Switch {
    pub fn is_on(self) -> bool {
        matches!(self, Switch::On)
    }
}

impl std::fmt::Display for Switch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Switch::On => f.write_str("on"),
            Switch::Off => f.write_str("off"),
        }
    }
}

/// Six-segment on/off pattern shown for one phase number.
///
/// Index 0 is the first segment on the strip (before any wiring reversal).
pub type LightPattern = [Switch; SEGMENTS];
