//! Flag screen: static color bands split evenly along the strip.

use crate::lamp::Lamp;
use crate::screen::{RenderError, Visual};
use crate::RGB8;
use chrono::{DateTime, Local};

pub const UKRAINE_BLUE: RGB8 = RGB8 { r: 0, g: 87, b: 183 };
pub const UKRAINE_YELLOW: RGB8 = RGB8 { r: 255, g: 215, b: 0 };

#[derive(Debug, Clone)]
pub struct FlagScreen {
    bands: Vec<RGB8>,
}

impl FlagScreen {
    /// `bands` run from the first pixel onwards; must not be empty.
    pub fn new(bands: Vec<RGB8>) -> Self {
        Self { bands }
    }

    pub fn ukraine() -> Self {
        Self::new(vec![UKRAINE_BLUE, UKRAINE_YELLOW])
    }
}

/// Pixel `j` of `n` gets band `j * bands / n`.
pub fn band_colors(bands: &[RGB8], num_leds: usize) -> Vec<RGB8> {
    if bands.is_empty() {
        return vec![RGB8::default(); num_leds];
    }
    (0..num_leds)
        .map(|j| bands[(j * bands.len() / num_leds).min(bands.len() - 1)])
        .collect()
}

impl Visual for FlagScreen {
    fn render(&mut self, lamp: &mut Lamp, _now: DateTime<Local>) -> Result<bool, RenderError> {
        lamp.set_leds(&band_colors(&self.bands, lamp.num_leds()))?;
        Ok(true)
    }
}
