//! # Pixel Output
//!
//! [`Lamp`] is the one component that talks to the LED strip. Every visual (moon,
//! weather, sports, flag) draws through it, and the rotation loop owns it, so there is
//! exactly one writer for the physical pixels.
//!
//! ## Outputs
//!
//! - [`StatusFileOutput`]: "print only" mode for development. Each frame overwrites a
//!   small text file (`timestamp\t#rrggbb\t...`), which also serves as the status file
//!   read by the external web controller.
//! - `SpiPixelOutput` (feature `hardware`, Linux only): WS2812/NeoPixel strip driven from
//!   the Pi's SPI0 MOSI pin, GRB order.
//!
//! ## Wiring
//! Strips are often mounted so the first pixel is at the "wrong" end of the lamp. With
//! `reverse` set, logical index `i` is written to physical pixel `num_leds - 1 - i`.
//! Only strip outputs see the reversed frame; the status file and
//! [`Lamp::current_frame`] always report the logical order.

use crate::RGB8;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Color of an unlit pixel.
pub const BLACK: RGB8 = RGB8 { r: 0, g: 0, b: 0 };

/// Errors writing a frame to the strip.
#[derive(Error, Debug)]
pub enum OutputError {
    /// Frame length doesn't match the strip.
    #[error("expecting {expected} colors not {got}")]
    FrameLength { expected: usize, got: usize },

    /// Status file could not be written.
    #[error("status file IO: {0}")]
    Io(#[from] std::io::Error),

    /// SPI transfer to the strip failed.
    #[cfg(all(target_os = "linux", feature = "hardware"))]
    #[error("SPI error: {0}")]
    Spi(#[from] rppal::spi::Error),
}

/// Something that can physically show a frame of colors.
pub trait PixelOutput {
    /// Show `frame`, in physical pixel order if [`Self::physical_order`] holds.
    fn write(&mut self, frame: &[RGB8]) -> Result<(), OutputError>;

    /// Whether frames must be rewired to match the strip.
    fn physical_order(&self) -> bool {
        true
    }
}

/// The shared LED strip.
pub struct Lamp {
    output: Box<dyn PixelOutput>,
    num_leds: usize,
    reverse: bool,
    current: Vec<RGB8>,
}

impl Lamp {
    pub fn new(output: Box<dyn PixelOutput>, num_leds: usize, reverse: bool) -> Self {
        Self {
            output,
            num_leds,
            reverse,
            current: vec![BLACK; num_leds],
        }
    }

    pub fn num_leds(&self) -> usize {
        self.num_leds
    }

    /// Show one color per pixel, in logical order.
    pub fn set_leds(&mut self, colors: &[RGB8]) -> Result<(), OutputError> {
        if colors.len() != self.num_leds {
            return Err(OutputError::FrameLength {
                expected: self.num_leds,
                got: colors.len(),
            });
        }

        let mut physical = colors.to_vec();
        if self.reverse && self.output.physical_order() {
            physical.reverse();
        }
        self.output.write(&physical)?;
        self.current = colors.to_vec();
        Ok(())
    }

    /// Turn every pixel off.
    pub fn leds_off(&mut self) -> Result<(), OutputError> {
        let dark = vec![BLACK; self.num_leds];
        self.set_leds(&dark)
    }

    /// Last frame successfully shown, in logical order.
    pub fn current_frame(&self) -> &[RGB8] {
        &self.current
    }

    pub fn is_dark(&self) -> bool {
        self.current.iter().all(|c| *c == BLACK)
    }
}

/// Format a color as `#rrggbb`.
pub fn to_hex(color: RGB8) -> String {
    format!("#{:02x}{:02x}{:02x}", color.r, color.g, color.b)
}

/// Parse `#rrggbb` (the leading `#` is optional).
pub fn parse_hex(text: &str) -> Option<RGB8> {
    let hex = text.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some(RGB8::new(channel(0)?, channel(2)?, channel(4)?))
}

/// Scale every channel of `color` by `factor` (clamped to `[0, 1]`).
pub fn dim(color: RGB8, factor: f32) -> RGB8 {
    let factor = factor.clamp(0.0, 1.0);
    let scale = |v: u8| (f32::from(v) * factor) as u8;
    RGB8::new(scale(color.r), scale(color.g), scale(color.b))
}

/// Development output that records each frame in a text file.
pub struct StatusFileOutput {
    path: PathBuf,
}

impl StatusFileOutput {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PixelOutput for StatusFileOutput {
    fn write(&mut self, frame: &[RGB8]) -> Result<(), OutputError> {
        let colors: Vec<String> = frame.iter().copied().map(to_hex).collect();
        let line = format!(
            "{}\t{}\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.6f"),
            colors.join("\t")
        );
        fs::write(&self.path, line)?;
        Ok(())
    }

    fn physical_order(&self) -> bool {
        false
    }
}

/// SPI clock for WS2812 encoding: four SPI bits per data bit at 3.2 MHz = 800 kHz data.
pub const WS2812_SPI_HZ: u32 = 3_200_000;

/// Zero bytes appended after a frame to latch it (>50 µs low).
const WS2812_RESET_BYTES: usize = 40;

/// Encode a frame as an SPI bit stream for WS2812 pixels (GRB, MSB first).
///
/// Each data bit becomes a nibble: `1` → `1110`, `0` → `1000`.
pub fn encode_ws2812(frame: &[RGB8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(frame.len() * 12 + WS2812_RESET_BYTES);
    for pixel in frame {
        for byte in [pixel.g, pixel.r, pixel.b] {
            for pair in (0..4).rev() {
                let hi = (byte >> (pair * 2 + 1)) & 1;
                let lo = (byte >> (pair * 2)) & 1;
                let nibble = |bit: u8| if bit == 1 { 0b1110 } else { 0b1000 };
                out.push((nibble(hi) << 4) | nibble(lo));
            }
        }
    }
    out.extend(std::iter::repeat(0u8).take(WS2812_RESET_BYTES));
    out
}

/// WS2812 strip on the Pi's SPI0 bus.
#[cfg(all(target_os = "linux", feature = "hardware"))]
pub struct SpiPixelOutput {
    spi: rppal::spi::Spi,
}

#[cfg(all(target_os = "linux", feature = "hardware"))]
impl SpiPixelOutput {
    pub fn new() -> Result<Self, OutputError> {
        use rppal::spi::{Bus, Mode, SlaveSelect, Spi};

        let spi = Spi::new(Bus::Spi0, SlaveSelect::Ss0, WS2812_SPI_HZ, Mode::Mode0)?;
        Ok(Self { spi })
    }
}

#[cfg(all(target_os = "linux", feature = "hardware"))]
impl PixelOutput for SpiPixelOutput {
    fn write(&mut self, frame: &[RGB8]) -> Result<(), OutputError> {
        self.spi.write(&encode_ws2812(frame))?;
        Ok(())
    }
}

/// Output that keeps every frame in memory, for tests.
#[cfg(test)]
#[derive(Clone, Default)]
pub(crate) struct RecordingOutput {
    frames: std::rc::Rc<std::cell::RefCell<Vec<Vec<RGB8>>>>,
}

#[cfg(test)]
impl RecordingOutput {
    pub(crate) fn frames(&self) -> Vec<Vec<RGB8>> {
        self.frames.borrow().clone()
    }

    /// Number of all-black frames written.
    pub(crate) fn off_count(&self) -> usize {
        self.frames
            .borrow()
            .iter()
            .filter(|f| f.iter().all(|c| *c == BLACK))
            .count()
    }
}

#[cfg(test)]
impl PixelOutput for RecordingOutput {
    fn write(&mut self, frame: &[RGB8]) -> Result<(), OutputError> {
        self.frames.borrow_mut().push(frame.to_vec());
        Ok(())
    }
}
