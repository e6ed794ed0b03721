//! Screens: one visual in the rotation.
//!
//! A [`Visual`] draws something onto the shared [`Lamp`] and reports whether it
//! actually showed anything. Returning `Ok(false)` means "nothing to show" (no game
//! today, no rain expected) and the rotation moves on without pausing.

use crate::lamp::{Lamp, OutputError};
use crate::lunar::PhaseError;
use crate::twilight::DataError;
use chrono::{DateTime, Local};
use thiserror::Error;

/// Why a screen failed to render.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("data unavailable: {0}")]
    Data(#[from] DataError),

    #[error(transparent)]
    Phase(#[from] PhaseError),

    #[error("pixel output: {0}")]
    Output(#[from] OutputError),
}

/// A display capability bound to its arguments.
pub trait Visual {
    /// Draw onto `lamp`. `Ok(true)` if something visible was shown.
    fn render(&mut self, lamp: &mut Lamp, now: DateTime<Local>) -> Result<bool, RenderError>;
}

impl<F> Visual for F
where
    F: FnMut(&mut Lamp, DateTime<Local>) -> Result<bool, RenderError>,
{
    fn render(&mut self, lamp: &mut Lamp, now: DateTime<Local>) -> Result<bool, RenderError> {
        self(lamp, now)
    }
}

/// A named visual in the rotation.
pub struct Screen {
    name: String,
    visual: Box<dyn Visual>,
}

impl Screen {
    pub fn new(name: impl Into<String>, visual: impl Visual + 'static) -> Self {
        Self {
            name: name.into(),
            visual: Box::new(visual),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn render(&mut self, lamp: &mut Lamp, now: DateTime<Local>) -> Result<bool, RenderError> {
        self.visual.render(lamp, now)
    }

    /// Clear the strip.
    pub fn off(&self, lamp: &mut Lamp) -> Result<(), OutputError> {
        lamp.leds_off()
    }
}

impl std::fmt::Debug for Screen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Screen").field("name", &self.name).finish_non_exhaustive()
    }
}
