//! # Screen Rotation
//!
//! The control loop. While the current on/off [`Window`] is open, every screen is
//! shown in turn for the configured delay; a screen with nothing to show is skipped
//! without pausing. When the window closes the lamp goes dark and the loop sleeps
//! until the next window opens, as decided by the [`Mode`].
//!
//! ## Failure handling
//! - A screen that fails (provider down, bad data) is logged, replaced by the error
//!   pattern for one delay, and the rotation carries on.
//! - If the moon rise/set lookup fails the lamp stays dark and the lookup is retried
//!   after [`MOON_RETRY_MINUTES`].
//! - A shutdown request during any sleep switches the lamp off and ends the loop.
//!
//! Only pixel-output failures while switching off abort the loop.

use crate::clock::Clock;
use crate::lamp::{Lamp, OutputError};
use crate::moon::MoonScreen;
use crate::screen::{Screen, Visual};
use crate::window::{initial_window, next_window, Mode, MoonWindows, Window};
use chrono::{DateTime, Duration, Local};

/// Wait before asking the moon rise/set provider again after a failure.
pub const MOON_RETRY_MINUTES: i64 = 15;

/// How [`ScreenRotation::run`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The mode ran its course (`off`, or a finished `timer`).
    Finished,
    /// A sleep was cut short by a shutdown request.
    Interrupted,
}

/// Loop state, readable while or after the loop runs.
#[derive(Debug, Clone, PartialEq)]
pub struct RotationState {
    pub mode: Mode,
    pub delay: std::time::Duration,
    pub window: Option<Window>,
    pub lamp_on: bool,
}

impl RotationState {
    pub fn timer_length(&self) -> Option<Duration> {
        match self.mode {
            Mode::Timer(length) => Some(length),
            _ => None,
        }
    }
}

pub struct ScreenRotation<C> {
    screens: Vec<Screen>,
    lamp: Lamp,
    clock: C,
    moon: Option<Box<dyn MoonWindows>>,
    error_visual: MoonScreen,
    state: RotationState,
}

impl<C: Clock> ScreenRotation<C> {
    pub fn new(screens: Vec<Screen>, lamp: Lamp, clock: C, mode: Mode, delay: std::time::Duration) -> Self {
        Self {
            screens,
            lamp,
            clock,
            moon: None,
            error_visual: MoonScreen::error(),
            state: RotationState {
                mode,
                delay,
                window: None,
                lamp_on: false,
            },
        }
    }

    /// Rise/set provider for `with_moon` mode.
    pub fn with_moon_source(mut self, moon: Box<dyn MoonWindows>) -> Self {
        self.moon = Some(moon);
        self
    }

    pub fn state(&self) -> &RotationState {
        &self.state
    }

    pub fn lamp(&self) -> &Lamp {
        &self.lamp
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn screen_names(&self) -> Vec<&str> {
        self.screens.iter().map(Screen::name).collect()
    }

    /// Run until the mode finishes or a shutdown is requested.
    pub fn run(&mut self) -> Result<RunOutcome, OutputError> {
        let now = self.clock.now();
        log::info!(
            "Starting {} mode with {} screen(s): {}",
            self.state.mode,
            self.screens.len(),
            self.screen_names().join(", ")
        );

        if self.state.mode == Mode::Off {
            self.off()?;
            return Ok(RunOutcome::Finished);
        }

        let window = match initial_window(&self.state.mode, now, moon_source(&mut self.moon)) {
            Ok(window) => window,
            Err(e) => retry_window(now, &e),
        };
        log_window(&window);
        self.state.window = Some(window);
        if !window.currently_on {
            self.off()?;
        }

        loop {
            let now = self.clock.now();
            let mut window = self.state.window.unwrap_or_else(|| Window::closed_until(now));

            if window.contains(now) {
                self.state.lamp_on = true;
                if !self.show_screens(&window)? {
                    self.off()?;
                    return Ok(RunOutcome::Interrupted);
                }
                continue;
            }

            if let Mode::Timer(length) = self.state.mode {
                log::info!("Timer of {} min finished", length.num_minutes());
                self.off()?;
                return Ok(RunOutcome::Finished);
            }

            if window.is_expired(now) {
                window = match next_window(&self.state.mode, &window, now, moon_source(&mut self.moon)) {
                    Ok(Some(next)) => next,
                    Ok(None) => {
                        self.off()?;
                        return Ok(RunOutcome::Finished);
                    }
                    Err(e) => retry_window(now, &e),
                };
                log_window(&window);
                self.state.window = Some(window);
            }

            if self.state.lamp_on {
                self.off()?;
            }

            if !self.clock.sleep_until(window.on_at) {
                self.off()?;
                return Ok(RunOutcome::Interrupted);
            }
        }
    }

    /// One pass over the screens while `window` is open. `Ok(false)` on shutdown.
    fn show_screens(&mut self, window: &Window) -> Result<bool, OutputError> {
        let mut shown_any = false;

        for screen in self.screens.iter_mut() {
            let now = self.clock.now();
            if !window.contains(now) {
                break;
            }

            let shown = match screen.render(&mut self.lamp, now) {
                Ok(shown) => shown,
                Err(e) => {
                    log::warn!("Screen '{}' failed: {}", screen.name(), e);
                    if let Err(e) = self.error_visual.render(&mut self.lamp, now) {
                        log::error!("Error pattern failed too: {e}");
                    }
                    true
                }
            };

            if shown {
                shown_any = true;
                if !self.clock.sleep(self.state.delay) {
                    return Ok(false);
                }
            } else {
                log::debug!("Screen '{}' has nothing to show", screen.name());
            }
        }

        // Every screen declined; don't spin
        if !shown_any && !self.clock.sleep(self.state.delay) {
            return Ok(false);
        }
        Ok(true)
    }

    fn off(&mut self) -> Result<(), OutputError> {
        self.lamp.leds_off()?;
        self.state.lamp_on = false;
        Ok(())
    }
}

fn moon_source(moon: &mut Option<Box<dyn MoonWindows>>) -> Option<&mut dyn MoonWindows> {
    match moon {
        Some(source) => Some(source.as_mut() as &mut dyn MoonWindows),
        None => None,
    }
}

fn retry_window(now: DateTime<Local>, error: &crate::twilight::DataError) -> Window {
    log::warn!(
        "Could not determine next moon window: {error}; retrying in {MOON_RETRY_MINUTES} min"
    );
    Window::closed_until(now + Duration::minutes(MOON_RETRY_MINUTES))
}

fn log_window(window: &Window) {
    log::info!(
        "Lamp window {} - {} ({})",
        window.on_at.format("%Y-%m-%d %H:%M"),
        window.off_at.format("%Y-%m-%d %H:%M"),
        if window.currently_on { "on now" } else { "waiting" }
    );
}
