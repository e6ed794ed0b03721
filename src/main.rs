//! # Moon Lamp Application Entry Point
//!
//! This binary wires the library together: it reads moon-lamp.toml, applies command
//! line overrides, builds the screen rotation and runs it until the mode finishes or
//! the process is asked to stop.
//!
//! It supports both production mode (WS2812 strip over SPI) and development mode
//! (`--stdout`, frames written to the status file).

use anyhow::Context;
use moon_lamp_lib::args::{self, CliAction, RunArgs};
use moon_lamp_lib::catalog;
use moon_lamp_lib::clock::{install_signal_handler, Shutdown, SystemClock};
use moon_lamp_lib::config::Config;
use moon_lamp_lib::lamp::{Lamp, PixelOutput, StatusFileOutput};
use moon_lamp_lib::rotation::{RunOutcome, ScreenRotation};
use moon_lamp_lib::window::Mode;
use std::env;

fn init_logging(debug_enabled: bool) {
    let default_level = if debug_enabled { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_secs()
        .init();
}

/// Pixel output for this run: the LED strip in production, the status file otherwise.
fn pixel_output(run: &RunArgs, config: &Config) -> anyhow::Result<Box<dyn PixelOutput>> {
    // Development mode: frames go to the status file for testing without hardware
    if run.print_only {
        return Ok(status_file_output(config));
    }
    strip_output(config)
}

fn status_file_output(config: &Config) -> Box<dyn PixelOutput> {
    let output = StatusFileOutput::new(&config.lamp.status_file);
    log::info!("Writing frames to {}", output.path().display());
    Box::new(output)
}

#[cfg(all(target_os = "linux", feature = "hardware"))]
fn strip_output(config: &Config) -> anyhow::Result<Box<dyn PixelOutput>> {
    let strip = moon_lamp_lib::lamp::SpiPixelOutput::new().context("open SPI0 for the LED strip")?;
    log::info!("Driving {} WS2812 pixels on SPI0", config.lamp.num_leds);
    Ok(Box::new(strip))
}

#[cfg(not(all(target_os = "linux", feature = "hardware")))]
fn strip_output(config: &Config) -> anyhow::Result<Box<dyn PixelOutput>> {
    log::warn!("LED strip support not enabled. Rebuild with --features hardware on the Pi.");
    Ok(status_file_output(config))
}

fn run(run_args: RunArgs) -> anyhow::Result<RunOutcome> {
    let mut config = match &run_args.config_path {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    }
    .context("load configuration")?;
    config.apply_env();
    run_args.apply(&mut config);

    // Validate everything before touching the strip
    let mode = config.mode()?;
    let delay = config.delay()?;
    let ids = catalog::parse_ids(&config.rotation.screens)?;
    let screens = catalog::build_screens(&ids, &config)?;
    if screens.is_empty() && mode != Mode::Off {
        anyhow::bail!("no screens configured");
    }

    let lamp = Lamp::new(
        pixel_output(&run_args, &config)?,
        config.lamp.num_leds,
        config.lamp.reverse_leds,
    );

    let shutdown = Shutdown::new();
    install_signal_handler(shutdown.clone()).context("install signal handler")?;

    let mut rotation = ScreenRotation::new(screens, lamp, SystemClock::new(shutdown), mode, delay);
    if mode == Mode::WithMoon {
        rotation = rotation.with_moon_source(Box::new(catalog::moon_resolver(&config)?));
    }

    let outcome = rotation.run().context("switch the lamp off")?;
    Ok(outcome)
}

/// Main application entry point.
fn main() -> anyhow::Result<()> {
    let run_args = match CliAction::parse(env::args()) {
        CliAction::Run(run_args) => run_args,
        CliAction::ShowHelp => {
            args::display_help();
            return Ok(());
        }
        CliAction::ShowVersion => {
            args::display_version();
            return Ok(());
        }
        CliAction::ShowHelpDueToError(message) => {
            eprintln!("error: {message}");
            eprintln!();
            args::display_help();
            std::process::exit(2);
        }
    };

    init_logging(run_args.debug_enabled);

    match run(run_args)? {
        RunOutcome::Finished => log::info!("Rotation finished, lamp is off"),
        RunOutcome::Interrupted => log::info!("Stopped by signal, lamp is off"),
    }
    Ok(())
}
