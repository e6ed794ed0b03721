//! Command-line argument parsing and processing.
//!
//! Flags mirror the config file's rotation settings and override them when given.
//! Both `--flag value` and `--flag=value` are accepted.

use crate::config::Config;
use chrono::Duration;
use std::path::PathBuf;

/// Settings from the command line; `None` means "use the config file".
#[derive(Debug, Default, PartialEq)]
pub struct RunArgs {
    pub debug_enabled: bool,
    pub config_path: Option<PathBuf>,
    pub mode: Option<String>,
    pub delay_secs: Option<u64>,
    pub timer_length: Option<Duration>,
    pub on_hour: Option<u32>,
    pub off_hour: Option<u32>,
    /// Replaces the configured screen list when non-empty
    pub screens: Vec<String>,
    /// Write frames to the status file instead of the LED strip
    pub print_only: bool,
}

/// What the binary should do.
#[derive(Debug, PartialEq)]
pub enum CliAction {
    Run(RunArgs),
    ShowHelp,
    ShowVersion,
    /// Bad arguments: print the message and the help text, exit non-zero
    ShowHelpDueToError(String),
}

impl CliAction {
    /// Parse `args`, including the program name in position 0.
    pub fn parse<I, S>(args: I) -> CliAction
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut run = RunArgs::default();
        let mut args = args.into_iter().skip(1).map(|s| s.as_ref().to_string());

        while let Some(arg) = args.next() {
            let (flag, inline) = match arg.split_once('=') {
                Some((flag, value)) if flag.starts_with("--") => (flag.to_string(), Some(value.to_string())),
                _ => (arg.clone(), None),
            };

            // Flags without a value
            match flag.as_str() {
                "-h" | "--help" => return CliAction::ShowHelp,
                "-V" | "--version" => return CliAction::ShowVersion,
                "--debug" => {
                    run.debug_enabled = true;
                    continue;
                }
                "--stdout" | "--print-only" => {
                    run.print_only = true;
                    continue;
                }
                _ => {}
            }

            let Some(value) = inline.or_else(|| args.next()) else {
                return if known_value_flag(&flag) {
                    CliAction::ShowHelpDueToError(format!("{flag} needs a value"))
                } else {
                    CliAction::ShowHelpDueToError(format!("unknown argument '{flag}'"))
                };
            };

            let parsed = match flag.as_str() {
                "-m" | "--mode" => {
                    run.mode = Some(value.clone());
                    Ok(())
                }
                "-s" | "--screen" => {
                    run.screens.push(value.clone());
                    Ok(())
                }
                "-c" | "--config" => {
                    run.config_path = Some(PathBuf::from(&value));
                    Ok(())
                }
                "-d" | "--delay" => parse_into(&value, &mut run.delay_secs),
                "--on-hour" => parse_into(&value, &mut run.on_hour),
                "--off-hour" => parse_into(&value, &mut run.off_hour),
                "-t" | "--timer-length" => match parse_timer_length(&value) {
                    Some(length) => {
                        run.timer_length = Some(length);
                        Ok(())
                    }
                    None => Err(()),
                },
                _ => return CliAction::ShowHelpDueToError(format!("unknown argument '{flag}'")),
            };

            if parsed.is_err() {
                return CliAction::ShowHelpDueToError(format!("invalid value '{value}' for {flag}"));
            }
        }

        CliAction::Run(run)
    }
}

fn known_value_flag(flag: &str) -> bool {
    matches!(
        flag,
        "-m" | "--mode"
            | "-s"
            | "--screen"
            | "-c"
            | "--config"
            | "-d"
            | "--delay"
            | "--on-hour"
            | "--off-hour"
            | "-t"
            | "--timer-length"
    )
}

fn parse_into<T: std::str::FromStr>(value: &str, slot: &mut Option<T>) -> Result<(), ()> {
    *slot = Some(value.trim().parse().map_err(|_| ())?);
    Ok(())
}

/// Timer length in hours (`2`, `1.5`, `2h`) or minutes (`30m`).
pub fn parse_timer_length(text: &str) -> Option<Duration> {
    let text = text.trim();
    if let Some(minutes) = text.strip_suffix('m') {
        return minutes.trim().parse::<i64>().ok().map(Duration::minutes);
    }
    let hours: f64 = text.strip_suffix('h').unwrap_or(text).trim().parse().ok()?;
    if !hours.is_finite() {
        return None;
    }
    Some(Duration::minutes((hours * 60.0).round() as i64))
}

impl RunArgs {
    /// Overlay command-line settings onto `config`.
    pub fn apply(&self, config: &mut Config) {
        let rotation = &mut config.rotation;
        if let Some(mode) = &self.mode {
            rotation.mode = mode.clone();
        }
        if let Some(delay) = self.delay_secs {
            rotation.delay_secs = delay;
        }
        if let Some(length) = self.timer_length {
            rotation.timer_length_minutes = length.num_minutes();
        }
        if let Some(hour) = self.on_hour {
            rotation.on_hour = hour;
        }
        if let Some(hour) = self.off_hour {
            rotation.off_hour = hour;
        }
        if !self.screens.is_empty() {
            rotation.screens = self.screens.clone();
        }
    }
}

/// Display help information.
pub fn display_help() {
    println!("moon-lamp v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Usage: moon-lamp [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -m, --mode <MODE>           on, off, timer, day_only, with_moon (default: day_only)");
    println!("  -s, --screen <ID>           Screen to show; repeat for several");
    println!("  -d, --delay <SECONDS>       How long to show each screen (default: 5)");
    println!("  -t, --timer-length <LEN>    Timer length in hours, or minutes with an 'm' suffix (default: 1)");
    println!("      --on-hour <HOUR>        day_only: hour the lamp turns on (default: 8)");
    println!("      --off-hour <HOUR>       day_only: hour the lamp turns off (default: 21)");
    println!("  -c, --config <PATH>         Config file (default: moon-lamp.toml)");
    println!("      --stdout                Write frames to the status file instead of the LEDs");
    println!("      --debug                 Verbose logging");
    println!("  -h, --help                  Print help");
    println!("  -V, --version               Print version");
    println!();
    println!("Screens: feels_like_screen, sunniness_screen, current_moon_screen,");
    println!("         daily_precip_screen, game_today, ukraine_flag");
}

pub fn display_version() {
    println!("moon-lamp {}", env!("CARGO_PKG_VERSION"));
}
