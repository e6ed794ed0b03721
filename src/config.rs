//! # Configuration Management
//!
//! This module handles loading and parsing configuration from the moon-lamp.toml file.
//! It provides a centralized way to configure the LED strip, the rotation schedule,
//! the location used by the weather and moon providers, and per-screen options.
//!
//! Command line flags override whatever the file says, and API keys or coordinates
//! can also come from the environment (`OPEN_WEATHER_KEY`, `MOON_API_KEY`, `LAT`, `LON`)
//! so they never have to be committed alongside the config file.

use crate::lamp::parse_hex;
use crate::moon::PhaseMode;
use crate::twilight::{DataError, SourceZone};
use crate::window::Mode;
use crate::RGB8;
use chrono::{Duration, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default config file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "moon-lamp.toml";

/// Errors turning configuration into a runnable lamp.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("unknown mode '{0}' (expected one of on, off, timer, day_only, with_moon)")]
    InvalidMode(String),

    #[error("invalid day hours {on_hour}-{off_hour}: need 0 <= on < off <= 23")]
    InvalidHours { on_hour: u32, off_hour: u32 },

    #[error("timer length must be positive, got {0} minutes")]
    InvalidTimer(i64),

    #[error("delay between screens must be at least 1 second")]
    InvalidDelay,

    #[error("unknown moon phase mode '{0}' (expected current, fixed or cycle)")]
    InvalidPhaseMode(String),

    #[error("missing required setting: {0}")]
    MissingParameter(&'static str),

    #[error("unknown screen '{0}'")]
    UnknownScreen(String),

    #[error("invalid color '{0}' (expected #rrggbb)")]
    InvalidColor(String),

    #[error("could not set up data provider: {0}")]
    Provider(#[from] DataError),

    #[error("invalid config file format: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("could not serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("config file IO: {0}")]
    Io(#[from] std::io::Error),
}

/// Application configuration loaded from moon-lamp.toml
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// LED strip wiring
    pub lamp: LampConfig,
    /// On/off schedule and screen list
    pub rotation: RotationConfig,
    /// Where the lamp is, for weather and moonrise lookups
    pub location: LocationConfig,
    pub weather: WeatherConfig,
    pub moon: MoonConfig,
    pub sports: SportsConfig,
    pub flag: FlagConfig,
}

/// LED strip configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LampConfig {
    /// Number of pixels on the strip
    pub num_leds: usize,
    /// Strip is mounted with pixel 0 at the top
    pub reverse_leds: bool,
    /// Where print-only mode writes frames (also read as the status file)
    pub status_file: PathBuf,
}

/// Rotation schedule configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RotationConfig {
    /// One of on, off, timer, day_only, with_moon
    pub mode: String,
    /// Seconds each screen stays up
    pub delay_secs: u64,
    /// Timer mode duration in minutes
    pub timer_length_minutes: i64,
    /// Local hour the lamp turns on in day_only mode
    pub on_hour: u32,
    /// Local hour the lamp turns off in day_only mode
    pub off_hour: u32,
    /// Screen ids, shown in order
    pub screens: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LocationConfig {
    pub lat: f64,
    pub lon: f64,
    /// Offset of the moonrise provider's local times; defaults to the system zone, per date
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utc_offset_hours: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct WeatherConfig {
    /// OpenWeatherMap key (or env `OPEN_WEATHER_KEY`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MoonConfig {
    /// ipgeolocation.io key (or env `MOON_API_KEY`), needed for with_moon mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// current, fixed or cycle
    pub phase_mode: String,
    /// Phase shown in fixed mode, -1..=11
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase_number: Option<i8>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SportsConfig {
    /// MLB team id (statsapi.mlb.com)
    pub team_id: u32,
    pub primary_color: String,
    pub secondary_color: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FlagConfig {
    /// Bands from the first pixel up, split evenly over the strip
    pub colors: Vec<String>,
}

impl Default for LampConfig {
    fn default() -> Self {
        LampConfig {
            num_leds: 6,
            reverse_leds: true,
            status_file: PathBuf::from("lamp.txt"),
        }
    }
}

impl Default for RotationConfig {
    fn default() -> Self {
        RotationConfig {
            mode: "day_only".to_string(),
            delay_secs: 5,
            timer_length_minutes: 60,
            on_hour: 8,
            off_hour: 21,
            screens: vec![
                "feels_like_screen".to_string(),
                "sunniness_screen".to_string(),
                "current_moon_screen".to_string(),
            ],
        }
    }
}

impl Default for MoonConfig {
    fn default() -> Self {
        MoonConfig {
            api_key: None,
            phase_mode: "current".to_string(),
            phase_number: None,
        }
    }
}

impl Default for SportsConfig {
    fn default() -> Self {
        SportsConfig {
            team_id: 112, // Chicago Cubs
            primary_color: "#0e3386".to_string(),
            secondary_color: "#cc3433".to_string(),
        }
    }
}

impl Default for FlagConfig {
    fn default() -> Self {
        FlagConfig {
            colors: vec!["#0057b7".to_string(), "#ffd700".to_string()],
        }
    }
}

impl Config {
    /// Load configuration from moon-lamp.toml
    /// Falls back to default configuration if the file doesn't exist
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from specified path
    /// Falls back to default configuration if the file doesn't exist; a file that
    /// exists but doesn't parse is an error
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => {
                let config: Config = toml::from_str(&contents)?;
                log::info!("Loaded configuration from {}", path.display());
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No config file at {}, using default configuration", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Save current configuration to moon-lamp.toml
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to_path(DEFAULT_CONFIG_PATH)
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path.as_ref(), contents)?;
        log::info!("Configuration saved to {}", path.as_ref().display());
        Ok(())
    }

    /// Fill API keys and coordinates from the environment when the file leaves them unset.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.weather.api_key.is_none() {
            self.weather.api_key = lookup("OPEN_WEATHER_KEY");
        }
        if self.moon.api_key.is_none() {
            self.moon.api_key = lookup("MOON_API_KEY");
        }
        if let Some(lat) = lookup("LAT").and_then(|v| v.parse().ok()) {
            self.location.lat = lat;
        }
        if let Some(lon) = lookup("LON").and_then(|v| v.parse().ok()) {
            self.location.lon = lon;
        }
    }

    /// The validated gating mode.
    pub fn mode(&self) -> Result<Mode, ConfigError> {
        let r = &self.rotation;
        Mode::parse(
            &r.mode,
            Duration::minutes(r.timer_length_minutes),
            r.on_hour,
            r.off_hour,
        )
    }

    /// Time each screen stays up. Zero would make the rotation spin.
    pub fn delay(&self) -> Result<std::time::Duration, ConfigError> {
        match self.rotation.delay_secs {
            0 => Err(ConfigError::InvalidDelay),
            secs => Ok(std::time::Duration::from_secs(secs)),
        }
    }

    pub fn phase_mode(&self) -> Result<PhaseMode, ConfigError> {
        PhaseMode::parse(&self.moon.phase_mode, self.moon.phase_number)
    }

    /// Zone used to interpret the moon provider's local rise/set times.
    pub fn moon_zone(&self) -> SourceZone {
        self.location
            .utc_offset_hours
            .and_then(|hours| FixedOffset::east_opt((hours * 3600.0).round() as i32))
            .map_or(SourceZone::Local, SourceZone::Fixed)
    }

    pub fn team_colors(&self) -> Result<(RGB8, RGB8), ConfigError> {
        Ok((
            color(&self.sports.primary_color)?,
            color(&self.sports.secondary_color)?,
        ))
    }

    pub fn flag_colors(&self) -> Result<Vec<RGB8>, ConfigError> {
        if self.flag.colors.is_empty() {
            return Err(ConfigError::MissingParameter("flag.colors"));
        }
        self.flag.colors.iter().map(|c| color(c)).collect()
    }
}

fn color(text: &str) -> Result<RGB8, ConfigError> {
    parse_hex(text).ok_or_else(|| ConfigError::InvalidColor(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.lamp.num_leds, 6);
        assert!(config.lamp.reverse_leds);
        assert_eq!(config.rotation.mode, "day_only");
        assert_eq!(config.rotation.delay_secs, 5);
        assert_eq!(
            config.mode().unwrap(),
            Mode::DayOnly {
                on_hour: 8,
                off_hour: 21
            }
        );
        assert_eq!(config.phase_mode().unwrap(), PhaseMode::Current);
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("moon-lamp.toml");
        let mut config = Config::default();
        config.rotation.mode = "with_moon".to_string();
        config.location.utc_offset_hours = Some(-5.0);
        config.save_to_path(&path).unwrap();

        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let config = Config::load_from_path("/nonexistent/path").unwrap();
        // Should fallback to default
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("moon-lamp.toml");
        fs::write(&path, "[rotation]\nmode = \"timer\"\ntimer_length_minutes = 30\n").unwrap();

        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.mode().unwrap(), Mode::Timer(Duration::minutes(30)));
        assert_eq!(config.lamp.num_leds, 6);
        assert_eq!(config.rotation.off_hour, 21);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("moon-lamp.toml");
        fs::write(&path, "[rotation\nmode = ").unwrap();
        assert!(matches!(Config::load_from_path(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_invalid_settings() {
        let mut config = Config::default();
        config.rotation.on_hour = 22;
        assert!(matches!(config.mode(), Err(ConfigError::InvalidHours { .. })));

        config.rotation.mode = "sometimes".to_string();
        assert!(matches!(config.mode(), Err(ConfigError::InvalidMode(_))));

        config.sports.primary_color = "navy".to_string();
        assert!(matches!(config.team_colors(), Err(ConfigError::InvalidColor(_))));

        config.flag.colors.clear();
        assert!(matches!(config.flag_colors(), Err(ConfigError::MissingParameter(_))));
    }

    #[test]
    fn test_env_fills_unset_keys_only() {
        let env: HashMap<&str, &str> = [
            ("OPEN_WEATHER_KEY", "weather-from-env"),
            ("MOON_API_KEY", "moon-from-env"),
            ("LAT", "41.88"),
            ("LON", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.moon.api_key = Some("moon-from-file".to_string());
        config.location.lon = -87.6;
        config.apply_env_from(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.weather.api_key.as_deref(), Some("weather-from-env"));
        assert_eq!(config.moon.api_key.as_deref(), Some("moon-from-file"));
        assert_eq!(config.location.lat, 41.88);
        assert_eq!(config.location.lon, -87.6);
    }

    #[test]
    fn test_moon_zone_from_config() {
        let mut config = Config::default();
        assert_eq!(config.moon_zone(), SourceZone::Local);

        config.location.utc_offset_hours = Some(5.5);
        assert_eq!(
            config.moon_zone(),
            SourceZone::Fixed(FixedOffset::east_opt(5 * 3600 + 1800).unwrap())
        );
    }

    #[test]
    fn test_zero_delay_is_rejected() {
        let mut config = Config::default();
        assert_eq!(config.delay().unwrap(), std::time::Duration::from_secs(5));

        config.rotation.delay_secs = 0;
        assert!(matches!(config.delay(), Err(ConfigError::InvalidDelay)));
    }
}
