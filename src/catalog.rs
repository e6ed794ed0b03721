//! # Screen Catalog
//!
//! Maps the screen ids accepted on the command line and in the config file to
//! concrete visuals. Providers are created once and shared: all weather screens read
//! the same cached report.

use crate::config::{Config, ConfigError};
use crate::flag::FlagScreen;
use crate::moon::MoonScreen;
use crate::screen::Screen;
use crate::sports::{GameTodayScreen, MlbSchedule};
use crate::twilight::{IpGeolocationMoonTimes, TwilightResolver};
use crate::weather::{OpenWeatherSource, SharedWeather, Weather, WeatherMetric, WeatherScreen};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenId {
    FeelsLike,
    Sunniness,
    CurrentMoon,
    DailyPrecip,
    GameToday,
    UkraineFlag,
}

impl ScreenId {
    pub const ALL: [ScreenId; 6] = [
        ScreenId::FeelsLike,
        ScreenId::Sunniness,
        ScreenId::CurrentMoon,
        ScreenId::DailyPrecip,
        ScreenId::GameToday,
        ScreenId::UkraineFlag,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScreenId::FeelsLike => "feels_like_screen",
            ScreenId::Sunniness => "sunniness_screen",
            ScreenId::CurrentMoon => "current_moon_screen",
            ScreenId::DailyPrecip => "daily_precip_screen",
            ScreenId::GameToday => "game_today",
            ScreenId::UkraineFlag => "ukraine_flag",
        }
    }

    fn uses_weather(&self) -> bool {
        matches!(self, ScreenId::FeelsLike | ScreenId::Sunniness | ScreenId::DailyPrecip)
    }
}

impl FromStr for ScreenId {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ScreenId::ALL
            .into_iter()
            .find(|id| id.as_str() == s.trim())
            .ok_or_else(|| ConfigError::UnknownScreen(s.to_string()))
    }
}

impl fmt::Display for ScreenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse every id first so a typo fails before any provider is set up.
pub fn parse_ids(names: &[String]) -> Result<Vec<ScreenId>, ConfigError> {
    names.iter().map(|name| name.parse()).collect()
}

/// Build the rotation's screens, in order.
pub fn build_screens(ids: &[ScreenId], config: &Config) -> Result<Vec<Screen>, ConfigError> {
    let weather = if ids.iter().any(ScreenId::uses_weather) {
        Some(weather(config)?)
    } else {
        None
    };

    ids.iter()
        .map(|id| -> Result<Screen, ConfigError> {
            let name = id.as_str();
            let screen = match id {
                ScreenId::FeelsLike => Screen::new(name, weather_screen(&weather, WeatherMetric::FeelsLike)?),
                ScreenId::Sunniness => Screen::new(name, weather_screen(&weather, WeatherMetric::CloudCover)?),
                ScreenId::DailyPrecip => {
                    Screen::new(name, weather_screen(&weather, WeatherMetric::Precipitation)?)
                }
                ScreenId::CurrentMoon => Screen::new(name, MoonScreen::new(config.phase_mode()?)),
                ScreenId::GameToday => {
                    let (primary, secondary) = config.team_colors()?;
                    let schedule = MlbSchedule::new(config.sports.team_id)?;
                    Screen::new(name, GameTodayScreen::new(Box::new(schedule), primary, secondary))
                }
                ScreenId::UkraineFlag => Screen::new(name, FlagScreen::new(config.flag_colors()?)),
            };
            Ok(screen)
        })
        .collect()
}

fn weather(config: &Config) -> Result<SharedWeather, ConfigError> {
    let api_key = config
        .weather
        .api_key
        .clone()
        .ok_or(ConfigError::MissingParameter("weather.api_key (or OPEN_WEATHER_KEY)"))?;
    let source = OpenWeatherSource::new(api_key, config.location.lat, config.location.lon)?;
    Ok(Weather::shared(Box::new(source)))
}

fn weather_screen(weather: &Option<SharedWeather>, metric: WeatherMetric) -> Result<WeatherScreen, ConfigError> {
    let weather = weather
        .clone()
        .ok_or(ConfigError::MissingParameter("weather.api_key (or OPEN_WEATHER_KEY)"))?;
    Ok(WeatherScreen::new(weather, metric))
}

/// Moon rise/set resolver for `with_moon` mode.
pub fn moon_resolver(config: &Config) -> Result<TwilightResolver<IpGeolocationMoonTimes>, ConfigError> {
    let api_key = config
        .moon
        .api_key
        .clone()
        .ok_or(ConfigError::MissingParameter("moon.api_key (or MOON_API_KEY)"))?;
    let source = IpGeolocationMoonTimes::new(
        api_key,
        config.location.lat,
        config.location.lon,
        config.moon_zone(),
    )?;
    Ok(TwilightResolver::new(source))
}
