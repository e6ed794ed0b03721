//! # Weather Screens
//!
//! Three visuals share one cached weather report:
//!
//! - **Cloud cover**: the sunnier it is, the more yellow pixels. The last pixel is
//!   partially lit for the remainder, and at least a faint glow is shown when fully
//!   overcast so the screen never looks switched off.
//! - **Feels like**: temperature bands, each with its own color, five degrees per
//!   pixel. Outside every band's range the strip shows an alternating warning.
//! - **Precipitation**: chance of precipitation in the next hour as a bar; declines
//!   to render when no precipitation is expected.
//!
//! ## Data Source
//! OpenWeatherMap One Call API (imperial units). Reports are cached for
//! [`WEATHER_TTL_MINUTES`] since a single rotation renders several weather screens.

use crate::cache::{Cached, WEATHER_TTL_MINUTES};
use crate::lamp::{dim, Lamp, BLACK};
use crate::screen::{RenderError, Visual};
use crate::twilight::DataError;
use crate::RGB8;
use chrono::{DateTime, Duration, Local, Utc};
use serde::Deserialize;
use std::cell::RefCell;
use std::rc::Rc;

const SUN_YELLOW: RGB8 = RGB8 { r: 255, g: 255, b: 0 };
const RAIN_BLUE: RGB8 = RGB8 { r: 0, g: 0, b: 255 };
const SNOW_WHITE: RGB8 = RGB8 { r: 255, g: 255, b: 255 };

/// Dimmest partial pixel on the cloud cover screen.
const MIN_GLOW: f64 = 0.1;

/// Degrees (°F) per lit pixel on the feels-like screen.
const DEGREES_PER_PIXEL: f64 = 5.0;

/// What the weather says right now.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherReport {
    /// Cloud cover, percent.
    pub clouds: f64,
    /// Apparent temperature, °F.
    pub feels_like: f64,
    /// Probability of precipitation in the next hour, 0–1.
    pub precip_chance: f64,
    /// Kind of precipitation expected, if any volume is forecast.
    pub precip_kind: Option<PrecipKind>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrecipKind {
    Rain,
    Snow,
}

/// Provider of current weather.
pub trait WeatherSource {
    fn fetch(&mut self) -> Result<WeatherReport, DataError>;
}

/// Weather source with a staleness cache in front of it.
pub struct Weather {
    source: Box<dyn WeatherSource>,
    cache: Cached<WeatherReport>,
}

/// Handle shared by all weather screens.
pub type SharedWeather = Rc<RefCell<Weather>>;

impl Weather {
    pub fn new(source: Box<dyn WeatherSource>) -> Self {
        Self {
            source,
            cache: Cached::new(Duration::minutes(WEATHER_TTL_MINUTES)),
        }
    }

    pub fn shared(source: Box<dyn WeatherSource>) -> SharedWeather {
        Rc::new(RefCell::new(Self::new(source)))
    }

    /// Current report, fetched at most once per TTL.
    pub fn report(&mut self, now: DateTime<Utc>) -> Result<WeatherReport, DataError> {
        let source = &mut self.source;
        self.cache.get_or_refresh(now, || source.fetch()).cloned()
    }
}

/// Which weather metric a screen shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeatherMetric {
    CloudCover,
    FeelsLike,
    Precipitation,
}

/// A weather visual bound to one metric.
pub struct WeatherScreen {
    weather: SharedWeather,
    metric: WeatherMetric,
}

impl WeatherScreen {
    pub fn new(weather: SharedWeather, metric: WeatherMetric) -> Self {
        Self { weather, metric }
    }
}

impl Visual for WeatherScreen {
    fn render(&mut self, lamp: &mut Lamp, now: DateTime<Local>) -> Result<bool, RenderError> {
        let report = self.weather.borrow_mut().report(now.with_timezone(&Utc))?;
        let n = lamp.num_leds();
        let colors = match self.metric {
            WeatherMetric::CloudCover => cloud_cover_colors(report.clouds, n),
            WeatherMetric::FeelsLike => feels_like_colors(report.feels_like, n),
            WeatherMetric::Precipitation => {
                match precipitation_colors(report.precip_chance, report.precip_kind, n) {
                    Some(colors) => colors,
                    None => return Ok(false),
                }
            }
        };
        lamp.set_leds(&colors)?;
        Ok(true)
    }
}

/// Yellow bar proportional to how clear the sky is.
pub fn cloud_cover_colors(clouds: f64, num_leds: usize) -> Vec<RGB8> {
    let clouds = clouds.clamp(0.0, 100.0);
    let sunniness = (100.0 - clouds) / (100.0 / num_leds as f64);

    let full = (sunniness.floor() as usize).min(num_leds);
    let mut partial = sunniness - full as f64;
    if full == 0 && partial < MIN_GLOW {
        partial = MIN_GLOW;
    }

    let mut colors = vec![SUN_YELLOW; full];
    if partial > 0.0 && full < num_leds {
        colors.push(dim(SUN_YELLOW, partial as f32));
    }
    colors.resize(num_leds, BLACK);
    colors
}

/// Temperature band containing `feels_like`: color and `[low, high)` range in °F.
fn feels_like_band(feels_like: f64) -> (RGB8, f64, f64) {
    if feels_like < 20.0 {
        (RGB8::new(0, 191, 255), -10.0, 20.0)
    } else if feels_like < 50.0 {
        (RGB8::new(0, 0, 255), 20.0, 50.0)
    } else if feels_like < 80.0 {
        (RGB8::new(0, 255, 0), 50.0, 80.0)
    } else if feels_like < 110.0 {
        (RGB8::new(255, 165, 0), 80.0, 110.0)
    } else {
        (RGB8::new(255, 0, 0), 110.0, 130.0)
    }
}

/// One lit pixel per five degrees into the temperature's band.
pub fn feels_like_colors(feels_like: f64, num_leds: usize) -> Vec<RGB8> {
    let (color, low, high) = feels_like_band(feels_like);

    if (low..high).contains(&feels_like) {
        let lit = (((feels_like - low) / DEGREES_PER_PIXEL).floor() as usize + 1).min(num_leds);
        let mut colors = vec![color; lit];
        colors.resize(num_leds, BLACK);
        colors
    } else {
        // Off the scale
        [color, BLACK, color].iter().copied().cycle().take(num_leds).collect()
    }
}

/// Bar for the chance of precipitation, or `None` when none is expected.
pub fn precipitation_colors(chance: f64, kind: Option<PrecipKind>, num_leds: usize) -> Option<Vec<RGB8>> {
    let chance = chance.clamp(0.0, 1.0);
    if chance <= 0.0 {
        return None;
    }
    let color = match kind {
        Some(PrecipKind::Snow) => SNOW_WHITE,
        _ => RAIN_BLUE,
    };
    let lit = ((chance * num_leds as f64).ceil() as usize).min(num_leds);
    let mut colors = vec![color; lit];
    colors.resize(num_leds, BLACK);
    Some(colors)
}

/// OpenWeatherMap One Call API.
pub struct OpenWeatherSource {
    client: reqwest::blocking::Client,
    api_key: String,
    lat: f64,
    lon: f64,
}

const ONE_CALL_URL: &str = "https://api.openweathermap.org/data/2.5/onecall";

#[derive(Debug, Deserialize)]
struct OneCallResponse {
    current: CurrentConditions,
    #[serde(default)]
    hourly: Vec<HourlyForecast>,
}

#[derive(Debug, Deserialize)]
struct CurrentConditions {
    clouds: f64,
    feels_like: f64,
}

#[derive(Debug, Deserialize)]
struct HourlyForecast {
    #[serde(default)]
    pop: f64,
    rain: Option<Volume>,
    snow: Option<Volume>,
}

#[derive(Debug, Deserialize)]
struct Volume {
    #[serde(rename = "1h", default)]
    one_hour: f64,
}

impl OpenWeatherSource {
    pub fn new(api_key: String, lat: f64, lon: f64) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            api_key,
            lat,
            lon,
        })
    }
}

impl From<OneCallResponse> for WeatherReport {
    fn from(response: OneCallResponse) -> Self {
        let next_hour = response.hourly.first();
        let precip_kind = next_hour.and_then(|h| {
            if h.snow.as_ref().is_some_and(|v| v.one_hour > 0.0) {
                Some(PrecipKind::Snow)
            } else if h.rain.as_ref().is_some_and(|v| v.one_hour > 0.0) {
                Some(PrecipKind::Rain)
            } else {
                None
            }
        });
        WeatherReport {
            clouds: response.current.clouds,
            feels_like: response.current.feels_like,
            precip_chance: next_hour.map(|h| h.pop).unwrap_or(0.0),
            precip_kind,
        }
    }
}

impl WeatherSource for OpenWeatherSource {
    fn fetch(&mut self) -> Result<WeatherReport, DataError> {
        let lat = self.lat.to_string();
        let lon = self.lon.to_string();
        let response: OneCallResponse = self
            .client
            .get(ONE_CALL_URL)
            .query(&[
                ("lat", lat.as_str()),
                ("lon", lon.as_str()),
                ("appid", self.api_key.as_str()),
                ("units", "imperial"),
                ("exclude", "minutely,daily,alerts"),
            ])
            .send()?
            .error_for_status()?
            .json()?;
        log::debug!(
            "Weather: {}% clouds, feels like {}°F",
            response.current.clouds,
            response.current.feels_like
        );
        Ok(response.into())
    }
}
