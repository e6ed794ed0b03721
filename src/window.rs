//! # On/Off Windows
//!
//! A [`Window`] is the lamp's next lit interval: `[on_at, off_at)` plus whether the lamp
//! should be lit right now. Each [`Mode`] has a rule for the initial window and a rule
//! for what comes after the window expires:
//!
//! | mode        | initial window                                  | after expiry            |
//! |-------------|-------------------------------------------------|-------------------------|
//! | `on`        | `now .. now + 1000 days`                        | never expires           |
//! | `off`       | empty; the lamp is switched off                 | n/a                     |
//! | `timer`     | `now .. now + length`                           | off for good            |
//! | `day_only`  | today's or tomorrow's `[on_hour, off_hour)`     | the next day's hours    |
//! | `with_moon` | the active or next moon rise/set window         | ask the resolver again  |
//!
//! Wall-clock hours are interpreted in the system's local time zone.

use crate::config::ConfigError;
use crate::twilight::{DataError, MoonTimesSource, MoonWindow, TwilightResolver};
use chrono::{DateTime, Duration, Local, NaiveDate, TimeZone, Timelike, Utc};
use std::fmt;

/// How long "on" mode stays lit.
pub const ALWAYS_ON_DAYS: i64 = 1000;

/// Lamp gating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    On,
    Off,
    Timer(Duration),
    DayOnly { on_hour: u32, off_hour: u32 },
    WithMoon,
}

impl Mode {
    /// Build a mode from its name and the parameters the named mode needs.
    ///
    /// Parameters irrelevant to the mode are ignored, but the ones it uses are
    /// validated so a bad configuration never reaches the rotation loop.
    pub fn parse(name: &str, timer_length: Duration, on_hour: u32, off_hour: u32) -> Result<Self, ConfigError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "on" => Ok(Mode::On),
            "off" => Ok(Mode::Off),
            "timer" => {
                if timer_length <= Duration::zero() {
                    return Err(ConfigError::InvalidTimer(timer_length.num_minutes()));
                }
                Ok(Mode::Timer(timer_length))
            }
            "day_only" => {
                if on_hour > 23 || off_hour > 23 || on_hour >= off_hour {
                    return Err(ConfigError::InvalidHours { on_hour, off_hour });
                }
                Ok(Mode::DayOnly { on_hour, off_hour })
            }
            "with_moon" => Ok(Mode::WithMoon),
            other => Err(ConfigError::InvalidMode(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Mode::On => "on",
            Mode::Off => "off",
            Mode::Timer(_) => "timer",
            Mode::DayOnly { .. } => "day_only",
            Mode::WithMoon => "with_moon",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Timer(length) => write!(f, "timer ({} min)", length.num_minutes()),
            Mode::DayOnly { on_hour, off_hour } => write!(f, "day_only ({on_hour:02}:00-{off_hour:02}:00)"),
            other => f.write_str(other.name()),
        }
    }
}

/// The lamp's next lit interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub on_at: DateTime<Local>,
    pub off_at: DateTime<Local>,
    pub currently_on: bool,
}

impl Window {
    pub fn always_on(now: DateTime<Local>) -> Self {
        Self {
            on_at: now,
            off_at: now + Duration::days(ALWAYS_ON_DAYS),
            currently_on: true,
        }
    }

    pub fn timer(now: DateTime<Local>, length: Duration) -> Self {
        Self {
            on_at: now,
            off_at: now + length,
            currently_on: true,
        }
    }

    /// Today's hours if they haven't ended yet, otherwise tomorrow's.
    pub fn day_only(now: DateTime<Local>, on_hour: u32, off_hour: u32) -> Self {
        let today = now.date_naive();
        let hour = now.hour();

        if hour >= off_hour {
            let tomorrow = today.succ_opt().unwrap_or(today);
            Self {
                on_at: local_at_hour(tomorrow, on_hour),
                off_at: local_at_hour(tomorrow, off_hour),
                currently_on: false,
            }
        } else {
            Self {
                on_at: local_at_hour(today, on_hour),
                off_at: local_at_hour(today, off_hour),
                currently_on: hour >= on_hour,
            }
        }
    }

    pub fn from_moon(moon: MoonWindow) -> Self {
        Self {
            on_at: moon.rise.with_timezone(&Local),
            off_at: moon.set.with_timezone(&Local),
            currently_on: moon.moon_up,
        }
    }

    /// Empty window opening at `at`; used to hold the lamp off until a retry.
    pub fn closed_until(at: DateTime<Local>) -> Self {
        Self {
            on_at: at,
            off_at: at,
            currently_on: false,
        }
    }

    /// True if `now` is inside `[on_at, off_at)`.
    pub fn contains(&self, now: DateTime<Local>) -> bool {
        self.on_at <= now && now < self.off_at
    }

    /// True once `off_at` has passed.
    pub fn is_expired(&self, now: DateTime<Local>) -> bool {
        now >= self.off_at
    }
}

/// Local instant of `hour:00` on `date`.
///
/// Hours that don't exist locally (DST gaps) move forward to the first valid
/// half hour; repeated hours resolve to the earlier instant.
pub fn local_at_hour(date: NaiveDate, hour: u32) -> DateTime<Local> {
    let naive = date
        .and_hms_opt(hour.min(23), 0, 0)
        .unwrap_or_else(|| date.and_time(chrono::NaiveTime::MIN));
    (0..=4)
        .find_map(|step| Local.from_local_datetime(&(naive + Duration::minutes(30 * step))).earliest())
        .unwrap_or_else(|| Local.from_utc_datetime(&naive))
}

/// Anything that can answer "when is the moon up next".
pub trait MoonWindows {
    fn moon_window(&mut self, reference: DateTime<Utc>) -> Result<MoonWindow, DataError>;
}

impl<S: MoonTimesSource> MoonWindows for TwilightResolver<S> {
    fn moon_window(&mut self, reference: DateTime<Utc>) -> Result<MoonWindow, DataError> {
        TwilightResolver::moon_window(self, reference)
    }
}

/// Initial window for `mode` at `now`.
pub fn initial_window(mode: &Mode, now: DateTime<Local>, moon: Option<&mut dyn MoonWindows>) -> Result<Window, DataError> {
    match mode {
        Mode::On => Ok(Window::always_on(now)),
        Mode::Off => Ok(Window::closed_until(now)),
        Mode::Timer(length) => Ok(Window::timer(now, *length)),
        Mode::DayOnly { on_hour, off_hour } => Ok(Window::day_only(now, *on_hour, *off_hour)),
        Mode::WithMoon => {
            let moon = moon.ok_or(DataError::NotConfigured("moon rise/set source"))?;
            moon.moon_window(now.with_timezone(&Utc)).map(Window::from_moon)
        }
    }
}

/// Window following `expired` for `mode`, or `None` if the mode is finished.
pub fn next_window(
    mode: &Mode,
    expired: &Window,
    now: DateTime<Local>,
    moon: Option<&mut dyn MoonWindows>,
) -> Result<Option<Window>, DataError> {
    match mode {
        Mode::Off | Mode::Timer(_) => Ok(None),
        Mode::On => Ok(Some(Window::always_on(now))),
        Mode::DayOnly { on_hour, off_hour } => Ok(Some(Window::day_only(now, *on_hour, *off_hour))),
        Mode::WithMoon => {
            let moon = moon.ok_or(DataError::NotConfigured("moon rise/set source"))?;
            // Step past the boundary so a set time equal to `now` isn't picked again
            let reference = now.max(expired.off_at) + Duration::seconds(1);
            moon.moon_window(reference.with_timezone(&Utc))
                .map(|w| Some(Window::from_moon(w)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::twilight::tests::june_source;

    fn local(d: u32, h: u32, m: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 6, d, h, m, 0).unwrap()
    }

    #[test]
    fn test_parse_modes() {
        let hour = Duration::hours(1);
        assert_eq!(Mode::parse("on", hour, 8, 21).unwrap(), Mode::On);
        assert_eq!(Mode::parse("OFF", hour, 8, 21).unwrap(), Mode::Off);
        assert_eq!(Mode::parse("timer", hour, 8, 21).unwrap(), Mode::Timer(hour));
        assert_eq!(
            Mode::parse("day_only", hour, 8, 21).unwrap(),
            Mode::DayOnly { on_hour: 8, off_hour: 21 }
        );
        assert_eq!(Mode::parse("with_moon", hour, 8, 21).unwrap(), Mode::WithMoon);
    }

    #[test]
    fn test_parse_rejects_bad_configuration() {
        let hour = Duration::hours(1);
        assert!(matches!(Mode::parse("sometimes", hour, 8, 21), Err(ConfigError::InvalidMode(_))));
        assert!(matches!(
            Mode::parse("day_only", hour, 21, 8),
            Err(ConfigError::InvalidHours { on_hour: 21, off_hour: 8 })
        ));
        assert!(matches!(Mode::parse("day_only", hour, 8, 24), Err(ConfigError::InvalidHours { .. })));
        assert!(matches!(Mode::parse("timer", Duration::zero(), 8, 21), Err(ConfigError::InvalidTimer(0))));
        // Timer length only matters for timer mode
        assert!(Mode::parse("on", Duration::zero(), 8, 21).is_ok());
    }

    #[test]
    fn test_day_only_inside_hours() {
        let w = Window::day_only(local(1, 14, 0), 8, 20);
        assert!(w.currently_on);
        assert_eq!(w.on_at, local(1, 8, 0));
        assert_eq!(w.off_at, local(1, 20, 0));
        assert!(w.contains(local(1, 14, 0)));
    }

    #[test]
    fn test_day_only_before_hours() {
        let w = Window::day_only(local(1, 6, 30), 8, 20);
        assert!(!w.currently_on);
        assert_eq!(w.on_at, local(1, 8, 0));
        assert_eq!(w.off_at, local(1, 20, 0));
    }

    #[test]
    fn test_day_only_after_hours() {
        let w = Window::day_only(local(1, 21, 30), 8, 20);
        assert!(!w.currently_on);
        assert_eq!(w.on_at, local(2, 8, 0));
        assert_eq!(w.off_at, local(2, 20, 0));
    }

    #[test]
    fn test_day_only_at_off_hour_moves_to_tomorrow() {
        let w = Window::day_only(local(1, 20, 0), 8, 20);
        assert!(!w.currently_on);
        assert_eq!(w.on_at, local(2, 8, 0));
    }

    #[test]
    fn test_day_only_at_on_hour_is_on() {
        let w = Window::day_only(local(1, 8, 0), 8, 20);
        assert!(w.currently_on);
        assert!(w.contains(local(1, 8, 0)));
    }

    #[test]
    fn test_timer_and_always_on() {
        let now = local(1, 12, 0);
        let timer = Window::timer(now, Duration::minutes(1));
        assert!(timer.contains(now));
        assert!(timer.is_expired(now + Duration::minutes(1)));

        let on = Window::always_on(now);
        assert!(on.contains(now + Duration::days(999)));
    }

    #[test]
    fn test_next_window_rules() {
        let now = local(1, 20, 0);
        let expired = Window::day_only(local(1, 12, 0), 8, 20);
        let next = next_window(&Mode::DayOnly { on_hour: 8, off_hour: 20 }, &expired, now, None)
            .unwrap()
            .unwrap();
        assert_eq!(next.on_at, local(2, 8, 0));

        let timer = Window::timer(local(1, 12, 0), Duration::hours(1));
        assert_eq!(next_window(&Mode::Timer(Duration::hours(1)), &timer, now, None).unwrap(), None);
    }

    #[test]
    fn test_with_moon_requires_source() {
        let err = initial_window(&Mode::WithMoon, local(10, 12, 0), None).unwrap_err();
        assert!(matches!(err, DataError::NotConfigured(_)));
    }

    #[test]
    fn test_with_moon_window() {
        let mut resolver = TwilightResolver::new(june_source());
        let now = Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap().with_timezone(&Local);
        let w = initial_window(&Mode::WithMoon, now, Some(&mut resolver)).unwrap();
        assert!(w.currently_on);
        assert!(w.contains(now));
        assert_eq!(w.off_at, Utc.with_ymd_and_hms(2024, 6, 10, 23, 30, 0).unwrap());

        // At the set time, the next window is the following rise
        let next = next_window(&Mode::WithMoon, &w, w.off_at, Some(&mut resolver))
            .unwrap()
            .unwrap();
        assert!(!next.currently_on);
        assert_eq!(next.on_at, Utc.with_ymd_and_hms(2024, 6, 11, 9, 0, 0).unwrap());
    }

    #[test]
    fn test_local_at_hour_is_on_the_hour() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let t = local_at_hour(date, 8);
        assert_eq!(t.date_naive(), date);
        assert_eq!((t.hour(), t.minute()), (8, 0));
    }
}
