//! # Moon Rise/Set Windows
//!
//! The `with_moon` lamp mode keeps the lamp lit while the moon is above the horizon.
//! Rise and set times come from an external per-day source ([`MoonTimesSource`]); this
//! module merges four days of events around a reference time and picks the window that
//! is either active now or comes next.
//!
//! ## Algorithm
//! 1. Query the source for the local dates of `reference - 24h`, `reference`, `+24h`
//!    and `+48h`. Each day yields at most one rise and one set; on some days the moon
//!    never rises or never sets.
//! 2. Convert the local times of day to UTC in the source's zone, resolved per date so
//!    a DST change inside the four days is honoured, then sort and drop duplicates.
//! 3. Find consecutive events `e[i] < reference <= e[i+1]`:
//!    - `e[i]` is a rise → the moon is up, window `(e[i], e[i+1])`
//!    - `e[i]` is a set → the moon is down, window is the *next* pair `(e[i+1], e[i+2])`
//!
//! Any gap in the data (source failure, no bracketing pair, no `e[i+2]`) is reported as
//! [`DataError`]; the resolver never invents a window.

use chrono::{DateTime, Duration, FixedOffset, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::Deserialize;
use thiserror::Error;

/// Errors from external data providers (moon times, weather, sports).
#[derive(Error, Debug)]
pub enum DataError {
    /// HTTP request failed (network, server, or protocol error)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response arrived but didn't contain what we need
    #[error("unusable response: {0}")]
    Malformed(String),

    /// Required credentials or location are not configured
    #[error("provider not configured: {0}")]
    NotConfigured(&'static str),

    /// Events don't cover the requested instant
    #[error("no moon rise/set window around {0}")]
    NoWindow(DateTime<Utc>),
}

/// Kind of horizon crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Rise,
    Set,
}

/// One moon rise or set in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoonEvent {
    pub kind: EventKind,
    pub at: DateTime<Utc>,
}

/// The moon's active or upcoming above-horizon window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoonWindow {
    pub rise: DateTime<Utc>,
    pub set: DateTime<Utc>,
    /// True if the moon is up at the reference time (`rise < reference <= set`).
    pub moon_up: bool,
}

/// Time zone the source's local times of day are in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceZone {
    /// A fixed UTC offset, applied to every date.
    Fixed(FixedOffset),
    /// The system zone, resolved per date so DST changes are followed.
    Local,
}

impl SourceZone {
    /// Calendar date at `at` in this zone.
    pub fn date_of(&self, at: DateTime<Utc>) -> NaiveDate {
        match self {
            SourceZone::Fixed(offset) => at.with_timezone(offset).date_naive(),
            SourceZone::Local => at.with_timezone(&Local).date_naive(),
        }
    }

    /// UTC instant of a local date and time. Times inside a DST gap move forward
    /// by the gap; repeated times resolve to the earlier instant.
    pub fn to_utc(&self, local: NaiveDateTime) -> Option<DateTime<Utc>> {
        match self {
            SourceZone::Fixed(offset) => offset.from_local_datetime(&local).single().map(|t| t.with_timezone(&Utc)),
            SourceZone::Local => Local
                .from_local_datetime(&local)
                .earliest()
                .or_else(|| Local.from_local_datetime(&(local + Duration::hours(1))).earliest())
                .map(|t| t.with_timezone(&Utc)),
        }
    }
}

/// Per-day source of moon rise/set times in the source's local time.
pub trait MoonTimesSource {
    /// Rise/set events on `date`, as local times of day. Empty if none occur.
    fn events_for_day(&mut self, date: NaiveDate) -> Result<Vec<(EventKind, NaiveTime)>, DataError>;

    /// Zone of the local times returned by [`Self::events_for_day`].
    fn zone(&self) -> SourceZone;
}

/// Resolves moon windows from a [`MoonTimesSource`].
pub struct TwilightResolver<S> {
    source: S,
}

impl<S: MoonTimesSource> TwilightResolver<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Collect the sorted, de-duplicated events for the four days around `reference`.
    pub fn events_around(&mut self, reference: DateTime<Utc>) -> Result<Vec<MoonEvent>, DataError> {
        let zone = self.source.zone();
        let mut events = Vec::with_capacity(8);

        for hours in [-24, 0, 24, 48] {
            let date = zone.date_of(reference + Duration::hours(hours));
            for (kind, time) in self.source.events_for_day(date)? {
                let at = zone
                    .to_utc(date.and_time(time))
                    .ok_or_else(|| DataError::Malformed(format!("invalid local time {date} {time}")))?;
                events.push(MoonEvent { kind, at });
            }
        }

        events.sort_by_key(|e| e.at);
        events.dedup_by_key(|e| e.at);
        Ok(events)
    }

    /// The active or next moon window relative to `reference`.
    pub fn moon_window(&mut self, reference: DateTime<Utc>) -> Result<MoonWindow, DataError> {
        let events = self.events_around(reference)?;
        select_window(&events, reference)
    }
}

/// Pick the window for `reference` from sorted events.
pub fn select_window(events: &[MoonEvent], reference: DateTime<Utc>) -> Result<MoonWindow, DataError> {
    let i = events
        .windows(2)
        .position(|pair| pair[0].at < reference && reference <= pair[1].at)
        .ok_or(DataError::NoWindow(reference))?;

    match events[i].kind {
        EventKind::Rise => Ok(MoonWindow {
            rise: events[i].at,
            set: events[i + 1].at,
            moon_up: true,
        }),
        EventKind::Set => {
            let next = events.get(i + 2).ok_or(DataError::NoWindow(reference))?;
            Ok(MoonWindow {
                rise: events[i + 1].at,
                set: next.at,
                moon_up: false,
            })
        }
    }
}

/// ipgeolocation.io astronomy API as a [`MoonTimesSource`].
pub struct IpGeolocationMoonTimes {
    client: reqwest::blocking::Client,
    api_key: String,
    lat: f64,
    lon: f64,
    zone: SourceZone,
}

#[derive(Debug, Deserialize)]
struct AstronomyResponse {
    moonrise: String,
    moonset: String,
}

const ASTRONOMY_URL: &str = "https://api.ipgeolocation.io/astronomy";

impl IpGeolocationMoonTimes {
    pub fn new(api_key: String, lat: f64, lon: f64, zone: SourceZone) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            api_key,
            lat,
            lon,
            zone,
        })
    }
}

/// Parse an API time of day: `HH:MM`, or `-:-` when the event doesn't happen that day.
pub fn parse_event_time(value: &str) -> Result<Option<NaiveTime>, DataError> {
    let value = value.trim();
    if value == "-:-" || value.is_empty() {
        return Ok(None);
    }
    NaiveTime::parse_from_str(value, "%H:%M")
        .map(Some)
        .map_err(|_| DataError::Malformed(format!("bad time of day {value:?}")))
}

impl MoonTimesSource for IpGeolocationMoonTimes {
    fn events_for_day(&mut self, date: NaiveDate) -> Result<Vec<(EventKind, NaiveTime)>, DataError> {
        let date_param = date.format("%Y-%m-%d").to_string();
        let lat = self.lat.to_string();
        let lon = self.lon.to_string();
        let response: AstronomyResponse = self
            .client
            .get(ASTRONOMY_URL)
            .query(&[
                ("apiKey", self.api_key.as_str()),
                ("date", date_param.as_str()),
                ("lat", lat.as_str()),
                ("long", lon.as_str()),
            ])
            .send()?
            .error_for_status()?
            .json()?;

        let mut events = Vec::with_capacity(2);
        if let Some(time) = parse_event_time(&response.moonrise)? {
            events.push((EventKind::Rise, time));
        }
        if let Some(time) = parse_event_time(&response.moonset)? {
            events.push((EventKind::Set, time));
        }
        log::debug!("Moon events for {date}: {events:?}");
        Ok(events)
    }

    fn zone(&self) -> SourceZone {
        self.zone
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;

    /// In-memory source keyed by date.
    pub(crate) struct TableSource {
        pub(crate) days: HashMap<NaiveDate, Vec<(EventKind, NaiveTime)>>,
        pub(crate) zone: SourceZone,
        pub(crate) fail: bool,
        pub(crate) queries: Vec<NaiveDate>,
    }

    impl TableSource {
        pub(crate) fn new(offset_hours: i32) -> Self {
            Self {
                days: HashMap::new(),
                zone: SourceZone::Fixed(FixedOffset::east_opt(offset_hours * 3600).unwrap()),
                fail: false,
                queries: Vec::new(),
            }
        }

        pub(crate) fn with(mut self, date: (i32, u32, u32), events: &[(EventKind, u32, u32)]) -> Self {
            let date = NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap();
            let events = events
                .iter()
                .map(|(k, h, m)| (*k, NaiveTime::from_hms_opt(*h, *m, 0).unwrap()))
                .collect();
            self.days.insert(date, events);
            self
        }
    }

    impl MoonTimesSource for TableSource {
        fn events_for_day(&mut self, date: NaiveDate) -> Result<Vec<(EventKind, NaiveTime)>, DataError> {
            self.queries.push(date);
            if self.fail {
                return Err(DataError::Malformed("source offline".into()));
            }
            Ok(self.days.get(&date).cloned().unwrap_or_default())
        }

        fn zone(&self) -> SourceZone {
            self.zone
        }
    }

    use EventKind::{Rise, Set};

    fn utc(d: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, d, h, m, 0).unwrap()
    }

    /// A plausible four-day stretch in UTC (offset 0).
    pub(crate) fn june_source() -> TableSource {
        TableSource::new(0)
            .with((2024, 6, 9), &[(Rise, 7, 10), (Set, 22, 40)])
            .with((2024, 6, 10), &[(Rise, 8, 5), (Set, 23, 30)])
            .with((2024, 6, 11), &[(Rise, 9, 0)])
            .with((2024, 6, 12), &[(Set, 0, 15), (Rise, 10, 0)])
            .with((2024, 6, 13), &[(Set, 0, 50), (Rise, 11, 5)])
    }

    #[test]
    fn test_moon_up_window() {
        let mut resolver = TwilightResolver::new(june_source());
        let window = resolver.moon_window(utc(10, 12, 0)).unwrap();
        assert_eq!(
            window,
            MoonWindow {
                rise: utc(10, 8, 5),
                set: utc(10, 23, 30),
                moon_up: true
            }
        );
    }

    #[test]
    fn test_moon_down_returns_next_pair() {
        let mut resolver = TwilightResolver::new(june_source());
        let window = resolver.moon_window(utc(11, 2, 0)).unwrap();
        assert_eq!(
            window,
            MoonWindow {
                rise: utc(11, 9, 0),
                set: utc(12, 0, 15),
                moon_up: false
            }
        );
    }

    #[test]
    fn test_reference_on_event_boundary() {
        // rise < reference <= set: exactly at set still counts as up
        let mut resolver = TwilightResolver::new(june_source());
        let window = resolver.moon_window(utc(10, 23, 30)).unwrap();
        assert!(window.moon_up);
        assert_eq!(window.set, utc(10, 23, 30));
    }

    #[test]
    fn test_queries_four_days() {
        let mut resolver = TwilightResolver::new(june_source());
        resolver.moon_window(utc(10, 12, 0)).unwrap();
        let queried: Vec<u32> = resolver
            .source
            .queries
            .iter()
            .map(|d| chrono::Datelike::day(d))
            .collect();
        assert_eq!(queried, vec![9, 10, 11, 12]);
    }

    #[test]
    fn test_local_offset_converted_to_utc() {
        // Source reports Chicago daylight time (UTC-5)
        let source = TableSource::new(-5)
            .with((2024, 6, 10), &[(Rise, 3, 0), (Set, 18, 0)])
            .with((2024, 6, 11), &[(Rise, 4, 0), (Set, 19, 0)]);
        let mut resolver = TwilightResolver::new(source);
        let window = resolver.moon_window(utc(10, 12, 0)).unwrap();
        assert_eq!(window.rise, utc(10, 8, 0));
        assert_eq!(window.set, utc(10, 23, 0));
        assert!(window.moon_up);
    }

    #[test]
    fn test_system_zone_follows_dst_per_date() {
        // Rise at 08:00 local in both winter and summer must stay 08:00 local,
        // whatever the system zone's offsets on those dates are.
        let mut source = TableSource::new(0)
            .with((2024, 1, 10), &[(Rise, 8, 0), (Set, 20, 0)])
            .with((2024, 6, 10), &[(Rise, 8, 0), (Set, 20, 0)]);
        source.zone = SourceZone::Local;
        let mut resolver = TwilightResolver::new(source);

        for month in [1, 6] {
            let noon = Local.with_ymd_and_hms(2024, month, 10, 12, 0, 0).unwrap().with_timezone(&Utc);
            let window = resolver.moon_window(noon).unwrap();
            let rise = window.rise.with_timezone(&Local);
            assert!(window.moon_up);
            assert_eq!(rise.date_naive(), NaiveDate::from_ymd_opt(2024, month, 10).unwrap());
            assert_eq!(rise.time(), NaiveTime::from_hms_opt(8, 0, 0).unwrap());
            assert_eq!(window.set.with_timezone(&Local).time(), NaiveTime::from_hms_opt(20, 0, 0).unwrap());
        }
    }

    #[test]
    fn test_duplicates_removed_and_sorted() {
        let source = TableSource::new(0)
            .with((2024, 6, 10), &[(Set, 20, 0), (Rise, 6, 0), (Rise, 6, 0)])
            .with((2024, 6, 11), &[(Rise, 6, 0)]);
        let mut resolver = TwilightResolver::new(source);
        let events = resolver.events_around(utc(10, 12, 0)).unwrap();
        assert_eq!(events.len(), 3);
        assert!(events.windows(2).all(|w| w[0].at < w[1].at));
    }

    #[test]
    fn test_no_bracketing_pair_is_an_error() {
        let source = TableSource::new(0).with((2024, 6, 10), &[(Rise, 6, 0)]);
        let mut resolver = TwilightResolver::new(source);
        let err = resolver.moon_window(utc(10, 12, 0)).unwrap_err();
        assert!(matches!(err, DataError::NoWindow(_)));
    }

    #[test]
    fn test_missing_next_pair_is_an_error() {
        let events = [
            MoonEvent { kind: Rise, at: utc(10, 6, 0) },
            MoonEvent { kind: Set, at: utc(10, 10, 0) },
            MoonEvent { kind: Rise, at: utc(10, 18, 0) },
        ];
        let err = select_window(&events, utc(10, 12, 0)).unwrap_err();
        assert!(matches!(err, DataError::NoWindow(_)));
    }

    #[test]
    fn test_source_failure_propagates() {
        let mut source = june_source();
        source.fail = true;
        let mut resolver = TwilightResolver::new(source);
        assert!(matches!(
            resolver.moon_window(utc(10, 12, 0)),
            Err(DataError::Malformed(_))
        ));
    }

    #[test]
    fn test_parse_event_time() {
        assert_eq!(parse_event_time("-:-").unwrap(), None);
        assert_eq!(
            parse_event_time("07:42").unwrap(),
            NaiveTime::from_hms_opt(7, 42, 0)
        );
        assert!(parse_event_time("7h42").is_err());
    }
}
