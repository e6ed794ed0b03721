//! # Staleness Cache for Provider Results
//!
//! HTTP providers (weather, sports) are called from inside a render burst, often several
//! times per rotation. [`Cached`] keeps the last good value together with the wall-clock
//! time it was fetched and only calls the provider again once that value is older than
//! the TTL.
//!
//! The cache is keyed purely on staleness: there is a single slot per provider, and the
//! request that filled it is irrelevant. Failed refreshes leave the previous value in the
//! slot but still surface the error, so callers can show their fallback visual.

use chrono::{DateTime, Duration, Utc};

/// Weather results are refreshed at most every 15 minutes.
pub const WEATHER_TTL_MINUTES: i64 = 15;

/// Sports schedules are refreshed at most every 6 hours.
pub const SPORTS_TTL_HOURS: i64 = 6;

/// A single cached value with a time-to-live.
#[derive(Debug, Clone)]
pub struct Cached<T> {
    ttl: Duration,
    slot: Option<(DateTime<Utc>, T)>,
}

impl<T> Cached<T> {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, slot: None }
    }

    /// True when there is no value or the value is older than the TTL at `now`.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        match &self.slot {
            Some((fetched_at, _)) => now - *fetched_at > self.ttl,
            None => true,
        }
    }

    /// Return the cached value, calling `fetch` first if it is stale.
    pub fn get_or_refresh<E, F>(&mut self, now: DateTime<Utc>, fetch: F) -> Result<&T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let entry = match self.slot.take() {
            Some(entry) if now - entry.0 <= self.ttl => entry,
            previous => match fetch() {
                Ok(value) => (now, value),
                Err(e) => {
                    self.slot = previous;
                    return Err(e);
                }
            },
        };
        Ok(&self.slot.insert(entry).1)
    }

    /// Drop the cached value so the next access refetches.
    pub fn invalidate(&mut self) {
        self.slot = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::cell::Cell;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_fetches_once_within_ttl() {
        let calls = Cell::new(0);
        let mut cache = Cached::new(Duration::minutes(WEATHER_TTL_MINUTES));
        let fetch = || {
            calls.set(calls.get() + 1);
            Ok::<_, ()>(calls.get())
        };

        assert_eq!(*cache.get_or_refresh(t0(), fetch).unwrap(), 1);
        assert_eq!(*cache.get_or_refresh(t0() + Duration::minutes(10), fetch).unwrap(), 1);
        assert_eq!(*cache.get_or_refresh(t0() + Duration::minutes(15), fetch).unwrap(), 1);
        assert_eq!(*cache.get_or_refresh(t0() + Duration::minutes(16), fetch).unwrap(), 2);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_failed_refresh_surfaces_error_and_keeps_old_value() {
        let mut cache = Cached::new(Duration::hours(SPORTS_TTL_HOURS));
        cache.get_or_refresh(t0(), || Ok::<_, &str>(7)).unwrap();

        let later = t0() + Duration::hours(7);
        assert_eq!(cache.get_or_refresh(later, || Err("offline")), Err("offline"));
        assert!(cache.is_stale(later));

        // A successful retry replaces the stale value
        assert_eq!(*cache.get_or_refresh(later, || Ok::<_, &str>(8)).unwrap(), 8);
        assert!(!cache.is_stale(later));
    }

    #[test]
    fn test_invalidate_forces_refetch() {
        let mut cache = Cached::new(Duration::minutes(WEATHER_TTL_MINUTES));
        cache.get_or_refresh(t0(), || Ok::<_, ()>("a")).unwrap();
        cache.invalidate();
        assert!(cache.is_stale(t0()));
        assert_eq!(*cache.get_or_refresh(t0(), || Ok::<_, ()>("b")).unwrap(), "b");
    }
}
