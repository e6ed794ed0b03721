//! Wall-clock source with an interruptible sleep.
//!
//! The rotation loop only ever blocks in [`Clock::sleep`], either for the per-screen
//! delay or until the next on/off window opens (which can be many hours). The real
//! [`SystemClock`] waits on a [`Shutdown`] handle instead of `thread::sleep`, so a
//! SIGINT/SIGTERM wakes it immediately and the lamp can be switched off cleanly.
//! [`SimulatedClock`] jumps time forward instead of waiting and records every sleep.

use chrono::{DateTime, Local};
use std::cell::{Cell, RefCell};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Source of "now" and of blocking waits for the control loop.
pub trait Clock {
    /// Current local wall-clock time.
    fn now(&self) -> DateTime<Local>;

    /// Block for `duration`. Returns `false` if the wait was cut short by a
    /// shutdown request, in which case the caller should stop.
    fn sleep(&self, duration: Duration) -> bool;

    /// Block until `deadline`, returning immediately if it has already passed.
    fn sleep_until(&self, deadline: DateTime<Local>) -> bool {
        let remaining = (deadline - self.now()).to_std().unwrap_or(Duration::ZERO);
        log::info!("Sleeping until {}", deadline.format("%Y-%m-%d %H:%M:%S"));
        self.sleep(remaining)
    }
}

/// Cloneable shutdown flag that wakes any sleeper when triggered.
#[derive(Clone, Default)]
pub struct Shutdown {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown and wake every waiting thread.
    pub fn trigger(&self) {
        let (flag, condvar) = &*self.inner;
        *flag.lock().unwrap_or_else(PoisonError::into_inner) = true;
        condvar.notify_all();
    }

    pub fn is_triggered(&self) -> bool {
        *self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait up to `timeout`. Returns `true` if the full timeout elapsed,
    /// `false` if shutdown was requested first.
    pub fn wait(&self, timeout: Duration) -> bool {
        let (flag, condvar) = &*self.inner;
        let deadline = Instant::now() + timeout;
        let mut triggered = flag.lock().unwrap_or_else(PoisonError::into_inner);
        while !*triggered {
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            triggered = condvar
                .wait_timeout(triggered, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        false
    }
}

/// Trigger `shutdown` when the process receives SIGINT or SIGTERM.
#[cfg(unix)]
pub fn install_signal_handler(shutdown: Shutdown) -> std::io::Result<()> {
    use signal_hook::consts::signal::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    std::thread::spawn(move || {
        for signal in signals.forever() {
            log::info!("Received signal {signal}, shutting down");
            shutdown.trigger();
        }
    });
    Ok(())
}

#[cfg(not(unix))]
pub fn install_signal_handler(_shutdown: Shutdown) -> std::io::Result<()> {
    log::warn!("Signal handling is only available on Unix; Ctrl+C will not turn the lamp off");
    Ok(())
}

/// Real time, with sleeps that a [`Shutdown`] can interrupt.
pub struct SystemClock {
    shutdown: Shutdown,
}

impl SystemClock {
    pub fn new(shutdown: Shutdown) -> Self {
        Self { shutdown }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }

    fn sleep(&self, duration: Duration) -> bool {
        self.shutdown.wait(duration)
    }
}

/// Fast-forward clock for tests and dry runs.
///
/// Every sleep advances the simulated time instantly and is recorded. Once the
/// optional end time is reached, sleeps report an interruption so loops that would
/// otherwise run forever terminate.
pub struct SimulatedClock {
    current: Cell<DateTime<Local>>,
    end: Option<DateTime<Local>>,
    sleeps: RefCell<Vec<Duration>>,
}

impl SimulatedClock {
    pub fn new(start: DateTime<Local>) -> Self {
        Self {
            current: Cell::new(start),
            end: None,
            sleeps: RefCell::new(Vec::new()),
        }
    }

    /// Stop the simulation (sleeps return `false`) at `end`.
    pub fn until(mut self, end: DateTime<Local>) -> Self {
        self.end = Some(end);
        self
    }

    /// Move time forward without recording a sleep, e.g. to model slow renders.
    pub fn advance(&self, by: chrono::Duration) {
        self.current.set(self.current.get() + by);
    }

    /// Every sleep requested so far, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.borrow().clone()
    }

    /// Sum of all requested sleeps.
    pub fn total_slept(&self) -> Duration {
        self.sleeps.borrow().iter().sum()
    }
}

impl Clock for SimulatedClock {
    fn now(&self) -> DateTime<Local> {
        self.current.get()
    }

    fn sleep(&self, duration: Duration) -> bool {
        self.sleeps.borrow_mut().push(duration);
        let step = chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX);
        let target = self.current.get().checked_add_signed(step);
        match (target, self.end) {
            (Some(target), Some(end)) if target >= end => {
                self.current.set(end);
                false
            }
            (Some(target), _) => {
                self.current.set(target);
                true
            }
            (None, Some(end)) => {
                self.current.set(end);
                false
            }
            (None, None) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn start() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_shutdown_interrupts_wait() {
        let shutdown = Shutdown::new();
        let waiter = shutdown.clone();
        let handle = std::thread::spawn(move || waiter.wait(Duration::from_secs(30)));

        std::thread::sleep(Duration::from_millis(20));
        shutdown.trigger();

        assert!(!handle.join().unwrap(), "wait should report interruption");
        assert!(shutdown.is_triggered());
    }

    #[test]
    fn test_wait_times_out_without_trigger() {
        let shutdown = Shutdown::new();
        assert!(shutdown.wait(Duration::from_millis(5)));
        assert!(!shutdown.is_triggered());
    }

    #[test]
    fn test_system_clock_sleep_after_shutdown_returns_immediately() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        let clock = SystemClock::new(shutdown);
        let started = Instant::now();
        assert!(!clock.sleep(Duration::from_secs(60)));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_simulated_clock_advances_and_records() {
        let clock = SimulatedClock::new(start());
        assert!(clock.sleep(Duration::from_secs(5)));
        assert!(clock.sleep(Duration::from_secs(10)));
        assert_eq!(clock.now(), start() + chrono::Duration::seconds(15));
        assert_eq!(clock.total_slept(), Duration::from_secs(15));
        assert_eq!(clock.sleeps().len(), 2);
    }

    #[test]
    fn test_simulated_clock_stops_at_end() {
        let end = start() + chrono::Duration::minutes(1);
        let clock = SimulatedClock::new(start()).until(end);
        assert!(clock.sleep(Duration::from_secs(30)));
        assert!(!clock.sleep(Duration::from_secs(60)));
        assert_eq!(clock.now(), end);
    }

    #[test]
    fn test_sleep_until_past_deadline_is_zero() {
        let clock = SimulatedClock::new(start());
        assert!(clock.sleep_until(start() - chrono::Duration::hours(1)));
        assert_eq!(clock.sleeps(), vec![Duration::ZERO]);
    }
}
