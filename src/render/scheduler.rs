//! Frame scheduling
//!
//! The render loop runs once per display refresh. [`Scheduler`] abstracts the
//! "wait for the next refresh" callback so the loop can be driven by a real
//! interval in the binary and step by step in tests.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic time source
pub trait Clock: Send + Sync {
    /// Time elapsed since the clock started
    fn now(&self) -> Duration;
}

/// Wall clock backed by [`Instant`]
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Manually advanced clock, microsecond resolution
#[derive(Debug, Default)]
pub struct ManualClock {
    micros: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.micros
            .fetch_add(by.as_micros() as u64, Ordering::SeqCst);
    }

    pub fn set(&self, to: Duration) {
        self.micros.store(to.as_micros() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_micros(self.micros.load(Ordering::SeqCst))
    }
}

/// Source of render ticks
pub trait Scheduler {
    /// Block until the next tick. Returns false when the loop should stop.
    fn next_tick(&mut self) -> bool;
}

/// Fixed-rate scheduler standing in for the display refresh callback.
///
/// Missed deadlines are dropped rather than replayed, so a slow tick never
/// causes a burst of catch-up ticks.
pub struct IntervalScheduler {
    period: Duration,
    next_deadline: Option<Instant>,
    shutdown: Arc<AtomicBool>,
}

impl IntervalScheduler {
    pub fn new(refresh_hz: u32, shutdown: Arc<AtomicBool>) -> Self {
        let period = Duration::from_micros(1_000_000 / u64::from(refresh_hz.max(1)));
        Self {
            period,
            next_deadline: None,
            shutdown,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

impl Scheduler for IntervalScheduler {
    fn next_tick(&mut self) -> bool {
        if self.shutdown.load(Ordering::SeqCst) {
            return false;
        }

        let now = Instant::now();
        let deadline = match self.next_deadline {
            Some(d) => d,
            None => now,
        };
        if deadline > now {
            std::thread::sleep(deadline - now);
        }

        let mut next = deadline + self.period;
        let after = Instant::now();
        if next <= after {
            // Fell behind; skip the missed ticks
            next = after + self.period;
        }
        self.next_deadline = Some(next);

        !self.shutdown.load(Ordering::SeqCst)
    }
}

/// Runs exactly `n` ticks without waiting
#[derive(Debug, Clone, Copy)]
pub struct StepScheduler {
    remaining: usize,
}

impl StepScheduler {
    pub fn new(ticks: usize) -> Self {
        Self { remaining: ticks }
    }
}

impl Scheduler for StepScheduler {
    fn next_tick(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new();
        assert_eq!(clock.now(), Duration::ZERO);
        clock.advance(Duration::from_millis(16));
        clock.advance(Duration::from_millis(17));
        assert_eq!(clock.now(), Duration::from_millis(33));
        clock.set(Duration::from_millis(5));
        assert_eq!(clock.now(), Duration::from_millis(5));
    }

    #[test]
    fn test_step_scheduler() {
        let mut s = StepScheduler::new(2);
        assert!(s.next_tick());
        assert!(s.next_tick());
        assert!(!s.next_tick());
    }

    #[test]
    fn test_interval_period() {
        let s = IntervalScheduler::new(50, Arc::new(AtomicBool::new(false)));
        assert_eq!(s.period(), Duration::from_millis(20));
    }

    #[test]
    fn test_interval_stops_on_shutdown() {
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut s = IntervalScheduler::new(1000, Arc::clone(&shutdown));
        assert!(s.next_tick());
        assert!(s.next_tick());
        shutdown.store(true, Ordering::SeqCst);
        assert!(!s.next_tick());
    }
}
