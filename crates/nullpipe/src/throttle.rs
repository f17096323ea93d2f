//! Wall-clock write pacing.
//!
//! The limiter compares what has been released against `ceiling × elapsed`.
//! Whenever the difference would yield less than one minimum chunk, it sleeps
//! for a fixed quantum and releases exactly one minimum chunk. With
//! [`WRITES_PER_SEC`] quanta per second, output stays within one quantum's
//! worth of bytes of the configured ceiling.

use std::cell::Cell;
use std::time::{Duration, Instant};

use tracing::trace;

/// Scheduling frequency of the limiter.
pub const WRITES_PER_SEC: u32 = 10;

/// Sleep issued when the limiter is ahead of pace.
pub const QUANTUM: Duration = Duration::from_millis(1000 / WRITES_PER_SEC as u64);

/// Time source for [`RateLimiter`].
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

/// The real monotonic clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Deterministic clock that only moves when told to, or when slept on.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Cell<Duration>,
}

impl ManualClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Cell::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.offset.set(self.offset.get() + by);
    }

    /// Time elapsed since the clock was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.offset.get()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.offset.get()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration);
    }
}

/// Paces releases to a ceiling in bytes per second.
#[derive(Debug)]
pub struct RateLimiter<C = SystemClock> {
    clock: C,
    start: Instant,
    ceiling: u64,
    min_chunk: u64,
    released: u64,
}

impl RateLimiter<SystemClock> {
    #[must_use]
    pub fn new(ceiling: u64) -> Self {
        Self::with_clock(ceiling, SystemClock)
    }
}

impl<C: Clock> RateLimiter<C> {
    /// Start pacing now, as measured by `clock`.
    pub fn with_clock(ceiling: u64, clock: C) -> Self {
        let start = clock.now();
        Self {
            clock,
            start,
            ceiling,
            min_chunk: (ceiling / u64::from(WRITES_PER_SEC)).max(1),
            released: 0,
        }
    }

    #[must_use]
    pub fn ceiling(&self) -> u64 {
        self.ceiling
    }

    /// Bytes recorded as released so far.
    #[must_use]
    pub fn released(&self) -> u64 {
        self.released
    }

    /// Bytes that may be released by `elapsed` after the start.
    #[must_use]
    pub fn projected(&self, elapsed: Duration) -> u64 {
        let bytes = u128::from(self.ceiling) * elapsed.as_nanos() / 1_000_000_000;
        u64::try_from(bytes).unwrap_or(u64::MAX)
    }

    /// How many of `available` buffered bytes may be released now.
    ///
    /// May sleep for one [`QUANTUM`]. Call [`record`](Self::record) with the
    /// number of bytes actually released afterwards.
    pub fn admit(&mut self, available: usize) -> usize {
        if self.ceiling == 0 || available == 0 {
            return available;
        }

        let mut elapsed = self.clock.now().saturating_duration_since(self.start);
        if elapsed.is_zero() {
            elapsed = QUANTUM;
        }

        let mut permit = self.projected(elapsed).saturating_sub(self.released);
        if permit < self.min_chunk {
            self.clock.sleep(QUANTUM);
            permit = self.min_chunk;
        }

        let permit = usize::try_from(permit).unwrap_or(usize::MAX).min(available);
        trace!(permit, available, released = self.released, "throttle");
        permit
    }

    pub fn record(&mut self, released: usize) {
        self.released += released as u64;
    }

    /// Sleep one [`QUANTUM`] after a permit that released nothing, so the
    /// projection can grow past the bytes the caller had to withhold.
    pub fn stall(&mut self) {
        trace!(released = self.released, "permit released nothing");
        self.clock.sleep(QUANTUM);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_ceiling_is_unlimited() {
        let clock = ManualClock::new();
        let mut limiter = RateLimiter::with_clock(0, &clock);
        assert_eq!(limiter.admit(12345), 12345);
        assert_eq!(clock.elapsed(), Duration::ZERO);
    }

    #[test]
    fn first_decision_uses_one_quantum() {
        let clock = ManualClock::new();
        let mut limiter = RateLimiter::with_clock(1000, &clock);
        assert_eq!(limiter.admit(10_000), 100);
        assert_eq!(clock.elapsed(), Duration::ZERO);
    }

    #[test]
    fn ahead_of_pace_sleeps_then_releases_min_chunk() {
        let clock = ManualClock::new();
        let mut limiter = RateLimiter::with_clock(1000, &clock);
        let n = limiter.admit(10_000);
        limiter.record(n);
        assert_eq!(limiter.admit(10_000), 100);
        assert_eq!(clock.elapsed(), QUANTUM);
    }

    #[test]
    fn behind_pace_catches_up_without_sleeping() {
        let clock = ManualClock::new();
        let mut limiter = RateLimiter::with_clock(1000, &clock);
        clock.advance(Duration::from_secs(2));
        assert_eq!(limiter.admit(10_000), 2000);
        assert_eq!(clock.elapsed(), Duration::from_secs(2));
    }

    #[test]
    fn clamped_to_available() {
        let clock = ManualClock::new();
        let mut limiter = RateLimiter::with_clock(1000, &clock);
        clock.advance(Duration::from_secs(5));
        assert_eq!(limiter.admit(7), 7);
    }

    #[test]
    fn nothing_available_never_sleeps() {
        let clock = ManualClock::new();
        let mut limiter = RateLimiter::with_clock(1000, &clock);
        limiter.record(1_000_000);
        assert_eq!(limiter.admit(0), 0);
        assert_eq!(clock.elapsed(), Duration::ZERO);
    }

    #[test]
    fn tiny_ceiling_still_makes_progress() {
        let clock = ManualClock::new();
        let mut limiter = RateLimiter::with_clock(3, &clock);
        let n = limiter.admit(10);
        assert_eq!(n, 1);
    }

    #[test]
    fn stall_lets_the_projection_grow() {
        let clock = ManualClock::new();
        let mut limiter = RateLimiter::with_clock(50, &clock);
        assert_eq!(limiter.admit(9), 5);
        limiter.record(0);
        limiter.stall();
        limiter.stall();
        assert_eq!(clock.elapsed(), 2 * QUANTUM);
        assert_eq!(limiter.admit(9), 9);
    }

    #[test]
    fn pacing_stays_within_one_quantum() {
        const CEILING: u64 = 10_000;
        let work = Duration::from_millis(1);
        let clock = ManualClock::new();
        let mut limiter = RateLimiter::with_clock(CEILING, &clock);
        let slack = CEILING / u64::from(WRITES_PER_SEC) + CEILING / 1000;

        while clock.elapsed() < Duration::from_secs(8) {
            let n = limiter.admit(usize::MAX);
            limiter.record(n);
            clock.advance(work);

            let target = limiter.projected(clock.elapsed());
            let released = limiter.released();
            assert!(
                released.abs_diff(target) <= slack,
                "released {released} vs target {target} at {:?}",
                clock.elapsed()
            );
        }
    }
}
