//! Logical time for the rules engine
//!
//! All scheduling runs on a millisecond timeline that starts at power-on.
//! The clock only moves when the host calls `tick(now)` or reports a switch
//! event with a later timestamp.

use serde::{Deserialize, Serialize};

/// Milliseconds since power-on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub const ZERO: Self = Self(0);

    #[inline]
    pub fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    #[inline]
    pub fn from_secs_f64(seconds: f64) -> Self {
        Self(secs_to_millis(seconds))
    }

    #[inline]
    pub fn millis(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / 1000.0
    }

    /// Milliseconds elapsed since `earlier` (zero if `earlier` is later)
    #[inline]
    pub fn since(self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    /// Timestamp `seconds` after this one
    #[inline]
    pub fn after_secs(self, seconds: f64) -> Self {
        self + secs_to_millis(seconds)
    }
}

impl std::ops::Add<u64> for Timestamp {
    type Output = Self;

    fn add(self, rhs: u64) -> Self::Output {
        Self(self.0.saturating_add(rhs))
    }
}

impl std::ops::Sub for Timestamp {
    type Output = u64;

    fn sub(self, rhs: Self) -> Self::Output {
        self.0.saturating_sub(rhs.0)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:03}s", self.0 / 1000, self.0 % 1000)
    }
}

/// Convert seconds to whole milliseconds, clamping negatives to zero
#[inline]
pub fn secs_to_millis(seconds: f64) -> u64 {
    if seconds.is_finite() && seconds > 0.0 {
        (seconds * 1000.0).round() as u64
    } else {
        0
    }
}

/// Monotonic frame clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Clock {
    now: Timestamp,
    frame: u64,
    tick_period_ms: u64,
}

impl Clock {
    pub fn new(tick_period_ms: u64) -> Self {
        Self {
            now: Timestamp::ZERO,
            frame: 0,
            tick_period_ms: tick_period_ms.max(1),
        }
    }

    #[inline]
    pub fn now(&self) -> Timestamp {
        self.now
    }

    /// Number of completed ticks
    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    #[inline]
    pub fn tick_period_ms(&self) -> u64 {
        self.tick_period_ms
    }

    /// Move the clock forward to `ts` without counting a frame.
    /// Earlier timestamps are ignored.
    pub fn observe(&mut self, ts: Timestamp) {
        if ts > self.now {
            self.now = ts;
        }
    }

    /// Start a new frame at `ts`. Returns false if `ts` lies in the past;
    /// the frame still counts but time does not go backwards.
    pub fn advance_to(&mut self, ts: Timestamp) -> bool {
        self.frame += 1;
        if ts < self.now {
            return false;
        }
        self.now = ts;
        true
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new(crate::DEFAULT_TICK_PERIOD_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secs_to_millis() {
        assert_eq!(secs_to_millis(0.8), 800);
        assert_eq!(secs_to_millis(0.125), 125);
        assert_eq!(secs_to_millis(-1.0), 0);
        assert_eq!(secs_to_millis(f64::NAN), 0);
    }

    #[test]
    fn test_timestamp_arithmetic() {
        let t = Timestamp::from_millis(1500);
        assert_eq!(t.after_secs(2.0), Timestamp(3500));
        assert_eq!(t.since(Timestamp(2000)), 0);
        assert_eq!(Timestamp(2000) - t, 500);
        assert_eq!(t.to_string(), "1.500s");
    }

    #[test]
    fn test_clock_is_monotonic() {
        let mut clock = Clock::new(16);
        assert!(clock.advance_to(Timestamp(16)));
        assert!(!clock.advance_to(Timestamp(10)));
        assert_eq!(clock.now(), Timestamp(16));
        assert_eq!(clock.frame(), 2);

        clock.observe(Timestamp(20));
        assert_eq!(clock.now(), Timestamp(20));
        assert_eq!(clock.frame(), 2);
    }
}
