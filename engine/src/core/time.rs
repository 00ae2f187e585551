//! Simulated time for the event engine
//!
//! Time is a discrete tick count. It advances only when the engine dispatches
//! an event scheduled later than the current clock, never from wall-clock
//! observation. Fractional business time is modeled by choosing a finer tick
//! (minutes, seconds) when building the scenario.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A point in simulated time, measured in ticks
///
/// # Example
/// ```
/// use finsim_core_rs::SimTime;
///
/// let t = SimTime::new(10);
/// assert_eq!(t.ticks(), 10);
/// assert_eq!(t.after(5), Some(SimTime::new(15)));
/// assert!(SimTime::ZERO < t);
/// ```
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SimTime(u64);

impl SimTime {
    /// The zero point of simulated time.
    pub const ZERO: SimTime = SimTime(0);

    #[inline]
    pub const fn new(ticks: u64) -> Self {
        SimTime(ticks)
    }

    /// Raw tick value
    #[inline]
    pub const fn ticks(self) -> u64 {
        self.0
    }

    /// The time `delay` ticks after `self`, or `None` on overflow
    #[inline]
    pub fn after(self, delay: u64) -> Option<SimTime> {
        self.0.checked_add(delay).map(SimTime)
    }

    /// Ticks elapsed between `earlier` and `self`, or `None` if `earlier` is later
    #[inline]
    pub fn since(self, earlier: SimTime) -> Option<u64> {
        self.0.checked_sub(earlier.0)
    }
}

impl From<u64> for SimTime {
    fn from(ticks: u64) -> Self {
        SimTime(ticks)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t={}", self.0)
    }
}

/// Monotonic simulation clock
///
/// Owned by the engine. Starts at the trial epoch and only moves forward to
/// the scheduled time of the event being dispatched.
///
/// An optional calendar maps ticks onto business days, which is how
/// day-based processes (accruals, end-of-day settlement) find their place in
/// the run.
///
/// # Example
/// ```
/// use finsim_core_rs::{Clock, SimTime};
///
/// let clock = Clock::with_calendar(SimTime::ZERO, 100);
/// assert_eq!(clock.now(), SimTime::ZERO);
/// assert_eq!(clock.current_day(), Some(0));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clock {
    /// Time at which the trial started
    epoch: SimTime,
    /// Current simulated time
    now: SimTime,
    /// Number of ticks in one business day, if a calendar is attached
    ticks_per_day: Option<u64>,
}

impl Clock {
    /// Create a clock starting at `epoch` with no calendar
    pub fn new(epoch: SimTime) -> Self {
        Self {
            epoch,
            now: epoch,
            ticks_per_day: None,
        }
    }

    /// Create a clock with a business-day calendar
    ///
    /// # Panics
    /// Panics if `ticks_per_day` is zero. `EngineConfig::validate` rejects
    /// that value before an engine ever builds its clock.
    pub fn with_calendar(epoch: SimTime, ticks_per_day: u64) -> Self {
        assert!(ticks_per_day > 0, "ticks_per_day must be positive");
        Self {
            epoch,
            now: epoch,
            ticks_per_day: Some(ticks_per_day),
        }
    }

    #[inline]
    pub fn now(&self) -> SimTime {
        self.now
    }

    #[inline]
    pub fn epoch(&self) -> SimTime {
        self.epoch
    }

    /// Ticks elapsed since the epoch
    pub fn elapsed(&self) -> u64 {
        self.now.ticks() - self.epoch.ticks()
    }

    pub fn ticks_per_day(&self) -> Option<u64> {
        self.ticks_per_day
    }

    /// Move the clock to `time`
    ///
    /// Only the engine calls this, with the time of the event it just popped.
    /// The queue never yields an event earlier than the clock, so the clock
    /// cannot run backwards.
    pub(crate) fn advance_to(&mut self, time: SimTime) {
        debug_assert!(
            time >= self.now,
            "clock moved backwards: now={}, requested={}",
            self.now,
            time
        );
        if time > self.now {
            self.now = time;
        }
    }

    /// Business day (0-indexed from the epoch), if a calendar is attached
    pub fn current_day(&self) -> Option<u64> {
        self.ticks_per_day.map(|tpd| self.elapsed() / tpd)
    }

    /// Tick within the current business day
    pub fn tick_within_day(&self) -> Option<u64> {
        self.ticks_per_day.map(|tpd| self.elapsed() % tpd)
    }

    /// Whether the clock sits on the last tick of a business day
    pub fn is_end_of_day(&self) -> bool {
        match (self.ticks_per_day, self.tick_within_day()) {
            (Some(tpd), Some(tick)) => tick == tpd - 1,
            _ => false,
        }
    }

    /// First tick of the business day after the current one
    pub fn start_of_next_day(&self) -> Option<SimTime> {
        let tpd = self.ticks_per_day?;
        let day = self.current_day()?;
        (day + 1)
            .checked_mul(tpd)
            .and_then(|offset| self.epoch.after(offset))
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new(SimTime::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "ticks_per_day must be positive")]
    fn test_zero_ticks_per_day_panics() {
        Clock::with_calendar(SimTime::ZERO, 0);
    }

    #[test]
    fn test_advance_to_same_time_is_noop() {
        let mut clock = Clock::new(SimTime::new(4));
        clock.advance_to(SimTime::new(4));
        assert_eq!(clock.now(), SimTime::new(4));
        assert_eq!(clock.elapsed(), 0);
    }

    #[test]
    fn test_start_of_next_day_with_offset_epoch() {
        let mut clock = Clock::with_calendar(SimTime::new(1_000), 24);
        clock.advance_to(SimTime::new(1_030));
        assert_eq!(clock.current_day(), Some(1));
        assert_eq!(clock.start_of_next_day(), Some(SimTime::new(1_048)));
    }

    #[test]
    fn test_no_calendar() {
        let clock = Clock::default();
        assert_eq!(clock.current_day(), None);
        assert!(!clock.is_end_of_day());
        assert_eq!(clock.start_of_next_day(), None);
    }
}
