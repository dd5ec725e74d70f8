//! Game clock for the Dominion simulation.
//!
//! All deadlines in the simulation (battle resolution, interaction
//! cooldowns, relationship decay) are stored timestamps compared against the
//! [`GameClock`]. The clock never reads the wall clock on its own; it only
//! moves when the engine advances it.
//!
//! # Design Principles
//!
//! - Time only moves forward. Negative steps are rejected.
//! - Advancing uses checked arithmetic; a step past the calendar's end is an
//!   error rather than a wrap.

use chrono::{DateTime, TimeDelta, Utc};

/// Errors that can occur during clock operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClockError {
    /// The step would move the clock past the representable range.
    #[error("clock overflow: cannot advance {step} past {now}")]
    Overflow {
        /// Current game time.
        now: DateTime<Utc>,
        /// The rejected step.
        step: TimeDelta,
    },

    /// The step is negative.
    #[error("cannot move the clock backwards by {step}")]
    NegativeStep {
        /// The rejected step.
        step: TimeDelta,
    },
}

/// Monotonic game time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameClock {
    /// When the simulation started.
    started_at: DateTime<Utc>,

    /// Current game time.
    now: DateTime<Utc>,
}

impl GameClock {
    /// Create a clock starting at `start`.
    pub const fn new(start: DateTime<Utc>) -> Self {
        Self {
            started_at: start,
            now: start,
        }
    }

    /// Current game time.
    pub const fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// When the simulation started.
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Game time elapsed since start.
    pub fn elapsed(&self) -> TimeDelta {
        self.now.signed_duration_since(self.started_at)
    }

    /// Advance the clock by `step`. Returns the new time.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::NegativeStep`] for a negative step and
    /// [`ClockError::Overflow`] if the new time is not representable.
    pub fn advance(&mut self, step: TimeDelta) -> Result<DateTime<Utc>, ClockError> {
        if step < TimeDelta::zero() {
            return Err(ClockError::NegativeStep { step });
        }
        self.now = self
            .now
            .checked_add_signed(step)
            .ok_or(ClockError::Overflow {
                now: self.now,
                step,
            })?;
        Ok(self.now)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use super::*;

    #[test]
    fn advances_forward() {
        let start = DateTime::<Utc>::UNIX_EPOCH;
        let mut clock = GameClock::new(start);
        assert_eq!(clock.elapsed(), TimeDelta::zero());
        clock.advance(TimeDelta::hours(24)).unwrap();
        clock.advance(TimeDelta::zero()).unwrap();
        assert_eq!(clock.now(), start + TimeDelta::days(1));
        assert_eq!(clock.elapsed(), TimeDelta::days(1));
        assert_eq!(clock.started_at(), start);
    }

    #[test]
    fn rejects_backwards_step() {
        let mut clock = GameClock::new(DateTime::<Utc>::UNIX_EPOCH);
        let result = clock.advance(TimeDelta::seconds(-1));
        assert!(matches!(result, Err(ClockError::NegativeStep { .. })));
        assert_eq!(clock.now(), DateTime::<Utc>::UNIX_EPOCH);
    }

    #[test]
    fn rejects_overflow() {
        let mut clock = GameClock::new(DateTime::<Utc>::MAX_UTC);
        let result = clock.advance(TimeDelta::seconds(1));
        assert!(matches!(result, Err(ClockError::Overflow { .. })));
    }
}
