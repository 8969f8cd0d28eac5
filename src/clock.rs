//! Time source for expiry and issuance.
//!
//! Validation compares `expiresAt` against "now"; routing every read of the
//! current time through [`Clock`] keeps the day-boundary logic testable.

use chrono::{DateTime, SubsecRound, Utc};

/// Source of the current UTC time.
pub trait Clock: Send + Sync {
    /// Get the current UTC time.
    fn now_utc(&self) -> DateTime<Utc>;

    /// Current time truncated to the millisecond precision used on the wire.
    fn now_millis(&self) -> DateTime<Utc> {
        self.now_utc().trunc_subsecs(3)
    }
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to a chosen instant.
#[cfg(any(test, feature = "test-seams"))]
#[derive(Debug, Clone)]
pub struct FixedClock {
    now: DateTime<Utc>,
}

#[cfg(any(test, feature = "test-seams"))]
impl FixedClock {
    /// Create a clock frozen at the given time.
    pub fn at(now: DateTime<Utc>) -> Self {
        Self { now }
    }

    /// Create a clock from an RFC 3339 string.
    pub fn parse(s: &str) -> Result<Self, chrono::ParseError> {
        Ok(Self {
            now: DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc),
        })
    }

    /// Return a clock moved forward (or back, for negative values) by `by`.
    pub fn shifted(&self, by: chrono::Duration) -> Self {
        Self { now: self.now + by }
    }
}

#[cfg(any(test, feature = "test-seams"))]
impl Clock for FixedClock {
    fn now_utc(&self) -> DateTime<Utc> {
        self.now
    }
}
