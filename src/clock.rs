//! Wall-clock time.
//!
//! `ronin.createdAt`/`ronin.updatedAt` stamping is an injected capability
//! (§9), exactly like [`crate::idgen::RandomSource`] is for id generation, so
//! a compile can be made fully deterministic for tests by supplying a
//! [`FixedClock`] instead of [`SystemClock`].

use chrono::{DateTime, Utc};

/// A source of the current instant, injected into anything that stamps a
/// record with `ronin.createdAt`/`ronin.updatedAt`.
pub trait ClockSource {
    fn now(&mut self) -> DateTime<Utc>;
}

/// The default source, backed by the system clock.
#[derive(Debug, Default)]
pub struct SystemClock;

impl ClockSource for SystemClock {
    fn now(&mut self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A deterministic source for tests: always returns the same instant.
pub struct FixedClock(pub DateTime<Utc>);

impl ClockSource for FixedClock {
    fn now(&mut self) -> DateTime<Utc> {
        self.0
    }
}

/// Render an instant the way `ronin.createdAt`/`ronin.updatedAt` are stored:
/// millisecond-precision ISO 8601 with a literal `Z`.
pub fn format_timestamp(instant: DateTime<Utc>) -> String {
    instant.format("%Y-%m-%dT%H:%M:%.3fZ").to_string()
}
