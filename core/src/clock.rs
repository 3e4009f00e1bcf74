//! Inject wall-clock reads the same way spec.md §5 requires every
//! suspension point to accept a cancellation handle — so ingest-path tests
//! (spec.md §4.8 `generation_tag`) can supply deterministic values.

use chrono::{DateTime, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Wall-clock nanosecond integer used as an alert batch's
    /// `generation_tag` (spec.md §4.8).
    fn generation_tag(&self) -> i64 { self.now().timestamp_nanos_opt().unwrap_or(i64::MIN) }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> { Utc::now() }
}

#[cfg(test)]
pub struct FixedClock(pub DateTime<Utc>);

#[cfg(test)]
impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> { self.0 }
}
