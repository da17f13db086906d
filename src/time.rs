//! Time sources and duration helpers.
//! Every registry reads "now" through a [`Clock`] so tests can drive time by hand.

use std::fmt::Debug;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;

use crate::error::{DescriptorError, DescriptorResult};

pub type Timestamp = DateTime<Utc>;

pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> Timestamp;
}

/// Wall clock backed by `Utc::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp { Utc::now() }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Timestamp>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self { Self { now: Mutex::new(start) } }

    /// Starts at the Unix epoch, which keeps test offsets readable.
    pub fn at_epoch() -> Self { Self::new(DateTime::<Utc>::UNIX_EPOCH) }

    pub fn advance(&self, by: Duration) {
        let mut g = self.now.lock();
        *g = add_duration(*g, by);
    }

    pub fn set(&self, to: Timestamp) { *self.now.lock() = to; }

    /// Jump to `secs` seconds after the Unix epoch.
    pub fn set_secs(&self, secs: i64) {
        self.set(DateTime::<Utc>::UNIX_EPOCH + TimeDelta::seconds(secs));
    }
}

impl Default for ManualClock {
    fn default() -> Self { Self::at_epoch() }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp { *self.now.lock() }
}

#[inline]
fn to_delta(d: Duration) -> TimeDelta {
    TimeDelta::from_std(d).unwrap_or(TimeDelta::MAX)
}

/// `ts - d`, saturating at the earliest representable instant.
pub fn sub_duration(ts: Timestamp, d: Duration) -> Timestamp {
    ts.checked_sub_signed(to_delta(d)).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// `ts + d`, saturating at the latest representable instant.
pub fn add_duration(ts: Timestamp, d: Duration) -> Timestamp {
    ts.checked_add_signed(to_delta(d)).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Parse a human duration such as `500ms`, `15s`, `5m`, `2h`, `1day` or `1m 30s`.
/// A bare number is taken as seconds.
pub fn parse_duration(s: &str) -> DescriptorResult<Duration> {
    let t = s.trim();
    if !t.is_empty() && t.bytes().all(|b| b.is_ascii_digit()) {
        return t.parse().map(Duration::from_secs).map_err(|_| DescriptorError::InvalidDuration(s.to_string()));
    }
    humantime::parse_duration(t).map_err(|e| DescriptorError::InvalidDuration(format!("{}: {}", s, e)))
}

/// Serde adapter storing a `Duration` as a human string such as `"15m"`.
pub mod serde_duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&humantime::format_duration(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[path = "time_tests.rs"]
mod time_tests;
