//! Declarative eviction conditions: "older than" / "newer than" a duration, gated by
//! population counts.

use std::fmt;
use std::hash::Hash;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::descriptors::{DateSortedDescriptors, Priority};
use crate::error::{DescriptorError, DescriptorResult};
use crate::time::sub_duration;

/// A count expressed relative to the current registry size.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Threshold {
    /// Everything currently registered (the `-1` sentinel).
    #[default]
    All,
    /// A fraction in `[0, 1)` of the current count, rounded down.
    Fraction(f64),
    /// An absolute count.
    Count(usize),
}

impl Threshold {
    pub fn resolve(&self, count: usize) -> usize {
        match *self {
            Threshold::All => count,
            Threshold::Fraction(f) => (f * count as f64).floor() as usize,
            Threshold::Count(n) => n,
        }
    }

    /// The raw `f64` form accepted by [`TryFrom<f64>`].
    pub fn as_f64(&self) -> f64 {
        match *self {
            Threshold::All => -1.0,
            Threshold::Fraction(f) => f,
            Threshold::Count(n) => n as f64,
        }
    }
}

impl TryFrom<f64> for Threshold {
    type Error = DescriptorError;

    fn try_from(v: f64) -> DescriptorResult<Self> {
        if v == -1.0 {
            Ok(Threshold::All)
        } else if !v.is_finite() || v < 0.0 {
            Err(DescriptorError::InvalidThreshold(v))
        } else if v < 1.0 {
            Ok(Threshold::Fraction(v))
        } else {
            Ok(Threshold::Count(v.floor() as usize))
        }
    }
}

impl From<usize> for Threshold {
    fn from(n: usize) -> Self { Threshold::Count(n) }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Threshold::All => write!(f, "all"),
            Threshold::Fraction(x) => write!(f, "{}%", x * 100.0),
            Threshold::Count(n) => write!(f, "{}", n),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    #[default]
    OlderThan,
    NewerThan,
}

/// An age rule selecting registry entries.
#[derive(Debug, Clone, PartialEq)]
pub struct Conditions {
    pub period: Period,
    pub duration: Duration,
    pub threshold: Threshold,
    pub min_count: usize,
}

impl Conditions {
    pub fn new(period: Period, duration: Duration) -> Self {
        Self { period, duration, threshold: Threshold::All, min_count: 1 }
    }

    pub fn older_than(duration: Duration) -> Self { Self::new(Period::OlderThan, duration) }
    pub fn newer_than(duration: Duration) -> Self { Self::new(Period::NewerThan, duration) }

    pub fn with_threshold(mut self, threshold: Threshold) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_min_count(mut self, min_count: usize) -> Self {
        self.min_count = min_count;
        self
    }

    /// Keys of the entries matching this rule, in walk order (oldest first for
    /// `OlderThan`, newest first for `NewerThan`).
    ///
    /// `min_count` and an explicit threshold gate both the registry population and the
    /// matches; when the matches fall short, nothing is returned.
    pub fn matching<K, V>(&self, registry: &DateSortedDescriptors<K, V>, by: Priority) -> Vec<K>
    where
        K: Hash + Eq + Clone,
        V: PartialEq,
    {
        let count = registry.len();
        if count < self.min_count {
            return Vec::new();
        }
        let threshold_count = self.threshold.resolve(count);
        if count < threshold_count {
            return Vec::new();
        }

        let cutoff = sub_duration(registry.now(), self.duration);
        let view = match self.period {
            Period::OlderThan => registry.ascending(by),
            Period::NewerThan => registry.descending(by),
        };
        let matches: Vec<K> = view
            .into_iter()
            .take_while(|(_, e)| match self.period {
                Period::OlderThan => e.timestamp(by) < cutoff,
                Period::NewerThan => e.timestamp(by) > cutoff,
            })
            .map(|(k, _)| k.clone())
            .collect();

        // `All` is only a population gate; an explicit threshold must also be met by the matches
        let needed = match self.threshold {
            Threshold::All => self.min_count,
            _ => self.min_count.max(threshold_count),
        };
        if matches.len() < needed {
            return Vec::new();
        }
        matches
    }
}

impl fmt::Display for Conditions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let period = match self.period {
            Period::OlderThan => "older than",
            Period::NewerThan => "newer than",
        };
        write!(
            f,
            "{} {} (threshold={}, min_count={})",
            period,
            humantime::format_duration(self.duration),
            self.threshold,
            self.min_count
        )
    }
}

#[cfg(test)]
#[path = "conditions_tests.rs"]
mod conditions_tests;
