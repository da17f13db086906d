//! Autoclose: close descriptors matched by a [`Conditions`] rule, bounded by a min/max
//! window. Best-effort; a resource that refuses to close stays registered and the pass
//! moves on.

use std::fmt::Debug;
use std::hash::Hash;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::conditions::{Conditions, Threshold};
use crate::descriptors::{DateSortedDescriptors, Priority};
use crate::error::{DescriptorError, DescriptorResult};
use crate::openable::Openable;

/// Outcome of a single autoclose pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AutocloseReport<K> {
    /// Entries the condition selected.
    pub candidates: usize,
    /// Close calls made.
    pub attempted: usize,
    pub closed: usize,
    pub failed: usize,
    /// Keys removed from the registry, in close order.
    pub closed_keys: Vec<K>,
}

impl<K> AutocloseReport<K> {
    pub(crate) fn new(candidates: usize) -> Self {
        Self { candidates, attempted: 0, closed: 0, failed: 0, closed_keys: Vec::new() }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AutoclosePolicy {
    pub condition: Conditions,
    pub priority: Priority,
    /// Target number to close; `None` leaves the max bound alone.
    pub percentage: Option<Threshold>,
    pub min: Threshold,
    pub max: Threshold,
}

impl AutoclosePolicy {
    pub fn new(condition: Conditions) -> Self {
        Self { condition, priority: Priority::Added, percentage: None, min: Threshold::Count(0), max: Threshold::All }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_percentage(mut self, percentage: Threshold) -> Self {
        self.percentage = Some(percentage);
        self
    }

    /// Set the close window. Bounds of the same kind are compared right away; mixed
    /// kinds can only be compared against a registry size and are checked by [`run`].
    ///
    /// [`run`]: AutoclosePolicy::run
    pub fn with_bounds(mut self, min: Threshold, max: Threshold) -> DescriptorResult<Self> {
        match (min, max) {
            (Threshold::Count(_), Threshold::Count(_)) | (Threshold::Fraction(_), Threshold::Fraction(_))
                if min.as_f64() > max.as_f64() =>
            {
                return Err(DescriptorError::InvalidBounds { min: min.as_f64(), max: max.as_f64() });
            }
            _ => {}
        }
        self.min = min;
        self.max = max;
        Ok(self)
    }

    /// Resolve `(min, max)` against `count`; inverted bounds are an error, never clamped.
    pub fn bounds(&self, count: usize) -> DescriptorResult<(usize, usize)> {
        let min = self.min.resolve(count);
        let max = self.max.resolve(count);
        if min > max {
            return Err(DescriptorError::InvalidBounds { min: min as f64, max: max as f64 });
        }
        Ok((min, max))
    }

    /// Run one pass over `registry`.
    ///
    /// Entries are removed only after their `close()` succeeds. Close failures are logged
    /// and counted in the report; they never abort the pass.
    pub fn run<K, V>(&self, registry: &mut DateSortedDescriptors<K, V>) -> DescriptorResult<AutocloseReport<K>>
    where
        K: Hash + Eq + Clone + Debug,
        V: PartialEq + Openable,
    {
        let count = registry.len();
        let (min, max) = match self.bounds(count) {
            Ok(b) => b,
            Err(e) => {
                error!(target: "pathfd::autoclose", count, "refusing to autoclose: {}", e);
                return Err(e);
            }
        };
        let target = self.percentage.map(|p| p.resolve(count)).unwrap_or(0);
        let effective_max = max.max(target);

        let candidates = self.condition.matching(registry, self.priority);
        debug!(
            target: "pathfd::autoclose",
            count,
            candidates = candidates.len(),
            min,
            max = effective_max,
            "autoclose pass: {}",
            self.condition
        );

        let mut report = AutocloseReport::new(candidates.len());
        for key in candidates {
            if report.closed >= min && report.closed >= effective_max {
                break;
            }
            let Some(value) = registry.peek_mut(&key) else { continue };
            report.attempted += 1;
            match value.close() {
                Ok(()) => {
                    registry.remove(&key);
                    report.closed += 1;
                    report.closed_keys.push(key);
                }
                Err(e) => {
                    warn!(target: "pathfd::autoclose", key = ?key, code = e.code(), "close failed, descriptor stays open: {}", e);
                    report.failed += 1;
                }
            }
        }

        if report.closed > 0 {
            info!(
                target: "pathfd::autoclose",
                closed = report.closed,
                failed = report.failed,
                remaining = registry.len(),
                "autoclosed descriptors"
            );
        } else {
            debug!(target: "pathfd::autoclose", failed = report.failed, "autoclose pass closed nothing");
        }
        Ok(report)
    }
}

#[cfg(test)]
#[path = "autoclose_tests.rs"]
mod autoclose_tests;
