//! Autoclose settings.
//! Layered the usual way: built-in defaults, then an optional JSON file, then `PATHFD_*`
//! environment overrides. Counts use the raw `f64` form (`-1` = all, `[0,1)` = fraction,
//! `>= 1` = absolute) so the file stays flat.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::autoclose::AutoclosePolicy;
use crate::conditions::{Conditions, Period, Threshold};
use crate::descriptors::Priority;
use crate::error::{DescriptorError, DescriptorResult};
use crate::time::parse_duration;

pub const ENV_CONFIG: &str = "PATHFD_CONFIG";
pub const ENV_ENABLED: &str = "PATHFD_AUTOCLOSE";
pub const ENV_ON_INSERT: &str = "PATHFD_AUTOCLOSE_ON_INSERT";
pub const ENV_AGE: &str = "PATHFD_AUTOCLOSE_AGE";
pub const ENV_PERIOD: &str = "PATHFD_AUTOCLOSE_PERIOD";
pub const ENV_MAX: &str = "PATHFD_AUTOCLOSE_MAX";
pub const ENV_PRIORITY: &str = "PATHFD_AUTOCLOSE_PRIORITY";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AutocloseConfig {
    pub enabled: bool,
    /// Run a pass every time a descriptor is registered.
    pub on_insert: bool,
    pub period: Period,
    /// e.g. "15m", "30s", "500ms"
    #[serde(with = "crate::time::serde_duration")]
    pub age: Duration,
    /// Condition activation threshold.
    pub threshold: f64,
    pub min_count: usize,
    /// Target close count; -1 leaves it unset.
    pub percentage: f64,
    pub min: f64,
    pub max: f64,
    pub priority: Priority,
}

impl Default for AutocloseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            on_insert: true,
            period: Period::OlderThan,
            age: Duration::from_secs(15 * 60),
            threshold: -1.0,
            min_count: 1,
            percentage: -1.0,
            min: 0.0,
            max: -1.0,
            priority: Priority::Used,
        }
    }
}

impl AutocloseConfig {
    /// Read `path` if it exists; a missing file yields the defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> DescriptorResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(target: "pathfd::config", path = %path.display(), "no autoclose config file, using defaults");
            return Ok(Self::default());
        }
        let bytes = std::fs::read(path)?;
        serde_json::from_slice(&bytes).map_err(|source| DescriptorError::Config { path: path.to_path_buf(), source })
    }

    pub fn save(&self, path: impl AsRef<Path>) -> DescriptorResult<()> {
        let bytes = serde_json::to_vec_pretty(self)
            .map_err(|source| DescriptorError::Config { path: path.as_ref().to_path_buf(), source })?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Defaults, then the file named by `PATHFD_CONFIG`, then env overrides.
    pub fn from_env() -> DescriptorResult<Self> {
        let base = match std::env::var_os(ENV_CONFIG) {
            Some(p) => Self::load_or_default(PathBuf::from(p))?,
            None => Self::default(),
        };
        base.apply_env()
    }

    pub fn apply_env(self) -> DescriptorResult<Self> {
        self.apply_vars(|name| std::env::var(name).ok())
    }

    /// Apply overrides from any variable source.
    pub fn apply_vars(mut self, var: impl Fn(&str) -> Option<String>) -> DescriptorResult<Self> {
        if let Some(v) = var(ENV_ENABLED) { self.enabled = parse_bool(ENV_ENABLED, &v)?; }
        if let Some(v) = var(ENV_ON_INSERT) { self.on_insert = parse_bool(ENV_ON_INSERT, &v)?; }
        if let Some(v) = var(ENV_AGE) { self.age = parse_duration(&v)?; }
        if let Some(v) = var(ENV_PERIOD) {
            self.period = match v.trim().to_ascii_lowercase().as_str() {
                "older_than" | "older" => Period::OlderThan,
                "newer_than" | "newer" => Period::NewerThan,
                _ => return Err(invalid(ENV_PERIOD, &v)),
            };
        }
        if let Some(v) = var(ENV_MAX) {
            self.max = v.trim().parse().map_err(|_| invalid(ENV_MAX, &v))?;
        }
        if let Some(v) = var(ENV_PRIORITY) {
            self.priority = match v.trim().to_ascii_lowercase().as_str() {
                "added" => Priority::Added,
                "used" => Priority::Used,
                _ => return Err(invalid(ENV_PRIORITY, &v)),
            };
        }
        Ok(self)
    }

    /// Build the policy; `None` when autoclose is disabled.
    pub fn to_policy(&self) -> DescriptorResult<Option<AutoclosePolicy>> {
        if !self.enabled {
            return Ok(None);
        }
        let condition = Conditions::new(self.period, self.age)
            .with_threshold(Threshold::try_from(self.threshold)?)
            .with_min_count(self.min_count);
        let mut policy = AutoclosePolicy::new(condition)
            .with_priority(self.priority)
            .with_bounds(Threshold::try_from(self.min)?, Threshold::try_from(self.max)?)?;
        if self.percentage != -1.0 {
            policy = policy.with_percentage(Threshold::try_from(self.percentage)?);
        }
        Ok(Some(policy))
    }
}

fn invalid(name: &str, value: &str) -> DescriptorError {
    DescriptorError::InvalidSetting { name: name.to_string(), value: value.to_string() }
}

fn parse_bool(name: &str, v: &str) -> DescriptorResult<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(name, v)),
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
