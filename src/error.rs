//! Error model for the descriptor cache.
//! `DescriptorError` covers configuration and open failures surfaced to callers;
//! `CloseError` is what a resource reports when it cannot be closed. Close errors are
//! swallowed by the autoclose policy and only show up in its report and logs.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("autoclose bounds are inverted: min={min} > max={max}")]
    InvalidBounds { min: f64, max: f64 },
    #[error("invalid threshold {0}: expected -1, a fraction in [0, 1) or a count >= 1")]
    InvalidThreshold(f64),
    #[error("invalid duration '{0}'")]
    InvalidDuration(String),
    #[error("invalid value for {name}: '{value}'")]
    InvalidSetting { name: String, value: String },
    #[error("failed to open {}: {source}", .path.display())]
    Open { path: PathBuf, #[source] source: io::Error },
    #[error("failed to parse config {}: {source}", .path.display())]
    Config { path: PathBuf, #[source] source: serde_json::Error },
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl DescriptorError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            DescriptorError::InvalidBounds { .. } => "invalid_bounds",
            DescriptorError::InvalidThreshold(_) => "invalid_threshold",
            DescriptorError::InvalidDuration(_) => "invalid_duration",
            DescriptorError::InvalidSetting { .. } => "invalid_setting",
            DescriptorError::Open { .. } => "open_failed",
            DescriptorError::Config { .. } => "config_parse",
            DescriptorError::Io(_) => "io",
        }
    }

    /// True for errors caused by a bad policy or config rather than the filesystem.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            DescriptorError::InvalidBounds { .. }
                | DescriptorError::InvalidThreshold(_)
                | DescriptorError::InvalidDuration(_)
                | DescriptorError::InvalidSetting { .. }
                | DescriptorError::Config { .. }
        )
    }
}

#[derive(Debug, Error)]
pub enum CloseError {
    #[error("descriptor already closed: {0}")]
    AlreadyClosed(String),
    #[error("failed to close {}: {source}", .path.display())]
    Io { path: PathBuf, #[source] source: io::Error },
    #[error("{0}")]
    Other(String),
}

impl CloseError {
    pub fn code(&self) -> &'static str {
        match self {
            CloseError::AlreadyClosed(_) => "already_closed",
            CloseError::Io { .. } => "close_io",
            CloseError::Other(_) => "close_failed",
        }
    }
}

pub type DescriptorResult<T> = Result<T, DescriptorError>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod error_tests;
