// src/errors.rs

//! Crate-wide error types.
//!
//! Each concern has its own enum so callers can match on exactly the failure
//! class they care about; [`SparksError`] folds them together for the binary
//! and for manifest loading.

use std::sync::Arc;

use thiserror::Error;

use crate::types::SparkKey;

/// A spark set that must never be run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("duplicate spark key '{0}'")]
    DuplicateKey(SparkKey),

    #[error("spark '{spark}' needs '{need}', which is not a tracked or detached spark")]
    MissingDependency { spark: SparkKey, need: SparkKey },

    #[error("dependency cycle detected: {}", format_cycle(.0))]
    CycleDetected(Vec<SparkKey>),
}

impl ValidationError {
    /// The cycle path for `CycleDetected`, first and last element equal.
    pub fn cycle(&self) -> Option<&[SparkKey]> {
        match self {
            ValidationError::CycleDetected(path) => Some(path),
            _ => None,
        }
    }
}

fn format_cycle(path: &[SparkKey]) -> String {
    path.iter()
        .map(SparkKey::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Misuse of the timing recorder.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimingError {
    #[error("stop called for spark '{0}' without a matching start")]
    NotStarted(SparkKey),

    #[error("spark '{0}' was already stopped; its duration is recorded once")]
    AlreadyStopped(SparkKey),
}

/// Failure of a single spark during a run.
///
/// Cloneable so one failure can be observed by every dependent and by the
/// group join.
#[derive(Error, Debug, Clone)]
pub enum TaskError {
    #[error("spark '{key}' failed: {cause:#}")]
    Failed {
        key: SparkKey,
        cause: Arc<anyhow::Error>,
    },

    #[error("spark '{key}' did not run: dependency '{dependency}' failed")]
    DependencyFailed { key: SparkKey, dependency: SparkKey },

    #[error("spark '{0}' panicked or was dropped before completing")]
    Panicked(SparkKey),

    #[error(transparent)]
    Timing(#[from] TimingError),
}

impl TaskError {
    pub fn failed(key: SparkKey, cause: anyhow::Error) -> Self {
        TaskError::Failed {
            key,
            cause: Arc::new(cause),
        }
    }

    /// Key of the spark this error is reported for.
    pub fn key(&self) -> &SparkKey {
        match self {
            TaskError::Failed { key, .. } => key,
            TaskError::DependencyFailed { key, .. } => key,
            TaskError::Panicked(key) => key,
            TaskError::Timing(TimingError::NotStarted(key))
            | TaskError::Timing(TimingError::AlreadyStopped(key)) => key,
        }
    }
}

/// Errors returned by `Scheduler::initialize`.
#[derive(Error, Debug, Clone)]
pub enum SchedulerError {
    #[error(transparent)]
    Task(#[from] TaskError),

    #[error("scheduler has already been initialized; a spark set runs exactly once")]
    AlreadyInitialized,
}

#[derive(Error, Debug)]
pub enum SparksError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid spark graph: {0}")]
    Validation(#[from] ValidationError),

    #[error("Run failed: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, SparksError>;
