// src/timing/mod.rs

//! Per-spark and aggregate timing.
//!
//! - [`recorder`] holds the concurrency-safe [`TimingRecorder`].
//! - [`report`] turns a recorder into a serializable summary.
//! - [`mock`] provides a manually advanced clock for deterministic tests.

use std::fmt::Debug;
use std::time::Instant;

pub mod mock;
pub mod recorder;
pub mod report;

pub use mock::ManualClock;
pub use recorder::{TimingRecorder, TimingSpan};
pub use report::{PolicyTiming, SparkTiming, TimingReport};

/// Source of monotonic time marks.
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> Instant;
}

/// Implementation backed by `std::time::Instant::now`.
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}
