// src/engine/mod.rs

//! Execution engine for spark sets.
//!
//! - [`scheduler`] runs blocking sparks in order, then every concurrent spark
//!   as a deferred unit released all at once.
//! - [`handle`] holds the deferred units and the completion handles that
//!   dependents await.
//! - [`latch`] is the set-once signal behind tracked-complete and complete.

pub mod handle;
pub mod latch;
pub mod scheduler;

pub use handle::{CompletionHandle, UnitOutcome};
pub use latch::CompletionLatch;
pub use scheduler::Scheduler;

/// Where a scheduler is in its single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
    NotStarted,
    /// Blocking sparks are running in declaration order.
    RunningBlocking,
    /// Concurrent sparks have been released.
    RunningConcurrent,
    /// Every spark succeeded.
    Completed,
    /// A spark failed; see `Scheduler::failure`.
    Failed,
}

impl SchedulerPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, SchedulerPhase::Completed | SchedulerPhase::Failed)
    }
}
