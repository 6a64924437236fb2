// src/engine/handle.rs

//! Deferred units of concurrent work and the handles used to await them.
//!
//! Construction is two-phase: every [`CompletionHandle`] exists before any
//! [`DeferredUnit`] is built, so a unit can capture the handles of its
//! prerequisites regardless of declaration order. Nothing runs until
//! [`DeferredUnit::release`] spawns the unit.

use futures::future::BoxFuture;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::errors::TaskError;
use crate::types::{ExecutionContext, ExecutionPolicy, SparkKey};

pub type UnitOutcome = Result<(), TaskError>;

/// Read side of a unit's completion.
///
/// Cheap to clone; every clone observes the same single outcome.
#[derive(Debug, Clone)]
pub struct CompletionHandle {
    key: SparkKey,
    rx: watch::Receiver<Option<UnitOutcome>>,
}

impl CompletionHandle {
    pub fn key(&self) -> &SparkKey {
        &self.key
    }

    /// Wait for the unit to finish and return its outcome.
    ///
    /// A unit that is dropped without reporting (for example because its
    /// work panicked) is reported as [`TaskError::Panicked`].
    pub async fn wait(&self) -> UnitOutcome {
        let mut rx = self.rx.clone();
        match rx.wait_for(Option::is_some).await {
            Ok(outcome) => match &*outcome {
                Some(result) => result.clone(),
                None => Err(TaskError::Panicked(self.key.clone())),
            },
            Err(_) => Err(TaskError::Panicked(self.key.clone())),
        }
    }
}

/// Write side of a unit's completion, moved into the unit itself.
#[derive(Debug)]
pub(crate) struct CompletionSender {
    tx: watch::Sender<Option<UnitOutcome>>,
}

impl CompletionSender {
    pub(crate) fn complete(self, outcome: UnitOutcome) {
        self.tx.send_replace(Some(outcome));
    }
}

pub(crate) fn completion_pair(key: SparkKey) -> (CompletionSender, CompletionHandle) {
    let (tx, rx) = watch::channel(None);
    (CompletionSender { tx }, CompletionHandle { key, rx })
}

/// A unit of concurrent work that has been built but not started.
pub(crate) struct DeferredUnit {
    pub(crate) key: SparkKey,
    pub(crate) policy: ExecutionPolicy,
    pub(crate) context: ExecutionContext,
    pub(crate) future: BoxFuture<'static, ()>,
}

impl DeferredUnit {
    /// Start the unit on its execution context, falling back to `host`.
    pub(crate) fn release(self, host: &Handle) -> JoinHandle<()> {
        self.context.handle(host).spawn(self.future)
    }
}
