// src/engine/latch.rs

use std::sync::Arc;

use tokio::sync::watch;

/// A set-once boolean that can be observed and awaited.
///
/// Starts `false`, flips to `true` at most once and never goes back. Clones
/// observe the same latch.
#[derive(Debug, Clone)]
pub struct CompletionLatch {
    tx: Arc<watch::Sender<bool>>,
}

impl CompletionLatch {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn is_set(&self) -> bool {
        *self.tx.borrow()
    }

    /// Flip the latch. Returns `true` only for the call that flipped it.
    pub fn set(&self) -> bool {
        self.tx.send_if_modified(|value| {
            if *value {
                false
            } else {
                *value = true;
                true
            }
        })
    }

    /// Receiver that sees the current value and the single transition.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Wait until the latch is set. Returns immediately if it already is.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this cannot observe a close.
        let _ = rx.wait_for(|set| *set).await;
    }
}

impl Default for CompletionLatch {
    fn default() -> Self {
        Self::new()
    }
}
