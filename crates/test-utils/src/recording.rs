use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use tokio::sync::watch;

use sparks::dag::SparkWork;

/// Shared, ordered log of what spark work ran.
///
/// Every work built from the same log appends to it, so tests can assert on
/// execution order and on how many times a spark ran.
#[derive(Debug, Clone, Default)]
pub struct ExecutionLog {
    events: Arc<Mutex<Vec<String>>>,
}

impl ExecutionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, event: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.as_str() == event)
            .count()
    }

    /// Position of the first occurrence of `event`.
    pub fn position(&self, event: &str) -> Option<usize> {
        self.events.lock().unwrap().iter().position(|e| e == event)
    }

    /// Work that records `key` and succeeds.
    pub fn work(&self, key: &str) -> SparkWork {
        let log = self.clone();
        let key = key.to_string();
        SparkWork::new(move || {
            let log = log.clone();
            let key = key.clone();
            async move {
                log.push(key);
                Ok(())
            }
        })
    }

    /// Work that records `start:<key>`, sleeps, then records `<key>`.
    pub fn slow_work(&self, key: &str, delay: Duration) -> SparkWork {
        let log = self.clone();
        let key = key.to_string();
        SparkWork::new(move || {
            let log = log.clone();
            let key = key.clone();
            async move {
                log.push(format!("start:{key}"));
                tokio::time::sleep(delay).await;
                log.push(key);
                Ok(())
            }
        })
    }

    /// Work that records `<key>` and then fails with `message`.
    pub fn failing_work(&self, key: &str, message: &str) -> SparkWork {
        let log = self.clone();
        let key = key.to_string();
        let message = message.to_string();
        SparkWork::new(move || {
            let log = log.clone();
            let key = key.clone();
            let message = message.clone();
            async move {
                log.push(key);
                Err(anyhow!(message))
            }
        })
    }

    /// Work that records `start:<key>`, waits for `gate` to open, then
    /// records `<key>`.
    pub fn gated_work(&self, key: &str, gate: &Gate) -> SparkWork {
        let log = self.clone();
        let key = key.to_string();
        let gate = gate.clone();
        SparkWork::new(move || {
            let log = log.clone();
            let key = key.clone();
            let gate = gate.clone();
            async move {
                log.push(format!("start:{key}"));
                gate.wait().await;
                log.push(key);
                Ok(())
            }
        })
    }
}

/// A one-way gate that gated work waits on.
#[derive(Debug, Clone)]
pub struct Gate {
    tx: Arc<watch::Sender<bool>>,
}

impl Gate {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn open(&self) {
        self.tx.send_replace(true);
    }

    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(|open| *open).await;
    }
}

impl Default for Gate {
    fn default() -> Self {
        Self::new()
    }
}
