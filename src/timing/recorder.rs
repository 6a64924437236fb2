// src/timing/recorder.rs

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::dag::Spark;
use crate::errors::TimingError;
use crate::types::{ExecutionPolicy, SparkKey};

use super::{Clock, SystemClock};

/// Start and stop marks recorded for one spark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingSpan {
    pub started_at: Instant,
    pub stopped_at: Instant,
}

impl TimingSpan {
    pub fn duration(&self) -> Duration {
        self.stopped_at.saturating_duration_since(self.started_at)
    }
}

#[derive(Debug, Clone)]
struct Entry {
    policy: ExecutionPolicy,
    started_at: Instant,
    stopped_at: Option<Instant>,
}

impl Entry {
    fn duration(&self) -> Option<Duration> {
        self.stopped_at
            .map(|stop| stop.saturating_duration_since(self.started_at))
    }
}

/// Earliest start and latest stop for a group of sparks.
#[derive(Debug, Clone, Copy)]
struct Window {
    first_start: Instant,
    last_stop: Option<Instant>,
}

impl Window {
    fn opened_at(at: Instant) -> Self {
        Self {
            first_start: at,
            last_stop: None,
        }
    }

    /// Pull the first start back; a later mark never shrinks the window.
    fn widen_start(&mut self, at: Instant) {
        self.first_start = self.first_start.min(at);
    }

    /// Push the last stop forward; an earlier mark never shrinks the window.
    fn widen_stop(&mut self, at: Instant) {
        self.last_stop = Some(self.last_stop.map_or(at, |stop| stop.max(at)));
    }

    fn duration(&self) -> Option<Duration> {
        self.last_stop
            .map(|stop| stop.saturating_duration_since(self.first_start))
    }
}

#[derive(Debug, Default)]
struct TimingState {
    entries: HashMap<SparkKey, Entry>,
    /// Keys in the order they were first started.
    order: Vec<SparkKey>,
    overall: Option<Window>,
    by_policy: HashMap<ExecutionPolicy, Window>,
}

struct Inner {
    clock: Arc<dyn Clock>,
    state: Mutex<TimingState>,
}

/// Concurrency-safe store of spark timings.
///
/// Cloning is cheap and shares the underlying store. Every mutation takes a
/// single lock for a short critical section; queries copy out of the same
/// lock, so they see a consistent snapshot.
#[derive(Clone)]
pub struct TimingRecorder {
    inner: Arc<Inner>,
}

impl fmt::Debug for TimingRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("TimingRecorder")
            .field("clock", &self.inner.clock)
            .field("recorded", &state.entries.len())
            .finish_non_exhaustive()
    }
}

impl Default for TimingRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl TimingRecorder {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }

    pub fn with_clock(clock: impl Clock + 'static) -> Self {
        Self {
            inner: Arc::new(Inner {
                clock: Arc::new(clock),
                state: Mutex::new(TimingState::default()),
            }),
        }
    }

    /// Record a start mark for `spark`.
    ///
    /// The first start ever seen opens the overall window; the first start
    /// per policy opens that policy's window. Starting a spark whose duration
    /// is already recorded is ignored.
    pub fn start(&self, spark: &Spark) {
        let key = spark.key();
        let policy = spark.policy();
        let mut state = self.inner.state.lock();
        // Read under the lock so mark order matches commit order.
        let now = self.inner.clock.now();

        if let Some(existing) = state.entries.get_mut(key) {
            if existing.stopped_at.is_some() {
                warn!(spark = %key, "start after stop; keeping recorded duration");
                return;
            }
            existing.started_at = now;
            trace!(spark = %key, "restarted pending timing mark");
            return;
        }

        state.entries.insert(
            key.clone(),
            Entry {
                policy,
                started_at: now,
                stopped_at: None,
            },
        );
        state.order.push(key.clone());

        state
            .overall
            .get_or_insert(Window::opened_at(now))
            .widen_start(now);
        state
            .by_policy
            .entry(policy)
            .or_insert(Window::opened_at(now))
            .widen_start(now);

        trace!(spark = %key, %policy, "timing started");
    }

    /// Record the stop mark for `spark` and return its duration.
    ///
    /// Fails if `spark` was never started or was already stopped.
    pub fn stop(&self, spark: &Spark) -> Result<Duration, TimingError> {
        let key = spark.key();
        let mut state = self.inner.state.lock();
        let now = self.inner.clock.now();

        let entry = state
            .entries
            .get_mut(key)
            .ok_or_else(|| TimingError::NotStarted(key.clone()))?;
        if entry.stopped_at.is_some() {
            return Err(TimingError::AlreadyStopped(key.clone()));
        }
        entry.stopped_at = Some(now);
        let elapsed = now.saturating_duration_since(entry.started_at);
        let policy = entry.policy;

        if let Some(window) = state.by_policy.get_mut(&policy) {
            window.widen_stop(now);
        }
        if let Some(window) = state.overall.as_mut() {
            window.widen_stop(now);
        }

        debug!(spark = %key, %policy, elapsed_ms = elapsed.as_millis() as u64, "timing stopped");
        Ok(elapsed)
    }

    /// Run `fut` between a `start` and a `stop` for `spark`.
    ///
    /// The stop is recorded on every exit path: normal completion, an error
    /// carried in `fut`'s output, a panic unwinding through here, or the
    /// returned future being dropped.
    pub async fn measure<F>(&self, spark: &Spark, fut: F) -> Result<F::Output, TimingError>
    where
        F: Future,
    {
        self.start(spark);
        let guard = StopGuard {
            recorder: self,
            spark,
            armed: true,
        };
        let output = fut.await;
        guard.disarm()?;
        Ok(output)
    }

    pub fn duration_of(&self, key: &str) -> Option<Duration> {
        self.inner
            .state
            .lock()
            .entries
            .get(key)
            .and_then(Entry::duration)
    }

    pub fn span_of(&self, key: &str) -> Option<TimingSpan> {
        let state = self.inner.state.lock();
        let entry = state.entries.get(key)?;
        Some(TimingSpan {
            started_at: entry.started_at,
            stopped_at: entry.stopped_at?,
        })
    }

    /// Durations of every stopped spark.
    pub fn all_durations(&self) -> HashMap<SparkKey, Duration> {
        self.inner
            .state
            .lock()
            .entries
            .iter()
            .filter_map(|(key, entry)| entry.duration().map(|d| (key.clone(), d)))
            .collect()
    }

    pub fn sum_of_durations(&self) -> Duration {
        self.inner
            .state
            .lock()
            .entries
            .values()
            .filter_map(Entry::duration)
            .sum()
    }

    pub fn sum_of_durations_by_policy(&self) -> HashMap<ExecutionPolicy, Duration> {
        let state = self.inner.state.lock();
        let mut sums: HashMap<ExecutionPolicy, Duration> = HashMap::new();
        for entry in state.entries.values() {
            if let Some(d) = entry.duration() {
                *sums.entry(entry.policy).or_default() += d;
            }
        }
        sums
    }

    /// Wall-clock span from the first start to the most recent stop.
    pub fn execution_delta(&self) -> Option<Duration> {
        self.inner.state.lock().overall.and_then(|w| w.duration())
    }

    /// Per-policy analogue of [`execution_delta`](Self::execution_delta);
    /// policies without a stop yet are absent.
    pub fn execution_delta_by_policy(&self) -> HashMap<ExecutionPolicy, Duration> {
        self.inner
            .state
            .lock()
            .by_policy
            .iter()
            .filter_map(|(policy, window)| window.duration().map(|d| (*policy, d)))
            .collect()
    }

    /// Stopped sparks with their policy and duration, in start order.
    pub(crate) fn ordered_durations(&self) -> Vec<(SparkKey, ExecutionPolicy, Duration)> {
        let state = self.inner.state.lock();
        state
            .order
            .iter()
            .filter_map(|key| {
                let entry = state.entries.get(key)?;
                Some((key.clone(), entry.policy, entry.duration()?))
            })
            .collect()
    }
}

struct StopGuard<'a> {
    recorder: &'a TimingRecorder,
    spark: &'a Spark,
    armed: bool,
}

impl StopGuard<'_> {
    fn disarm(mut self) -> Result<Duration, TimingError> {
        self.armed = false;
        self.recorder.stop(self.spark)
    }
}

impl Drop for StopGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(e) = self.recorder.stop(self.spark) {
            warn!(spark = %self.spark.key(), error = %e, "failed to stop timing on early exit");
        }
    }
}
