// src/engine/scheduler.rs

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::FutureExt;
use futures::future::try_join_all;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::dag::{Spark, SparkSet};
use crate::errors::{SchedulerError, TaskError};
use crate::timing::TimingRecorder;
use crate::types::{ExecutionPolicy, SparkKey};

use super::SchedulerPhase;
use super::handle::{CompletionHandle, DeferredUnit, completion_pair};
use super::latch::CompletionLatch;

/// Runs a validated [`SparkSet`] exactly once.
///
/// Blocking sparks run first, in declaration order, on the caller of
/// [`initialize`](Self::initialize). Tracked and detached sparks then run
/// concurrently on the host runtime, each one waiting for its `needs`.
///
/// Two latches report progress: tracked-complete flips once every tracked
/// spark has succeeded, complete flips once every concurrent spark has.
pub struct Scheduler {
    set: SparkSet,
    host: Handle,
    recorder: TimingRecorder,
    tracked: CompletionLatch,
    complete: CompletionLatch,
    phase: watch::Sender<SchedulerPhase>,
    failure: Mutex<Option<TaskError>>,
    initialized: AtomicBool,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("sparks", &self.set.len())
            .field("phase", &self.phase())
            .field("recorder", &self.recorder)
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Create a scheduler with its own timing recorder.
    pub fn new(set: SparkSet, host: Handle) -> Self {
        Self::with_recorder(set, host, TimingRecorder::new())
    }

    /// Create a scheduler that records into `recorder`.
    pub fn with_recorder(set: SparkSet, host: Handle, recorder: TimingRecorder) -> Self {
        let (phase, _rx) = watch::channel(SchedulerPhase::NotStarted);
        Self {
            set,
            host,
            recorder,
            tracked: CompletionLatch::new(),
            complete: CompletionLatch::new(),
            phase,
            failure: Mutex::new(None),
            initialized: AtomicBool::new(false),
        }
    }

    pub fn sparks(&self) -> &SparkSet {
        &self.set
    }

    pub fn recorder(&self) -> &TimingRecorder {
        &self.recorder
    }

    pub fn phase(&self) -> SchedulerPhase {
        *self.phase.borrow()
    }

    pub fn is_tracked_complete(&self) -> bool {
        self.tracked.is_set()
    }

    pub fn is_complete(&self) -> bool {
        self.complete.is_set()
    }

    pub fn tracked_latch(&self) -> &CompletionLatch {
        &self.tracked
    }

    pub fn complete_latch(&self) -> &CompletionLatch {
        &self.complete
    }

    /// The failure that ended the run, if it failed.
    pub fn failure(&self) -> Option<TaskError> {
        self.failure.lock().clone()
    }

    /// Wait until the run has finished.
    ///
    /// Resolves with `Ok` once the complete latch is set, or with the
    /// failure that ended the run; a failed run never sets the latch.
    pub async fn wait_until_complete(&self) -> Result<(), SchedulerError> {
        let mut rx = self.phase.subscribe();
        let _ = rx.wait_for(|phase| phase.is_terminal()).await;
        match self.failure() {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// Run every spark.
    ///
    /// Returns once all concurrent sparks have finished, or with the first
    /// failure observed. A blocking failure stops the run before anything
    /// concurrent starts. A concurrent failure is reported at its group's
    /// join; units already running are not cancelled.
    ///
    /// A scheduler runs once: a second call returns
    /// [`SchedulerError::AlreadyInitialized`].
    pub async fn initialize(&self) -> Result<(), SchedulerError> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return Err(SchedulerError::AlreadyInitialized);
        }

        info!(sparks = self.set.len(), "spark run started");

        self.phase.send_replace(SchedulerPhase::RunningBlocking);
        if let Err(e) = self.run_blocking().await {
            warn!(error = %e, "blocking spark failed; aborting run");
            return Err(self.fail(e).into());
        }

        self.phase.send_replace(SchedulerPhase::RunningConcurrent);
        let (tracked, detached) = self.release_concurrent();

        self.watch_tracked(&tracked);

        let joined = tokio::try_join!(
            self.join_group(ExecutionPolicy::Tracked, &tracked),
            self.join_group(ExecutionPolicy::Detached, &detached),
        );
        if let Err(e) = joined {
            return Err(self.fail(e).into());
        }

        if self.tracked.set() {
            info!(count = tracked.len(), "tracked sparks complete");
        }
        self.complete.set();
        self.phase.send_replace(SchedulerPhase::Completed);
        info!(
            total_ms = self.recorder.sum_of_durations().as_millis() as u64,
            "spark run complete"
        );
        Ok(())
    }

    /// Blocking entry point for callers outside an async context.
    ///
    /// Panics if called from within a tokio runtime, like
    /// [`Handle::block_on`].
    pub fn initialize_blocking(&self) -> Result<(), SchedulerError> {
        self.host.block_on(self.initialize())
    }

    async fn run_blocking(&self) -> Result<(), TaskError> {
        for spark in self.set.with_policy(ExecutionPolicy::Blocking) {
            debug!(spark = %spark.key(), "running blocking spark");
            run_measured(&self.recorder, spark)
                .instrument(info_span!("spark", key = %spark.key(), policy = "blocking"))
                .await?;
        }
        Ok(())
    }

    /// Build a deferred unit per concurrent spark, then release them all.
    ///
    /// Returns the tracked and detached handles in declaration order.
    fn release_concurrent(&self) -> (Vec<CompletionHandle>, Vec<CompletionHandle>) {
        let concurrent: Vec<&Spark> = self
            .set
            .sparks()
            .iter()
            .filter(|s| s.policy().is_concurrent())
            .collect();

        let mut senders = HashMap::with_capacity(concurrent.len());
        let mut handles: HashMap<SparkKey, CompletionHandle> =
            HashMap::with_capacity(concurrent.len());
        for spark in &concurrent {
            let (tx, rx) = completion_pair(spark.key().clone());
            senders.insert(spark.key().clone(), tx);
            handles.insert(spark.key().clone(), rx);
        }

        let mut units = Vec::with_capacity(concurrent.len());
        for spark in &concurrent {
            let Some(sender) = senders.remove(spark.key()) else {
                continue;
            };
            let deps: Vec<CompletionHandle> = spark
                .needs()
                .iter()
                .filter_map(|need| handles.get(need).cloned())
                .collect();
            let recorder = self.recorder.clone();
            let owned = (*spark).clone();
            let span = info_span!("spark", key = %spark.key(), policy = %spark.policy());

            let future = async move {
                for dep in &deps {
                    if dep.wait().await.is_err() {
                        debug!(dependency = %dep.key(), "dependency failed; skipping spark");
                        sender.complete(Err(TaskError::DependencyFailed {
                            key: owned.key().clone(),
                            dependency: dep.key().clone(),
                        }));
                        return;
                    }
                }
                let outcome = run_measured(&recorder, &owned).await;
                if let Err(e) = &outcome {
                    warn!(error = %e, "spark failed");
                }
                sender.complete(outcome);
            }
            .instrument(span)
            .boxed();

            units.push(DeferredUnit {
                key: spark.key().clone(),
                policy: spark.policy(),
                context: spark.context().clone(),
                future,
            });
        }

        let mut tracked = Vec::new();
        let mut detached = Vec::new();
        for unit in units {
            debug!(spark = %unit.key, policy = %unit.policy, context = unit.context.label(), "releasing spark");
            let handle = handles.get(&unit.key).cloned();
            match (unit.policy, handle) {
                (ExecutionPolicy::Tracked, Some(h)) => tracked.push(h),
                (ExecutionPolicy::Detached, Some(h)) => detached.push(h),
                _ => {}
            }
            // Units are never joined directly; completion flows through the handles.
            let _ = unit.release(&self.host);
        }

        (tracked, detached)
    }

    /// Set the tracked latch as soon as every tracked unit has succeeded.
    ///
    /// Runs apart from `initialize`'s join so a detached failure, which ends
    /// that join early, cannot keep the tracked latch from firing.
    fn watch_tracked(&self, tracked: &[CompletionHandle]) {
        let latch = self.tracked.clone();
        let handles = tracked.to_vec();
        self.host.spawn(async move {
            let waits = handles.iter().map(CompletionHandle::wait);
            if try_join_all(waits).await.is_ok() && latch.set() {
                info!(count = handles.len(), "tracked sparks complete");
            }
        });
    }

    /// Wait for every handle in a group, reporting the first failure seen.
    async fn join_group(
        &self,
        policy: ExecutionPolicy,
        handles: &[CompletionHandle],
    ) -> Result<(), TaskError> {
        let waits = handles.iter().map(|h| {
            h.wait().map(|outcome| {
                if let Err(e) = &outcome {
                    self.record_failure(e);
                }
                outcome
            })
        });
        let result = try_join_all(waits).await.map(|_| ());
        if result.is_ok() {
            debug!(%policy, count = handles.len(), "spark group joined");
        }
        result
    }

    fn record_failure(&self, e: &TaskError) {
        let mut slot = self.failure.lock();
        if slot.is_none() {
            *slot = Some(e.clone());
        }
    }

    fn fail(&self, e: TaskError) -> TaskError {
        self.record_failure(&e);
        self.phase.send_replace(SchedulerPhase::Failed);
        self.failure().unwrap_or(e)
    }
}

/// Run one spark's work inside the recorder's `measure`.
async fn run_measured(recorder: &TimingRecorder, spark: &Spark) -> Result<(), TaskError> {
    recorder
        .measure(spark, spark.work().call())
        .await?
        .map_err(|e| TaskError::failed(spark.key().clone(), e))
}
