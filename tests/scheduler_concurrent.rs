// tests/scheduler_concurrent.rs

use std::error::Error;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::runtime::Handle;

use sparks::dag::{Spark, SparkSet, SparkWork};
use sparks::engine::{Scheduler, SchedulerPhase};
use sparks::errors::SchedulerError;
use sparks::types::ExecutionContext;
use sparks_test_utils::recording::{ExecutionLog, Gate};
use sparks_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn latches_start_false() -> TestResult {
    let set = SparkSet::new(vec![Spark::tracked("a", SparkWork::noop())])?;
    let scheduler = Scheduler::new(set, Handle::current());

    assert!(!scheduler.is_tracked_complete());
    assert!(!scheduler.is_complete());
    assert_eq!(scheduler.phase(), SchedulerPhase::NotStarted);
    Ok(())
}

#[tokio::test]
async fn shared_dependency_runs_once_and_tracked_latch_ignores_detached() -> TestResult {
    init_tracing();
    let log = ExecutionLog::new();
    let gate = Gate::new();

    let set = SparkSet::new(vec![
        Spark::tracked("dep", log.work("dep")),
        Spark::tracked("x", log.work("x")).with_need("dep"),
        Spark::detached("y", log.gated_work("y", &gate)).with_need("dep"),
    ])?;
    let scheduler = Arc::new(Scheduler::new(set, Handle::current()));

    let run = {
        let scheduler = Arc::clone(&scheduler);
        tokio::spawn(async move { scheduler.initialize().await })
    };

    with_timeout(scheduler.tracked_latch().wait()).await;
    assert!(scheduler.is_tracked_complete());
    assert!(log.position("dep").is_some());
    assert!(log.position("x").is_some());
    assert_eq!(log.position("y"), None);
    assert!(!scheduler.is_complete());

    let mut complete = scheduler.complete_latch().subscribe();
    assert!(!*complete.borrow());

    gate.open();
    with_timeout(scheduler.complete_latch().wait()).await;
    with_timeout(complete.changed()).await?;
    assert!(*complete.borrow());
    with_timeout(run).await??;

    assert!(scheduler.is_complete());
    assert_eq!(scheduler.phase(), SchedulerPhase::Completed);
    assert_eq!(log.count("dep"), 1);
    assert_eq!(log.count("x"), 1);
    assert_eq!(log.count("y"), 1);
    Ok(())
}

#[tokio::test]
async fn detached_latch_does_not_wait_for_slow_tracked() -> TestResult {
    init_tracing();
    let log = ExecutionLog::new();
    let gate = Gate::new();

    let set = SparkSet::new(vec![
        Spark::tracked("slow", log.gated_work("slow", &gate)),
        Spark::detached("quick", log.work("quick")),
    ])?;
    let scheduler = Arc::new(Scheduler::new(set, Handle::current()));

    let run = {
        let scheduler = Arc::clone(&scheduler);
        tokio::spawn(async move { scheduler.initialize().await })
    };

    // The detached spark finishes while the tracked one is still held.
    with_timeout(async {
        while scheduler.recorder().duration_of("quick").is_none() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(!scheduler.is_tracked_complete());
    assert!(!scheduler.is_complete());

    gate.open();
    with_timeout(run).await??;
    assert!(scheduler.is_tracked_complete());
    assert!(scheduler.is_complete());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn dependents_start_after_prerequisites_stop() -> TestResult {
    init_tracing();
    let log = ExecutionLog::new();
    let delay = Duration::from_millis(10);

    let set = SparkSet::new(vec![
        Spark::detached("report", log.slow_work("report", delay)).with_needs(["api", "worker"]),
        Spark::tracked("api", log.slow_work("api", delay)).with_needs(["db", "cache"]),
        Spark::tracked("worker", log.slow_work("worker", delay)).with_need("db"),
        Spark::tracked("cache", log.slow_work("cache", delay)),
        Spark::tracked("db", log.slow_work("db", delay)),
    ])?;
    let scheduler = Scheduler::new(set, Handle::current());
    with_timeout(scheduler.initialize()).await?;

    let recorder = scheduler.recorder();
    for spark in scheduler.sparks().sparks() {
        let span = recorder.span_of(spark.key().as_str()).expect("timed");
        for need in spark.needs() {
            let dep = recorder.span_of(need.as_str()).expect("dependency timed");
            assert!(
                dep.stopped_at <= span.started_at,
                "{} started before {} stopped",
                spark.key(),
                need
            );
        }
    }
    Ok(())
}

#[tokio::test]
async fn independent_sparks_overlap() -> TestResult {
    init_tracing();
    let log = ExecutionLog::new();
    let gate = Gate::new();

    let set = SparkSet::new(vec![
        Spark::tracked("left", log.gated_work("left", &gate)),
        Spark::tracked("right", log.gated_work("right", &gate)),
    ])?;
    let scheduler = Arc::new(Scheduler::new(set, Handle::current()));
    let run = {
        let scheduler = Arc::clone(&scheduler);
        tokio::spawn(async move { scheduler.initialize().await })
    };

    // Both are in flight at the same time before either can finish.
    with_timeout(async {
        while log.position("start:left").is_none() || log.position("start:right").is_none() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await;
    gate.open();
    with_timeout(run).await??;
    Ok(())
}

#[tokio::test]
async fn wait_until_complete_resolves_for_other_observers() -> TestResult {
    init_tracing();
    let log = ExecutionLog::new();
    let set = SparkSet::new(vec![
        Spark::tracked("a", log.slow_work("a", Duration::from_millis(20))),
        Spark::detached("b", log.work("b")).with_need("a"),
    ])?;
    let scheduler = Arc::new(Scheduler::new(set, Handle::current()));

    let observer = {
        let scheduler = Arc::clone(&scheduler);
        tokio::spawn(async move {
            scheduler.wait_until_complete().await?;
            Ok::<bool, SchedulerError>(scheduler.is_complete())
        })
    };

    scheduler.initialize().await?;
    assert!(with_timeout(observer).await??);
    Ok(())
}

#[tokio::test]
async fn empty_set_completes_immediately() -> TestResult {
    let scheduler = Scheduler::new(SparkSet::new(Vec::new())?, Handle::current());
    scheduler.initialize().await?;
    assert!(scheduler.is_tracked_complete());
    assert!(scheduler.is_complete());
    assert_eq!(scheduler.recorder().execution_delta(), None);
    Ok(())
}

#[tokio::test]
async fn second_initialize_is_rejected() -> TestResult {
    let log = ExecutionLog::new();
    let set = SparkSet::new(vec![Spark::tracked("once", log.work("once"))])?;
    let scheduler = Scheduler::new(set, Handle::current());

    scheduler.initialize().await?;
    let again = scheduler.initialize().await;

    assert!(matches!(again, Err(SchedulerError::AlreadyInitialized)));
    assert_eq!(log.count("once"), 1);
    Ok(())
}

#[tokio::test]
async fn single_detached_window_matches_its_duration() -> TestResult {
    let log = ExecutionLog::new();
    let set = SparkSet::new(vec![
        Spark::tracked("t", log.slow_work("t", Duration::from_millis(5))),
        Spark::detached("only", log.slow_work("only", Duration::from_millis(5))),
    ])?;
    let scheduler = Scheduler::new(set, Handle::current());
    scheduler.initialize().await?;

    let recorder = scheduler.recorder();
    assert_eq!(
        recorder
            .execution_delta_by_policy()
            .get(&sparks::types::ExecutionPolicy::Detached)
            .copied(),
        recorder.duration_of("only")
    );
    assert_eq!(
        recorder.sum_of_durations(),
        recorder.all_durations().values().sum::<Duration>()
    );
    Ok(())
}

#[test]
fn spark_runs_on_its_execution_context() -> TestResult {
    let host = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("sparks-host")
        .enable_all()
        .build()?;
    let dedicated = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("sparks-dedicated")
        .enable_all()
        .build()?;

    let seen: Arc<Mutex<Vec<(String, String)>>> = Arc::new(Mutex::new(Vec::new()));
    let record = |key: &'static str| {
        let seen = Arc::clone(&seen);
        SparkWork::new(move || {
            let seen = Arc::clone(&seen);
            async move {
                let thread = std::thread::current().name().unwrap_or_default().to_string();
                seen.lock().unwrap().push((key.to_string(), thread));
                Ok(())
            }
        })
    };

    let set = SparkSet::new(vec![
        Spark::tracked("on-host", record("on-host")),
        Spark::tracked("on-dedicated", record("on-dedicated"))
            .with_context(ExecutionContext::Runtime(dedicated.handle().clone())),
    ])?;
    let scheduler = Scheduler::new(set, host.handle().clone());
    scheduler.initialize_blocking()?;

    let seen = seen.lock().unwrap().clone();
    let thread_of = |key: &str| {
        seen.iter()
            .find(|(k, _)| k == key)
            .map(|(_, t)| t.clone())
            .unwrap_or_default()
    };
    assert_eq!(thread_of("on-host"), "sparks-host");
    assert_eq!(thread_of("on-dedicated"), "sparks-dedicated");
    Ok(())
}
