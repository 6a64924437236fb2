// tests/scheduler_blocking.rs

use std::error::Error;

use tokio::runtime::Handle;

use sparks::dag::{Spark, SparkSet};
use sparks::engine::{Scheduler, SchedulerPhase};
use sparks_test_utils::init_tracing;
use sparks_test_utils::recording::ExecutionLog;

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn blocking_sparks_run_in_declaration_order() -> TestResult {
    init_tracing();
    let log = ExecutionLog::new();

    let set = SparkSet::new(vec![
        Spark::blocking("a", log.work("a")),
        Spark::blocking("b", log.work("b")),
        Spark::blocking("c", log.work("c")),
    ])?;
    let scheduler = Scheduler::new(set, Handle::current());
    scheduler.initialize().await?;

    assert_eq!(log.events(), vec!["a", "b", "c"]);
    assert!(scheduler.is_complete());
    Ok(())
}

#[tokio::test]
async fn blocking_sparks_ignore_their_needs() -> TestResult {
    init_tracing();
    let log = ExecutionLog::new();

    // `c` needs the tracked spark `x`, yet runs first: blocking order is
    // declaration order and everything blocking runs before `x` starts.
    let set = SparkSet::new(vec![
        Spark::blocking("c", log.work("c")).with_need("x"),
        Spark::blocking("b", log.work("b")),
        Spark::blocking("a", log.work("a")),
        Spark::tracked("x", log.work("x")),
    ])?;
    let scheduler = Scheduler::new(set, Handle::current());
    scheduler.initialize().await?;

    assert_eq!(log.events(), vec!["c", "b", "a", "x"]);
    Ok(())
}

#[tokio::test]
async fn blocking_sparks_finish_before_concurrent_ones_start() -> TestResult {
    init_tracing();
    let log = ExecutionLog::new();

    let set = SparkSet::new(vec![
        Spark::tracked("t", log.work("t")),
        Spark::detached("d", log.work("d")),
        Spark::blocking("slow", log.slow_work("slow", std::time::Duration::from_millis(30))),
    ])?;
    let scheduler = Scheduler::new(set, Handle::current());
    scheduler.initialize().await?;

    let slow_done = log.position("slow").expect("slow ran");
    assert!(log.position("t").expect("t ran") > slow_done);
    assert!(log.position("d").expect("d ran") > slow_done);

    let recorder = scheduler.recorder();
    let slow = recorder.span_of("slow").expect("slow timed");
    for key in ["t", "d"] {
        let span = recorder.span_of(key).expect("timed");
        assert!(slow.stopped_at <= span.started_at);
    }
    Ok(())
}

#[test]
fn initialize_blocking_runs_outside_async_context() -> TestResult {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()?;
    let log = ExecutionLog::new();

    let set = SparkSet::new(vec![
        Spark::blocking("boot", log.work("boot")),
        Spark::tracked("serve", log.work("serve")),
    ])?;
    let scheduler = Scheduler::new(set, runtime.handle().clone());

    assert_eq!(scheduler.phase(), SchedulerPhase::NotStarted);
    scheduler.initialize_blocking()?;

    assert_eq!(log.events(), vec!["boot", "serve"]);
    assert_eq!(scheduler.phase(), SchedulerPhase::Completed);
    Ok(())
}
