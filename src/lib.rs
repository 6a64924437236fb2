// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod timing;
pub mod types;

use tokio::runtime::Handle;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{Manifest, default_config_path, load_and_validate};
use crate::dag::{SparkGraph, SparkSet};
use crate::engine::Scheduler;
use crate::errors::Result;
use crate::types::ExecutionPolicy;

pub use crate::dag::{Spark, SparkWork};
pub use crate::errors::{SparksError, ValidationError};
pub use crate::types::{ExecutionContext, SparkKey};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - manifest loading and validation
/// - binding each spark to its shell command
/// - the scheduler run on the current tokio runtime
/// - the timing report on stdout
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let manifest = load_and_validate(&config_path)?;

    let sparks = manifest.to_sparks(exec::bind_entry)?;
    let set = SparkSet::new(sparks)?;

    if args.dry_run {
        print_plan(&manifest, &set)?;
        return Ok(());
    }

    let scheduler = Scheduler::new(set, Handle::current());
    let outcome = scheduler.initialize().await;

    let report = scheduler.recorder().snapshot();
    if args.json {
        let json = serde_json::to_string_pretty(&report).map_err(anyhow::Error::from)?;
        println!("{json}");
    } else {
        println!("{report}");
    }

    outcome?;
    info!(
        tracked_complete = scheduler.is_tracked_complete(),
        complete = scheduler.is_complete(),
        "sparks finished"
    );
    Ok(())
}

/// Dry-run output: blocking order, then concurrent layers.
fn print_plan(manifest: &Manifest, set: &SparkSet) -> Result<()> {
    let graph = SparkGraph::from_set(set);

    println!("sparks dry-run");
    println!(
        "  default.policy = {}",
        manifest.default_section().policy.unwrap_or_default()
    );
    println!();

    println!("blocking (in order):");
    for spark in set.with_policy(ExecutionPolicy::Blocking) {
        println!("  - {}", spark.key());
    }

    println!("concurrent layers:");
    for (depth, layer) in graph.layers()?.iter().enumerate() {
        let keys: Vec<String> = layer
            .iter()
            .map(|key| match graph.policy_of(key.as_str()) {
                Some(policy) => format!("{key} ({policy})"),
                None => key.to_string(),
            })
            .collect();
        println!("  {depth}: {}", keys.join(", "));
    }

    println!();
    println!("sparks ({}):", set.len());
    for entry in manifest.entries() {
        println!("  - {}", entry.key);
        println!("      policy: {}", manifest.policy_of(entry));
        if !entry.needs.is_empty() {
            println!("      needs: {:?}", entry.needs);
        }
        if let Some(ref cmd) = entry.cmd {
            println!("      cmd: {cmd}");
        }
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}
