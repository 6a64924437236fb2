// src/dag/validate.rs

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::dag::spark::Spark;
use crate::errors::ValidationError;
use crate::types::SparkKey;

/// Check that a list of sparks can be run.
///
/// Runs, in order and stopping at the first failure:
/// - key uniqueness
/// - every `need` names a tracked or detached spark
/// - the dependency graph among concurrent sparks is acyclic
///
/// Blocking sparks are never part of the cycle check: they run in
/// declaration order regardless of their `needs`. A blocking spark may only
/// need tracked or detached sparks; ordering between blocking sparks is
/// expressed by declaring them in that order, and a blocking-on-blocking need
/// is rejected with [`ValidationError::MissingDependency`].
pub fn validate(sparks: &[Spark]) -> Result<(), ValidationError> {
    ensure_unique_keys(sparks)?;
    ensure_needs_resolve(sparks)?;
    ensure_acyclic(sparks)?;
    debug!(sparks = sparks.len(), "spark graph validated");
    Ok(())
}

fn ensure_unique_keys(sparks: &[Spark]) -> Result<(), ValidationError> {
    let mut seen: HashSet<&SparkKey> = HashSet::with_capacity(sparks.len());
    for spark in sparks {
        if !seen.insert(spark.key()) {
            return Err(ValidationError::DuplicateKey(spark.key().clone()));
        }
    }
    Ok(())
}

fn ensure_needs_resolve(sparks: &[Spark]) -> Result<(), ValidationError> {
    let concurrent: HashSet<&SparkKey> = sparks
        .iter()
        .filter(|s| s.policy().is_concurrent())
        .map(Spark::key)
        .collect();

    for spark in sparks {
        for need in spark.needs() {
            if !concurrent.contains(need) {
                return Err(ValidationError::MissingDependency {
                    spark: spark.key().clone(),
                    need: need.clone(),
                });
            }
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Iterative depth-first search with three-colour marking.
///
/// Colours and adjacency are indexed by declaration position. The DFS stack
/// holds `(node, next edge)` frames and doubles as the current path, so a
/// back edge to an in-progress node yields the cycle as the stack suffix
/// starting at that node.
fn ensure_acyclic(sparks: &[Spark]) -> Result<(), ValidationError> {
    let index: HashMap<&SparkKey, usize> = sparks
        .iter()
        .enumerate()
        .filter(|(_, s)| s.policy().is_concurrent())
        .map(|(i, s)| (s.key(), i))
        .collect();

    let adjacency: Vec<Vec<usize>> = sparks
        .iter()
        .map(|s| {
            if !s.policy().is_concurrent() {
                return Vec::new();
            }
            s.needs()
                .iter()
                .filter_map(|need| index.get(need).copied())
                .collect()
        })
        .collect();

    let mut marks = vec![Mark::Unvisited; sparks.len()];
    let mut stack: Vec<(usize, usize)> = Vec::new();

    for root in 0..sparks.len() {
        if marks[root] != Mark::Unvisited || !sparks[root].policy().is_concurrent() {
            continue;
        }

        marks[root] = Mark::InProgress;
        stack.push((root, 0));

        while let Some(&(node, next)) = stack.last() {
            let Some(&child) = adjacency[node].get(next) else {
                marks[node] = Mark::Done;
                stack.pop();
                continue;
            };

            let top = stack.len() - 1;
            stack[top].1 += 1;

            match marks[child] {
                Mark::Unvisited => {
                    marks[child] = Mark::InProgress;
                    stack.push((child, 0));
                }
                Mark::InProgress => {
                    let start = stack
                        .iter()
                        .position(|&(n, _)| n == child)
                        .unwrap_or(0);
                    let mut path: Vec<SparkKey> = stack[start..]
                        .iter()
                        .map(|&(n, _)| sparks[n].key().clone())
                        .collect();
                    path.push(sparks[child].key().clone());
                    return Err(ValidationError::CycleDetected(path));
                }
                Mark::Done => {}
            }
        }
    }

    Ok(())
}
