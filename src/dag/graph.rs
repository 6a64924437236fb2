// src/dag/graph.rs

use std::collections::HashMap;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::dag::spark::{Spark, SparkSet};
use crate::errors::ValidationError;
use crate::types::{ExecutionPolicy, SparkKey};

/// Internal node structure: stores immediate deps and dependents.
#[derive(Debug, Clone)]
struct SparkNode {
    policy: ExecutionPolicy,
    /// Direct dependencies: sparks that must complete before this one runs.
    deps: Vec<SparkKey>,
    /// Direct dependents: sparks that need this one.
    dependents: Vec<SparkKey>,
}

/// Adjacency view of a spark set, keyed by spark key.
///
/// Used for diagnostics and the dry-run plan; the scheduler itself only
/// needs each spark's own `needs`.
#[derive(Debug, Clone)]
pub struct SparkGraph {
    order: Vec<SparkKey>,
    nodes: HashMap<SparkKey, SparkNode>,
}

impl SparkGraph {
    pub fn from_set(set: &SparkSet) -> Self {
        Self::from_sparks(set.sparks())
    }

    /// Build from raw declarations. Needs that do not resolve are kept as
    /// deps but produce no dependent edge.
    pub fn from_sparks(sparks: &[Spark]) -> Self {
        let mut nodes: HashMap<SparkKey, SparkNode> = HashMap::new();
        let mut order = Vec::with_capacity(sparks.len());

        for spark in sparks {
            order.push(spark.key().clone());
            nodes.insert(
                spark.key().clone(),
                SparkNode {
                    policy: spark.policy(),
                    deps: spark.needs().to_vec(),
                    dependents: Vec::new(),
                },
            );
        }

        for spark in sparks {
            for dep in spark.needs() {
                if let Some(dep_node) = nodes.get_mut(dep) {
                    dep_node.dependents.push(spark.key().clone());
                }
            }
        }

        Self { order, nodes }
    }

    /// All spark keys in declaration order.
    pub fn keys(&self) -> impl Iterator<Item = &SparkKey> {
        self.order.iter()
    }

    pub fn policy_of(&self, key: &str) -> Option<ExecutionPolicy> {
        self.nodes.get(key).map(|n| n.policy)
    }

    pub fn dependencies_of(&self, key: &str) -> &[SparkKey] {
        self.nodes
            .get(key)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    pub fn dependents_of(&self, key: &str) -> &[SparkKey] {
        self.nodes
            .get(key)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    /// Concurrent sparks with no dependencies, in declaration order.
    pub fn roots(&self) -> Vec<SparkKey> {
        self.order
            .iter()
            .filter(|key| {
                self.nodes
                    .get(*key)
                    .is_some_and(|n| n.policy.is_concurrent() && n.deps.is_empty())
            })
            .cloned()
            .collect()
    }

    /// Group concurrent sparks into layers: layer `n` only needs sparks in
    /// layers `< n`. Within a layer, keys keep declaration order.
    pub fn layers(&self) -> Result<Vec<Vec<SparkKey>>, ValidationError> {
        // Edge direction: dep -> dependent.
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
        for key in &self.order {
            if self.nodes[key].policy.is_concurrent() {
                graph.add_node(key.as_str());
            }
        }
        for key in &self.order {
            let node = &self.nodes[key];
            if !node.policy.is_concurrent() {
                continue;
            }
            for dep in &node.deps {
                graph.add_edge(dep.as_str(), key.as_str(), ());
            }
        }

        let sorted = toposort(&graph, None).map_err(|cycle| {
            let key = SparkKey::from(cycle.node_id());
            ValidationError::CycleDetected(vec![key.clone(), key])
        })?;

        let mut depth: HashMap<&str, usize> = HashMap::new();
        for key in sorted {
            let level = self
                .dependencies_of(key)
                .iter()
                .filter_map(|dep| depth.get(dep.as_str()))
                .map(|d| d + 1)
                .max()
                .unwrap_or(0);
            depth.insert(key, level);
        }

        let count = depth.values().copied().max().map_or(0, |d| d + 1);
        let mut layers: Vec<Vec<SparkKey>> = vec![Vec::new(); count];
        for key in &self.order {
            if let Some(&level) = depth.get(key.as_str()) {
                layers[level].push(key.clone());
            }
        }
        Ok(layers)
    }
}
