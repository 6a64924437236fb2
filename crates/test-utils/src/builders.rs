#![allow(dead_code)]

use sparks::config::{DefaultSection, Manifest, RawManifest, SparkEntry};
use sparks::dag::{Spark, SparkWork};
use sparks::types::ExecutionPolicy;

/// Spark with no-op work, for graph-only tests.
pub fn spark(key: &str, policy: ExecutionPolicy, needs: &[&str]) -> Spark {
    Spark::new(key, policy, SparkWork::noop()).with_needs(needs.iter().copied())
}

pub fn tracked(key: &str, needs: &[&str]) -> Spark {
    spark(key, ExecutionPolicy::Tracked, needs)
}

pub fn detached(key: &str, needs: &[&str]) -> Spark {
    spark(key, ExecutionPolicy::Detached, needs)
}

pub fn blocking(key: &str, needs: &[&str]) -> Spark {
    spark(key, ExecutionPolicy::Blocking, needs)
}

/// Builder for `Manifest` to simplify test setup.
pub struct ManifestBuilder {
    manifest: RawManifest,
}

impl ManifestBuilder {
    pub fn new() -> Self {
        Self {
            manifest: RawManifest {
                default: DefaultSection::default(),
                spark: Vec::new(),
            },
        }
    }

    pub fn with_spark(mut self, entry: SparkEntry) -> Self {
        self.manifest.spark.push(entry);
        self
    }

    pub fn with_default_policy(mut self, policy: ExecutionPolicy) -> Self {
        self.manifest.default.policy = Some(policy);
        self
    }

    pub fn build_raw(self) -> RawManifest {
        self.manifest
    }

    pub fn build(self) -> Manifest {
        Manifest::try_from(self.manifest).expect("Failed to build valid manifest from builder")
    }
}

impl Default for ManifestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `SparkEntry`.
pub struct SparkEntryBuilder {
    entry: SparkEntry,
}

impl SparkEntryBuilder {
    pub fn new(key: &str) -> Self {
        Self {
            entry: SparkEntry {
                key: key.to_string(),
                policy: None,
                needs: vec![],
                cmd: None,
            },
        }
    }

    pub fn policy(mut self, policy: ExecutionPolicy) -> Self {
        self.entry.policy = Some(policy);
        self
    }

    pub fn needs(mut self, dep: &str) -> Self {
        self.entry.needs.push(dep.to_string());
        self
    }

    pub fn cmd(mut self, cmd: &str) -> Self {
        self.entry.cmd = Some(cmd.to_string());
        self
    }

    pub fn build(self) -> SparkEntry {
        self.entry
    }
}
