// src/config/model.rs

use serde::Deserialize;

use crate::dag::{Spark, SparkWork};
use crate::types::ExecutionPolicy;

/// Spark manifest as read from a TOML file, before validation.
///
/// ```toml
/// [default]
/// policy = "tracked"
///
/// [[spark]]
/// key = "migrate"
/// policy = "blocking"
/// cmd = "./migrate.sh"
///
/// [[spark]]
/// key = "metrics"
/// policy = "detached"
/// needs = ["cache"]
/// cmd = "./metrics.sh"
/// ```
///
/// Sparks are an array of tables so declaration order survives parsing;
/// blocking sparks run in exactly this order.
#[derive(Debug, Clone, Deserialize)]
pub struct RawManifest {
    /// Defaults from `[default]`.
    #[serde(default)]
    pub default: DefaultSection,

    /// All sparks from `[[spark]]`, in file order.
    #[serde(default)]
    pub spark: Vec<SparkEntry>,
}

/// `[default]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DefaultSection {
    /// Policy for sparks that do not set one; `tracked` if omitted.
    #[serde(default)]
    pub policy: Option<ExecutionPolicy>,
}

/// One `[[spark]]` table.
#[derive(Debug, Clone, Deserialize)]
pub struct SparkEntry {
    pub key: String,

    /// `"blocking"`, `"tracked"` or `"detached"`. Falls back to
    /// `default.policy`.
    #[serde(default)]
    pub policy: Option<ExecutionPolicy>,

    /// Keys of tracked or detached sparks that must finish first.
    #[serde(default)]
    pub needs: Vec<String>,

    /// Shell command run by the `sparks` binary. Library users may bind work
    /// by key instead and leave this unset.
    #[serde(default)]
    pub cmd: Option<String>,
}

impl SparkEntry {
    pub fn effective_policy(&self, default: &DefaultSection) -> ExecutionPolicy {
        self.policy.or(default.policy).unwrap_or_default()
    }
}

/// A manifest that passed validation.
///
/// Only constructible through `TryFrom<RawManifest>` (see
/// `config::validate`), so holding one means the spark graph is sound.
#[derive(Debug, Clone)]
pub struct Manifest {
    default: DefaultSection,
    sparks: Vec<SparkEntry>,
}

impl Manifest {
    pub(crate) fn new_unchecked(default: DefaultSection, sparks: Vec<SparkEntry>) -> Self {
        Self { default, sparks }
    }

    pub fn entries(&self) -> &[SparkEntry] {
        &self.sparks
    }

    pub fn default_section(&self) -> &DefaultSection {
        &self.default
    }

    pub fn policy_of(&self, entry: &SparkEntry) -> ExecutionPolicy {
        entry.effective_policy(&self.default)
    }

    /// Turn every entry into a [`Spark`], asking `bind` for its work.
    pub fn to_sparks<F, E>(&self, mut bind: F) -> Result<Vec<Spark>, E>
    where
        F: FnMut(&SparkEntry) -> Result<SparkWork, E>,
    {
        self.sparks
            .iter()
            .map(|entry| {
                let work = bind(entry)?;
                Ok(Spark::new(entry.key.as_str(), self.policy_of(entry), work)
                    .with_needs(entry.needs.iter().map(String::as_str)))
            })
            .collect()
    }
}
