use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;

/// Unique name of a spark.
///
/// Keys are compared by value; two declarations with the same key are a
/// configuration error.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SparkKey(String);

impl SparkKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SparkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for SparkKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SparkKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for SparkKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// How a spark is scheduled relative to the others.
///
/// - `Blocking`: runs to completion, in declaration order, before anything
///   concurrent starts. Cannot be depended upon.
/// - `Tracked`: runs concurrently and counts towards the tracked-complete
///   signal.
/// - `Detached`: runs concurrently and only counts towards the final
///   all-complete signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionPolicy {
    Blocking,
    Tracked,
    Detached,
}

impl ExecutionPolicy {
    pub const ALL: [ExecutionPolicy; 3] = [
        ExecutionPolicy::Blocking,
        ExecutionPolicy::Tracked,
        ExecutionPolicy::Detached,
    ];

    /// Whether this policy runs on the concurrent path.
    pub fn is_concurrent(self) -> bool {
        !matches!(self, ExecutionPolicy::Blocking)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionPolicy::Blocking => "blocking",
            ExecutionPolicy::Tracked => "tracked",
            ExecutionPolicy::Detached => "detached",
        }
    }
}

impl Default for ExecutionPolicy {
    fn default() -> Self {
        ExecutionPolicy::Tracked
    }
}

impl fmt::Display for ExecutionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for ExecutionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "blocking" => Ok(ExecutionPolicy::Blocking),
            "tracked" => Ok(ExecutionPolicy::Tracked),
            "detached" => Ok(ExecutionPolicy::Detached),
            other => Err(format!(
                "invalid execution policy: {other} (expected \"blocking\", \"tracked\" or \"detached\")"
            )),
        }
    }
}

/// Where the work of a concurrent spark is spawned.
///
/// Blocking sparks ignore this and always run on the caller of
/// `Scheduler::initialize`.
#[derive(Debug, Clone, Default)]
pub enum ExecutionContext {
    /// The scheduler's host runtime.
    #[default]
    Host,
    /// A dedicated runtime supplied by the embedding application.
    Runtime(Handle),
}

impl ExecutionContext {
    /// Resolve the runtime handle to spawn on, falling back to `host`.
    pub fn handle<'a>(&'a self, host: &'a Handle) -> &'a Handle {
        match self {
            ExecutionContext::Host => host,
            ExecutionContext::Runtime(handle) => handle,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ExecutionContext::Host => "host",
            ExecutionContext::Runtime(_) => "runtime",
        }
    }
}
