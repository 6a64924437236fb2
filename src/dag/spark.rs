// src/dag/spark.rs

//! Spark declarations and validated spark sets.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::dag::validate::validate;
use crate::errors::ValidationError;
use crate::types::{ExecutionContext, ExecutionPolicy, SparkKey};

type WorkFn = dyn Fn() -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync;

/// The asynchronous unit of work behind a spark.
///
/// Cloning shares the same callable; the scheduler invokes it once per run.
#[derive(Clone)]
pub struct SparkWork(Arc<WorkFn>);

impl SparkWork {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self(Arc::new(move || f().boxed()))
    }

    /// Work that completes immediately.
    pub fn noop() -> Self {
        Self::new(|| async { Ok(()) })
    }

    pub fn call(&self) -> BoxFuture<'static, anyhow::Result<()>> {
        (self.0)()
    }
}

impl fmt::Debug for SparkWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SparkWork(..)")
    }
}

/// A single declared spark.
///
/// Immutable once built; the builder-style `with_*` methods consume and
/// return the declaration.
#[derive(Debug, Clone)]
pub struct Spark {
    key: SparkKey,
    needs: Vec<SparkKey>,
    policy: ExecutionPolicy,
    context: ExecutionContext,
    work: SparkWork,
}

impl Spark {
    pub fn new(key: impl Into<SparkKey>, policy: ExecutionPolicy, work: SparkWork) -> Self {
        Self {
            key: key.into(),
            needs: Vec::new(),
            policy,
            context: ExecutionContext::Host,
            work,
        }
    }

    pub fn blocking(key: impl Into<SparkKey>, work: SparkWork) -> Self {
        Self::new(key, ExecutionPolicy::Blocking, work)
    }

    pub fn tracked(key: impl Into<SparkKey>, work: SparkWork) -> Self {
        Self::new(key, ExecutionPolicy::Tracked, work)
    }

    pub fn detached(key: impl Into<SparkKey>, work: SparkWork) -> Self {
        Self::new(key, ExecutionPolicy::Detached, work)
    }

    /// Add a dependency. Repeated keys are kept once.
    pub fn with_need(mut self, need: impl Into<SparkKey>) -> Self {
        let need = need.into();
        if !self.needs.contains(&need) {
            self.needs.push(need);
        }
        self
    }

    pub fn with_needs<I, K>(self, needs: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<SparkKey>,
    {
        needs.into_iter().fold(self, |spark, need| spark.with_need(need))
    }

    pub fn with_context(mut self, context: ExecutionContext) -> Self {
        self.context = context;
        self
    }

    pub fn key(&self) -> &SparkKey {
        &self.key
    }

    /// Dependencies in the order they were declared.
    pub fn needs(&self) -> &[SparkKey] {
        &self.needs
    }

    pub fn policy(&self) -> ExecutionPolicy {
        self.policy
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    pub fn work(&self) -> &SparkWork {
        &self.work
    }
}

/// An ordered, validated collection of sparks.
///
/// The only way to obtain one is through [`SparkSet::new`], which runs the
/// graph validator, so every `SparkSet` is safe to hand to a scheduler.
///
/// `needs` may only name tracked or detached sparks, including on blocking
/// sparks. Blocking sparks run in declaration order, so "`c` after `b` after
/// `a`" among blocking sparks is written as declaring `a`, `b`, `c` in that
/// order with no `needs`.
#[derive(Debug, Clone)]
pub struct SparkSet {
    sparks: Vec<Spark>,
}

impl SparkSet {
    pub fn new(sparks: Vec<Spark>) -> Result<Self, ValidationError> {
        validate(&sparks)?;
        Ok(Self { sparks })
    }

    /// All sparks in declaration order.
    pub fn sparks(&self) -> &[Spark] {
        &self.sparks
    }

    pub fn get(&self, key: &str) -> Option<&Spark> {
        self.sparks.iter().find(|s| s.key.as_str() == key)
    }

    pub fn len(&self) -> usize {
        self.sparks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sparks.is_empty()
    }

    /// Sparks with the given policy, in declaration order.
    pub fn with_policy(&self, policy: ExecutionPolicy) -> impl Iterator<Item = &Spark> {
        self.sparks.iter().filter(move |s| s.policy == policy)
    }

    pub fn into_sparks(self) -> Vec<Spark> {
        self.sparks
    }
}

impl TryFrom<Vec<Spark>> for SparkSet {
    type Error = ValidationError;

    fn try_from(sparks: Vec<Spark>) -> Result<Self, Self::Error> {
        SparkSet::new(sparks)
    }
}
