// src/dag/mod.rs

//! Spark declarations and graph checks.
//!
//! - [`spark`] holds the immutable declaration type and the validated
//!   [`SparkSet`].
//! - [`validate`] checks key uniqueness, dependency resolution and
//!   acyclicity before anything runs.
//! - [`graph`] is an adjacency view used for diagnostics and plans.

pub mod graph;
pub mod spark;
pub mod validate;

pub use graph::SparkGraph;
pub use spark::{Spark, SparkSet, SparkWork};
pub use validate::validate;
