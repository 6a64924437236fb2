// src/config/mod.rs

//! `Sparks.toml` manifest model, loading and validation.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, parse_str};
pub use model::{DefaultSection, Manifest, RawManifest, SparkEntry};
