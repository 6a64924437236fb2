// src/config/validate.rs

use std::convert::Infallible;

use crate::config::model::{Manifest, RawManifest, SparkEntry};
use crate::dag::{SparkWork, validate};
use crate::errors::{Result, SparksError};

impl TryFrom<RawManifest> for Manifest {
    type Error = SparksError;

    fn try_from(raw: RawManifest) -> std::result::Result<Self, Self::Error> {
        validate_raw_manifest(&raw)?;
        Ok(Manifest::new_unchecked(raw.default, raw.spark))
    }
}

fn validate_raw_manifest(raw: &RawManifest) -> Result<()> {
    ensure_has_sparks(raw)?;
    for entry in &raw.spark {
        validate_entry(entry)?;
    }
    validate_graph(raw)?;
    Ok(())
}

fn ensure_has_sparks(raw: &RawManifest) -> Result<()> {
    if raw.spark.is_empty() {
        return Err(SparksError::ConfigError(
            "manifest must contain at least one [[spark]] table".to_string(),
        ));
    }
    Ok(())
}

fn validate_entry(entry: &SparkEntry) -> Result<()> {
    if entry.key.trim().is_empty() {
        return Err(SparksError::ConfigError(
            "[[spark]] entry has an empty `key`".to_string(),
        ));
    }
    if let Some(cmd) = &entry.cmd {
        if cmd.trim().is_empty() {
            return Err(SparksError::ConfigError(format!(
                "spark '{}' has an empty `cmd`",
                entry.key
            )));
        }
    }
    Ok(())
}

/// Run the graph validator over the declared shape, with placeholder work.
fn validate_graph(raw: &RawManifest) -> Result<()> {
    let shape = Manifest::new_unchecked(raw.default.clone(), raw.spark.clone());
    let sparks = shape
        .to_sparks(|_| Ok::<_, Infallible>(SparkWork::noop()))
        .unwrap_or_else(|never| match never {});
    validate(&sparks)?;
    Ok(())
}
