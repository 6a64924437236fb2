// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{Manifest, RawManifest};
use crate::errors::Result;

/// Load a manifest from a given path and return the raw [`RawManifest`].
///
/// This only performs TOML deserialization; it does **not** validate the
/// spark graph. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawManifest> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    parse_str(&contents)
}

/// Parse manifest text without touching the filesystem.
pub fn parse_str(contents: &str) -> Result<RawManifest> {
    let manifest: RawManifest = toml::from_str(contents)?;
    Ok(manifest)
}

/// Load a manifest from path and validate it.
///
/// Checks for:
/// - at least one spark, non-empty keys and commands,
/// - duplicate keys,
/// - `needs` that do not name a tracked or detached spark,
/// - dependency cycles.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<Manifest> {
    let raw = load_from_path(&path)?;
    let manifest = Manifest::try_from(raw)?;
    debug!(
        path = %path.as_ref().display(),
        sparks = manifest.entries().len(),
        "manifest loaded"
    );
    Ok(manifest)
}

/// Default manifest location: `Sparks.toml` in the working directory,
/// unless `SPARKS_CONFIG` points elsewhere.
pub fn default_config_path() -> PathBuf {
    std::env::var_os("SPARKS_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("Sparks.toml"))
}
