//! Package metadata persisted alongside a checked-out working directory

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Metadata file for a materialized checkout.
pub const META_FILE: &str = ".gitdep.json";

/// Metadata file written after an in-place update. Kept separate from
/// [`META_FILE`] so a consumer comparing old and new state can see both
/// until it promotes the pending file.
pub const PENDING_META_FILE: &str = ".gitdep.json.new";

/// What was checked out, recorded next to the working tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackageMeta {
    /// Package name
    pub name: String,
    /// Repository source URL
    pub source: String,
    /// The requested target (version range, branch, tag, or commit)
    pub target: String,
    /// Resolved version tag, when the target was a version range
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Resolved commit id, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
}

/// Writes `meta` into `dir` as pretty-printed JSON, returning the path
/// written.
///
/// After an in-place update the pending filename is used, leaving the
/// previous metadata in place for comparison.
pub async fn save_pkg_meta(
    meta: &PackageMeta,
    dir: &Path,
    updated_in_place: bool,
) -> Result<PathBuf> {
    let file = if updated_in_place {
        PENDING_META_FILE
    } else {
        META_FILE
    };
    let path = dir.join(file);
    let json = serde_json::to_string_pretty(meta).context("Failed to serialize package metadata")?;
    tokio::fs::write(&path, json)
        .await
        .with_context(|| format!("Failed to write package metadata to {}", path.display()))?;
    Ok(path)
}
