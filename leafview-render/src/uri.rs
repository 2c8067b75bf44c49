use std::path::PathBuf;

use anyhow::{bail, Context, Result};

const FILE_SCHEME: &str = "file://";

/// Turns an item's file path or `file://` URI into a local path.
pub fn resolve_uri(uri: &str) -> Result<PathBuf> {
    let trimmed = uri.trim();
    if trimmed.is_empty() {
        bail!("empty document location");
    }
    let raw = match trimmed.strip_prefix(FILE_SCHEME) {
        Some(rest) => rest,
        None if trimmed.contains("://") => {
            bail!("unsupported document location {trimmed}");
        }
        None => trimmed,
    };
    let path = PathBuf::from(raw);
    path.canonicalize()
        .with_context(|| format!("failed to resolve path for {:?}", path))
}
