use anyhow::{Context, Result, bail};
use std::fs;
use std::path::PathBuf;

use crate::utils::resolve_directory;

/// Resolve a preview request to a regular file that stays inside `directory`,
/// after following symlinks on both sides.
pub fn resolve_media_file(directory: &str, file_name: &str) -> Result<PathBuf> {
    if directory.trim().is_empty() || file_name.is_empty() {
        bail!("directory and file are required");
    }

    let base = resolve_directory(directory)?;
    let base = fs::canonicalize(&base)
        .with_context(|| format!("failed to canonicalize {:?}", base))?;
    let candidate = base.join(file_name);
    let target = fs::canonicalize(&candidate)
        .with_context(|| format!("no such file {:?}", candidate))?;

    if !target.starts_with(&base) || target == base {
        bail!("{:?} escapes {:?}", target, base);
    }
    if !target.is_file() {
        bail!("{:?} is not a regular file", target);
    }
    Ok(target)
}
