use anyhow::{Result, bail};
use log::debug;
use serde::Serialize;
use std::fs;
use std::path::Path;

use crate::operations::natural_sort::natural_sort;
use crate::utils::resolve_directory;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DirectoryListing {
    pub current_path: String,
    pub parent: Option<String>,
    pub directories: Vec<String>,
}

/// List the visible subdirectories of `raw_path` after resolving it to an absolute path.
pub fn browse_directory(raw_path: &str) -> Result<DirectoryListing> {
    let path = resolve_directory(raw_path)?;
    if !path.is_dir() {
        bail!("Invalid directory path: {}", path.display());
    }

    let directories = list_subdirectories(&path);
    let parent = path
        .parent()
        .map(|parent| parent.to_string_lossy().into_owned());

    Ok(DirectoryListing {
        current_path: path.to_string_lossy().into_owned(),
        parent,
        directories,
    })
}

/// Unreadable directories list as empty rather than failing the request.
fn list_subdirectories(path: &Path) -> Vec<String> {
    let entries = match fs::read_dir(path) {
        Ok(entries) => entries,
        Err(err) => {
            debug!("Cannot list {:?}: {}", path, err);
            return Vec::new();
        }
    };

    let mut directories: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| !name.starts_with('.'))
        .collect();
    natural_sort(&mut directories);
    directories
}
