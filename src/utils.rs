use anyhow::{Context, Result};
use path_clean::PathClean;
use std::path::{Path, PathBuf};

use crate::common::{TEMP_FILE_PREFIX, VALID_IMAGE_EXTENSIONS};

pub trait PathExt {
    fn ext_lower(&self) -> String;
}

impl PathExt for Path {
    fn ext_lower(&self) -> String {
        self.extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_ascii_lowercase())
            .unwrap_or_default()
    }
}

/// Whether a bare file name may enter a batch: allow-listed extension, not a temp file.
pub fn is_eligible_image(file_name: &str) -> bool {
    !file_name.starts_with(TEMP_FILE_PREFIX)
        && VALID_IMAGE_EXTENSIONS.contains(&Path::new(file_name).ext_lower().as_str())
}

/// Expand `~`, anchor relative paths at the current working directory and strip `.`/`..`.
pub fn resolve_directory(raw: &str) -> Result<PathBuf> {
    let expanded = expand_tilde(raw.trim());
    let absolute = if expanded.is_absolute() {
        expanded
    } else {
        std::env::current_dir()
            .context("failed to read the current working directory")?
            .join(expanded)
    };
    Ok(absolute.clean())
}

fn expand_tilde(raw: &str) -> PathBuf {
    match (raw.strip_prefix('~'), dirs::home_dir()) {
        (Some(""), Some(home)) => home,
        (Some(rest), Some(home)) if rest.starts_with('/') => home.join(rest.trim_start_matches('/')),
        _ => PathBuf::from(raw),
    }
}

/// A bare file name has exactly one normal component.
pub fn is_bare_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(std::path::Component::Normal(_)), None)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eligibility_follows_allow_list_and_temp_prefix() {
        assert!(is_eligible_image("holiday.JPG"));
        assert!(is_eligible_image("scan.tif"));
        assert!(!is_eligible_image("notes.txt"));
        assert!(!is_eligible_image("temp_0001.png"));
        assert!(!is_eligible_image("png"));
    }

    #[test]
    fn relative_segments_are_cleaned() {
        let resolved = resolve_directory("/srv/photos/../pictures/./2024").unwrap();
        assert_eq!(resolved, PathBuf::from("/srv/pictures/2024"));
    }

    #[test]
    fn relative_paths_become_absolute() {
        let resolved = resolve_directory("some/dir").unwrap();
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("some/dir"));
    }

    #[test]
    fn bare_file_names_reject_components() {
        assert!(is_bare_file_name("a.jpg"));
        assert!(!is_bare_file_name("../a.jpg"));
        assert!(!is_bare_file_name("sub/a.jpg"));
        assert!(!is_bare_file_name("/etc/passwd"));
        assert!(!is_bare_file_name(""));
        assert!(!is_bare_file_name(".."));
    }
}
