use log::debug;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

use crate::operations::natural_sort::natural_sort;
use crate::utils::is_eligible_image;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Invalid directory path: {0}")]
    NotADirectory(PathBuf),

    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    #[error("Failed to list {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// List eligible image files directly inside `directory`, naturally sorted.
pub fn scan_directory(directory: &Path) -> Result<Vec<String>, ScanError> {
    match directory.metadata() {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => return Err(ScanError::NotADirectory(directory.to_path_buf())),
        Err(err) if err.kind() == ErrorKind::PermissionDenied => {
            return Err(ScanError::PermissionDenied(directory.to_path_buf()));
        }
        Err(_) => return Err(ScanError::NotADirectory(directory.to_path_buf())),
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(directory)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() == 0 => return Err(listing_error(directory, err)),
            Err(err) => {
                debug!("Skipping unreadable entry in {:?}: {}", directory, err);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            debug!("Skipping non UTF-8 file name {:?}", entry.file_name());
            continue;
        };
        if is_eligible_image(name) {
            files.push(name.to_string());
        }
    }

    natural_sort(&mut files);
    Ok(files)
}

fn listing_error(directory: &Path, err: walkdir::Error) -> ScanError {
    let path = directory.to_path_buf();
    match err.into_io_error() {
        Some(source) if source.kind() == ErrorKind::PermissionDenied => {
            ScanError::PermissionDenied(path)
        }
        Some(source) => ScanError::Io { path, source },
        None => ScanError::NotADirectory(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn filters_and_orders_images() {
        let temp = tempfile::tempdir().expect("create temp dir");
        for name in [
            "img10.png",
            "img2.JPG",
            "img1.webp",
            "temp_0001.png",
            "notes.txt",
            "archive.png.bak",
        ] {
            fs::write(temp.path().join(name), b"x").expect("write fixture");
        }
        fs::create_dir(temp.path().join("folder.png")).expect("create dir");

        let files = scan_directory(temp.path()).expect("scan");
        assert_eq!(files, vec!["img1.webp", "img2.JPG", "img10.png"]);
    }

    #[test]
    fn missing_directory_is_not_a_directory() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let err = scan_directory(&temp.path().join("missing")).unwrap_err();
        assert!(matches!(err, ScanError::NotADirectory(_)));
    }

    #[test]
    fn file_path_is_not_a_directory() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let file = temp.path().join("a.png");
        fs::write(&file, b"x").expect("write fixture");
        assert!(matches!(
            scan_directory(&file),
            Err(ScanError::NotADirectory(_))
        ));
    }
}
