use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

use crate::common::MAX_RESIZE_SIZE;
use crate::utils::{is_bare_file_name, resolve_directory};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CropMode {
    #[default]
    Center,
    Smart,
}

/// Body of `POST /process`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BatchRequest {
    pub directory: String,
    #[serde(default)]
    pub prefix: String,
    pub files: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_resize_size")]
    pub resize_size: Option<u32>,
    #[serde(default)]
    pub crop_mode: CropMode,
}

/// A request that passed validation, with its directory made absolute.
#[derive(Debug, Clone)]
pub struct ValidatedBatch {
    pub directory: PathBuf,
    pub prefix: String,
    pub files: Vec<String>,
    pub resize_size: Option<u32>,
    pub crop_mode: CropMode,
}

impl BatchRequest {
    pub fn validate(&self) -> Result<ValidatedBatch, String> {
        if self.directory.trim().is_empty() {
            return Err("Invalid directory path".to_string());
        }
        let directory = resolve_directory(&self.directory).map_err(|err| format!("{err:#}"))?;
        if !directory.is_dir() {
            return Err(format!("Invalid directory path: {}", directory.display()));
        }
        if self.files.is_empty() {
            return Err("No files selected".to_string());
        }
        if let Some(bad) = self.files.iter().find(|name| !is_bare_file_name(name)) {
            return Err(format!("Invalid file name: {bad:?}"));
        }
        let mut seen = HashSet::new();
        if let Some(duplicate) = self.files.iter().find(|name| !seen.insert(*name)) {
            return Err(format!("File selected twice: {duplicate:?}"));
        }
        if self
            .resize_size
            .is_some_and(|size| !(1..=MAX_RESIZE_SIZE).contains(&size))
        {
            return Err(format!("Resize size must be between 1 and {MAX_RESIZE_SIZE}"));
        }
        let prefix = self.prefix.trim();
        if !prefix.is_empty() && !is_bare_file_name(prefix) {
            return Err(format!("Invalid prefix: {prefix:?}"));
        }

        Ok(ValidatedBatch {
            directory,
            prefix: prefix.to_string(),
            files: self.files.clone(),
            resize_size: self.resize_size,
            crop_mode: self.crop_mode,
        })
    }
}

/// Accepts `""`, `null`, `"512"` or `512`.
fn deserialize_resize_size<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    struct ResizeSizeVisitor;

    impl<'de> de::Visitor<'de> for ResizeSizeVisitor {
        type Value = Option<u32>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("an empty string or a positive integer")
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
            u32::try_from(value)
                .ok()
                .filter(|size| *size > 0)
                .map(Some)
                .ok_or_else(|| E::custom(format!("invalid resize size {value}")))
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
            u64::try_from(value)
                .map_err(|_| E::custom(format!("invalid resize size {value}")))
                .and_then(|value| self.visit_u64(value))
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
            let value = value.trim();
            if value.is_empty() {
                return Ok(None);
            }
            let size: u64 = value
                .parse()
                .map_err(|_| E::custom(format!("invalid resize size {value:?}")))?;
            self.visit_u64(size)
        }
    }

    deserializer.deserialize_any(ResizeSizeVisitor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> Result<BatchRequest, serde_json::Error> {
        serde_json::from_value(value)
    }

    #[test]
    fn defaults_apply_to_optional_fields() {
        let request = parse(json!({"directory": "/tmp", "files": ["a.jpg"]})).unwrap();
        assert_eq!(request.prefix, "");
        assert_eq!(request.resize_size, None);
        assert_eq!(request.crop_mode, CropMode::Center);
    }

    #[test]
    fn resize_size_accepts_strings_and_numbers() {
        let sized = |value| {
            parse(json!({"directory": "/tmp", "files": ["a.jpg"], "resize_size": value}))
                .map(|request| request.resize_size)
        };
        assert_eq!(sized(json!("")).unwrap(), None);
        assert_eq!(sized(json!("512")).unwrap(), Some(512));
        assert_eq!(sized(json!(1024)).unwrap(), Some(1024));
        assert_eq!(sized(json!(null)).unwrap(), None);
        assert!(sized(json!("0")).is_err());
        assert!(sized(json!("big")).is_err());
        assert!(sized(json!(-5)).is_err());
    }

    #[test]
    fn crop_mode_parses_smart() {
        let request = parse(
            json!({"directory": "/tmp", "files": ["a.jpg"], "crop_mode": "smart"}),
        )
        .unwrap();
        assert_eq!(request.crop_mode, CropMode::Smart);
    }

    #[test]
    fn validation_rejects_bad_requests() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let dir = temp.path().to_string_lossy().into_owned();
        let request = |directory: &str, files: Vec<&str>, prefix: &str| BatchRequest {
            directory: directory.to_string(),
            prefix: prefix.to_string(),
            files: files.into_iter().map(String::from).collect(),
            resize_size: None,
            crop_mode: CropMode::Center,
        };

        assert!(request(&dir, vec!["a.jpg"], "").validate().is_ok());
        assert!(request("", vec!["a.jpg"], "").validate().is_err());
        assert!(request(&format!("{dir}/missing"), vec!["a.jpg"], "").validate().is_err());
        assert_eq!(
            request(&dir, vec![], "").validate().unwrap_err(),
            "No files selected"
        );
        assert!(request(&dir, vec!["../a.jpg"], "").validate().is_err());
        assert!(request(&dir, vec!["a.jpg"], "../up").validate().is_err());
        assert!(request(&dir, vec!["a.jpg", "a.jpg"], "").validate().is_err());
    }

    #[test]
    fn validation_bounds_the_resize_size() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let sized = |resize_size| BatchRequest {
            directory: temp.path().to_string_lossy().into_owned(),
            prefix: String::new(),
            files: vec!["a.jpg".to_string()],
            resize_size,
            crop_mode: CropMode::Center,
        };

        assert!(sized(Some(1)).validate().is_ok());
        assert!(sized(Some(MAX_RESIZE_SIZE)).validate().is_ok());
        assert_eq!(
            sized(Some(MAX_RESIZE_SIZE + 1)).validate().unwrap_err(),
            format!("Resize size must be between 1 and {MAX_RESIZE_SIZE}")
        );

        let huge = parse(json!({
            "directory": temp.path().to_string_lossy(),
            "files": ["a.jpg"],
            "resize_size": "4294967295"
        }))
        .unwrap();
        assert_eq!(huge.resize_size, Some(u32::MAX));
        assert!(huge.validate().is_err());
    }
}
