//! The convert → delete originals → rename pipeline.
//!
//! Phases run strictly one after another over the whole selection. Per-file failures
//! are logged to the event stream and skipped; only an invalid request or an
//! unavailable backend stops a batch. Nothing is rolled back.

use log::{debug, info, warn};
use std::fs;
use std::path::Path;
use std::time::Instant;
use thiserror::Error;
use uuid::Uuid;

use crate::common::{OUTPUT_EXTENSION, TEMP_FILE_PREFIX};
use crate::models::event::{LogLine, Phase, ProgressEvent};
use crate::models::request::{BatchRequest, CropMode, ValidatedBatch};
use crate::operations::imaging::{ImageBackend, SmartCropPath};
use crate::utils::is_eligible_image;
use crate::workflow::stream::ProgressSink;

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("Image backend `{backend}` is unavailable: {reason}")]
    ToolUnavailable {
        backend: &'static str,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchSummary {
    pub selected: usize,
    pub converted: usize,
    pub processed: usize,
}

/// An original and the temp file it was converted into.
#[derive(Debug, Clone)]
struct Converted {
    original: String,
    temp_name: String,
}

pub fn temp_file_name(index: usize) -> String {
    format!("{TEMP_FILE_PREFIX}{index:04}.{OUTPUT_EXTENSION}")
}

pub fn final_file_name(prefix: &str, index: usize) -> String {
    if prefix.is_empty() {
        format!("{index}.{OUTPUT_EXTENSION}")
    } else {
        format!("{prefix}-{index}.{OUTPUT_EXTENSION}")
    }
}

/// Run a batch to completion. Always finishes the stream with exactly one terminal
/// event: `complete` on success, `error` if the batch could not start.
pub fn process_batch(
    backend: &dyn ImageBackend,
    request: &BatchRequest,
    sink: &mut dyn ProgressSink,
) -> Result<BatchSummary, BatchError> {
    let result = run_batch(backend, request, sink);
    match &result {
        Ok(summary) => sink.emit(ProgressEvent::Complete {
            processed: summary.processed,
        }),
        Err(err) => {
            warn!("Batch rejected: {}", err);
            sink.emit(ProgressEvent::error(err.to_string()));
        }
    }
    result
}

fn run_batch(
    backend: &dyn ImageBackend,
    request: &BatchRequest,
    sink: &mut dyn ProgressSink,
) -> Result<BatchSummary, BatchError> {
    let batch = request.validate().map_err(BatchError::InvalidRequest)?;
    let version = backend
        .probe()
        .map_err(|err| BatchError::ToolUnavailable {
            backend: backend.name(),
            reason: format!("{err:#}"),
        })?;

    let batch_id = Uuid::new_v4().simple().to_string()[..8].to_string();
    let start_time = Instant::now();
    info!(
        "[{}] Processing {} files in {:?} with {} backend ({})",
        batch_id,
        batch.files.len(),
        batch.directory,
        backend.name(),
        version
    );

    let converted = convert_phase(backend, &batch, &batch_id, sink);
    delete_phase(&batch, &converted, &batch_id, sink);
    let processed = rename_phase(&batch, &converted, &batch_id, sink);

    info!(
        duration = &*format!("{:?}", start_time.elapsed());
        "[{}] Batch finished: {} of {} files renamed", batch_id, processed, batch.files.len()
    );

    Ok(BatchSummary {
        selected: batch.files.len(),
        converted: converted.len(),
        processed,
    })
}

fn convert_phase(
    backend: &dyn ImageBackend,
    batch: &ValidatedBatch,
    batch_id: &str,
    sink: &mut dyn ProgressSink,
) -> Vec<Converted> {
    let header = match batch.resize_size {
        Some(size) => format!("--- Converting and resizing to {size}x{size} ---"),
        None => "--- Converting to PNG format ---".to_string(),
    };
    sink.emit(LogLine::info(header).into());

    let total = batch.files.len();
    let mut next_temp_index = 1;
    let mut converted = Vec::with_capacity(total);

    for (idx, file_name) in batch.files.iter().enumerate() {
        sink.emit(ProgressEvent::Progress {
            phase: Phase::Convert,
            current: idx + 1,
            total,
            message: format!("Processing {file_name}"),
        });

        let source = batch.directory.join(file_name);
        if !source.is_file() {
            warn!("[{}] File not found: {:?}", batch_id, source);
            sink.emit(LogLine::failure(format!("File not found: {file_name}")).into());
            continue;
        }
        if !is_eligible_image(file_name) {
            warn!("[{}] Not an eligible image: {:?}", batch_id, source);
            sink.emit(LogLine::failure(format!("Not a supported image: {file_name}")).into());
            continue;
        }

        let temp_name = temp_file_name(next_temp_index);
        let destination = batch.directory.join(&temp_name);
        match convert_one(backend, batch, file_name, &source, &destination, sink) {
            Ok(()) => {
                sink.emit(LogLine::success(format!("Processed: {file_name}")).into());
                converted.push(Converted {
                    original: file_name.clone(),
                    temp_name,
                });
                next_temp_index += 1;
            }
            Err(err) => {
                warn!("[{}] Failed to process {:?}: {:#}", batch_id, source, err);
                sink.emit(LogLine::failure(format!("Failed: {file_name} ({err:#})")).into());
                remove_partial_output(&destination, batch_id);
            }
        }
    }

    converted
}

/// Drop whatever a failed conversion left at `destination`.
fn remove_partial_output(destination: &Path, batch_id: &str) {
    if !destination.exists() {
        return;
    }
    if let Err(err) = fs::remove_file(destination) {
        warn!(
            "[{}] Failed to remove partial output {:?}: {}",
            batch_id, destination, err
        );
    }
}

fn convert_one(
    backend: &dyn ImageBackend,
    batch: &ValidatedBatch,
    file_name: &str,
    source: &Path,
    destination: &Path,
    sink: &mut dyn ProgressSink,
) -> anyhow::Result<()> {
    let Some(size) = batch.resize_size else {
        return backend.convert(source, destination);
    };
    match batch.crop_mode {
        CropMode::Center => {
            let region = backend.center_crop(source, destination, size)?;
            debug!("Center crop {:?} -> {:?}", source, region);
        }
        CropMode::Smart => match backend.smart_crop(source, destination, size)? {
            SmartCropPath::Salient(region) => {
                debug!("Smart crop {:?} -> {:?}", source, region);
            }
            SmartCropPath::Fallback { reason } => {
                warn!("Smart crop fell back for {:?}: {:#}", source, reason);
                sink.emit(
                    LogLine::warning(format!(
                        "Smart crop unavailable for {file_name}, used centered fill ({reason:#})"
                    ))
                    .into(),
                );
            }
        },
    }
    Ok(())
}

fn delete_phase(
    batch: &ValidatedBatch,
    converted: &[Converted],
    batch_id: &str,
    sink: &mut dyn ProgressSink,
) {
    sink.emit(LogLine::blank().into());
    sink.emit(LogLine::info("--- Removing original files ---").into());

    for (idx, item) in converted.iter().enumerate() {
        sink.emit(ProgressEvent::Progress {
            phase: Phase::Delete,
            current: idx + 1,
            total: converted.len(),
            message: "Removing originals".to_string(),
        });
        match fs::remove_file(batch.directory.join(&item.original)) {
            Ok(()) => {
                sink.emit(LogLine::success(format!("Removed: {}", item.original)).into());
            }
            Err(err) => {
                warn!("[{}] Failed to remove {:?}: {}", batch_id, item.original, err);
                sink.emit(LogLine::failure(format!("Failed to remove: {}", item.original)).into());
            }
        }
    }
}

/// Returns the number of files that reached their final name.
fn rename_phase(
    batch: &ValidatedBatch,
    converted: &[Converted],
    batch_id: &str,
    sink: &mut dyn ProgressSink,
) -> usize {
    sink.emit(LogLine::blank().into());
    sink.emit(LogLine::info("--- Renaming to sequential numbers ---").into());

    let mut next_index = 1;
    for (idx, item) in converted.iter().enumerate() {
        sink.emit(ProgressEvent::Progress {
            phase: Phase::Rename,
            current: idx + 1,
            total: converted.len(),
            message: "Renaming files".to_string(),
        });

        let new_name = final_file_name(&batch.prefix, next_index);
        let from = batch.directory.join(&item.temp_name);
        let to = batch.directory.join(&new_name);
        if to.exists() {
            sink.emit(LogLine::warning(format!("Overwriting existing {new_name}")).into());
        }
        match fs::rename(&from, &to) {
            Ok(()) => {
                sink.emit(LogLine::success(format!("{} -> {}", item.temp_name, new_name)).into());
                next_index += 1;
            }
            Err(err) => {
                warn!("[{}] Failed to rename {:?} to {:?}: {}", batch_id, from, to, err);
                sink.emit(LogLine::failure(format!("Failed: {}", item.temp_name)).into());
            }
        }
    }

    next_index - 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_names_are_zero_padded() {
        assert_eq!(temp_file_name(1), "temp_0001.png");
        assert_eq!(temp_file_name(42), "temp_0042.png");
        assert_eq!(temp_file_name(12345), "temp_12345.png");
        assert!(!is_eligible_image(&temp_file_name(7)));
    }

    #[test]
    fn partial_outputs_are_removed() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let partial = temp.path().join(temp_file_name(1));
        fs::write(&partial, b"half a png").expect("write partial");

        remove_partial_output(&partial, "test");
        assert!(!partial.exists());

        // A missing file is skipped; a directory in the way is logged and left alone.
        remove_partial_output(&partial, "test");
        fs::create_dir(&partial).expect("create dir");
        remove_partial_output(&partial, "test");
        assert!(partial.is_dir());
    }

    #[test]
    fn final_names_use_the_prefix_when_given() {
        assert_eq!(final_file_name("", 3), "3.png");
        assert_eq!(final_file_name("photo", 1), "photo-1.png");
    }
}
