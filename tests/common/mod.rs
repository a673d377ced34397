#![allow(dead_code)]

use image::{ImageFormat, Rgb, RgbImage};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use magic_renamer::models::event::{LogKind, ProgressEvent};
use magic_renamer::operations::imaging::ImageBackend;
use magic_renamer::operations::imaging::native::NativeBackend;
use magic_renamer::operations::imaging::saliency::EdgeSaliencyFinder;

pub fn native_backend() -> Arc<dyn ImageBackend> {
    Arc::new(NativeBackend::new(Arc::new(EdgeSaliencyFinder::default())))
}

pub fn write_jpeg(path: &Path, width: u32, height: u32) {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    })
    .save_with_format(path, ImageFormat::Jpeg)
    .expect("write jpeg fixture");
}

pub fn write_png(path: &Path, width: u32, height: u32) {
    RgbImage::from_pixel(width, height, Rgb([200, 40, 40]))
        .save_with_format(path, ImageFormat::Png)
        .expect("write png fixture");
}

/// Sorted names of every file in `dir`.
pub fn listing(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .expect("read dir")
        .map(|entry| entry.expect("dir entry").file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

pub fn log_lines(events: &[ProgressEvent], kind: LogKind) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            ProgressEvent::Log(line) if line.kind == kind => Some(line.text.clone()),
            _ => None,
        })
        .collect()
}
