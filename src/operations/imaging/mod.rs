pub mod geometry;
pub mod magick;
pub mod native;
pub mod saliency;

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{AppConfig, BackendKind};
use geometry::CropRegion;
use magick::MagickBackend;
use native::NativeBackend;
use saliency::EdgeSaliencyFinder;

/// Which path produced a smart-crop output.
#[derive(Debug)]
pub enum SmartCropPath {
    Salient(CropRegion),
    /// Saliency failed; the fill-and-extent crop was written instead.
    Fallback { reason: anyhow::Error },
}

/// Conversion and cropping capabilities the batch pipeline depends on.
///
/// Every operation writes `destination` on success and reports failure as an `Err`
/// value; callers treat an `Err` as a per-file failure.
pub trait ImageBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Cheap liveness check; returns a version or description string.
    fn probe(&self) -> Result<String>;

    fn dimensions(&self, source: &Path) -> Result<(u32, u32)>;

    /// Re-encode `source` as PNG without resizing.
    fn convert(&self, source: &Path, destination: &Path) -> Result<()>;

    /// Centred square crop scaled to `target_size`×`target_size`.
    fn center_crop(&self, source: &Path, destination: &Path, target_size: u32)
    -> Result<CropRegion>;

    /// Saliency-chosen square crop scaled to `target_size`×`target_size`.
    fn salient_crop(&self, source: &Path, destination: &Path, target_size: u32)
    -> Result<CropRegion>;

    /// Scale until both sides cover `target_size`, then cut the centred square.
    fn fill_crop(&self, source: &Path, destination: &Path, target_size: u32) -> Result<()>;

    fn smart_crop(
        &self,
        source: &Path,
        destination: &Path,
        target_size: u32,
    ) -> Result<SmartCropPath> {
        match self.salient_crop(source, destination, target_size) {
            Ok(region) => Ok(SmartCropPath::Salient(region)),
            Err(reason) => {
                self.fill_crop(source, destination, target_size)
                    .with_context(|| format!("fallback crop also failed after: {:#}", reason))?;
                Ok(SmartCropPath::Fallback { reason })
            }
        }
    }
}

pub fn backend_from_config(config: &AppConfig) -> Arc<dyn ImageBackend> {
    let finder = Arc::new(EdgeSaliencyFinder::default());
    match config.backend {
        BackendKind::Native => Arc::new(NativeBackend::new(finder)),
        BackendKind::Magick => Arc::new(MagickBackend::new(
            config.magick_binary.clone(),
            config.identify_binary.clone(),
            Duration::from_secs(config.probe_timeout_secs),
            Duration::from_secs(config.command_timeout_secs),
            finder,
        )),
    }
}
