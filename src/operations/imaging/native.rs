use anyhow::{Context, Result, bail};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader, RgbImage};
use std::fs::read;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use super::geometry::{CropRegion, center_extent, center_square, fill_dimensions};
use super::saliency::SaliencyFinder;
use super::ImageBackend;
use crate::common::MAX_OUTPUT_PIXELS;

const RESAMPLE_FILTER: FilterType = FilterType::Lanczos3;

/// Pure-Rust backend on top of the `image` crate.
pub struct NativeBackend {
    saliency: Arc<dyn SaliencyFinder>,
}

impl NativeBackend {
    pub fn new(saliency: Arc<dyn SaliencyFinder>) -> Self {
        Self { saliency }
    }
}

impl ImageBackend for NativeBackend {
    fn name(&self) -> &'static str {
        "native"
    }

    fn probe(&self) -> Result<String> {
        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(RgbImage::new(1, 1))
            .write_to(&mut buffer, ImageFormat::Png)
            .context("PNG encoder is unavailable")?;
        Ok("image crate PNG encoder".to_string())
    }

    fn dimensions(&self, source: &Path) -> Result<(u32, u32)> {
        image::image_dimensions(source)
            .context(format!("failed to read dimensions of {:?}", source))
    }

    fn convert(&self, source: &Path, destination: &Path) -> Result<()> {
        let dynamic_image = load_dynamic_image(source)?;
        save_png(dynamic_image, destination)
    }

    fn center_crop(
        &self,
        source: &Path,
        destination: &Path,
        target_size: u32,
    ) -> Result<CropRegion> {
        let dynamic_image = load_dynamic_image(source)?;
        let region = center_square(dynamic_image.width(), dynamic_image.height());
        let cropped = dynamic_image.crop_imm(region.x, region.y, region.width, region.height);
        save_png(resize_checked(&cropped, target_size, target_size)?, destination)?;
        Ok(region)
    }

    fn salient_crop(
        &self,
        source: &Path,
        destination: &Path,
        target_size: u32,
    ) -> Result<CropRegion> {
        let rgb_image = load_dynamic_image(source)?.to_rgb8();
        let region = self
            .saliency
            .find(&rgb_image, target_size, target_size)
            .context("saliency detection failed")?;
        if !region.fits_within(rgb_image.width(), rgb_image.height()) {
            bail!("saliency region {:?} lies outside the image", region);
        }
        let cropped = DynamicImage::ImageRgb8(rgb_image)
            .crop_imm(region.x, region.y, region.width, region.height);
        save_png(resize_checked(&cropped, target_size, target_size)?, destination)?;
        Ok(region)
    }

    fn fill_crop(&self, source: &Path, destination: &Path, target_size: u32) -> Result<()> {
        let dynamic_image = load_dynamic_image(source)?;
        let (fill_width, fill_height) =
            fill_dimensions(dynamic_image.width(), dynamic_image.height(), target_size);
        let filled = resize_checked(&dynamic_image, fill_width, fill_height)?;
        let region = center_extent(fill_width, fill_height, target_size);
        let cropped = filled.crop_imm(region.x, region.y, region.width, region.height);
        save_png(cropped, destination)
    }
}

/// Resize unless the output would exceed the pixel budget. An oversized target fails
/// this one file instead of aborting the process on allocation.
fn resize_checked(dynamic_image: &DynamicImage, width: u32, height: u32) -> Result<DynamicImage> {
    let pixels = u64::from(width) * u64::from(height);
    if pixels == 0 || pixels > MAX_OUTPUT_PIXELS {
        bail!(
            "refusing to resize to {}x{}: output must hold between 1 and {} pixels",
            width,
            height,
            MAX_OUTPUT_PIXELS
        );
    }
    Ok(dynamic_image.resize_exact(width, height, RESAMPLE_FILTER))
}

/// Decode from memory, trying each decoder in turn.
pub fn load_dynamic_image(file_path: &Path) -> Result<DynamicImage> {
    let file_in_memory =
        read(file_path).context(format!("failed to read file into memory: {:?}", file_path))?;

    let decoders: [fn(&[u8], &Path) -> Result<DynamicImage>; 2] =
        [image_crate_decoder, extension_hint_decoder];

    let mut last_error = None;
    for decoder in decoders {
        match decoder(&file_in_memory, file_path) {
            Ok(decoded_image) => return Ok(decoded_image),
            Err(error) => last_error = Some(error),
        }
    }

    match last_error {
        Some(error) => Err(error.context(format!("all decoders failed for file: {:?}", file_path))),
        None => bail!("all decoders failed for file: {:?}", file_path),
    }
}

fn image_crate_decoder(file_in_memory: &[u8], _: &Path) -> Result<DynamicImage> {
    let dynamic_image = image::load_from_memory(file_in_memory)
        .context("image crate failed to decode image from memory")?;
    Ok(dynamic_image)
}

fn extension_hint_decoder(file_in_memory: &[u8], file_path: &Path) -> Result<DynamicImage> {
    let format = ImageFormat::from_path(file_path)
        .context(format!("no image format matches the extension of {:?}", file_path))?;
    let mut reader = ImageReader::new(Cursor::new(file_in_memory));
    reader.set_format(format);
    let dynamic_image = reader
        .decode()
        .context(format!("failed to decode as {:?}", format))?;
    Ok(dynamic_image)
}

fn save_png(dynamic_image: DynamicImage, destination: &Path) -> Result<()> {
    // PNG has no floating point color types.
    let encodable = match dynamic_image {
        DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_) => {
            DynamicImage::ImageRgba16(dynamic_image.to_rgba16())
        }
        other => other,
    };
    encodable
        .save_with_format(destination, ImageFormat::Png)
        .context(format!("failed to save PNG to {:?}", destination))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::imaging::SmartCropPath;
    use crate::operations::imaging::saliency::EdgeSaliencyFinder;
    use anyhow::anyhow;
    use image::Rgb;

    struct BrokenFinder;

    impl SaliencyFinder for BrokenFinder {
        fn find(&self, _: &RgbImage, _: u32, _: u32) -> Result<CropRegion> {
            Err(anyhow!("saliency model unavailable"))
        }
    }

    fn write_jpeg(path: &Path, width: u32, height: u32) {
        RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 90]))
            .save_with_format(path, ImageFormat::Jpeg)
            .expect("write fixture");
    }

    #[test]
    fn center_crop_of_landscape_uses_middle_band() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let source = temp.path().join("wide.jpg");
        let destination = temp.path().join("out.png");
        write_jpeg(&source, 2000, 1000);

        let backend = NativeBackend::new(Arc::new(EdgeSaliencyFinder::default()));
        let region = backend
            .center_crop(&source, &destination, 512)
            .expect("center crop");

        assert_eq!(
            region,
            CropRegion {
                x: 500,
                y: 0,
                width: 1000,
                height: 1000
            }
        );
        assert_eq!(image::image_dimensions(&destination).unwrap(), (512, 512));
    }

    #[test]
    fn smart_crop_falls_back_when_saliency_fails() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let source = temp.path().join("tall.jpg");
        let destination = temp.path().join("out.png");
        write_jpeg(&source, 300, 700);

        let backend = NativeBackend::new(Arc::new(BrokenFinder));
        let path = backend
            .smart_crop(&source, &destination, 512)
            .expect("fallback crop");

        assert!(matches!(path, SmartCropPath::Fallback { .. }));
        assert_eq!(image::image_dimensions(&destination).unwrap(), (512, 512));
    }

    #[test]
    fn smart_crop_uses_saliency_when_available() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let source = temp.path().join("wide.jpg");
        let destination = temp.path().join("out.png");
        write_jpeg(&source, 640, 320);

        let backend = NativeBackend::new(Arc::new(EdgeSaliencyFinder::default()));
        let path = backend
            .smart_crop(&source, &destination, 128)
            .expect("smart crop");

        match path {
            SmartCropPath::Salient(region) => assert!(region.fits_within(640, 320)),
            SmartCropPath::Fallback { reason } => panic!("unexpected fallback: {reason:#}"),
        }
        assert_eq!(image::image_dimensions(&destination).unwrap(), (128, 128));
    }

    #[test]
    fn smart_crop_fails_when_fallback_fails() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let source = temp.path().join("broken.jpg");
        std::fs::write(&source, b"not an image").expect("write fixture");

        let backend = NativeBackend::new(Arc::new(BrokenFinder));
        assert!(
            backend
                .smart_crop(&source, &temp.path().join("out.png"), 64)
                .is_err()
        );
    }

    #[test]
    fn convert_reencodes_as_png() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let source = temp.path().join("photo.jpg");
        let destination = temp.path().join("photo.png");
        write_jpeg(&source, 40, 30);

        let backend = NativeBackend::new(Arc::new(EdgeSaliencyFinder::default()));
        backend.convert(&source, &destination).expect("convert");

        let format = ImageReader::open(&destination)
            .unwrap()
            .with_guessed_format()
            .unwrap()
            .format();
        assert_eq!(format, Some(ImageFormat::Png));
        assert_eq!(backend.dimensions(&destination).unwrap(), (40, 30));
    }

    #[test]
    fn oversized_targets_fail_without_allocating() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let source = temp.path().join("small.jpg");
        let destination = temp.path().join("out.png");
        write_jpeg(&source, 8, 8);

        let backend = NativeBackend::new(Arc::new(EdgeSaliencyFinder::default()));
        assert!(backend.center_crop(&source, &destination, u32::MAX).is_err());
        assert!(backend.salient_crop(&source, &destination, u32::MAX).is_err());
        assert!(backend.fill_crop(&source, &destination, u32::MAX).is_err());
        assert!(backend.smart_crop(&source, &destination, u32::MAX).is_err());
        assert!(!destination.exists());
    }

    #[test]
    fn extreme_aspect_ratios_stay_within_the_fill_budget() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let source = temp.path().join("sliver.png");
        let destination = temp.path().join("out.png");
        RgbImage::new(1, 4000)
            .save_with_format(&source, ImageFormat::Png)
            .expect("write fixture");

        let backend = NativeBackend::new(Arc::new(EdgeSaliencyFinder::default()));
        let err = backend
            .fill_crop(&source, &destination, 8192)
            .expect_err("fill target exceeds the pixel budget");
        assert!(format!("{err:#}").contains("refusing to resize"));
    }

    #[test]
    fn probe_reports_the_encoder() {
        let backend = NativeBackend::new(Arc::new(EdgeSaliencyFinder::default()));
        assert!(backend.probe().is_ok());
    }
}
