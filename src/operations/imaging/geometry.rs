use serde::{Deserialize, Serialize};

/// Axis-aligned box inside the source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRegion {
    pub fn is_square(&self) -> bool {
        self.width == self.height
    }

    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.width > 0
            && self.height > 0
            && u64::from(self.x) + u64::from(self.width) <= u64::from(width)
            && u64::from(self.y) + u64::from(self.height) <= u64::from(height)
    }

    /// ImageMagick geometry string, e.g. `1000x1000+500+0`.
    pub fn to_geometry(&self) -> String {
        format!("{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

/// Largest centred square: a band across the longer side.
pub fn center_square(width: u32, height: u32) -> CropRegion {
    if width > height {
        CropRegion {
            x: (width - height) / 2,
            y: 0,
            width: height,
            height,
        }
    } else {
        CropRegion {
            x: 0,
            y: (height - width) / 2,
            width,
            height: width,
        }
    }
}

/// Smallest aspect-preserving size where both sides reach `target`.
pub fn fill_dimensions(width: u32, height: u32, target: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (target, target);
    }
    let (w, h, t) = (u64::from(width), u64::from(height), u64::from(target));
    if width <= height {
        let scaled = (h * t).div_ceil(w).max(t);
        (target, clamp_u32(scaled))
    } else {
        let scaled = (w * t).div_ceil(h).max(t);
        (clamp_u32(scaled), target)
    }
}

/// Centred `target`×`target` window inside a `width`×`height` image.
pub fn center_extent(width: u32, height: u32, target: u32) -> CropRegion {
    CropRegion {
        x: width.saturating_sub(target) / 2,
        y: height.saturating_sub(target) / 2,
        width: target.min(width),
        height: target.min(height),
    }
}

fn clamp_u32(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landscape_crops_a_centred_band() {
        let region = center_square(2000, 1000);
        assert_eq!(
            region,
            CropRegion {
                x: 500,
                y: 0,
                width: 1000,
                height: 1000
            }
        );
        assert_eq!(region.to_geometry(), "1000x1000+500+0");
    }

    #[test]
    fn portrait_crops_vertically() {
        let region = center_square(600, 1001);
        assert_eq!(region.x, 0);
        assert_eq!(region.y, 200);
        assert!(region.is_square());
        assert!(region.fits_within(600, 1001));
    }

    #[test]
    fn square_sources_are_untouched() {
        assert_eq!(
            center_square(512, 512),
            CropRegion {
                x: 0,
                y: 0,
                width: 512,
                height: 512
            }
        );
    }

    #[test]
    fn fill_covers_target_on_both_sides() {
        assert_eq!(fill_dimensions(2000, 1000, 512), (1024, 512));
        assert_eq!(fill_dimensions(300, 1000, 512), (512, 1707));
        assert_eq!(fill_dimensions(100, 100, 512), (512, 512));
    }

    #[test]
    fn extent_is_centred() {
        let region = center_extent(1024, 512, 512);
        assert_eq!(region.x, 256);
        assert_eq!(region.y, 0);
        assert!(region.is_square());
    }
}
