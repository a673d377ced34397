//! Content-aware crop selection.
//!
//! Each pixel of a downscaled working copy is scored by local detail (Laplacian of
//! luminance), skin-tone likelihood and colour saturation. Candidate windows with the
//! requested aspect ratio slide over the score grid; every cell is weighted by an
//! importance map that favours the window centre and penalises detail left outside
//! the window. The best window is mapped back to source coordinates.

use anyhow::{Result, bail};
use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};

use super::geometry::CropRegion;

pub trait SaliencyFinder: Send + Sync {
    /// Best region with the aspect ratio of `target_width`×`target_height`.
    fn find(&self, image: &RgbImage, target_width: u32, target_height: u32) -> Result<CropRegion>;
}

#[derive(Debug, Clone)]
pub struct EdgeSaliencyFinder {
    pub working_size: u32,
    pub cell_size: u32,
    pub step: u32,
    pub scales: Vec<f64>,
    pub detail_weight: f64,
    pub skin_weight: f64,
    pub saturation_weight: f64,
    pub edge_radius: f64,
    pub edge_weight: f64,
    pub outside_importance: f64,
}

impl Default for EdgeSaliencyFinder {
    fn default() -> Self {
        Self {
            working_size: 256,
            cell_size: 4,
            step: 8,
            scales: vec![1.0, 0.9],
            detail_weight: 0.2,
            skin_weight: 1.8,
            saturation_weight: 0.3,
            edge_radius: 0.4,
            edge_weight: -20.0,
            outside_importance: -0.5,
        }
    }
}

const SKIN_COLOR: [f64; 3] = [0.78, 0.57, 0.44];
const SKIN_THRESHOLD: f64 = 0.8;
const SATURATION_THRESHOLD: f64 = 0.4;

struct ScoreGrid {
    columns: u32,
    rows: u32,
    cell_size: u32,
    cells: Vec<f64>,
}

impl ScoreGrid {
    fn at(&self, column: u32, row: u32) -> f64 {
        self.cells[(row * self.columns + column) as usize]
    }
}

impl SaliencyFinder for EdgeSaliencyFinder {
    fn find(&self, image: &RgbImage, target_width: u32, target_height: u32) -> Result<CropRegion> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            bail!("cannot search an empty {}x{} image", width, height);
        }
        if target_width == 0 || target_height == 0 {
            bail!("target size must be positive");
        }

        let working = self.working_copy(image);
        let (work_width, work_height) = working.dimensions();
        let grid = self.score_grid(&working);

        let aspect = f64::from(target_width) / f64::from(target_height);
        let base_width = f64::from(work_width).min(f64::from(work_height) * aspect);
        let base_height = base_width / aspect;

        let mut best: Option<(f64, CropRegion)> = None;
        for &scale in &self.scales {
            let crop_width = ((base_width * scale).floor() as u32).clamp(1, work_width);
            let crop_height = ((base_height * scale).floor() as u32).clamp(1, work_height);
            for y in positions(work_height - crop_height, self.step) {
                for x in positions(work_width - crop_width, self.step) {
                    let candidate = CropRegion {
                        x,
                        y,
                        width: crop_width,
                        height: crop_height,
                    };
                    let score = self.score(&grid, &candidate);
                    if best.is_none_or(|(top, _)| score > top) {
                        best = Some((score, candidate));
                    }
                }
            }
        }

        let Some((_, region)) = best else {
            bail!("no candidate crop windows for {}x{}", width, height);
        };
        Ok(scale_region(region, (work_width, work_height), (width, height), aspect))
    }
}

impl EdgeSaliencyFinder {
    fn working_copy(&self, image: &RgbImage) -> RgbImage {
        let (width, height) = image.dimensions();
        if width.max(height) <= self.working_size {
            return image.clone();
        }
        DynamicImage::ImageRgb8(image.clone())
            .resize(self.working_size, self.working_size, FilterType::Triangle)
            .to_rgb8()
    }

    fn score_grid(&self, image: &RgbImage) -> ScoreGrid {
        let (width, height) = image.dimensions();
        let cell_size = self.cell_size.max(1);
        let columns = width.div_ceil(cell_size);
        let rows = height.div_ceil(cell_size);
        let mut cells = vec![0.0; (columns * rows) as usize];

        let lightness: Vec<f64> = image.pixels().map(|p| cie_lightness(p.0)).collect();
        let light_at = |x: u32, y: u32| lightness[(y * width + x) as usize];

        for (x, y, pixel) in image.enumerate_pixels() {
            let rgb = pixel.0.map(|c| f64::from(c) / 255.0);
            let light = light_at(x, y);

            let detail = if x == 0 || y == 0 || x + 1 == width || y + 1 == height {
                0.0
            } else {
                (4.0 * light
                    - light_at(x - 1, y)
                    - light_at(x + 1, y)
                    - light_at(x, y - 1)
                    - light_at(x, y + 1))
                .abs()
            };

            let skin = skin_likelihood(rgb);
            let skin = if skin > SKIN_THRESHOLD && (0.2..=1.0).contains(&light) {
                (skin - SKIN_THRESHOLD) / (1.0 - SKIN_THRESHOLD)
            } else {
                0.0
            };

            let saturation = saturation(rgb);
            let saturation = if saturation > SATURATION_THRESHOLD && (0.05..=0.9).contains(&light)
            {
                (saturation - SATURATION_THRESHOLD) / (1.0 - SATURATION_THRESHOLD)
            } else {
                0.0
            };

            let score = detail * self.detail_weight
                + skin * self.skin_weight
                + saturation * self.saturation_weight;
            let cell = (y / cell_size) * columns + x / cell_size;
            cells[cell as usize] += score;
        }

        ScoreGrid {
            columns,
            rows,
            cell_size,
            cells,
        }
    }

    fn score(&self, grid: &ScoreGrid, crop: &CropRegion) -> f64 {
        let half = f64::from(grid.cell_size) / 2.0;
        let mut total = 0.0;
        for row in 0..grid.rows {
            for column in 0..grid.columns {
                let value = grid.at(column, row);
                if value == 0.0 {
                    continue;
                }
                let x = f64::from(column * grid.cell_size) + half;
                let y = f64::from(row * grid.cell_size) + half;
                total += value * self.importance(crop, x, y);
            }
        }
        total / (f64::from(crop.width) * f64::from(crop.height))
    }

    fn importance(&self, crop: &CropRegion, x: f64, y: f64) -> f64 {
        let (left, top) = (f64::from(crop.x), f64::from(crop.y));
        let (width, height) = (f64::from(crop.width), f64::from(crop.height));
        if x < left || x >= left + width || y < top || y >= top + height {
            return self.outside_importance;
        }
        let px = ((x - left) / width - 0.5).abs() * 2.0;
        let py = ((y - top) / height - 0.5).abs() * 2.0;
        let dx = (px - 1.0 + self.edge_radius).max(0.0);
        let dy = (py - 1.0 + self.edge_radius).max(0.0);
        let edge = (dx * dx + dy * dy) * self.edge_weight;
        1.41 - (px * px + py * py).sqrt() + edge
    }
}

/// Offsets `0, step, 2*step, ..` always ending exactly at `max`.
fn positions(max: u32, step: u32) -> Vec<u32> {
    let mut offsets: Vec<u32> = (0..=max).step_by(step.max(1) as usize).collect();
    if offsets.last() != Some(&max) {
        offsets.push(max);
    }
    offsets
}

fn scale_region(
    region: CropRegion,
    working: (u32, u32),
    source: (u32, u32),
    aspect: f64,
) -> CropRegion {
    let factor = f64::from(source.0) / f64::from(working.0);
    let max_width = f64::from(source.0).min(f64::from(source.1) * aspect);
    let width = (f64::from(region.width) * factor)
        .round()
        .clamp(1.0, max_width.max(1.0));
    let height = (width / aspect).round().clamp(1.0, f64::from(source.1));
    let (width, height) = (width as u32, height as u32);

    let x = ((f64::from(region.x) * factor).round() as u32).min(source.0 - width);
    let y = ((f64::from(region.y) * factor).round() as u32).min(source.1 - height);
    CropRegion {
        x,
        y,
        width,
        height,
    }
}

fn cie_lightness(rgb: [u8; 3]) -> f64 {
    (0.2126 * f64::from(rgb[0]) + 0.7152 * f64::from(rgb[1]) + 0.0722 * f64::from(rgb[2]))
        / 255.0
}

fn skin_likelihood(rgb: [f64; 3]) -> f64 {
    let magnitude = (rgb[0] * rgb[0] + rgb[1] * rgb[1] + rgb[2] * rgb[2]).sqrt();
    if magnitude == 0.0 {
        return 0.0;
    }
    let distance = rgb
        .iter()
        .zip(SKIN_COLOR)
        .map(|(channel, skin)| (channel / magnitude - skin).powi(2))
        .sum::<f64>()
        .sqrt();
    1.0 - distance
}

fn saturation(rgb: [f64; 3]) -> f64 {
    let max = rgb[0].max(rgb[1]).max(rgb[2]);
    let min = rgb[0].min(rgb[1]).min(rgb[2]);
    if max == min {
        return 0.0;
    }
    let lightness = (max + min) / 2.0;
    let delta = max - min;
    if lightness > 0.5 {
        delta / (2.0 - max - min)
    } else {
        delta / (max + min)
    }
}
