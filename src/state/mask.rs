/// Mask authoring surface
///
/// A binary raster the size of the rendered image box. The user paints
/// strokes on it; a stroke is a chain of round brush stamps joined by
/// thick segments, so fast pointer movement never leaves gaps. Covered
/// pixels are 255, uncovered 0. The surface hands the controller only an
/// encoded PNG (or nothing when no paint has been laid down).

use cgmath::{InnerSpace, Point2};
use image::{GrayImage, ImageFormat, Luma};
use std::io::Cursor;

use super::controller::MaskSignal;
use super::data::ImageArtifact;

/// Smallest brush diameter
pub const MIN_BRUSH_SIZE: u32 = 5;
/// Largest brush diameter
pub const MAX_BRUSH_SIZE: u32 = 100;
pub const DEFAULT_BRUSH_SIZE: u32 = 30;

const COVERED: Luma<u8> = Luma([255]);

pub struct MaskSurface {
    raster: GrayImage,
    brush_size: u32,
    /// Last point of the stroke in progress
    last_point: Option<Point2<f32>>,
    painted: bool,
    enabled: bool,
    /// Last clear generation seen from the controller
    seen_clear: u64,
}

impl Default for MaskSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl MaskSurface {
    pub fn new() -> Self {
        Self {
            raster: GrayImage::new(0, 0),
            brush_size: DEFAULT_BRUSH_SIZE,
            last_point: None,
            painted: false,
            enabled: true,
            seen_clear: 0,
        }
    }

    #[cfg(test)]
    pub fn dimensions(&self) -> (u32, u32) {
        self.raster.dimensions()
    }

    pub fn brush_size(&self) -> u32 {
        self.brush_size
    }

    /// Set the brush diameter, clamped to 5..=100
    pub fn set_brush_size(&mut self, size: u32) {
        self.brush_size = size.clamp(MIN_BRUSH_SIZE, MAX_BRUSH_SIZE);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// True when nothing is covered
    pub fn is_empty(&self) -> bool {
        !self.painted
    }

    #[cfg(test)]
    pub fn is_stroking(&self) -> bool {
        self.last_point.is_some()
    }

    /// Whether the pixel at (x, y) is covered. Out of range is uncovered.
    #[cfg(test)]
    pub fn is_covered(&self, x: u32, y: u32) -> bool {
        self.raster
            .get_pixel_checked(x, y)
            .map(|pixel| pixel[0] > 0)
            .unwrap_or(false)
    }

    /// Reinitialize to all uncovered at the given size
    ///
    /// Returns false (and keeps the paint) when the size is unchanged.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if self.raster.dimensions() == (width, height) {
            return false;
        }
        self.raster = GrayImage::new(width, height);
        self.last_point = None;
        self.painted = false;
        true
    }

    /// Reset every pixel to uncovered
    pub fn clear(&mut self) {
        let (width, height) = self.raster.dimensions();
        self.raster = GrayImage::new(width, height);
        self.last_point = None;
        self.painted = false;
    }

    /// Follow the controller: clear when it asked for a clear, and accept
    /// strokes only while it allows painting.
    pub fn sync(&mut self, signal: MaskSignal) {
        if signal.clear_generation != self.seen_clear {
            self.seen_clear = signal.clear_generation;
            self.clear();
        }
        self.enabled = signal.enabled;
        if !self.enabled {
            self.last_point = None;
        }
    }

    /// Start a stroke with a single stamp
    pub fn begin_stroke(&mut self, point: Point2<f32>) {
        if !self.enabled {
            return;
        }
        self.fill_segment(point, point);
        self.last_point = Some(point);
    }

    /// Extend the stroke in progress to `point`
    pub fn continue_stroke(&mut self, point: Point2<f32>) {
        if !self.enabled {
            return;
        }
        let Some(last) = self.last_point else {
            return;
        };
        self.fill_segment(last, point);
        self.last_point = Some(point);
    }

    /// Finish the stroke and serialize the mask
    ///
    /// Returns `Ok(None)` while nothing has been painted.
    pub fn end_stroke(&mut self) -> Result<Option<ImageArtifact>, String> {
        self.last_point = None;
        self.to_artifact()
    }

    /// Encode the raster as a PNG artifact
    pub fn to_artifact(&self) -> Result<Option<ImageArtifact>, String> {
        if !self.painted {
            return Ok(None);
        }
        let mut out = Cursor::new(Vec::new());
        self.raster
            .write_to(&mut out, ImageFormat::Png)
            .map_err(|e| format!("Failed to encode mask: {}", e))?;
        ImageArtifact::from_bytes("image/png", out.into_inner()).map(Some)
    }

    /// Covered spans per row as (y, x_start, x_end_exclusive), for drawing
    pub fn covered_runs(&self) -> Vec<(u32, u32, u32)> {
        let mut runs = Vec::new();
        if !self.painted {
            return runs;
        }
        for (y, row) in self.raster.enumerate_rows() {
            let mut start = None;
            for (x, _, pixel) in row {
                match (pixel[0] > 0, start) {
                    (true, None) => start = Some(x),
                    (false, Some(s)) => {
                        runs.push((y, s, x));
                        start = None;
                    }
                    _ => {}
                }
            }
            if let Some(s) = start {
                runs.push((y, s, self.raster.width()));
            }
        }
        runs
    }

    /// Cover every pixel whose center lies within the brush radius of the
    /// segment a→b. With a == b this is a round stamp.
    fn fill_segment(&mut self, a: Point2<f32>, b: Point2<f32>) {
        let (width, height) = self.raster.dimensions();
        if width == 0 || height == 0 {
            return;
        }
        let radius = self.brush_size as f32 / 2.0;

        let min_x = (a.x.min(b.x) - radius).floor().max(0.0) as u32;
        let min_y = (a.y.min(b.y) - radius).floor().max(0.0) as u32;
        let max_x = (a.x.max(b.x) + radius).ceil().min(width as f32 - 1.0);
        let max_y = (a.y.max(b.y) + radius).ceil().min(height as f32 - 1.0);
        if max_x < 0.0 || max_y < 0.0 {
            return;
        }
        let (max_x, max_y) = (max_x as u32, max_y as u32);

        let radius_sq = radius * radius;
        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let center = Point2::new(x as f32 + 0.5, y as f32 + 0.5);
                if distance_sq_to_segment(center, a, b) <= radius_sq {
                    self.raster.put_pixel(x, y, COVERED);
                    self.painted = true;
                }
            }
        }
    }
}

fn distance_sq_to_segment(p: Point2<f32>, a: Point2<f32>, b: Point2<f32>) -> f32 {
    let ab = b - a;
    let len_sq = ab.magnitude2();
    let t = if len_sq == 0.0 {
        0.0
    } else {
        ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0)
    };
    (p - (a + ab * t)).magnitude2()
}
