//! Drawing surfaces the calibrator renders onto.

use std::path::Path;

use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;
use tracing::debug;

use vcount_models::PixelPoint;

use crate::error::CalibrationResult;
use crate::frame::ReferenceFrame;

/// Line style for a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stroke {
    /// Live preview while the second point is pending
    Dashed,
    /// Confirmed counting line
    Solid,
}

/// Rendering target in native reference-frame pixels.
pub trait Surface {
    /// Replace everything drawn so far with the bare frame.
    fn draw_frame(&mut self, frame: &ReferenceFrame);

    fn draw_segment(&mut self, from: PixelPoint, to: PixelPoint, stroke: Stroke);

    fn draw_marker(&mut self, at: PixelPoint);

    fn draw_label(&mut self, text: &str, at: PixelPoint);
}

const PREVIEW_COLOR: Rgba<u8> = Rgba([255, 214, 0, 255]);
const LINE_COLOR: Rgba<u8> = Rgba([230, 30, 30, 255]);
const LABEL_COLOR: Rgba<u8> = Rgba([20, 20, 20, 220]);

const DASH_ON: f32 = 8.0;
const DASH_OFF: f32 = 6.0;
const MARKER_RADIUS: i32 = 4;
const LABEL_CHAR_WIDTH: u32 = 7;
const LABEL_HEIGHT: u32 = 14;

/// In-memory RGBA canvas.
///
/// Labels are drawn as a badge behind the anchor point and recorded so the
/// caller can print them next to a saved preview.
#[derive(Debug, Clone)]
pub struct RasterSurface {
    canvas: RgbaImage,
    labels: Vec<(String, PixelPoint)>,
}

impl Default for RasterSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl RasterSurface {
    pub fn new() -> Self {
        Self {
            canvas: RgbaImage::new(0, 0),
            labels: Vec::new(),
        }
    }

    pub fn canvas(&self) -> &RgbaImage {
        &self.canvas
    }

    pub fn labels(&self) -> &[(String, PixelPoint)] {
        &self.labels
    }

    /// Write the current canvas as an image (format from the extension).
    pub fn save(&self, path: impl AsRef<Path>) -> CalibrationResult<()> {
        let path = path.as_ref();
        self.canvas.save(path)?;
        debug!(path = %path.display(), "Saved calibration preview");
        Ok(())
    }

    fn thick_segment(&mut self, from: (f32, f32), to: (f32, f32), color: Rgba<u8>) {
        for offset in [-1.0f32, 0.0, 1.0] {
            draw_line_segment_mut(
                &mut self.canvas,
                (from.0 + offset, from.1),
                (to.0 + offset, to.1),
                color,
            );
            draw_line_segment_mut(
                &mut self.canvas,
                (from.0, from.1 + offset),
                (to.0, to.1 + offset),
                color,
            );
        }
    }
}

impl Surface for RasterSurface {
    fn draw_frame(&mut self, frame: &ReferenceFrame) {
        self.canvas = frame.image().clone();
        self.labels.clear();
    }

    fn draw_segment(&mut self, from: PixelPoint, to: PixelPoint, stroke: Stroke) {
        let start = (from.x as f32, from.y as f32);
        let end = (to.x as f32, to.y as f32);

        match stroke {
            Stroke::Solid => self.thick_segment(start, end, LINE_COLOR),
            Stroke::Dashed => {
                let length = from.distance_to(&to) as f32;
                if length == 0.0 {
                    return;
                }
                let (dx, dy) = ((end.0 - start.0) / length, (end.1 - start.1) / length);
                let mut travelled = 0.0;
                while travelled < length {
                    let dash_end = (travelled + DASH_ON).min(length);
                    self.thick_segment(
                        (start.0 + dx * travelled, start.1 + dy * travelled),
                        (start.0 + dx * dash_end, start.1 + dy * dash_end),
                        PREVIEW_COLOR,
                    );
                    travelled = dash_end + DASH_OFF;
                }
            }
        }
    }

    fn draw_marker(&mut self, at: PixelPoint) {
        draw_filled_circle_mut(
            &mut self.canvas,
            (at.x as i32, at.y as i32),
            MARKER_RADIUS,
            PREVIEW_COLOR,
        );
    }

    fn draw_label(&mut self, text: &str, at: PixelPoint) {
        let width = (text.chars().count() as u32).max(1) * LABEL_CHAR_WIDTH + 6;
        let rect = Rect::at(at.x as i32 + 6, at.y as i32 - LABEL_HEIGHT as i32 - 4)
            .of_size(width, LABEL_HEIGHT);
        draw_filled_rect_mut(&mut self.canvas, rect, LABEL_COLOR);
        self.labels.push((text.to_string(), at));
    }
}
