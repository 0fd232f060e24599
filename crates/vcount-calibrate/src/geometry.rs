//! Display-to-native coordinate mapping.

use vcount_models::PixelPoint;

use crate::error::{CalibrationError, CalibrationResult};

/// A pointer position relative to the displayed element's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayPoint {
    pub x: f64,
    pub y: f64,
}

impl DisplayPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// On-screen size of the reference frame, after any CSS-style scaling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplaySize {
    pub width: f64,
    pub height: f64,
}

impl DisplaySize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Displayed at natural size.
    pub fn native(width: u32, height: u32) -> Self {
        Self::new(width as f64, height as f64)
    }
}

/// Maps display positions into native image pixels using the ratio
/// `native / displayed` per axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleMapping {
    native_width: u32,
    native_height: u32,
    display: DisplaySize,
}

impl ScaleMapping {
    pub fn new(native_width: u32, native_height: u32, display: DisplaySize) -> CalibrationResult<Self> {
        let valid = |v: f64| v.is_finite() && v > 0.0;
        if !valid(display.width) || !valid(display.height) {
            return Err(CalibrationError::InvalidDisplaySize {
                width: display.width,
                height: display.height,
            });
        }
        Ok(Self {
            native_width,
            native_height,
            display,
        })
    }

    pub fn scale_x(&self) -> f64 {
        self.native_width as f64 / self.display.width
    }

    pub fn scale_y(&self) -> f64 {
        self.native_height as f64 / self.display.height
    }

    pub fn display(&self) -> DisplaySize {
        self.display
    }

    /// Transform a display position into native pixels.
    ///
    /// Positions outside `[0,width) x [0,height)` of the displayed element are
    /// rejected, so every mapped point lies inside the native image.
    pub fn to_native(&self, point: DisplayPoint) -> CalibrationResult<PixelPoint> {
        let inside = point.x >= 0.0
            && point.y >= 0.0
            && point.x < self.display.width
            && point.y < self.display.height;
        if !inside {
            return Err(CalibrationError::OutOfBounds {
                x: point.x,
                y: point.y,
                width: self.display.width,
                height: self.display.height,
            });
        }

        let x = clamp_below(point.x * self.scale_x(), self.native_width);
        let y = clamp_below(point.y * self.scale_y(), self.native_height);
        Ok(PixelPoint::new(x, y))
    }
}

/// Rounding can push a point just inside the display edge onto the native edge.
fn clamp_below(value: f64, limit: u32) -> f64 {
    let limit = limit as f64;
    if value >= limit {
        (limit - 1e-6).max(0.0)
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaled_display_maps_to_native() {
        let mapping = ScaleMapping::new(400, 300, DisplaySize::new(800.0, 600.0)).unwrap();
        assert_eq!(mapping.scale_x(), 0.5);
        assert_eq!(
            mapping.to_native(DisplayPoint::new(400.0, 300.0)).unwrap(),
            PixelPoint::new(200.0, 150.0)
        );
    }

    #[test]
    fn test_mapping_matches_ratio_for_many_sizes() {
        let displays = [(400.0, 300.0), (640.0, 480.0), (333.0, 250.0), (1280.0, 720.0)];
        let natives = [(400u32, 300u32), (1920, 1080), (320, 240)];
        let clicks = [(0.0, 0.0), (1.5, 2.25), (100.0, 80.0), (199.9, 149.9)];

        for (dw, dh) in displays {
            for (nw, nh) in natives {
                let mapping = ScaleMapping::new(nw, nh, DisplaySize::new(dw, dh)).unwrap();
                for (cx, cy) in clicks {
                    let mapped = mapping.to_native(DisplayPoint::new(cx, cy)).unwrap();
                    assert_eq!(mapped.x, cx * (nw as f64 / dw));
                    assert_eq!(mapped.y, cy * (nh as f64 / dh));
                    assert!(mapped.is_within(nw, nh));
                }
            }
        }
    }

    #[test]
    fn test_outside_display_rejected() {
        let mapping = ScaleMapping::new(400, 300, DisplaySize::native(400, 300)).unwrap();
        assert!(matches!(
            mapping.to_native(DisplayPoint::new(400.0, 10.0)),
            Err(CalibrationError::OutOfBounds { .. })
        ));
        assert!(mapping.to_native(DisplayPoint::new(-1.0, 10.0)).is_err());
    }

    #[test]
    fn test_zero_display_size_rejected() {
        assert!(matches!(
            ScaleMapping::new(400, 300, DisplaySize::new(0.0, 300.0)),
            Err(CalibrationError::InvalidDisplaySize { .. })
        ));
    }
}
