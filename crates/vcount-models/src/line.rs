//! Counting line geometry in reference-frame pixel space.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, ValidationResult};

/// A point in native reference-frame pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PixelPoint {
    pub x: f64,
    pub y: f64,
}

impl PixelPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance_to(&self, other: &PixelPoint) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Check the point lies within `[0,width) x [0,height)`.
    pub fn is_within(&self, width: u32, height: u32) -> bool {
        self.x >= 0.0 && self.y >= 0.0 && self.x < width as f64 && self.y < height as f64
    }
}

/// Directed line segment the backend counts crossings against.
///
/// Coordinates are in the native resolution of the reference frame, never
/// the on-screen scaled size, so the line can be sent to the backend as is.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CountingLine {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl CountingLine {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Build a line running from `start` to `end`.
    pub fn from_points(start: PixelPoint, end: PixelPoint) -> Self {
        Self::new(start.x, start.y, end.x, end.y)
    }

    pub fn start(&self) -> PixelPoint {
        PixelPoint::new(self.x1, self.y1)
    }

    pub fn end(&self) -> PixelPoint {
        PixelPoint::new(self.x2, self.y2)
    }

    pub fn length(&self) -> f64 {
        self.start().distance_to(&self.end())
    }

    pub fn midpoint(&self) -> PixelPoint {
        PixelPoint::new((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    /// Both endpoints are the same pixel.
    pub fn is_degenerate(&self) -> bool {
        self.start() == self.end()
    }

    /// Validate the line on its own (distinct endpoints).
    pub fn validate(&self) -> ValidationResult<()> {
        if self.is_degenerate() {
            return Err(ValidationError::ZeroLengthLine);
        }
        Ok(())
    }

    /// Validate the line against the reference frame it was drawn on.
    pub fn validate_within(&self, width: u32, height: u32) -> ValidationResult<()> {
        self.validate()?;
        for point in [self.start(), self.end()] {
            if !point.is_within(width, height) {
                return Err(ValidationError::LineOutOfBounds {
                    x: point.x,
                    y: point.y,
                    width,
                    height,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_endpoints_and_length() {
        let line = CountingLine::new(0.0, 0.0, 30.0, 40.0);
        assert_eq!(line.start(), PixelPoint::new(0.0, 0.0));
        assert_eq!(line.end(), PixelPoint::new(30.0, 40.0));
        assert!((line.length() - 50.0).abs() < 1e-9);
        assert_eq!(line.midpoint(), PixelPoint::new(15.0, 20.0));
    }

    #[test]
    fn test_zero_length_line_rejected() {
        let line = CountingLine::new(12.0, 12.0, 12.0, 12.0);
        assert!(line.is_degenerate());
        assert_eq!(line.validate(), Err(ValidationError::ZeroLengthLine));
    }

    #[test]
    fn test_line_bounds() {
        let line = CountingLine::new(10.0, 10.0, 200.0, 150.0);
        assert!(line.validate_within(400, 300).is_ok());

        // Width itself is outside the half-open range
        let line = CountingLine::new(10.0, 10.0, 400.0, 150.0);
        assert!(matches!(
            line.validate_within(400, 300),
            Err(ValidationError::LineOutOfBounds { x, .. }) if x == 400.0
        ));
    }

    #[test]
    fn test_line_serializes_flat() {
        let line = CountingLine::new(10.0, 10.0, 200.0, 150.0);
        let json = serde_json::to_value(line).unwrap();
        assert_eq!(json["x1"], 10.0);
        assert_eq!(json["y2"], 150.0);
    }
}
