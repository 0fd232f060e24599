//! Reference frame the operator calibrates on.

use image::RgbaImage;

use crate::error::CalibrationResult;

/// Decoded first frame of the uploaded video.
///
/// Its natural pixel dimensions define the calibration coordinate space.
#[derive(Debug, Clone)]
pub struct ReferenceFrame {
    image: RgbaImage,
}

impl ReferenceFrame {
    /// Decode an encoded image (JPEG or PNG) as returned by the backend.
    pub fn decode(bytes: &[u8]) -> CalibrationResult<Self> {
        let image = image::load_from_memory(bytes)?.to_rgba8();
        Ok(Self { image })
    }

    pub fn from_image(image: RgbaImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageOutputFormat, Rgba};
    use std::io::Cursor;

    #[test]
    fn test_decode_png_keeps_natural_size() {
        let source = RgbaImage::from_pixel(40, 30, Rgba([10, 20, 30, 255]));
        let mut encoded = Cursor::new(Vec::new());
        source.write_to(&mut encoded, ImageOutputFormat::Png).unwrap();

        let frame = ReferenceFrame::decode(encoded.get_ref()).unwrap();
        assert_eq!(frame.dimensions(), (40, 30));
        assert_eq!(frame.image().get_pixel(0, 0), &Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(ReferenceFrame::decode(b"not an image").is_err());
    }
}
