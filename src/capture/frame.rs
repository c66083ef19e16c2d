//! Frame data structures for captured document images

use image::DynamicImage;
use std::path::{Path, PathBuf};

/// A captured still image of a document
#[derive(Debug)]
pub struct CapturedFrame {
    /// Decoded image
    pub image: DynamicImage,
    /// Encoded bytes as captured (sent to the recognition service unchanged)
    pub encoded: Vec<u8>,
    /// Where the capture is stored
    pub source: PathBuf,
}

impl CapturedFrame {
    /// Create a new captured frame
    pub fn new(image: DynamicImage, encoded: Vec<u8>, source: PathBuf) -> Self {
        Self {
            image,
            encoded,
            source,
        }
    }

    /// Get frame dimensions as (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }

    /// Path of the stored capture
    pub fn source(&self) -> &Path {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn test_frame_dimensions() {
        let image = DynamicImage::ImageRgb8(RgbImage::new(64, 48));
        let frame = CapturedFrame::new(image, vec![], PathBuf::from("snapshot.jpg"));

        assert_eq!(frame.dimensions(), (64, 48));
        assert_eq!(frame.source(), Path::new("snapshot.jpg"));
    }
}
