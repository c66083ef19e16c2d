//! Image preprocessing for the face detector
//!
//! Handles resizing, normalization and tensor conversion for the ONNX model.

use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};
use ndarray::Array4;

/// Preprocessing configuration
#[derive(Debug, Clone)]
pub struct PreprocessConfig {
    /// Model input width
    pub input_width: u32,
    /// Model input height
    pub input_height: u32,
    /// Value subtracted from every channel
    pub mean: f32,
    /// Divisor applied after mean subtraction
    pub std: f32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            input_width: 320,
            input_height: 240,
            // The detector expects (pixel - 127) / 128, roughly [-1, 1]
            mean: 127.0,
            std: 128.0,
        }
    }
}

/// Resize an image to the model input size (aspect ratio is not kept)
pub fn resize_for_detection(image: &DynamicImage, config: &PreprocessConfig) -> RgbImage {
    image::imageops::resize(
        &image.to_rgb8(),
        config.input_width,
        config.input_height,
        FilterType::Triangle,
    )
}

/// Convert an RGB image to a normalized NCHW tensor (batch size 1)
pub fn rgb_to_nchw(image: &RgbImage, mean: f32, std: f32) -> Array4<f32> {
    let (w, h) = image.dimensions();
    let mut tensor = Array4::<f32>::zeros((1, 3, h as usize, w as usize));

    for (x, y, pixel) in image.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = (pixel.0[c] as f32 - mean) / std;
        }
    }

    tensor
}

/// Full preprocessing: resize then normalize into a model input tensor
pub fn prepare_input(image: &DynamicImage, config: &PreprocessConfig) -> Array4<f32> {
    let resized = resize_for_detection(image, config);
    rgb_to_nchw(&resized, config.mean, config.std)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_prepare_input_shape() {
        let image = DynamicImage::ImageRgb8(RgbImage::new(640, 480));
        let tensor = prepare_input(&image, &PreprocessConfig::default());
        assert_eq!(tensor.dim(), (1, 3, 240, 320));
    }

    #[test]
    fn test_rgb_to_nchw_normalization() {
        let mut image = RgbImage::new(2, 1);
        image.put_pixel(0, 0, Rgb([127, 255, 0]));
        image.put_pixel(1, 0, Rgb([0, 0, 0]));

        let tensor = rgb_to_nchw(&image, 127.0, 128.0);

        assert_eq!(tensor.dim(), (1, 3, 1, 2));
        assert!((tensor[[0, 0, 0, 0]] - 0.0).abs() < 1e-6);
        assert!((tensor[[0, 1, 0, 0]] - 1.0).abs() < 1e-6);
        assert!((tensor[[0, 2, 0, 0]] + 127.0 / 128.0).abs() < 1e-6);
        assert!((tensor[[0, 0, 0, 1]] + 127.0 / 128.0).abs() < 1e-6);
    }

    #[test]
    fn test_resize_for_detection() {
        let image = DynamicImage::ImageRgb8(RgbImage::new(100, 50));
        let config = PreprocessConfig {
            input_width: 32,
            input_height: 24,
            ..Default::default()
        };
        assert_eq!(resize_for_detection(&image, &config).dimensions(), (32, 24));
    }
}
