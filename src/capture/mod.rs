//! Capture Layer
//!
//! Produces still images of documents. Captures are read from image files,
//! one file per capture cycle.

pub mod frame;

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::CaptureError;
use frame::CapturedFrame;

/// Image extensions picked up when a directory is scanned
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

/// Source of still document images
pub trait CaptureSource {
    /// Produce one still image
    fn capture(&mut self) -> Result<CapturedFrame, CaptureError>;
}

/// Capture source backed by a single image file
#[derive(Debug, Clone)]
pub struct ImageFileSource {
    path: PathBuf,
}

impl ImageFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CaptureSource for ImageFileSource {
    fn capture(&mut self) -> Result<CapturedFrame, CaptureError> {
        if !self.path.exists() {
            return Err(CaptureError::NotFound(self.path.clone()));
        }

        let encoded = std::fs::read(&self.path).map_err(|source| CaptureError::Read {
            path: self.path.clone(),
            source,
        })?;

        let image = image::load_from_memory(&encoded).map_err(|source| CaptureError::Decode {
            path: self.path.clone(),
            source,
        })?;

        debug!(
            "Captured {:?} ({}x{}, {} bytes)",
            self.path,
            image.width(),
            image.height(),
            encoded.len()
        );

        Ok(CapturedFrame::new(image, encoded, self.path.clone()))
    }
}

/// Whether a path has one of the supported image extensions
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Expand directories into their image files (sorted). Plain file paths are
/// kept as given, so a missing file surfaces as a capture failure later.
pub fn collect_image_paths(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut collected = Vec::new();

    for path in paths {
        if !path.is_dir() {
            collected.push(path.clone());
            continue;
        }

        let entries = match std::fs::read_dir(path) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Failed to read directory {:?}: {}", path, e);
                continue;
            }
        };

        let mut images: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && is_image_file(p))
            .collect();
        images.sort();
        collected.extend(images);
    }

    collected
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb, RgbImage};
    use tempfile::TempDir;

    fn write_test_image(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        let img = RgbImage::from_pixel(8, 6, Rgb([200, 100, 50]));
        DynamicImage::ImageRgb8(img).save(&path).unwrap();
        path
    }

    #[test]
    fn test_capture_from_file() {
        let dir = TempDir::new().unwrap();
        let path = write_test_image(dir.path(), "snapshot.png");

        let mut source = ImageFileSource::new(&path);
        let frame = source.capture().unwrap();

        assert_eq!(frame.dimensions(), (8, 6));
        assert_eq!(frame.source(), path.as_path());
        assert!(!frame.encoded.is_empty());
    }

    #[test]
    fn test_capture_missing_file() {
        let mut source = ImageFileSource::new("/nonexistent/snapshot.jpg");
        let result = source.capture();
        assert!(matches!(result, Err(CaptureError::NotFound(_))));
    }

    #[test]
    fn test_capture_undecodable_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"not an image").unwrap();

        let mut source = ImageFileSource::new(&path);
        assert!(matches!(source.capture(), Err(CaptureError::Decode { .. })));
    }

    #[test]
    fn test_is_image_file() {
        assert!(is_image_file(Path::new("a.jpg")));
        assert!(is_image_file(Path::new("a.JPEG")));
        assert!(is_image_file(Path::new("dir/a.png")));
        assert!(!is_image_file(Path::new("a.txt")));
        assert!(!is_image_file(Path::new("noext")));
    }

    #[test]
    fn test_collect_image_paths_expands_directories() {
        let dir = TempDir::new().unwrap();
        let b = write_test_image(dir.path(), "b.png");
        let a = write_test_image(dir.path(), "a.png");
        std::fs::write(dir.path().join("notes.txt"), "skip me").unwrap();

        let explicit = PathBuf::from("/some/explicit.jpg");
        let paths = collect_image_paths(&[dir.path().to_path_buf(), explicit.clone()]);

        assert_eq!(paths, vec![a, b, explicit]);
    }
}
