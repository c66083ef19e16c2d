//! Face detection module
//!
//! Locates faces in a captured document with an ONNX face detector and
//! writes one cropped image per face.

use anyhow::{Context, Result};
use image::Rgb;
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::TensorRef;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};

use super::preprocess::{prepare_input, PreprocessConfig};
use crate::capture::frame::CapturedFrame;
use crate::config::FaceSettings;
use crate::document::ImageRef;
use crate::error::DetectionError;

/// A face rectangle in source image pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Detector confidence (0.0 - 1.0)
    pub confidence: f32,
}

impl FaceRegion {
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Intersection over union with another region
    pub fn iou(&self, other: &FaceRegion) -> f32 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);

        if x2 <= x1 || y2 <= y1 {
            return 0.0;
        }

        let intersection = (x2 - x1) as u64 * (y2 - y1) as u64;
        let union = self.area() + other.area() - intersection;
        intersection as f32 / union as f32
    }
}

/// Finds faces in a captured image
pub trait FaceLocator {
    /// Face regions in detection order, possibly empty
    fn locate(&self, frame: &CapturedFrame) -> Result<Vec<FaceRegion>, DetectionError>;
}

/// Detection filter settings
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub score_threshold: f32,
    pub iou_threshold: f32,
    pub min_face_size: u32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            score_threshold: 0.7,
            iou_threshold: 0.3,
            min_face_size: 50,
        }
    }
}

impl From<&FaceSettings> for DetectorConfig {
    fn from(settings: &FaceSettings) -> Self {
        Self {
            score_threshold: settings.score_threshold,
            iou_threshold: settings.iou_threshold,
            min_face_size: settings.min_face_size,
        }
    }
}

/// UltraFace detector running on ONNX Runtime
///
/// Outputs are `scores` (N x 2, background/face) and `boxes` (N x 4,
/// normalized corner coordinates).
pub struct UltraFaceLocator {
    session: Mutex<Session>,
    input_name: String,
    scores_output: String,
    boxes_output: String,
    config: DetectorConfig,
    preprocess: PreprocessConfig,
}

impl UltraFaceLocator {
    /// Load the detector model
    pub fn new(model_path: &Path, config: DetectorConfig) -> Result<Self> {
        info!("Loading face detector from {:?}", model_path);

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(model_path)
            .context("Failed to load ONNX model")?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .context("Face detector model has no inputs")?;

        let output_names: Vec<String> = session
            .outputs
            .iter()
            .map(|output| output.name.clone())
            .collect();

        let pick = |wanted: &str, fallback: usize| -> Result<String> {
            output_names
                .iter()
                .find(|name| name.as_str() == wanted)
                .or_else(|| output_names.get(fallback))
                .cloned()
                .with_context(|| format!("Face detector model has no '{}' output", wanted))
        };
        let scores_output = pick("scores", 0)?;
        let boxes_output = pick("boxes", 1)?;

        info!(
            "Face detector loaded. Input: {}, Outputs: {:?}",
            input_name, output_names
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            scores_output,
            boxes_output,
            config,
            preprocess: PreprocessConfig::default(),
        })
    }
}

impl FaceLocator for UltraFaceLocator {
    fn locate(&self, frame: &CapturedFrame) -> Result<Vec<FaceRegion>, DetectionError> {
        let start = Instant::now();
        let (width, height) = frame.dimensions();

        let input = prepare_input(&frame.image, &self.preprocess);
        let tensor = TensorRef::from_array_view(input.view())?;

        let mut session = self.session.lock();
        let outputs = session.run(ort::inputs![self.input_name.as_str() => tensor])?;

        let (_, scores) = outputs[self.scores_output.as_str()].try_extract_tensor::<f32>()?;
        let (_, boxes) = outputs[self.boxes_output.as_str()].try_extract_tensor::<f32>()?;

        let faces = decode_detections(scores, boxes, width, height, &self.config)?;

        debug!(
            "Face detection complete in {:?}: {} faces",
            start.elapsed(),
            faces.len()
        );

        Ok(faces)
    }
}

/// Turn raw detector output into filtered face regions in image pixels
pub fn decode_detections(
    scores: &[f32],
    boxes: &[f32],
    width: u32,
    height: u32,
    config: &DetectorConfig,
) -> Result<Vec<FaceRegion>, DetectionError> {
    let count = scores.len() / 2;
    if scores.len() % 2 != 0 || boxes.len() != count * 4 {
        return Err(DetectionError::Output(format!(
            "{} scores do not match {} box coordinates",
            scores.len(),
            boxes.len()
        )));
    }

    let w = width as f32;
    let h = height as f32;
    let mut candidates = Vec::new();

    for i in 0..count {
        let confidence = scores[i * 2 + 1];
        if confidence < config.score_threshold {
            continue;
        }

        let x1 = (boxes[i * 4] * w).clamp(0.0, w);
        let y1 = (boxes[i * 4 + 1] * h).clamp(0.0, h);
        let x2 = (boxes[i * 4 + 2] * w).clamp(0.0, w);
        let y2 = (boxes[i * 4 + 3] * h).clamp(0.0, h);

        if x2 <= x1 || y2 <= y1 {
            continue;
        }

        let region = FaceRegion {
            x: x1 as u32,
            y: y1 as u32,
            width: (x2 - x1) as u32,
            height: (y2 - y1) as u32,
            confidence,
        };

        if region.width < config.min_face_size || region.height < config.min_face_size {
            continue;
        }

        candidates.push(region);
    }

    Ok(non_maximum_suppression(candidates, config.iou_threshold))
}

/// Keep the most confident region of each overlapping group
fn non_maximum_suppression(mut regions: Vec<FaceRegion>, iou_threshold: f32) -> Vec<FaceRegion> {
    regions.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<FaceRegion> = Vec::new();
    for region in regions {
        if kept.iter().all(|k| k.iou(&region) <= iou_threshold) {
            kept.push(region);
        }
    }
    kept
}

/// Writes cropped face images next to each other in one directory
#[derive(Debug, Clone)]
pub struct FaceCropper {
    output_dir: PathBuf,
    save_annotated: bool,
}

impl FaceCropper {
    pub fn new(output_dir: PathBuf, save_annotated: bool) -> Result<Self> {
        std::fs::create_dir_all(&output_dir)
            .with_context(|| format!("Failed to create face directory {:?}", output_dir))?;
        Ok(Self {
            output_dir,
            save_annotated,
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Crop and save each face. Returns refs for the crops that were written;
    /// a face whose image cannot be written is skipped.
    pub fn crop_and_save(&self, frame: &CapturedFrame, faces: &[FaceRegion]) -> Vec<ImageRef> {
        let stamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let (img_w, img_h) = frame.dimensions();
        let mut refs = Vec::with_capacity(faces.len());

        for (i, face) in faces.iter().enumerate() {
            let x = face.x.min(img_w);
            let y = face.y.min(img_h);
            let width = face.width.min(img_w - x);
            let height = face.height.min(img_h - y);
            if width == 0 || height == 0 {
                warn!("Face {} lies outside the image, skipping", i);
                continue;
            }

            let path = self.output_dir.join(format!("face_{}_{}.jpg", i, stamp));
            let crop = frame.image.crop_imm(x, y, width, height).to_rgb8();

            match crop.save(&path) {
                Ok(()) => {
                    info!("Saved face image {:?}", path);
                    refs.push(ImageRef::from(path.as_path()));
                }
                Err(e) => error!("Could not save face image {:?}: {}", path, e),
            }
        }

        if self.save_annotated && !faces.is_empty() {
            if let Err(e) = self.save_annotated_copy(frame, faces) {
                warn!("Failed to save annotated capture: {}", e);
            }
        }

        refs
    }

    /// Write the capture with every face outlined
    fn save_annotated_copy(&self, frame: &CapturedFrame, faces: &[FaceRegion]) -> Result<PathBuf> {
        let mut canvas = frame.image.to_rgb8();
        for face in faces.iter().filter(|f| f.width > 0 && f.height > 0) {
            let rect = Rect::at(face.x as i32, face.y as i32).of_size(face.width, face.height);
            draw_hollow_rect_mut(&mut canvas, rect, Rgb([0, 255, 0]));
        }

        let stem = frame
            .source()
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("capture");
        let path = self.output_dir.join(format!("{}_faces.jpg", stem));
        canvas.save(&path)?;
        debug!("Saved annotated capture {:?}", path);
        Ok(path)
    }
}
