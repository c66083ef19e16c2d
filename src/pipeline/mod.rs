//! Capture cycle coordination
//!
//! Runs one synchronous cycle per capture: recognize text, build the record,
//! locate faces and store one record per face. Collaborators are passed in
//! by reference so each can be replaced independently.

pub mod fanout;

pub use fanout::{fan_out, FanOutReport};

use std::time::Instant;
use tracing::{error, info, info_span, warn};
use uuid::Uuid;

use crate::capture::frame::CapturedFrame;
use crate::capture::CaptureSource;
use crate::document::{extract_record, DocumentRecord, DocumentType, ImageRef};
use crate::error::ScanError;
use crate::storage::RecordSink;
use crate::vision::{FaceCropper, FaceLocator, TextRecognizer};

/// Summary of one completed capture cycle
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// Id used in the cycle's log span
    pub capture_id: Uuid,
    /// Record built from the full capture, before per-face replication
    pub template: DocumentRecord,
    /// Faces reported by the locator
    pub faces_detected: usize,
    /// Face crops written to disk
    pub faces_saved: usize,
    /// Storage outcome
    pub fan_out: FanOutReport,
    /// Wall time for the cycle in milliseconds
    pub processing_time_ms: u64,
}

impl CycleReport {
    pub fn document_type(&self) -> DocumentType {
        self.template.document_type()
    }
}

/// Document scan pipeline with injected collaborators
pub struct ScanPipeline<'a> {
    recognizer: &'a dyn TextRecognizer,
    locator: &'a dyn FaceLocator,
    cropper: &'a FaceCropper,
    sink: &'a mut dyn RecordSink,
    min_fields: usize,
}

impl<'a> ScanPipeline<'a> {
    pub fn new(
        recognizer: &'a dyn TextRecognizer,
        locator: &'a dyn FaceLocator,
        cropper: &'a FaceCropper,
        sink: &'a mut dyn RecordSink,
        min_fields: usize,
    ) -> Self {
        Self {
            recognizer,
            locator,
            cropper,
            sink,
            min_fields,
        }
    }

    /// Capture one image and process it
    pub fn run_cycle(&mut self, source: &mut dyn CaptureSource) -> Result<CycleReport, ScanError> {
        let capture_id = Uuid::new_v4();
        let span = info_span!("capture", id = %capture_id);
        let _guard = span.enter();

        let frame = source.capture()?;
        self.process_frame(capture_id, &frame)
    }

    /// Process an already captured frame
    pub fn process_frame(
        &mut self,
        capture_id: Uuid,
        frame: &CapturedFrame,
    ) -> Result<CycleReport, ScanError> {
        let start = Instant::now();

        let text = self.recognizer.recognize(frame)?;
        info!("Recognized {} lines from {:?}", text.line_count(), frame.source());

        let template = extract_record(text.as_str(), self.min_fields, ImageRef::from(frame.source()));

        let faces = match self.locator.locate(frame) {
            Ok(faces) => faces,
            Err(e) => {
                error!("Face detection failed, treating as no faces: {}", e);
                Vec::new()
            }
        };
        info!("Detected {} faces", faces.len());

        let face_refs = self.cropper.crop_and_save(frame, &faces);
        if face_refs.len() < faces.len() {
            warn!(
                "{} of {} face images could not be saved",
                faces.len() - face_refs.len(),
                faces.len()
            );
        }
        let fan_out = fan_out(&template, &face_refs, &mut *self.sink);

        Ok(CycleReport {
            capture_id,
            template,
            faces_detected: faces.len(),
            faces_saved: face_refs.len(),
            fan_out,
            processing_time_ms: start.elapsed().as_millis() as u64,
        })
    }
}
