//! Vision Layer
//!
//! Text recognition and face location on captured document images.
//! - Text recognition through a remote `images:annotate` service
//! - Face detection with an UltraFace model via ONNX Runtime

pub mod detection;
pub mod models;
pub mod preprocess;
pub mod recognition;

pub use detection::{DetectorConfig, FaceCropper, FaceLocator, FaceRegion, UltraFaceLocator};
pub use models::{DetectorModel, ModelManager};
pub use recognition::{RecognizedText, StaticTextRecognizer, TextRecognizer, VisionApiRecognizer};
