//! Application Configuration
//!
//! Scanner settings stored in TOML format.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::document::MIN_FIELDS;
use crate::vision::DetectorModel;

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Text recognition service settings
    pub recognition: RecognitionSettings,
    /// Face detection and crop settings
    pub faces: FaceSettings,
    /// Record storage settings
    pub storage: StorageSettings,
    /// Field extraction settings
    pub document: DocumentSettings,
}

/// Text recognition service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionSettings {
    /// `images:annotate` endpoint URL
    pub endpoint: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Language hints passed to the service (e.g. "ko")
    pub language_hints: Vec<String>,
}

impl Default for RecognitionSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://vision.googleapis.com/v1/images:annotate".to_string(),
            api_key_env: "GOOGLE_API_KEY".to_string(),
            timeout_secs: 30,
            language_hints: vec!["ko".to_string()],
        }
    }
}

/// Face detection and crop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceSettings {
    /// Detector model variant to download
    pub model: DetectorModel,
    /// Detector model file; overrides `model` when set
    pub model_path: Option<PathBuf>,
    /// Minimum detector confidence (0.0 - 1.0)
    pub score_threshold: f32,
    /// Overlap above which two detections are merged (0.0 - 1.0)
    pub iou_threshold: f32,
    /// Smallest accepted face edge in pixels
    pub min_face_size: u32,
    /// Directory for cropped face images; `<data dir>/faces` when unset
    pub output_dir: Option<PathBuf>,
    /// Also write a copy of the capture with detected faces outlined
    pub save_annotated: bool,
}

impl Default for FaceSettings {
    fn default() -> Self {
        Self {
            model: DetectorModel::default(),
            model_path: None,
            score_threshold: 0.7,
            iou_threshold: 0.3,
            min_face_size: 50,
            output_dir: None,
            save_annotated: false,
        }
    }
}

/// Record storage settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// SQLite database file; `<data dir>/idcards.db` when unset
    pub database_path: Option<PathBuf>,
}

/// Field extraction settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentSettings {
    /// Minimum number of field positions after normalization.
    /// Values below [`MIN_FIELDS`] are raised to it.
    pub min_fields: usize,
}

impl Default for DocumentSettings {
    fn default() -> Self {
        Self {
            min_fields: MIN_FIELDS,
        }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
