//! Model management for ONNX Runtime
//!
//! Handles downloading and caching of the face detector model.

use anyhow::{Context, Result};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::runtime::Runtime;
use tracing::{debug, info};

/// Face detector model variants (UltraFace, 320x240 input)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorModel {
    /// Receptive-field-block variant, more accurate
    #[default]
    Rfb320,
    /// Slim variant, faster
    Slim320,
}

impl DetectorModel {
    /// Get the filename for this model
    pub fn filename(&self) -> &'static str {
        match self {
            DetectorModel::Rfb320 => "ultraface-rfb-320.onnx",
            DetectorModel::Slim320 => "ultraface-slim-320.onnx",
        }
    }

    /// Get the download URL for this model (ONNX model zoo)
    pub fn download_url(&self) -> &'static str {
        match self {
            DetectorModel::Rfb320 => {
                "https://github.com/onnx/models/raw/main/validated/vision/body_analysis/ultraface/models/version-RFB-320.onnx"
            }
            DetectorModel::Slim320 => {
                "https://github.com/onnx/models/raw/main/validated/vision/body_analysis/ultraface/models/version-slim-320.onnx"
            }
        }
    }

    /// Expected file size for integrity check (approximate, in bytes)
    pub fn expected_size_range(&self) -> (u64, u64) {
        match self {
            DetectorModel::Rfb320 => (800_000, 3_000_000),   // ~1.27 MB
            DetectorModel::Slim320 => (600_000, 3_000_000),  // ~1.04 MB
        }
    }

    /// Display name for progress reporting
    pub fn display_name(&self) -> &'static str {
        match self {
            DetectorModel::Rfb320 => "UltraFace RFB-320",
            DetectorModel::Slim320 => "UltraFace slim-320",
        }
    }
}

/// Model manifest tracking downloaded models
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelManifest {
    pub version: String,
    pub models: Vec<ModelInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub filename: String,
    pub size_bytes: u64,
    pub sha256: String,
    pub downloaded_at: u64,
}

impl Default for ModelManifest {
    fn default() -> Self {
        Self {
            version: "1.0.0".to_string(),
            models: Vec::new(),
        }
    }
}

/// Model manager for downloading and caching ONNX models
pub struct ModelManager {
    models_dir: PathBuf,
}

impl ModelManager {
    /// Create a model manager under the application data directory
    pub fn new() -> Result<Self> {
        let data_dir = crate::storage::get_data_dir()?;
        Self::with_dir(data_dir.join("models"))
    }

    /// Create model manager with custom directory
    pub fn with_dir(models_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&models_dir)?;
        Ok(Self { models_dir })
    }

    /// Get the path to a specific model file
    pub fn model_path(&self, model: DetectorModel) -> PathBuf {
        self.models_dir.join(model.filename())
    }

    /// Check if a model is already downloaded
    pub fn is_model_available(&self, model: DetectorModel) -> bool {
        match std::fs::metadata(self.model_path(model)) {
            Ok(metadata) => {
                let (min, max) = model.expected_size_range();
                let size = metadata.len();
                size >= min && size <= max
            }
            Err(_) => false,
        }
    }

    /// Download a model if not already available.
    /// Returns the path to the model file
    pub fn ensure_model(&self, model: DetectorModel) -> Result<PathBuf> {
        let path = self.model_path(model);

        if self.is_model_available(model) {
            debug!("Model {:?} already available at {:?}", model, path);
            return Ok(path);
        }

        let url = model.download_url();
        info!("Downloading {} model from {}", model.display_name(), url);

        if std::env::var("IDCARD_SCANNER_OFFLINE").is_ok() {
            anyhow::bail!(
                "Offline mode: cannot download models. Please download manually from {} and place at {:?}",
                url,
                path
            );
        }

        let rt = Runtime::new().context("Failed to create tokio runtime")?;
        let hash = rt.block_on(download_file(url, &path))?;

        if !self.is_model_available(model) {
            anyhow::bail!("Download completed but model verification failed");
        }

        self.update_manifest(model, hash)?;

        info!("Successfully downloaded {} model", model.display_name());
        Ok(path)
    }

    /// Record a finished download in the manifest
    fn update_manifest(&self, model: DetectorModel, sha256: String) -> Result<()> {
        let mut manifest = self.load_manifest().unwrap_or_default();
        let metadata = std::fs::metadata(self.model_path(model))?;

        let model_info = ModelInfo {
            filename: model.filename().to_string(),
            size_bytes: metadata.len(),
            sha256,
            downloaded_at: unix_now(),
        };

        if let Some(existing) = manifest.models.iter_mut().find(|m| m.filename == model_info.filename) {
            *existing = model_info;
        } else {
            manifest.models.push(model_info);
        }

        self.save_manifest(&manifest)
    }

    /// Load the model manifest
    pub fn load_manifest(&self) -> Result<ModelManifest> {
        let manifest_path = self.models_dir.join("manifest.json");
        if manifest_path.exists() {
            let content = std::fs::read_to_string(&manifest_path)?;
            Ok(serde_json::from_str(&content)?)
        } else {
            Ok(ModelManifest::default())
        }
    }

    /// Save the model manifest
    pub fn save_manifest(&self, manifest: &ModelManifest) -> Result<()> {
        let manifest_path = self.models_dir.join("manifest.json");
        let content = serde_json::to_string_pretty(manifest)?;
        std::fs::write(manifest_path, content)?;
        Ok(())
    }
}

/// Stream a file to `path` through a temp file, returning its sha256
async fn download_file(url: &str, path: &Path) -> Result<String> {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(300))
        .build()
        .context("Failed to create HTTP client")?;

    let response = client
        .get(url)
        .send()
        .await
        .context("Failed to send download request")?;

    if !response.status().is_success() {
        anyhow::bail!("Download failed with status {}: {}", response.status(), url);
    }

    debug!("Download size: {:?} bytes", response.content_length());

    let temp_path = path.with_extension("tmp");
    let mut file = std::fs::File::create(&temp_path).context("Failed to create temp file")?;

    let mut hasher = Sha256::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("Error reading download stream")?;
        file.write_all(&chunk).context("Failed to write to temp file")?;
        hasher.update(&chunk);
    }

    file.flush().context("Failed to flush temp file")?;
    drop(file);

    std::fs::rename(&temp_path, path)
        .context("Failed to move downloaded file to final location")?;

    Ok(format!("{:x}", hasher.finalize()))
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
