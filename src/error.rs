//! Error types for a capture cycle
//!
//! Each collaborator has its own error type; `ScanError` is what aborts a
//! cycle. Face detection and storage errors never abort a cycle on their own,
//! the pipeline logs them and carries on.

use std::path::PathBuf;
use thiserror::Error;

/// No still image could be produced
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Image not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read image {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode image {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// The recognition service produced no usable text
#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error("Recognition request timed out after {0}s")]
    Timeout(u64),

    #[error("Recognition request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Recognition service returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Recognition service error {code}: {message}")]
    Service { code: i32, message: String },

    #[error("Malformed recognition response: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("No text recognized")]
    Empty,

    #[error("API key not set (expected in ${0})")]
    MissingApiKey(String),
}

impl RecognitionError {
    /// Whether retrying the same request could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            RecognitionError::Timeout(_) => true,
            RecognitionError::Http(e) => e.is_timeout() || e.is_connect(),
            RecognitionError::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

/// The face locator failed to run
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("Face detector inference failed: {0}")]
    Inference(#[from] ort::Error),

    #[error("Unexpected detector output: {0}")]
    Output(String),

    #[error("Face detector error: {0}")]
    Other(String),
}

/// A single record could not be persisted
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Errors that abort a capture cycle before any record is produced
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Capture failed: {0}")]
    Capture(#[from] CaptureError),

    #[error("Text recognition failed: {0}")]
    Recognition(#[from] RecognitionError),
}

impl ScanError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ScanError::Capture(_) => false,
            ScanError::Recognition(e) => e.is_retryable(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CaptureError::NotFound(PathBuf::from("snapshot.jpg"));
        assert!(err.to_string().contains("snapshot.jpg"));

        let err = RecognitionError::MissingApiKey("GOOGLE_API_KEY".to_string());
        assert_eq!(err.to_string(), "API key not set (expected in $GOOGLE_API_KEY)");
    }

    #[test]
    fn test_retryable_classification() {
        assert!(RecognitionError::Timeout(30).is_retryable());
        assert!(RecognitionError::Status { status: 503, body: String::new() }.is_retryable());
        assert!(RecognitionError::Status { status: 429, body: String::new() }.is_retryable());
        assert!(!RecognitionError::Status { status: 400, body: String::new() }.is_retryable());
        assert!(!RecognitionError::Empty.is_retryable());
    }

    #[test]
    fn test_scan_error_wraps_source() {
        let err: ScanError = RecognitionError::Timeout(10).into();
        assert!(err.is_retryable());
        assert!(err.to_string().contains("timed out"));

        let err: ScanError = CaptureError::NotFound(PathBuf::from("x.png")).into();
        assert!(!err.is_retryable());
    }
}
