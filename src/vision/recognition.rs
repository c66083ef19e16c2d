//! Text recognition service client
//!
//! Sends the captured image to a Google Vision compatible `images:annotate`
//! endpoint and returns the full recognized text block. The service is
//! expected to emit one line per document field, in printed order.

use anyhow::{Context, Result};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::{debug, info};

use crate::capture::frame::CapturedFrame;
use crate::config::RecognitionSettings;
use crate::error::RecognitionError;

/// Line-structured text returned by the recognition service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognizedText(String);

impl RecognizedText {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn line_count(&self) -> usize {
        self.0.lines().count()
    }
}

/// Anything that can turn a captured image into text
pub trait TextRecognizer {
    fn recognize(&self, frame: &CapturedFrame) -> Result<RecognizedText, RecognitionError>;
}

/// Recognizer that always returns the same text, for pre-recognized input
#[derive(Debug, Clone)]
pub struct StaticTextRecognizer {
    text: String,
}

impl StaticTextRecognizer {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl TextRecognizer for StaticTextRecognizer {
    fn recognize(&self, _frame: &CapturedFrame) -> Result<RecognizedText, RecognitionError> {
        if self.text.trim().is_empty() {
            return Err(RecognitionError::Empty);
        }
        Ok(RecognizedText::new(self.text.clone()))
    }
}

#[derive(Debug, Serialize)]
struct AnnotateRequest {
    requests: Vec<AnnotateImageRequest>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateImageRequest {
    image: ImagePayload,
    features: Vec<Feature>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_context: Option<ImageContext>,
}

#[derive(Debug, Serialize)]
struct ImagePayload {
    content: String,
}

#[derive(Debug, Serialize)]
struct Feature {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageContext {
    language_hints: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<AnnotateImageResponse>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateImageResponse {
    #[serde(default)]
    text_annotations: Vec<EntityAnnotation>,
    error: Option<ApiStatus>,
}

#[derive(Debug, Deserialize)]
struct EntityAnnotation {
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ApiStatus {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

/// Recognition client for the Vision `images:annotate` API
pub struct VisionApiRecognizer {
    client: reqwest::Client,
    runtime: Runtime,
    endpoint: String,
    api_key: String,
    timeout_secs: u64,
    language_hints: Vec<String>,
}

impl VisionApiRecognizer {
    /// Create a client from settings, reading the API key from the environment
    pub fn from_settings(settings: &RecognitionSettings) -> Result<Self> {
        let api_key = std::env::var(&settings.api_key_env)
            .ok()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| RecognitionError::MissingApiKey(settings.api_key_env.clone()))?;

        Self::new(settings, api_key)
    }

    /// Create a client with an explicit API key
    pub fn new(settings: &RecognitionSettings, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        let runtime = Runtime::new().context("Failed to create tokio runtime")?;

        info!("Recognition service endpoint: {}", settings.endpoint);

        Ok(Self {
            client,
            runtime,
            endpoint: settings.endpoint.clone(),
            api_key,
            timeout_secs: settings.timeout_secs,
            language_hints: settings.language_hints.clone(),
        })
    }

    fn build_request(&self, encoded_image: &[u8]) -> AnnotateRequest {
        let image_context = if self.language_hints.is_empty() {
            None
        } else {
            Some(ImageContext {
                language_hints: self.language_hints.clone(),
            })
        };

        AnnotateRequest {
            requests: vec![AnnotateImageRequest {
                image: ImagePayload {
                    content: base64::engine::general_purpose::STANDARD.encode(encoded_image),
                },
                features: vec![Feature {
                    kind: "TEXT_DETECTION",
                }],
                image_context,
            }],
        }
    }

    async fn annotate(&self, request: &AnnotateRequest) -> Result<String, RecognitionError> {
        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(request)
            .send()
            .await
            .map_err(|e| self.classify_http_error(e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.classify_http_error(e))?;

        if !status.is_success() {
            return Err(RecognitionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(body)
    }

    fn classify_http_error(&self, error: reqwest::Error) -> RecognitionError {
        if error.is_timeout() {
            RecognitionError::Timeout(self.timeout_secs)
        } else {
            RecognitionError::Http(error)
        }
    }
}

impl TextRecognizer for VisionApiRecognizer {
    fn recognize(&self, frame: &CapturedFrame) -> Result<RecognizedText, RecognitionError> {
        debug!(
            "Sending {} byte image from {:?} for recognition",
            frame.encoded.len(),
            frame.source
        );

        let request = self.build_request(&frame.encoded);
        let body = self.runtime.block_on(self.annotate(&request))?;
        let text = parse_annotate_response(&body)?;

        debug!("Recognized {} lines", text.line_count());
        Ok(text)
    }
}

/// Extract the full text block from an `images:annotate` response body
fn parse_annotate_response(body: &str) -> Result<RecognizedText, RecognitionError> {
    let response: AnnotateResponse = serde_json::from_str(body)?;

    let Some(first) = response.responses.into_iter().next() else {
        return Err(RecognitionError::Empty);
    };

    if let Some(error) = first.error {
        return Err(RecognitionError::Service {
            code: error.code,
            message: error.message,
        });
    }

    match first.text_annotations.into_iter().next() {
        Some(annotation) if !annotation.description.trim().is_empty() => {
            Ok(RecognizedText::new(annotation.description))
        }
        _ => Err(RecognitionError::Empty),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbImage};
    use std::path::PathBuf;

    fn test_frame() -> CapturedFrame {
        CapturedFrame::new(
            DynamicImage::ImageRgb8(RgbImage::new(4, 4)),
            vec![1, 2, 3],
            PathBuf::from("snapshot.jpg"),
        )
    }

    #[test]
    fn test_parse_response_full_text() {
        let body = r#"{
            "responses": [{
                "textAnnotations": [
                    {"locale": "ko", "description": "2\nB\n12345\n"},
                    {"description": "2"}
                ]
            }]
        }"#;

        let text = parse_annotate_response(body).unwrap();
        assert_eq!(text.as_str(), "2\nB\n12345\n");
        assert_eq!(text.line_count(), 3);
    }

    #[test]
    fn test_parse_response_without_annotations() {
        let body = r#"{"responses": [{}]}"#;
        assert!(matches!(parse_annotate_response(body), Err(RecognitionError::Empty)));

        let body = r#"{"responses": []}"#;
        assert!(matches!(parse_annotate_response(body), Err(RecognitionError::Empty)));
    }

    #[test]
    fn test_parse_response_service_error() {
        let body = r#"{"responses": [{"error": {"code": 3, "message": "Bad image data."}}]}"#;
        match parse_annotate_response(body) {
            Err(RecognitionError::Service { code, message }) => {
                assert_eq!(code, 3);
                assert_eq!(message, "Bad image data.");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_parse_response_malformed() {
        let result = parse_annotate_response("<html>gateway error</html>");
        assert!(matches!(result, Err(RecognitionError::Malformed(_))));
    }

    #[test]
    fn test_request_body_shape() {
        let settings = RecognitionSettings {
            language_hints: vec!["ko".to_string()],
            ..Default::default()
        };
        let recognizer = VisionApiRecognizer::new(&settings, "test-key".to_string()).unwrap();

        let request = recognizer.build_request(b"abc");
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["requests"][0]["image"]["content"], "YWJj");
        assert_eq!(json["requests"][0]["features"][0]["type"], "TEXT_DETECTION");
        assert_eq!(json["requests"][0]["imageContext"]["languageHints"][0], "ko");
    }

    #[test]
    fn test_request_without_language_hints() {
        let settings = RecognitionSettings {
            language_hints: vec![],
            ..Default::default()
        };
        let recognizer = VisionApiRecognizer::new(&settings, "test-key".to_string()).unwrap();

        let json = serde_json::to_value(recognizer.build_request(b"abc")).unwrap();
        assert!(json["requests"][0].get("imageContext").is_none());
    }

    #[test]
    fn test_missing_api_key() {
        let settings = RecognitionSettings {
            api_key_env: "IDCARD_SCANNER_TEST_UNSET_KEY".to_string(),
            ..Default::default()
        };
        assert!(VisionApiRecognizer::from_settings(&settings).is_err());
    }

    #[test]
    fn test_static_recognizer() {
        let recognizer = StaticTextRecognizer::new("ID\nKim");
        let text = recognizer.recognize(&test_frame()).unwrap();
        assert_eq!(text.as_str(), "ID\nKim");

        let empty = StaticTextRecognizer::new("  \n");
        assert!(matches!(empty.recognize(&test_frame()), Err(RecognitionError::Empty)));
    }
}
