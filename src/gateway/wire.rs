//! # Wire Formats
//!
//! The processor speaks snake_case JSON; the public API speaks camelCase.
//! Each side gets its own struct and [`translate`] is the only place where
//! one becomes the other.
//!
//! ## Downstream `/process` reply:
//! ```json
//! {
//!   "success": true,
//!   "message": "done",
//!   "processing_id": "test-123",
//!   "output_file": "enhanced_test.wav",
//!   "output_path": "/data/out/enhanced_test.wav",
//!   "download_url": "/download/enhanced_test.wav",
//!   "processing_details": {
//!     "processing_time": 1.5,
//!     "file_size_mb": 0.2,
//!     "enhancement_applied": "denoise"
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};

pub const UNKNOWN: &str = "unknown";
pub const DEFAULT_SUCCESS_MESSAGE: &str = "Processing completed successfully";

/// Reply body of the processor's `/process` endpoint. Every field is optional
/// on the wire; defaults are applied in [`translate`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DownstreamResult {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub processing_id: Option<String>,
    #[serde(default)]
    pub output_file: Option<String>,
    #[serde(default)]
    pub output_path: Option<String>,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub processing_details: Option<DownstreamDetails>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DownstreamDetails {
    #[serde(default)]
    pub processing_time: Option<f64>,
    #[serde(default)]
    pub file_size_mb: Option<f64>,
    /// Usually a label such as `"denoise"`; some processor builds send a bool.
    #[serde(default)]
    pub enhancement_applied: Option<serde_json::Value>,
}

/// Public description of a processed file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedAudio {
    pub processing_id: String,
    pub output_file: String,
    pub download_url: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_details: Option<ProcessingDetails>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingDetails {
    pub processing_time_seconds: f64,
    pub file_size_mb: f64,
    pub enhancement_applied: String,
}

/// Error categories a failed upload can fall into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Empty, oversized, or unsupported file. Never reaches the processor.
    InputRejected,
    /// Health check failed or the connection broke.
    DependencyUnavailable,
    /// The processor answered with a non-2xx status.
    DependencyRejected,
    Timeout,
    Unexpected,
}

/// Outcome of one upload. Always produced; the gateway never returns an error.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayResponse {
    Success(ProcessedAudio),
    Failure { kind: FailureKind, message: String },
}

impl GatewayResponse {
    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        GatewayResponse::Failure {
            kind,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, GatewayResponse::Success(_))
    }

    pub fn message(&self) -> &str {
        match self {
            GatewayResponse::Success(audio) => &audio.message,
            GatewayResponse::Failure { message, .. } => message,
        }
    }
}

/// `{ "success": true, ...ProcessedAudio }`
#[derive(Debug, Serialize)]
pub struct SuccessEnvelope<'a> {
    pub success: bool,
    #[serde(flatten)]
    pub result: &'a ProcessedAudio,
}

impl<'a> SuccessEnvelope<'a> {
    pub fn new(result: &'a ProcessedAudio) -> Self {
        Self { success: true, result }
    }
}

/// `{ "success": false, "message": ..., "timestamp": ... }`
#[derive(Debug, Serialize)]
pub struct FailureEnvelope<'a> {
    pub success: bool,
    pub message: &'a str,
    pub timestamp: String,
}

impl<'a> FailureEnvelope<'a> {
    pub fn new(message: &'a str) -> Self {
        Self {
            success: false,
            message,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Map a processor reply onto the public shape.
///
/// Missing or blank ids become `"unknown"` so a success always names a file.
pub fn translate(result: DownstreamResult) -> ProcessedAudio {
    ProcessedAudio {
        processing_id: non_blank(result.processing_id).unwrap_or_else(|| UNKNOWN.to_string()),
        output_file: non_blank(result.output_file).unwrap_or_else(|| UNKNOWN.to_string()),
        download_url: result.download_url.unwrap_or_default(),
        message: non_blank(result.message).unwrap_or_else(|| DEFAULT_SUCCESS_MESSAGE.to_string()),
        processing_details: result.processing_details.map(|details| ProcessingDetails {
            processing_time_seconds: details.processing_time.unwrap_or_default(),
            file_size_mb: details.file_size_mb.unwrap_or_default(),
            enhancement_applied: match details.enhancement_applied {
                Some(serde_json::Value::String(label)) => label,
                Some(serde_json::Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            },
        }),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_full_reply_translation() {
        let raw = json!({
            "success": true,
            "message": "Enhanced",
            "processing_id": "test-123",
            "output_file": "enhanced_test.wav",
            "output_path": "/srv/out/enhanced_test.wav",
            "download_url": "/download/enhanced_test.wav",
            "processing_details": {
                "processing_time": 2.5,
                "file_size_mb": 1.25,
                "enhancement_applied": "noise_reduction"
            }
        });
        let result: DownstreamResult = serde_json::from_value(raw).unwrap();
        assert_eq!(result.output_path.as_deref(), Some("/srv/out/enhanced_test.wav"));

        let audio = translate(result);
        assert_eq!(audio.processing_id, "test-123");
        assert_eq!(audio.output_file, "enhanced_test.wav");
        assert_eq!(audio.download_url, "/download/enhanced_test.wav");
        assert_eq!(audio.message, "Enhanced");
        let details = audio.processing_details.unwrap();
        assert_eq!(details.processing_time_seconds, 2.5);
        assert_eq!(details.file_size_mb, 1.25);
        assert_eq!(details.enhancement_applied, "noise_reduction");
    }

    #[test]
    fn test_missing_fields_use_sentinels() {
        let result: DownstreamResult = serde_json::from_str(r#"{"success": true}"#).unwrap();
        let audio = translate(result);
        assert_eq!(audio.processing_id, UNKNOWN);
        assert_eq!(audio.output_file, UNKNOWN);
        assert_eq!(audio.download_url, "");
        assert_eq!(audio.message, DEFAULT_SUCCESS_MESSAGE);
        assert!(audio.processing_details.is_none());
    }

    #[test]
    fn test_blank_ids_are_replaced() {
        let result: DownstreamResult =
            serde_json::from_str(r#"{"processing_id": "", "output_file": "  ", "message": ""}"#).unwrap();
        let audio = translate(result);
        assert_eq!(audio.processing_id, UNKNOWN);
        assert_eq!(audio.output_file, UNKNOWN);
        assert_eq!(audio.message, DEFAULT_SUCCESS_MESSAGE);
    }

    #[test]
    fn test_boolean_enhancement_flag() {
        let result: DownstreamResult =
            serde_json::from_str(r#"{"processing_details": {"enhancement_applied": true}}"#).unwrap();
        let details = translate(result).processing_details.unwrap();
        assert_eq!(details.enhancement_applied, "true");
        assert_eq!(details.processing_time_seconds, 0.0);
    }

    #[test]
    fn test_public_envelopes_use_camel_case() {
        let audio = ProcessedAudio {
            processing_id: "p1".to_string(),
            output_file: "o.wav".to_string(),
            download_url: "/download/o.wav".to_string(),
            message: "ok".to_string(),
            processing_details: Some(ProcessingDetails {
                processing_time_seconds: 1.0,
                file_size_mb: 2.0,
                enhancement_applied: "denoise".to_string(),
            }),
        };
        let value = serde_json::to_value(SuccessEnvelope::new(&audio)).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["processingId"], "p1");
        assert_eq!(value["outputFile"], "o.wav");
        assert_eq!(value["downloadUrl"], "/download/o.wav");
        assert_eq!(value["processingDetails"]["processingTimeSeconds"], 1.0);
        assert_eq!(value["processingDetails"]["fileSizeMb"], 2.0);
        assert!(value.get("processing_id").is_none());

        let failure = serde_json::to_value(FailureEnvelope::new("nope")).unwrap();
        assert_eq!(failure["success"], false);
        assert_eq!(failure["message"], "nope");
        assert!(failure["timestamp"].is_string());
    }
}
