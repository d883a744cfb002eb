//! # Audio REST API Handlers
//!
//! The public face of the gateway.
//!
//! ## Available Endpoints:
//! - `POST /api/audio/upload` - Validate and forward an audio file for enhancement
//! - `GET /api/audio/download/{filename}` - Proxy a processed file back to the caller
//! - `GET /api/audio/health` - Report whether the enhancement processor is reachable
//!
//! ## Upload streaming:
//! The `file` field is never collected into memory. Its first chunk is read
//! here (to tell an empty upload from a real one); the rest is pumped by a
//! local task through a small bounded channel whose receiving end becomes
//! the outbound request body. If the gateway rejects the file before
//! forwarding, the receiver is dropped and the pump stops.

use crate::error::AppResult;
use crate::gateway::client::UNAVAILABLE_MESSAGE;
use crate::gateway::wire::{FailureEnvelope, FailureKind, SuccessEnvelope};
use crate::gateway::{content_type_for, FileBody, GatewayResponse, IncomingFile};
use crate::{error::AppError, state::AppState};
use actix_multipart::{Field, Multipart};
use actix_web::http::header::{ContentDisposition, CONTENT_LENGTH};
use actix_web::http::StatusCode;
use actix_web::web::Bytes;
use actix_web::{web, HttpResponse};
use futures_util::StreamExt;
use serde_json::json;
use std::io;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

/// Chunks buffered between the inbound multipart field and the outbound body.
const UPLOAD_CHANNEL_CAPACITY: usize = 8;

/// Multipart field that carries the audio file.
const FILE_FIELD: &str = "file";

/// Upload an audio file for enhancement.
///
/// ## Endpoint: `POST /api/audio/upload`
///
/// ## Request:
/// Multipart form data with an audio file field named "file"
///
/// ## Response (200):
/// ```json
/// {
///   "success": true,
///   "message": "Processing completed successfully",
///   "processingId": "test-123",
///   "outputFile": "enhanced_test.wav",
///   "downloadUrl": "/download/enhanced_test.wav",
///   "processingDetails": {
///     "processingTimeSeconds": 2.5,
///     "fileSizeMb": 1.2,
///     "enhancementApplied": "noise_reduction"
///   }
/// }
/// ```
///
/// Rejected uploads answer 400 (500 for unexpected faults) with
/// `{"success": false, "message": ..., "timestamp": ...}`.
pub async fn upload_audio(
    mut payload: Multipart,
    state: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    let _active = state.track_upload();
    let cancel = state.request_token();

    let mut file_field: Option<Field> = None;
    while let Some(item) = payload.next().await {
        let field = match item {
            Ok(field) => field,
            Err(e) => {
                warn!(error = %e, "Malformed multipart upload");
                return Ok(failure_response(
                    StatusCode::BAD_REQUEST,
                    &format!("Invalid multipart payload: {}", e),
                ));
            }
        };

        if field.name() == Some(FILE_FIELD) {
            file_field = Some(field);
            break;
        }
        // Unread fields are skipped by the multipart reader on the next poll.
        debug!(field = ?field.name(), "Ignoring multipart field");
    }

    let file = match file_field {
        Some(field) => match open_incoming_file(field, payload).await {
            Ok(file) => Some(file),
            Err(e) => {
                warn!(error = %e, "Failed to read uploaded file");
                return Ok(failure_response(
                    StatusCode::BAD_REQUEST,
                    &format!("Invalid multipart payload: {}", e),
                ));
            }
        },
        None => None,
    };

    let response = state.gateway.process_audio(file, &cancel).await?;
    debug!(
        success = response.is_success(),
        message = %response.message(),
        "Upload handled"
    );
    Ok(upload_response(&response))
}

/// Download a processed file from the enhancement processor.
///
/// ## Endpoint: `GET /api/audio/download/{filename}`
///
/// Answers with the raw bytes, a `Content-Type` derived from the extension
/// and the file name as the attachment name. 404 if the processor does not
/// have the file.
pub async fn download_audio(
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    let filename = path.into_inner();
    if !is_plain_file_name(&filename) {
        return Err(AppError::BadRequest(format!("Invalid file name '{}'", filename)));
    }

    let cancel = state.request_token();
    let downstream_path = format!("/download/{}", filename);

    match state.gateway.download_processed_audio(&downstream_path, &cancel).await? {
        Some(bytes) => Ok(HttpResponse::Ok()
            .content_type(content_type_for(&filename))
            .insert_header(ContentDisposition::attachment(filename))
            .body(bytes)),
        None => Ok(HttpResponse::NotFound().json(json!({
            "message": format!("File '{}' not found", filename)
        }))),
    }
}

/// Report whether the enhancement processor is reachable.
///
/// ## Endpoint: `GET /api/audio/health`
///
/// 200 with `status: "Healthy"`, or 503 with the unavailable message.
pub async fn downstream_health(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let cancel = state.request_token();
    let timestamp = chrono::Utc::now().to_rfc3339();

    if state.gateway.check_downstream_health(&cancel).await? {
        Ok(HttpResponse::Ok().json(json!({
            "status": "Healthy",
            "message": "Audio enhancement service is available",
            "timestamp": timestamp
        })))
    } else {
        Ok(HttpResponse::ServiceUnavailable().json(json!({
            "status": "Unhealthy",
            "message": UNAVAILABLE_MESSAGE,
            "timestamp": timestamp
        })))
    }
}

fn upload_response(response: &GatewayResponse) -> HttpResponse {
    match response {
        GatewayResponse::Success(audio) => HttpResponse::Ok().json(SuccessEnvelope::new(audio)),
        GatewayResponse::Failure {
            kind: FailureKind::Unexpected,
            message,
        } => failure_response(StatusCode::INTERNAL_SERVER_ERROR, message),
        GatewayResponse::Failure { message, .. } => failure_response(StatusCode::BAD_REQUEST, message),
    }
}

fn failure_response(status: StatusCode, message: &str) -> HttpResponse {
    HttpResponse::build(status).json(FailureEnvelope::new(message))
}

/// Turn the `file` field into an [`IncomingFile`] without buffering it.
///
/// The declared size is the part's own `Content-Length` when the client sent
/// one, otherwise the first chunk's length. The request `Content-Length`
/// counts boundaries and part headers, so it is never used. The exact limit
/// is enforced later on the streamed bytes.
async fn open_incoming_file(
    mut field: Field,
    payload: Multipart,
) -> Result<IncomingFile, actix_multipart::MultipartError> {
    let name = field
        .content_disposition()
        .and_then(|cd| cd.get_filename())
        .unwrap_or_default()
        .to_string();
    let declared_content_type = field
        .content_type()
        .map(|mime| mime.to_string())
        .unwrap_or_default();

    let first = loop {
        match field.next().await {
            Some(Ok(chunk)) if chunk.is_empty() => continue,
            Some(Ok(chunk)) => break Some(chunk),
            Some(Err(e)) => return Err(e),
            None => break None,
        }
    };

    let Some(first) = first else {
        return Ok(IncomingFile::new(name, declared_content_type, 0, FileBody::empty()));
    };

    let size_bytes = part_content_length(&field).unwrap_or(first.len() as u64);
    let (tx, rx) = mpsc::channel(UPLOAD_CHANNEL_CAPACITY);
    actix_web::rt::spawn(pump_field(field, payload, first, tx));

    Ok(IncomingFile::new(
        name,
        declared_content_type,
        size_bytes,
        FileBody::from_stream(ReceiverStream::new(rx)),
    ))
}

/// Forward the rest of the field into the channel. `payload` is held only so
/// the multipart reader stays alive while the field is read.
async fn pump_field(
    mut field: Field,
    payload: Multipart,
    first: Bytes,
    tx: mpsc::Sender<io::Result<Bytes>>,
) {
    let _payload = payload;
    if tx.send(Ok(first)).await.is_err() {
        return;
    }

    while let Some(chunk) = field.next().await {
        let item = chunk.map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()));
        let failed = item.is_err();
        if tx.send(item).await.is_err() || failed {
            return;
        }
    }
}

fn part_content_length(field: &Field) -> Option<u64> {
    field
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty() && !name.contains('/') && !name.contains('\\') && !name.contains("..")
}
