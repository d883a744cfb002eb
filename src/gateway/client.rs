//! # Processing Gateway
//!
//! Talks to the downstream audio-enhancement processor over HTTP.
//!
//! ## Operations:
//! - **process_audio**: validate → health-gate → stream to `POST /process` → translate
//! - **check_downstream_health**: `GET /health`, true iff 2xx, never fails
//! - **download_processed_audio**: `GET {path}`, bytes or `None`
//!
//! ## Concurrency:
//! One pooled `reqwest::Client` is shared by every request. A semaphore with
//! `max_connections` permits caps how many outbound calls run at once; extra
//! calls wait for a permit instead of opening more connections. Every call
//! also races a `CancellationToken` and gives up as soon as it fires.

use crate::config::{DownstreamConfig, UploadConfig};
use crate::gateway::body::BodyGuard;
use crate::gateway::content_type::content_type_for;
use crate::gateway::validator::{
    size_exceeded_message, FileValidator, IncomingFile, ValidationOutcome, NO_FILE_MESSAGE,
};
use crate::gateway::wire::{translate, DownstreamResult, FailureKind, GatewayResponse, ProcessedAudio};
use actix_web::web::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub const UNAVAILABLE_MESSAGE: &str = "Audio enhancement service is currently unavailable";
pub const TIMEOUT_MESSAGE: &str = "Audio processing timed out. Please try with a smaller file.";
pub const INTERRUPTED_MESSAGE: &str = "Upload was interrupted before the file was fully received";

/// The caller's cancellation token fired before the operation finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

impl fmt::Display for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "operation cancelled")
    }
}

impl std::error::Error for Cancelled {}

/// Ways a forward to `/process` can go wrong once the request has been built.
#[derive(Debug)]
enum ForwardError {
    Rejected { status: StatusCode, body: String },
    Transport(reqwest::Error),
    Decode(reqwest::Error),
}

/// Stateless mediator between the public API and the processor.
///
/// Cheap to share behind an `Arc`; holds only the client, the validator and
/// the connection permits.
#[derive(Debug)]
pub struct ProcessingGateway {
    client: reqwest::Client,
    base_url: String,
    health_timeout: Duration,
    validator: FileValidator,
    permits: Arc<Semaphore>,
}

impl ProcessingGateway {
    pub fn new(downstream: &DownstreamConfig, upload: &UploadConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(downstream.request_timeout())
            .connect_timeout(downstream.health_timeout())
            .pool_max_idle_per_host(downstream.max_connections)
            .build()?;

        Ok(Self {
            client,
            base_url: downstream.base_url.trim_end_matches('/').to_string(),
            health_timeout: downstream.health_timeout(),
            validator: FileValidator::new(upload),
            permits: Arc::new(Semaphore::new(downstream.max_connections)),
        })
    }

    /// Validate, health-gate and forward one upload.
    ///
    /// Every outcome is a [`GatewayResponse`]; the only `Err` is cancellation.
    pub async fn process_audio(
        &self,
        file: Option<IncomingFile>,
        cancel: &CancellationToken,
    ) -> Result<GatewayResponse, Cancelled> {
        let file = match file {
            Some(file) if file.size_bytes > 0 => file,
            _ => {
                warn!("Upload rejected: no file");
                return Ok(GatewayResponse::failure(FailureKind::InputRejected, NO_FILE_MESSAGE));
            }
        };

        if let ValidationOutcome::Invalid(reason) = self.validator.validate(Some(&file)) {
            warn!(
                file = %file.name,
                content_type = %file.declared_content_type,
                size_bytes = file.size_bytes,
                reason = %reason,
                "Upload rejected"
            );
            return Ok(GatewayResponse::failure(FailureKind::InputRejected, reason));
        }

        // No point streaming a large body at a processor that is down.
        if !self.check_downstream_health(cancel).await? {
            return Ok(GatewayResponse::failure(
                FailureKind::DependencyUnavailable,
                UNAVAILABLE_MESSAGE,
            ));
        }

        let IncomingFile {
            name,
            size_bytes,
            body,
            ..
        } = file;
        let max_bytes = self.validator.max_file_size_bytes();
        let (stream, guard) = body.limited(max_bytes);

        let part = match Part::stream(reqwest::Body::wrap_stream(stream))
            .file_name(name.clone())
            .mime_str(content_type_for(&name))
        {
            Ok(part) => part,
            Err(e) => {
                error!(error = %e, "Failed to build multipart part");
                return Ok(unexpected(&e));
            }
        };
        let form = Form::new().part("file", part);

        info!(file = %name, declared_bytes = size_bytes, "Forwarding audio for enhancement");
        let outcome = self.run(cancel, self.forward(form)).await?;

        Ok(match outcome {
            Ok(audio) => {
                info!(
                    file = %name,
                    processing_id = %audio.processing_id,
                    output_file = %audio.output_file,
                    streamed_bytes = guard.bytes_seen(),
                    "Audio enhancement completed"
                );
                GatewayResponse::Success(audio)
            }
            Err(e) => classify(e, &guard, max_bytes),
        })
    }

    /// `GET {base}/health`. Failures are logged and reported as `false`.
    pub async fn check_downstream_health(&self, cancel: &CancellationToken) -> Result<bool, Cancelled> {
        let url = self.url("/health");
        self.run(cancel, async {
            match self.client.get(&url).timeout(self.health_timeout).send().await {
                Ok(response) if response.status().is_success() => true,
                Ok(response) => {
                    warn!(status = %response.status().as_u16(), "Audio enhancement service reported unhealthy");
                    false
                }
                Err(e) => {
                    warn!(error = %e, "Audio enhancement service health check failed");
                    false
                }
            }
        })
        .await
    }

    /// Fetch a processed file. `None` means "not available" (missing file,
    /// bad status, or transport failure); callers treat it as a 404.
    pub async fn download_processed_audio(
        &self,
        path: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Bytes>, Cancelled> {
        let url = self.url(path);
        self.run(cancel, async {
            let fetched: Result<Bytes, reqwest::Error> = async {
                let response = self.client.get(&url).send().await?.error_for_status()?;
                response.bytes().await
            }
            .await;

            match fetched {
                Ok(bytes) => {
                    debug!(path = %path, bytes = bytes.len(), "Downloaded processed audio");
                    Some(bytes)
                }
                Err(e) => {
                    warn!(path = %path, error = %e, "Processed audio unavailable");
                    None
                }
            }
        })
        .await
    }

    async fn forward(&self, form: Form) -> Result<ProcessedAudio, ForwardError> {
        let response = self
            .client
            .post(self.url("/process"))
            .multipart(form)
            .send()
            .await
            .map_err(ForwardError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(ForwardError::Rejected { status, body });
        }

        let result: DownstreamResult = response.json().await.map_err(ForwardError::Decode)?;
        if let Some(path) = &result.output_path {
            debug!(output_path = %path, "Processor stored output");
        }
        Ok(translate(result))
    }

    /// Run an outbound call under a connection permit, abandoning it if
    /// `cancel` fires first.
    async fn run<F, T>(&self, cancel: &CancellationToken, call: F) -> Result<T, Cancelled>
    where
        F: Future<Output = T>,
    {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Outbound call cancelled");
                Err(Cancelled)
            }
            out = async {
                // The semaphore is never closed; acquire cannot fail.
                let _permit = self.permits.acquire().await.ok();
                call.await
            } => Ok(out),
        }
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

fn classify(err: ForwardError, guard: &BodyGuard, max_bytes: u64) -> GatewayResponse {
    // A body that outgrew the limit surfaces as a transport error; report the real cause.
    if guard.overflowed() {
        warn!(streamed_bytes = guard.bytes_seen(), max_bytes, "Upload exceeded size limit while streaming");
        return GatewayResponse::failure(
            FailureKind::InputRejected,
            size_exceeded_message(guard.bytes_seen(), max_bytes),
        );
    }
    // Same for the caller's own stream breaking; the processor is not at fault.
    if guard.source_failed() {
        warn!(streamed_bytes = guard.bytes_seen(), "Upload stream failed while forwarding");
        return GatewayResponse::failure(FailureKind::InputRejected, INTERRUPTED_MESSAGE);
    }

    match err {
        ForwardError::Rejected { status, body } => {
            error!(status = %status.as_u16(), body = %body, "Audio enhancement service rejected the file");
            GatewayResponse::failure(
                FailureKind::DependencyRejected,
                format!("Audio processing failed: {} - {}", status.as_u16(), body),
            )
        }
        ForwardError::Transport(e) | ForwardError::Decode(e) => classify_transport(&e),
    }
}

fn classify_transport(e: &reqwest::Error) -> GatewayResponse {
    // A connect timeout reports both; it is an unreachable processor, not slow processing.
    if e.is_connect() {
        error!(error = %e, "Audio enhancement service unreachable");
        GatewayResponse::failure(FailureKind::DependencyUnavailable, UNAVAILABLE_MESSAGE)
    } else if e.is_timeout() {
        error!(error = %e, "Audio enhancement request timed out");
        GatewayResponse::failure(FailureKind::Timeout, TIMEOUT_MESSAGE)
    } else if e.is_request() || e.is_body() {
        error!(error = %e, "Audio enhancement service unreachable");
        GatewayResponse::failure(FailureKind::DependencyUnavailable, UNAVAILABLE_MESSAGE)
    } else {
        unexpected(e)
    }
}

fn unexpected(e: &reqwest::Error) -> GatewayResponse {
    error!(error = ?e, "Unexpected error while processing audio");
    GatewayResponse::failure(
        FailureKind::Unexpected,
        format!("An unexpected error occurred: {}", e),
    )
}
