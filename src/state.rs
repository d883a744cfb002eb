//! # Application State
//!
//! Everything the request handlers share:
//! - **config**: read-only after startup, so a plain `Arc` is enough
//! - **gateway**: the processing gateway with its pooled HTTP client
//! - **metrics**: request counters updated by the metrics middleware
//! - **shutdown**: root cancellation token; every request works under a child
//!
//! Metrics are the only mutable data and live behind an `RwLock`. The gateway
//! itself holds no mutable state.

use crate::config::AppConfig;
use crate::gateway::ProcessingGateway;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub gateway: Arc<ProcessingGateway>,
    pub metrics: Arc<RwLock<AppMetrics>>,
    pub start_time: Instant,
    pub shutdown: CancellationToken,
}

/// Request counters collected across all HTTP requests.
#[derive(Debug, Default, Clone)]
pub struct AppMetrics {
    pub request_count: u64,
    pub error_count: u64,
    /// Uploads currently being validated or forwarded
    pub active_uploads: u32,
    /// Keyed by route pattern, e.g. `GET /api/audio/download/{filename}`
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

#[derive(Debug, Default, Clone)]
pub struct EndpointMetric {
    pub request_count: u64,
    pub total_duration_ms: u64,
    pub error_count: u64,
}

impl AppState {
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let gateway = ProcessingGateway::new(&config.downstream, &config.upload)?;
        Ok(Self {
            config: Arc::new(config),
            gateway: Arc::new(gateway),
            metrics: Arc::new(RwLock::new(AppMetrics::default())),
            start_time: Instant::now(),
            shutdown: CancellationToken::new(),
        })
    }

    /// Token for one request: cancelled when the server shuts down.
    pub fn request_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    fn with_metrics<R>(&self, f: impl FnOnce(&mut AppMetrics) -> R) -> R {
        // Counters stay usable even if a writer panicked mid-update.
        let mut metrics = self.metrics.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut metrics)
    }

    pub fn increment_request_count(&self) {
        self.with_metrics(|m| m.request_count += 1);
    }

    pub fn increment_error_count(&self) {
        self.with_metrics(|m| m.error_count += 1);
    }

    pub fn record_endpoint_request(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        self.with_metrics(|m| {
            let metric = m.endpoint_metrics.entry(endpoint.to_string()).or_default();
            metric.request_count += 1;
            metric.total_duration_ms += duration_ms;
            if is_error {
                metric.error_count += 1;
            }
        });
    }

    /// Count an upload as active until the returned guard is dropped.
    pub fn track_upload(&self) -> UploadGuard {
        self.with_metrics(|m| m.active_uploads += 1);
        UploadGuard { state: self.clone() }
    }

    pub fn get_metrics_snapshot(&self) -> AppMetrics {
        self.metrics.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

pub struct UploadGuard {
    state: AppState,
}

impl Drop for UploadGuard {
    fn drop(&mut self) {
        self.state.with_metrics(|m| m.active_uploads = m.active_uploads.saturating_sub(1));
    }
}

impl EndpointMetric {
    pub fn average_duration_ms(&self) -> f64 {
        if self.request_count > 0 {
            self.total_duration_ms as f64 / self.request_count as f64
        } else {
            0.0
        }
    }

    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0
        }
    }
}
