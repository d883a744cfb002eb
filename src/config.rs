//! # Configuration Management
//!
//! This module loads the gateway's settings once at startup from several sources:
//! - TOML configuration file (config.toml)
//! - Environment variables (with APP_ prefix)
//! - Default values (built into the code)
//!
//! ## Configuration Priority (highest to lowest):
//! 1. `HOST` / `PORT` (deployment platforms)
//! 2. Environment variables (`APP_SERVER__PORT`, `APP_DOWNSTREAM__BASE_URL`, ...)
//! 3. Configuration file (config.toml)
//! 4. Default values (defined in the Default impl)
//!
//! Nested keys use a double underscore so that snake_case field names survive:
//! `APP_UPLOAD__MAX_FILE_SIZE_BYTES=52428800` sets `upload.max_file_size_bytes`.
//! `APP_UPLOAD__ALLOWED_EXTENSIONS=.wav,.flac` is split on commas.
//!
//! The result is validated and then shared read-only for the life of the process.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Main application configuration that contains all settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub downstream: DownstreamConfig,
    pub upload: UploadConfig,
}

/// Where the gateway listens.
///
/// ## Common values:
/// - `host = "127.0.0.1"`: Only accept connections from localhost (development)
/// - `host = "0.0.0.0"`: Accept connections from any IP address (containers)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// How to reach the audio-enhancement processor.
///
/// ## Fields:
/// - `base_url`: Root URL of the processor, e.g. `http://enhancer:8000`
/// - `request_timeout_secs`: Upper bound for `/process` and downloads. Enhancement
///   is slow, so this is measured in minutes.
/// - `health_timeout_secs`: Upper bound for the `/health` probe. Kept short.
/// - `max_connections`: Concurrent outbound calls allowed; extra calls queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownstreamConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub health_timeout_secs: u64,
    pub max_connections: usize,
}

/// Upload acceptance rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    pub max_file_size_bytes: u64,
    /// Extensions including the leading dot, matched case-insensitively.
    pub allowed_extensions: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: 100 * 1024 * 1024, // 100 MiB
            allowed_extensions: [".wav", ".mp3", ".flac", ".m4a", ".aac", ".ogg"]
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            downstream: DownstreamConfig {
                base_url: "http://localhost:8000".to_string(),
                request_timeout_secs: 300,
                health_timeout_secs: 5,
                max_connections: 10,
            },
            upload: UploadConfig::default(),
        }
    }
}

impl DownstreamConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health_timeout_secs)
    }
}

impl AppConfig {
    /// Load configuration from all sources in priority order, then normalise
    /// and validate it.
    ///
    /// ## Environment Variable Examples:
    /// - `APP_DOWNSTREAM__BASE_URL=http://enhancer:8000`
    /// - `APP_DOWNSTREAM__REQUEST_TIMEOUT_SECS=600`
    /// - `HOST=0.0.0.0`, `PORT=3000`
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("upload.allowed_extensions")
                    .try_parsing(true),
            );

        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        let mut config: AppConfig = settings.build()?.try_deserialize()?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Trim the trailing slash from the base URL and lowercase extensions so
    /// that later string joins and comparisons are predictable.
    pub fn normalize(&mut self) {
        let trimmed = self.downstream.base_url.trim().trim_end_matches('/').to_string();
        self.downstream.base_url = trimmed;
        for ext in self.upload.allowed_extensions.iter_mut() {
            *ext = ext.trim().to_ascii_lowercase();
        }
    }

    /// Validate that the configuration values make sense.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        let url = reqwest::Url::parse(&self.downstream.base_url).map_err(|e| {
            anyhow::anyhow!("Invalid downstream base URL '{}': {}", self.downstream.base_url, e)
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(anyhow::anyhow!(
                "Downstream base URL must use http or https, got '{}'",
                url.scheme()
            ));
        }

        if self.downstream.request_timeout_secs == 0 || self.downstream.health_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Downstream timeouts must be greater than 0"));
        }

        if self.downstream.health_timeout_secs > self.downstream.request_timeout_secs {
            return Err(anyhow::anyhow!(
                "Health timeout ({}s) cannot exceed request timeout ({}s)",
                self.downstream.health_timeout_secs,
                self.downstream.request_timeout_secs
            ));
        }

        if self.downstream.max_connections == 0 {
            return Err(anyhow::anyhow!("Max connections must be greater than 0"));
        }

        if self.upload.max_file_size_bytes == 0 {
            return Err(anyhow::anyhow!("Max file size must be greater than 0"));
        }

        if self.upload.allowed_extensions.is_empty() {
            return Err(anyhow::anyhow!("At least one allowed extension is required"));
        }

        if let Some(bad) = self
            .upload
            .allowed_extensions
            .iter()
            .find(|ext| !ext.starts_with('.') || ext.len() < 2)
        {
            return Err(anyhow::anyhow!(
                "Allowed extension '{}' must start with '.' followed by a name",
                bad
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.upload.max_file_size_bytes, 104_857_600);
        assert_eq!(config.upload.allowed_extensions.len(), 6);
        assert_eq!(config.downstream.max_connections, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.downstream.base_url = "not a url".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.downstream.base_url = "ftp://enhancer".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.downstream.health_timeout_secs = 600;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.downstream.max_connections = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.upload.allowed_extensions = vec!["wav".to_string()];
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.upload.allowed_extensions.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_normalize() {
        let mut config = AppConfig::default();
        config.downstream.base_url = "http://enhancer:8000/".to_string();
        config.upload.allowed_extensions = vec![" .WAV ".to_string(), ".Mp3".to_string()];
        config.normalize();
        assert_eq!(config.downstream.base_url, "http://enhancer:8000");
        assert_eq!(config.upload.allowed_extensions, vec![".wav", ".mp3"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_timeouts_as_durations() {
        let config = AppConfig::default();
        assert_eq!(config.downstream.request_timeout(), Duration::from_secs(300));
        assert_eq!(config.downstream.health_timeout(), Duration::from_secs(5));
    }
}
