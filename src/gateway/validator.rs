//! # File Validation
//!
//! Pure checks on an uploaded file's metadata (name and declared size).
//! Nothing here touches the network or reads the file body.
//!
//! ## Rules (applied in order, first failure wins):
//! 1. **Missing or empty**: "No audio file provided"
//! 2. **Too large**: declared size above `max_file_size_bytes`
//! 3. **Unsupported format**: extension not in `allowed_extensions`
//!
//! Size is checked before the extension so a huge `.txt` upload reports
//! the size problem.

use crate::config::UploadConfig;
use crate::gateway::body::FileBody;
use crate::gateway::content_type::extension_of;

pub const NO_FILE_MESSAGE: &str = "No audio file provided";

/// An uploaded file owned by the current request.
///
/// `body` is single-read: it is consumed when the file is forwarded.
pub struct IncomingFile {
    pub name: String,
    pub declared_content_type: String,
    pub size_bytes: u64,
    pub body: FileBody,
}

impl IncomingFile {
    pub fn new(
        name: impl Into<String>,
        declared_content_type: impl Into<String>,
        size_bytes: u64,
        body: FileBody,
    ) -> Self {
        Self {
            name: name.into(),
            declared_content_type: declared_content_type.into(),
            size_bytes,
            body,
        }
    }
}

impl std::fmt::Debug for IncomingFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IncomingFile")
            .field("name", &self.name)
            .field("declared_content_type", &self.declared_content_type)
            .field("size_bytes", &self.size_bytes)
            .finish_non_exhaustive()
    }
}

/// Result of a single validation call. The reason exists only when invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Valid,
    Invalid(String),
}

impl ValidationOutcome {
    #[cfg(test)]
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationOutcome::Valid)
    }

    #[cfg(test)]
    pub fn reason(&self) -> Option<&str> {
        match self {
            ValidationOutcome::Valid => None,
            ValidationOutcome::Invalid(reason) => Some(reason),
        }
    }
}

/// Checks uploads against the configured size limit and extension allow-list.
#[derive(Debug, Clone)]
pub struct FileValidator {
    max_file_size_bytes: u64,
    allowed_extensions: Vec<String>,
}

impl FileValidator {
    /// Build a validator from the upload settings.
    ///
    /// Extensions are lowercased here as well as in config validation, so a
    /// validator built by hand behaves the same as one built from config.
    pub fn new(config: &UploadConfig) -> Self {
        Self {
            max_file_size_bytes: config.max_file_size_bytes,
            allowed_extensions: config
                .allowed_extensions
                .iter()
                .map(|ext| ext.to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_bytes
    }

    pub fn validate(&self, file: Option<&IncomingFile>) -> ValidationOutcome {
        let file = match file {
            Some(file) if file.size_bytes > 0 => file,
            _ => return ValidationOutcome::Invalid(NO_FILE_MESSAGE.to_string()),
        };

        if file.size_bytes > self.max_file_size_bytes {
            return ValidationOutcome::Invalid(size_exceeded_message(
                file.size_bytes,
                self.max_file_size_bytes,
            ));
        }

        let extension = extension_of(&file.name);
        if !self.allowed_extensions.contains(&extension) {
            let shown = if extension.is_empty() { "(none)" } else { extension.as_str() };
            return ValidationOutcome::Invalid(format!(
                "Unsupported file format: {}. Allowed formats: {}",
                shown,
                self.allowed_extensions.join(", ")
            ));
        }

        ValidationOutcome::Valid
    }
}

/// Shared with the streaming guard in [`FileBody`], which reports the same
/// wording when a body turns out larger than declared.
pub fn size_exceeded_message(size_bytes: u64, max_bytes: u64) -> String {
    format!(
        "File size {} bytes exceeds maximum allowed size of {} bytes",
        size_bytes, max_bytes
    )
}
