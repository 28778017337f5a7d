//! Upload file validation.
//!
//! The validator is a collaborator: adapters only depend on the [`FileValidator`]
//! contract and receive whichever implementation the orchestrator was built with.

use std::fmt;
use std::fs::File;
use std::path::Path;

/// Whitelist and size ceiling applied to one upload field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileRules {
    pub allowed_extensions: &'static [&'static str],
    pub max_bytes: u64,
}

/// Audio uploads: whisper formats, 25 MB.
pub const AUDIO_FILE_RULES: FileRules = FileRules {
    allowed_extensions: &["mp3", "mp4", "mpeg", "mpga", "m4a", "wav", "webm"],
    max_bytes: 25 * 1024 * 1024,
};

/// Image edit/variation uploads and masks: PNG only, 4 MB.
pub const PNG_FILE_RULES: FileRules = FileRules {
    allowed_extensions: &["png"],
    max_bytes: 4 * 1024 * 1024,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileErrorKind {
    NotFound,
    Unreadable,
    UnsupportedExtension,
    TooLarge,
}

impl FileErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Unreadable => "unreadable",
            Self::UnsupportedExtension => "unsupported_extension",
            Self::TooLarge => "too_large",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileValidationError {
    pub kind: FileErrorKind,
    pub message: String,
}

impl FileValidationError {
    pub fn new(kind: FileErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for FileValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind.as_str())
    }
}

impl std::error::Error for FileValidationError {}

pub trait FileValidator: Send + Sync + fmt::Debug {
    fn validate(&self, path: &Path, rules: &FileRules) -> Result<(), FileValidationError>;
}

/// Validates against the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsFileValidator;

impl FileValidator for FsFileValidator {
    fn validate(&self, path: &Path, rules: &FileRules) -> Result<(), FileValidationError> {
        let display = path.display();
        let metadata = std::fs::metadata(path).map_err(|_| {
            FileValidationError::new(
                FileErrorKind::NotFound,
                format!("file '{}' does not exist", display),
            )
        })?;
        if !metadata.is_file() {
            return Err(FileValidationError::new(
                FileErrorKind::NotFound,
                format!("'{}' is not a regular file", display),
            ));
        }
        File::open(path).map_err(|e| {
            FileValidationError::new(
                FileErrorKind::Unreadable,
                format!("file '{}' is not readable: {}", display, e),
            )
        })?;

        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        if !rules.allowed_extensions.contains(&ext.as_str()) {
            return Err(FileValidationError::new(
                FileErrorKind::UnsupportedExtension,
                format!(
                    "unsupported file extension '{}' (allowed: {})",
                    ext,
                    rules.allowed_extensions.join(", ")
                ),
            ));
        }

        if metadata.len() > rules.max_bytes {
            return Err(FileValidationError::new(
                FileErrorKind::TooLarge,
                format!(
                    "file '{}' is {} bytes; limit is {} bytes",
                    display,
                    metadata.len(),
                    rules.max_bytes
                ),
            ));
        }
        Ok(())
    }
}
