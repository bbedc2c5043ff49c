//! Request-side data model: source files, target format, batch validation.

use crate::config::ConvertConfig;
use crate::error::ConvertError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Output file type requested for an entire batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    Pdf,
    Jpg,
    Png,
    Webp,
    Docx,
}

impl TargetFormat {
    /// The file extension (without dot), also the `output_format` value sent
    /// to the conversion service.
    pub fn extension(&self) -> &'static str {
        match self {
            TargetFormat::Pdf => "pdf",
            TargetFormat::Jpg => "jpg",
            TargetFormat::Png => "png",
            TargetFormat::Webp => "webp",
            TargetFormat::Docx => "docx",
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for TargetFormat {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pdf" => Ok(TargetFormat::Pdf),
            "jpg" | "jpeg" => Ok(TargetFormat::Jpg),
            "png" => Ok(TargetFormat::Png),
            "webp" => Ok(TargetFormat::Webp),
            "docx" => Ok(TargetFormat::Docx),
            other => Err(ConvertError::UnsupportedFormat {
                format: other.to_string(),
            }),
        }
    }
}

/// One uploaded file: original name plus owned bytes.
///
/// The orchestrator owns each `SourceFile` exclusively for the duration of
/// one batch; nothing retains the bytes after the batch folder is released.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Original filename as uploaded (may contain an extension).
    pub filename: String,
    /// Raw file contents.
    pub bytes: Vec<u8>,
}

impl SourceFile {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }

    /// Filename without extension or path components.
    ///
    /// Path components are stripped so an uploaded name like `../../etc/x.png`
    /// cannot steer an archive entry outside the batch folder.
    pub fn base_name(&self) -> String {
        let name = Path::new(&self.filename)
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|s| !s.is_empty() && *s != "." && *s != "..")
            .unwrap_or("file");
        match name.rsplit_once('.') {
            Some((base, _ext)) if !base.is_empty() => base.to_string(),
            _ => name.to_string(),
        }
    }
}

/// An ordered batch of files to convert to a single target format.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub files: Vec<SourceFile>,
    pub target: TargetFormat,
}

impl ConversionRequest {
    pub fn new(files: Vec<SourceFile>, target: TargetFormat) -> Self {
        Self { files, target }
    }

    /// Validate batch-size invariants against the config.
    ///
    /// Called before any external call so an invalid request has zero
    /// network side effects.
    pub fn validate(&self, config: &ConvertConfig) -> Result<(), ConvertError> {
        if self.files.is_empty() {
            return Err(ConvertError::EmptyBatch);
        }
        if self.files.len() > config.max_batch_size {
            return Err(ConvertError::BatchTooLarge {
                count: self.files.len(),
                max: config.max_batch_size,
            });
        }
        Ok(())
    }
}
