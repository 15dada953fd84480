//! Upload storage for reference recordings.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::audio::{AudioConverter, AudioError};

/// Errors that can occur while storing an upload.
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Invalid file name: {0}")]
    InvalidName(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A reference recording and the canonical waveform derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceAudio {
    pub source: PathBuf,
    pub canonical: PathBuf,
}

impl ReferenceAudio {
    /// Convert `source` (or reuse the cached conversion) into a reference.
    pub fn prepare(source: &Path, converter: &AudioConverter) -> Result<Self, AudioError> {
        let canonical = converter.convert(source)?;
        Ok(Self {
            source: source.to_path_buf(),
            canonical,
        })
    }
}

/// Stores uploaded reference audio on disk.
#[derive(Debug, Clone)]
pub struct UploadStore {
    uploads_dir: PathBuf,
}

impl UploadStore {
    /// Create a store rooted at `uploads_dir`.
    pub fn with_dir(uploads_dir: PathBuf) -> Self {
        Self { uploads_dir }
    }

    /// Turn a client-supplied file name into a safe local one.
    ///
    /// Spaces become underscores and only the final path component is kept.
    pub fn sanitize_name(original: &str) -> Result<String, UploadError> {
        let last = original.rsplit(['/', '\\']).next().unwrap_or_default();

        if last.is_empty() {
            return Err(UploadError::InvalidName(
                "Name cannot be empty".to_string(),
            ));
        }

        if last == "." || last == ".." {
            return Err(UploadError::InvalidName(format!(
                "'{original}' does not name a file"
            )));
        }

        Ok(last.replace(' ', "_"))
    }

    /// Write `data` under the sanitized name and return the stored path.
    ///
    /// An existing upload with the same name is overwritten.
    pub fn store(&self, original_name: &str, data: &[u8]) -> Result<PathBuf, UploadError> {
        let name = Self::sanitize_name(original_name)?;

        std::fs::create_dir_all(&self.uploads_dir)?;

        let path = self.uploads_dir.join(name);
        std::fs::write(&path, data)?;

        Ok(path)
    }
}
