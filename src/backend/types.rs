//! Backend request/response types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cli::Device;

/// Language hint passed to the cloning model; lets it detect the language.
pub const AUTO_LANGUAGE: &str = "Auto";

/// Errors that can occur when communicating with a model server.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Invalid backend configuration: {0}")]
    Config(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Backend error: {0}")]
    BackendError(String),
}

/// Request asking the model server to load the cloning model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoadRequest {
    pub model_dir: String,
    pub device: Device,
    pub dtype: String,
    pub local_files_only: bool,
}

impl LoadRequest {
    /// Load from local files in `model_dir` with float32 weights.
    pub fn new(model_dir: impl Into<String>, device: Device) -> Self {
        Self {
            model_dir: model_dir.into(),
            device,
            dtype: "float32".to_string(),
            local_files_only: true,
        }
    }
}

/// Model server answer to a [`LoadRequest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadResponse {
    pub model: String,
    pub device: String,
}

/// Request for voice-clone generation.
#[derive(Debug, Clone, PartialEq)]
pub struct CloneRequest {
    pub text: String,
    pub language: String,
    pub ref_audio: PathBuf,
    pub ref_text: String,
}

impl CloneRequest {
    /// Create a request with automatic language detection.
    pub fn new(text: impl Into<String>, ref_audio: impl Into<PathBuf>) -> Self {
        Self {
            text: text.into(),
            language: AUTO_LANGUAGE.to_string(),
            ref_audio: ref_audio.into(),
            ref_text: String::new(),
        }
    }

    /// Set the transcript of the reference audio.
    pub fn with_ref_text(mut self, ref_text: impl Into<String>) -> Self {
        self.ref_text = ref_text.into();
        self
    }
}

/// Response body of an OpenAI-compatible transcription endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptionResponse {
    pub text: String,
}
