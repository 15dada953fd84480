//! Speech-to-text client for an OpenAI-compatible Whisper server.

use std::path::PathBuf;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};

use super::Transcriber;
use super::client::normalize_base_url;
use super::types::{BackendError, TranscriptionResponse};

/// Default lightweight transcription model.
pub const DEFAULT_STT_MODEL: &str = "whisper-tiny";

/// Transcribes reference audio through `/v1/audio/transcriptions`.
pub struct WhisperClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl WhisperClient {
    /// Create a client for the transcription server at `base_url`.
    pub fn new(base_url: &str, model: impl Into<String>) -> Result<Self, BackendError> {
        Ok(Self {
            client: reqwest::Client::new(),
            base_url: normalize_base_url(base_url)?,
            model: model.into(),
        })
    }

    /// Get the base URL for this backend.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Transcriber for WhisperClient {
    async fn transcribe(&self, wav_path: PathBuf, language: String) -> Result<String, BackendError> {
        let audio = tokio::fs::read(&wav_path)
            .await
            .map_err(|_| BackendError::FileNotFound(wav_path.display().to_string()))?;

        tracing::debug!(audio_bytes = audio.len(), language = %language, "starting transcription");

        let form = Form::new()
            .part(
                "file",
                Part::bytes(audio)
                    .file_name("audio.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| BackendError::RequestFailed(e.to_string()))?,
            )
            .text("model", self.model.clone())
            .text("language", language);

        let response = self
            .client
            .post(format!("{}/v1/audio/transcriptions", self.base_url))
            .multipart(form)
            .send()
            .await
            .map_err(|e| BackendError::ConnectionFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::RequestFailed(format!(
                "Transcription failed: {status}: {body}"
            )));
        }

        let result: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;

        Ok(result.text)
    }
}
