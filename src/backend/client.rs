//! HTTP client for the voice cloning model server.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};

use crate::audio::Waveform;
use crate::cli::Device;

use super::VoiceCloner;
use super::types::{BackendError, CloneRequest, LoadRequest, LoadResponse};

/// HTTP-based voice cloning backend.
pub struct HttpCloner {
    base_url: String,
    client: reqwest::Client,
    device: Device,
}

impl HttpCloner {
    /// Create a new client for the model server at `base_url`.
    pub fn new(base_url: &str, device: Device) -> Result<Self, BackendError> {
        let base_url = normalize_base_url(base_url)?;

        Ok(Self {
            base_url,
            client: reqwest::Client::new(),
            device,
        })
    }

    /// Get the base URL for this backend.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Ask the model server to load the cloning model from local files.
    pub async fn load(&self, model_dir: &str) -> Result<LoadResponse, BackendError> {
        let url = format!("{}/load", self.base_url);
        let request = LoadRequest::new(model_dir, self.device);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| BackendError::ConnectionFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::RequestFailed(format!(
                "Model load failed: {status}: {body}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl VoiceCloner for HttpCloner {
    fn device(&self) -> Device {
        self.device
    }

    async fn generate_voice_clone(&self, request: CloneRequest) -> Result<Waveform, BackendError> {
        let url = format!("{}/generate_voice_clone", self.base_url);

        let audio_data = tokio::fs::read(&request.ref_audio)
            .await
            .map_err(|_| BackendError::FileNotFound(request.ref_audio.display().to_string()))?;

        let file_name = request
            .ref_audio
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("reference.wav")
            .to_string();

        let file_part = Part::bytes(audio_data)
            .file_name(file_name)
            .mime_str("audio/wav")
            .map_err(|e| BackendError::RequestFailed(e.to_string()))?;

        let form = Form::new()
            .text("text", request.text)
            .text("language", request.language)
            .text("ref_text", request.ref_text)
            .part("ref_audio", file_part);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| BackendError::ConnectionFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::BackendError(format!(
                "Generation failed: {status}: {body}"
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;

        tokio::task::spawn_blocking(move || Waveform::from_wav_bytes(&bytes))
            .await
            .map_err(|e| BackendError::BackendError(format!("Decode task failed: {e}")))?
            .map_err(|e| BackendError::InvalidResponse(format!("Model returned invalid audio: {e}")))
    }

    async fn release_resources(&self) -> Result<(), BackendError> {
        if !self.device.needs_cache_release() {
            return Ok(());
        }

        let url = format!("{}/empty_cache", self.base_url);

        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| BackendError::ConnectionFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(BackendError::RequestFailed(format!(
                "Status: {}",
                response.status()
            )));
        }

        Ok(())
    }
}

/// Validate a model server URL and strip any trailing slash.
pub(crate) fn normalize_base_url(base_url: &str) -> Result<String, BackendError> {
    let trimmed = base_url.trim().trim_end_matches('/');

    let parsed = reqwest::Url::parse(trimmed)
        .map_err(|e| BackendError::Config(format!("{trimmed}: {e}")))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(BackendError::Config(format!(
            "{trimmed}: unsupported scheme '{}'",
            parsed.scheme()
        )));
    }

    Ok(trimmed.to_string())
}
