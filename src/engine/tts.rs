//! Voice clone generation orchestrator.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use thiserror::Error;

use crate::audio::AudioError;
use crate::backend::{BackendError, CloneRequest, Transcriber, VoiceCloner};

/// Errors that can occur during generation.
#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("Text to synthesize cannot be empty")]
    EmptyText,

    #[error("Reference audio not found: {0}")]
    AudioNotFound(String),

    #[error("Backend error: {0}")]
    BackendError(#[from] BackendError),

    #[error("Failed to write output audio: {0}")]
    AudioError(#[from] AudioError),

    #[error("Output task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),
}

/// Text to synthesize plus the reference voice to clone.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub text: String,
    pub ref_audio: PathBuf,
    pub ref_text: String,
}

impl GenerationRequest {
    /// Create a new generation request.
    pub fn new(
        text: impl Into<String>,
        ref_audio: impl Into<PathBuf>,
        ref_text: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            ref_audio: ref_audio.into(),
            ref_text: ref_text.into(),
        }
    }
}

/// A finished generation, written once to `output_path`.
#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub output_path: PathBuf,
    pub filename: String,
    pub sample_rate: u32,
    pub elapsed: Duration,
    pub timestamp: DateTime<Local>,
}

impl GenerationResult {
    /// Elapsed model time in seconds with two decimals.
    pub fn time_taken(&self) -> String {
        format!("{:.2}", self.elapsed.as_secs_f64())
    }

    /// Wall clock time of completion, e.g. `03:07 PM`.
    pub fn clock_time(&self) -> String {
        self.timestamp.format("%I:%M %p").to_string()
    }
}

/// Drives the cloning model and persists its output.
pub struct CloneEngine {
    cloner: Arc<dyn VoiceCloner>,
}

impl CloneEngine {
    /// Create a new engine around a loaded cloning model.
    pub fn new(cloner: Arc<dyn VoiceCloner>) -> Self {
        Self { cloner }
    }

    /// Synthesize `request.text` in the reference voice and write it to
    /// `output_path`.
    ///
    /// Nothing is written when the model call fails.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        output_path: &Path,
    ) -> Result<GenerationResult, GenerateError> {
        if request.text.trim().is_empty() {
            return Err(GenerateError::EmptyText);
        }

        if !request.ref_audio.is_file() {
            return Err(GenerateError::AudioNotFound(
                request.ref_audio.display().to_string(),
            ));
        }

        tracing::info!(text = %request.text, "generating speech");

        let clone_request = CloneRequest::new(request.text.clone(), request.ref_audio.clone())
            .with_ref_text(request.ref_text.clone());

        let start = Instant::now();
        let outcome = self.cloner.generate_voice_clone(clone_request).await;
        let elapsed = start.elapsed();

        self.release_resources().await;

        let waveform = outcome?;
        let sample_rate = waveform.sample_rate;

        let path = output_path.to_path_buf();
        tokio::task::spawn_blocking(move || waveform.write_wav(&path)).await??;

        let filename = output_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        tracing::info!(
            path = %output_path.display(),
            elapsed_secs = elapsed.as_secs_f64(),
            sample_rate,
            "generation complete"
        );

        Ok(GenerationResult {
            output_path: output_path.to_path_buf(),
            filename,
            sample_rate,
            elapsed,
            timestamp: Local::now(),
        })
    }

    async fn release_resources(&self) {
        if let Err(e) = self.cloner.release_resources().await {
            tracing::warn!(error = %e, device = %self.cloner.device(), "failed to release device memory");
        }
    }
}

/// Best-effort transcription of a reference recording.
///
/// Failures are logged and yield an empty string; the result only pre-fills
/// the reference transcript field.
pub async fn auto_transcribe(
    transcriber: Option<&dyn Transcriber>,
    wav_path: &Path,
    language: &str,
) -> String {
    let Some(transcriber) = transcriber else {
        return String::new();
    };

    match transcriber
        .transcribe(wav_path.to_path_buf(), language.to_string())
        .await
    {
        Ok(text) => {
            let text = text.trim().to_string();
            tracing::info!(transcript = %text, "auto-transcribed reference audio");
            text
        }
        Err(e) => {
            tracing::warn!(error = %e, path = %wav_path.display(), "transcription failed");
            String::new()
        }
    }
}
