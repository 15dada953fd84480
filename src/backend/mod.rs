//! Model backends for voice cloning and transcription.
//!
//! Provides traits and HTTP implementations for the model servers hosting the
//! pretrained voice cloning and speech recognition models, plus the loader
//! that brings both up once at process start.

mod client;
mod stt;
mod types;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

pub use client::HttpCloner;
pub use stt::{DEFAULT_STT_MODEL, WhisperClient};
pub use types::{
    AUTO_LANGUAGE, BackendError, CloneRequest, LoadRequest, LoadResponse, TranscriptionResponse,
};

use crate::audio::Waveform;
use crate::cli::Device;

/// Trait for the voice cloning model.
///
/// The handle is shared by every generation in the process, allowing for
/// mock implementations in tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VoiceCloner: Send + Sync {
    /// Device the model runs on.
    fn device(&self) -> Device;

    /// Synthesize `request.text` in the voice of the reference recording.
    ///
    /// # Returns
    /// The first waveform produced by the model
    async fn generate_voice_clone(&self, request: CloneRequest) -> Result<Waveform, BackendError>;

    /// Release cached accelerator memory after a generation.
    ///
    /// A no-op on devices that do not need it.
    async fn release_resources(&self) -> Result<(), BackendError>;
}

/// Trait for the speech recognition model.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe a canonical WAV file in the given language.
    async fn transcribe(&self, wav_path: PathBuf, language: String) -> Result<String, BackendError>;
}

/// Transcription backend settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SttConfig {
    pub url: String,
    pub model: String,
}

/// Everything the loader needs to bring the models up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelConfig {
    pub tts_url: String,
    pub model_dir: String,
    pub device: Device,
    /// `None` skips the transcription model (console tool).
    pub stt: Option<SttConfig>,
}

/// Loaded model handles, created once and read-only afterwards.
#[derive(Clone)]
pub struct Models {
    pub cloner: Arc<dyn VoiceCloner>,
    pub transcriber: Option<Arc<dyn Transcriber>>,
    pub device: Device,
}

impl Models {
    /// Assemble handles from already constructed backends.
    pub fn new(
        cloner: Arc<dyn VoiceCloner>,
        transcriber: Option<Arc<dyn Transcriber>>,
    ) -> Self {
        let device = cloner.device();
        Self {
            cloner,
            transcriber,
            device,
        }
    }
}

/// Load the cloning model and, when configured, the transcription model.
///
/// Any failure here is meant to be fatal to the caller.
pub async fn load_models(config: &ModelConfig) -> Result<Models, BackendError> {
    let steps = if config.stt.is_some() { 2 } else { 1 };

    tracing::info!(
        url = %config.tts_url,
        model_dir = %config.model_dir,
        device = %config.device,
        "[1/{steps}] loading voice cloning model"
    );
    let cloner = HttpCloner::new(&config.tts_url, config.device)?;
    let loaded = cloner.load(&config.model_dir).await?;
    tracing::info!(
        url = %cloner.base_url(),
        model = %loaded.model,
        device = %loaded.device,
        "voice cloning model ready"
    );

    let transcriber = match &config.stt {
        Some(stt) => {
            tracing::info!(url = %stt.url, model = %stt.model, "[2/2] loading transcription model");
            let client = WhisperClient::new(&stt.url, stt.model.clone())?;
            tracing::debug!(url = %client.base_url(), "transcription client ready");
            Some(Arc::new(client) as Arc<dyn Transcriber>)
        }
        None => None,
    };

    tracing::info!(device = %config.device, "models loaded");
    Ok(Models::new(Arc::new(cloner), transcriber))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::extract::Multipart;
    use axum::http::{StatusCode, header};
    use axum::routing::post;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    // ===========================================
    // Backend trait tests with mocks
    // ===========================================

    #[tokio::test]
    async fn test_mock_cloner_generate_success() {
        let mut mock = MockVoiceCloner::new();

        mock.expect_generate_voice_clone()
            .withf(|req| req.text == "Hello world" && req.ref_text == "Reference")
            .times(1)
            .returning(|_| Ok(Waveform::new(vec![0.1, -0.1], 1, 24_000)));

        let request = CloneRequest::new("Hello world", "ref.wav").with_ref_text("Reference");
        let result = mock.generate_voice_clone(request).await;

        assert!(result.is_ok());
        let wave = result.unwrap();
        assert_eq!(wave.sample_rate, 24_000);
    }

    #[tokio::test]
    async fn test_mock_transcriber_failure() {
        let mut mock = MockTranscriber::new();

        mock.expect_transcribe()
            .times(1)
            .returning(|_, _| Err(BackendError::ConnectionFailed("refused".to_string())));

        let result = mock
            .transcribe(PathBuf::from("ref.wav"), "ko".to_string())
            .await;
        assert!(matches!(
            result.unwrap_err(),
            BackendError::ConnectionFailed(_)
        ));
    }

    #[test]
    fn test_models_take_device_from_cloner() {
        let mut mock = MockVoiceCloner::new();
        mock.expect_device().return_const(Device::Mps);

        let models = Models::new(Arc::new(mock), None);
        assert_eq!(models.device, Device::Mps);
        assert!(models.transcriber.is_none());
    }

    // ===========================================
    // HTTP client construction tests
    // ===========================================

    #[test]
    fn test_http_cloner_strips_trailing_slash() {
        let cloner = HttpCloner::new("http://localhost:9290/", Device::Cpu).unwrap();
        assert_eq!(cloner.base_url(), "http://localhost:9290");
    }

    #[test]
    fn test_http_cloner_rejects_invalid_url() {
        let result = HttpCloner::new("not a url", Device::Cpu);
        assert!(matches!(result, Err(BackendError::Config(_))));
    }

    #[test]
    fn test_whisper_client_rejects_unsupported_scheme() {
        let result = WhisperClient::new("ftp://localhost:9300", DEFAULT_STT_MODEL);
        assert!(matches!(result, Err(BackendError::Config(_))));
    }

    #[tokio::test]
    async fn test_release_resources_is_noop_on_cpu() {
        // Nothing listens on this port; a request would fail
        let cloner = HttpCloner::new("http://127.0.0.1:1", Device::Cpu).unwrap();
        assert!(cloner.release_resources().await.is_ok());
    }

    #[tokio::test]
    async fn test_generate_missing_reference_fails_before_request() {
        let cloner = HttpCloner::new("http://127.0.0.1:1", Device::Cpu).unwrap();
        let request = CloneRequest::new("Hello", "/nonexistent/ref.wav");

        let result = cloner.generate_voice_clone(request).await;
        assert!(matches!(result, Err(BackendError::FileNotFound(_))));
    }

    #[tokio::test]
    async fn test_load_models_unreachable_server_fails() {
        let config = ModelConfig {
            tts_url: "http://127.0.0.1:1".to_string(),
            model_dir: ".".to_string(),
            device: Device::Cpu,
            stt: None,
        };

        let result = load_models(&config).await;
        assert!(matches!(result, Err(BackendError::ConnectionFailed(_))));
    }

    // ===========================================
    // HTTP client tests against a stub model server
    // ===========================================

    /// Multipart fields seen by the stub: name -> (file name, bytes).
    #[derive(Clone, Default)]
    struct Received(Arc<Mutex<HashMap<String, (Option<String>, Vec<u8>)>>>);

    impl Received {
        async fn record(&self, mut multipart: Multipart) {
            while let Some(field) = multipart.next_field().await.unwrap() {
                let name = field.name().unwrap_or_default().to_string();
                let file_name = field.file_name().map(str::to_string);
                let data = field.bytes().await.unwrap().to_vec();
                self.0.lock().unwrap().insert(name, (file_name, data));
            }
        }

        fn text(&self, name: &str) -> String {
            let fields = self.0.lock().unwrap();
            String::from_utf8(fields[name].1.clone()).unwrap()
        }

        fn file(&self, name: &str) -> (Option<String>, Vec<u8>) {
            self.0.lock().unwrap()[name].clone()
        }
    }

    async fn spawn_stub(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn wav_fixture(dir: &std::path::Path, name: &str, wave: &Waveform) -> (PathBuf, Vec<u8>) {
        let path = dir.join(name);
        wave.write_wav(&path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        (path, bytes)
    }

    #[tokio::test]
    async fn test_http_cloner_generate_sends_form_and_decodes_wav() {
        let temp_dir = TempDir::new().unwrap();
        let (ref_path, ref_bytes) = wav_fixture(
            temp_dir.path(),
            "ref.wav",
            &Waveform::new(vec![0.1, -0.1, 0.2], 1, 16_000),
        );
        let (_, reply) = wav_fixture(
            temp_dir.path(),
            "reply.wav",
            &Waveform::new(vec![0.25; 48], 1, 24_000),
        );

        let received = Received::default();
        let router = Router::new().route(
            "/generate_voice_clone",
            post({
                let received = received.clone();
                move |multipart: Multipart| {
                    let received = received.clone();
                    let reply = reply.clone();
                    async move {
                        received.record(multipart).await;
                        ([(header::CONTENT_TYPE, "audio/wav")], reply)
                    }
                }
            }),
        );
        let url = spawn_stub(router).await;

        let cloner = HttpCloner::new(&url, Device::Cpu).unwrap();
        let request = CloneRequest::new("Hello world", ref_path).with_ref_text("Reference words");
        let wave = cloner.generate_voice_clone(request).await.unwrap();

        assert_eq!(wave.sample_rate, 24_000);
        assert_eq!(wave.frames(), 48);

        assert_eq!(received.text("text"), "Hello world");
        assert_eq!(received.text("language"), AUTO_LANGUAGE);
        assert_eq!(received.text("ref_text"), "Reference words");
        let (file_name, data) = received.file("ref_audio");
        assert_eq!(file_name.as_deref(), Some("ref.wav"));
        assert_eq!(data, ref_bytes);
    }

    #[tokio::test]
    async fn test_http_cloner_generate_error_status() {
        let temp_dir = TempDir::new().unwrap();
        let (ref_path, _) = wav_fixture(
            temp_dir.path(),
            "ref.wav",
            &Waveform::new(vec![0.1, -0.1], 1, 16_000),
        );

        let router = Router::new().route(
            "/generate_voice_clone",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "CUDA out of memory") }),
        );
        let url = spawn_stub(router).await;

        let cloner = HttpCloner::new(&url, Device::Cuda).unwrap();
        let result = cloner
            .generate_voice_clone(CloneRequest::new("Hello", ref_path))
            .await;

        match result {
            Err(BackendError::BackendError(msg)) => assert!(msg.contains("CUDA out of memory")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_http_cloner_rejects_non_wav_reply() {
        let temp_dir = TempDir::new().unwrap();
        let (ref_path, _) = wav_fixture(
            temp_dir.path(),
            "ref.wav",
            &Waveform::new(vec![0.1, -0.1], 1, 16_000),
        );

        let router = Router::new().route(
            "/generate_voice_clone",
            post(|| async { "not audio" }),
        );
        let url = spawn_stub(router).await;

        let cloner = HttpCloner::new(&url, Device::Cpu).unwrap();
        let result = cloner
            .generate_voice_clone(CloneRequest::new("Hello", ref_path))
            .await;
        assert!(matches!(result, Err(BackendError::InvalidResponse(_))));
    }

    fn empty_cache_stub(calls: Arc<AtomicUsize>, status: StatusCode) -> Router {
        Router::new().route(
            "/empty_cache",
            post(move || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    status
                }
            }),
        )
    }

    #[tokio::test]
    async fn test_release_resources_posts_empty_cache_on_accelerators() {
        for device in [Device::Mps, Device::Cuda] {
            let calls = Arc::new(AtomicUsize::new(0));
            let url = spawn_stub(empty_cache_stub(calls.clone(), StatusCode::OK)).await;

            let cloner = HttpCloner::new(&url, device).unwrap();
            cloner.release_resources().await.unwrap();

            assert_eq!(calls.load(Ordering::SeqCst), 1, "device {device}");
        }
    }

    #[tokio::test]
    async fn test_release_resources_skips_request_on_cpu() {
        let calls = Arc::new(AtomicUsize::new(0));
        let url = spawn_stub(empty_cache_stub(calls.clone(), StatusCode::OK)).await;

        let cloner = HttpCloner::new(&url, Device::Cpu).unwrap();
        cloner.release_resources().await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_release_resources_error_status() {
        let calls = Arc::new(AtomicUsize::new(0));
        let url = spawn_stub(empty_cache_stub(
            calls.clone(),
            StatusCode::INTERNAL_SERVER_ERROR,
        ))
        .await;

        let cloner = HttpCloner::new(&url, Device::Mps).unwrap();
        let result = cloner.release_resources().await;

        assert!(matches!(result, Err(BackendError::RequestFailed(_))));
    }

    fn load_stub(seen: Arc<Mutex<Vec<LoadRequest>>>) -> Router {
        Router::new().route(
            "/load",
            post(move |axum::Json(request): axum::Json<LoadRequest>| {
                let seen = seen.clone();
                async move {
                    let device = request.device.to_string();
                    seen.lock().unwrap().push(request);
                    axum::Json(serde_json::json!({
                        "model": "Qwen3-TTS-12Hz-1.7B-Base",
                        "device": device,
                    }))
                }
            }),
        )
    }

    #[tokio::test]
    async fn test_load_posts_model_request() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let url = spawn_stub(load_stub(seen.clone())).await;

        let cloner = HttpCloner::new(&url, Device::Cuda).unwrap();
        let loaded = cloner.load("/models/qwen").await.unwrap();

        assert_eq!(loaded.model, "Qwen3-TTS-12Hz-1.7B-Base");
        assert_eq!(loaded.device, "cuda");

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], LoadRequest::new("/models/qwen", Device::Cuda));
    }

    #[tokio::test]
    async fn test_load_error_status() {
        let router = Router::new().route(
            "/load",
            post(|| async { (StatusCode::NOT_FOUND, "no weights in model_dir") }),
        );
        let url = spawn_stub(router).await;

        let cloner = HttpCloner::new(&url, Device::Cpu).unwrap();
        match cloner.load(".").await {
            Err(BackendError::RequestFailed(msg)) => assert!(msg.contains("no weights")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_load_models_with_transcriber() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let url = spawn_stub(load_stub(seen)).await;

        let config = ModelConfig {
            tts_url: url,
            model_dir: ".".to_string(),
            device: Device::Mps,
            stt: Some(SttConfig {
                url: "http://localhost:9300".to_string(),
                model: DEFAULT_STT_MODEL.to_string(),
            }),
        };

        let models = load_models(&config).await.unwrap();
        assert_eq!(models.device, Device::Mps);
        assert!(models.transcriber.is_some());
    }

    #[tokio::test]
    async fn test_whisper_client_sends_form_and_parses_text() {
        let temp_dir = TempDir::new().unwrap();
        let (wav_path, wav_bytes) = wav_fixture(
            temp_dir.path(),
            "ref_converted.wav",
            &Waveform::new(vec![0.1, -0.1, 0.3], 1, 16_000),
        );

        let received = Received::default();
        let router = Router::new().route(
            "/v1/audio/transcriptions",
            post({
                let received = received.clone();
                move |multipart: Multipart| {
                    let received = received.clone();
                    async move {
                        received.record(multipart).await;
                        axum::Json(serde_json::json!({ "text": " 안녕하세요 " }))
                    }
                }
            }),
        );
        let url = spawn_stub(router).await;

        let client = WhisperClient::new(&url, DEFAULT_STT_MODEL).unwrap();
        let text = client
            .transcribe(wav_path, "ko".to_string())
            .await
            .unwrap();

        assert_eq!(text, " 안녕하세요 ");
        assert_eq!(received.text("model"), DEFAULT_STT_MODEL);
        assert_eq!(received.text("language"), "ko");
        let (file_name, data) = received.file("file");
        assert_eq!(file_name.as_deref(), Some("audio.wav"));
        assert_eq!(data, wav_bytes);
    }

    #[tokio::test]
    async fn test_whisper_client_error_status() {
        let temp_dir = TempDir::new().unwrap();
        let (wav_path, _) = wav_fixture(
            temp_dir.path(),
            "ref_converted.wav",
            &Waveform::new(vec![0.1, -0.1], 1, 16_000),
        );

        let router = Router::new().route(
            "/v1/audio/transcriptions",
            post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "model busy") }),
        );
        let url = spawn_stub(router).await;

        let client = WhisperClient::new(&url, DEFAULT_STT_MODEL).unwrap();
        let result = client.transcribe(wav_path, "ko".to_string()).await;

        assert!(matches!(result, Err(BackendError::RequestFailed(_))));
    }
}
