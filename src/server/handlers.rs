use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::{Form, Json};
use serde::Serialize;

use crate::engine::{CloneEngine, GenerationRequest, auto_transcribe};
use crate::server::error::ApiError;
use crate::server::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    models_loaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    device: Option<String>,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let models = state.models();
    Json(HealthResponse {
        status: "ok",
        models_loaded: models.is_some(),
        device: models.map(|m| m.device.to_string()),
    })
}

pub async fn favicon() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "image/x-icon")], Body::empty())
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    message: &'static str,
    ref_audio_path: String,
    original_name: String,
    auto_transcription: String,
}

/// Store an uploaded recording, convert it and try to transcribe it.
pub async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut multipart = multipart?;
    let mut upload = None;

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let original_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await?;
        upload = Some((original_name, bytes));
    }

    let (original_name, data) = upload.ok_or_else(|| ApiError::unprocessable("No file uploaded"))?;
    let size = data.len();

    let uploads = state.uploads.clone();
    let name = original_name.clone();
    let stored = tokio::task::spawn_blocking(move || uploads.store(&name, &data))
        .await
        .map_err(|e| ApiError::internal(format!("Upload task failed: {e}")))??;
    tracing::info!(path = %stored.display(), bytes = size, "stored upload");

    let converter = state.converter;
    let source = stored.clone();
    let converted = tokio::task::spawn_blocking(move || converter.convert(&source))
        .await
        .map_err(|e| ApiError::internal(format!("Conversion task failed: {e}")))?;

    let wav_path = match converted {
        Ok(path) => path,
        Err(e) => {
            tracing::error!(error = %e, path = %stored.display(), "conversion failed");
            return Err(ApiError::internal("Failed to parse audio format"));
        }
    };

    let transcriber = state.models().and_then(|m| m.transcriber.clone());
    let auto_transcription =
        auto_transcribe(transcriber.as_deref(), &wav_path, &state.config.stt_language).await;

    Ok(Json(UploadResponse {
        message: "File prepared successfully",
        ref_audio_path: wav_path.display().to_string(),
        original_name,
        auto_transcription,
    }))
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    success: bool,
    filename: String,
    url: String,
    time_taken: String,
    text: String,
    timestamp: String,
}

/// Generate speech for `text` in the voice of the uploaded reference.
///
/// Fields arrive either URL-encoded or as multipart form data.
pub async fn generate(
    State(state): State<AppState>,
    request: Request,
) -> Result<Json<GenerateResponse>, ApiError> {
    let models = state.models().ok_or_else(ApiError::model_loading)?;
    let cloner = Arc::clone(&models.cloner);

    let mut fields = read_form_fields(request).await?;
    // Empty values count as missing
    let mut required = |name: &str| {
        fields
            .remove(name)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| ApiError::unprocessable(format!("Field required: {name}")))
    };
    let text = required("text")?;
    let ref_text = required("ref_text")?;
    let ref_audio_path = required("ref_audio_path")?;

    // Acquire lock to ensure sequential use of the model
    let _guard = state.lock.lock().await;

    let (filename, output_path) = state.next_output_path();
    let request = GenerationRequest::new(text.clone(), ref_audio_path, ref_text);

    let result = CloneEngine::new(cloner)
        .generate(&request, &output_path)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "generation failed");
            ApiError::from(e)
        })?;

    Ok(Json(GenerateResponse {
        success: true,
        url: format!("/generations/{filename}"),
        filename,
        time_taken: result.time_taken(),
        text,
        timestamp: result.clock_time(),
    }))
}

async fn read_form_fields(request: Request) -> Result<HashMap<String, String>, ApiError> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("multipart/form-data"));

    if !is_multipart {
        let Form(fields) = Form::<HashMap<String, String>>::from_request(request, &()).await?;
        return Ok(fields);
    }

    let mut multipart = Multipart::from_request(request, &()).await?;
    let mut fields = HashMap::new();

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        let value = field.text().await?;
        fields.insert(name, value);
    }

    Ok(fields)
}
