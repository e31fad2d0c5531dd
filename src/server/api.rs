use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::services::ServeDir;
use uuid::Uuid;

use super::state::AppState;
use crate::evaluation::Evaluation;
use crate::registry::ModelSummary;

const MISSING_FIELDS: &str = "Missing required fields: text, model_id";
const LOG_DOWNLOAD_NAME: &str = "poor_quality_samples.csv";
const INDEX_TEMPLATE: &str = include_str!("../../templates/index.html");

#[derive(Debug, Deserialize)]
pub struct SynthesizeRequest {
    pub text: Option<String>,
    pub model_id: Option<String>,
    #[serde(default)]
    pub speaker: Option<String>,
}

/// The evaluation fields are `null` when the ASR round trip is disabled.
#[derive(Debug, Serialize, Deserialize)]
pub struct SynthesizeResponse {
    pub status: String,
    pub audio_id: String,
    pub transcription: Option<String>,
    pub wer_score: Option<f64>,
    pub threshold_exceeded: Option<bool>,
}

#[derive(Debug, Serialize)]
struct ModelsResponse {
    status: &'static str,
    models: Vec<ModelSummary>,
}

#[derive(Debug, Serialize)]
struct SpeakersResponse {
    status: &'static str,
    speakers: Vec<String>,
}

pub fn create_router(state: Arc<AppState>) -> Router {
    log::info!("Creating API router with endpoints:");
    log::info!("  GET  /");
    log::info!("  GET  /static/* from {}", state.static_dir.display());
    log::info!("  GET  /api/models");
    log::info!("  GET  /api/speakers/{{model_id}}");
    log::info!("  POST /api/synthesize");
    log::info!("  GET  /api/audio/{{audio_id}}");
    log::info!("  GET  /api/logs/download");

    let static_files = ServeDir::new(&state.static_dir);

    Router::new()
        .route("/", get(index))
        .nest_service("/static", static_files)
        .route("/api/models", get(list_models))
        .route("/api/speakers/{*model_id}", get(list_speakers))
        .route("/api/synthesize", post(synthesize))
        .route("/api/audio/{audio_id}", get(get_audio))
        .route("/api/logs/download", get(download_logs))
        .fallback(not_found)
        .with_state(state)
}

async fn index(State(state): State<Arc<AppState>>) -> Result<Html<String>, ApiError> {
    let page = render_index(&state.synthesizer.list_models()).map_err(|e| {
        log::error!("Failed to render index page: {e}");
        ApiError::Internal("Failed to render page".to_string())
    })?;
    Ok(Html(page))
}

fn render_index(models: &[ModelSummary]) -> Result<String, minijinja::Error> {
    let mut env = minijinja::Environment::new();
    env.add_template("index.html", INDEX_TEMPLATE)?;
    let template = env.get_template("index.html")?;
    let page = template.render(minijinja::context! { models => models })?;
    Ok(page)
}

async fn list_models(State(state): State<Arc<AppState>>) -> Json<ModelsResponse> {
    let models = state.synthesizer.list_models();
    log::debug!("Listing {} models", models.len());
    Json(ModelsResponse {
        status: "success",
        models,
    })
}

async fn list_speakers(
    State(state): State<Arc<AppState>>,
    Path(model_id): Path<String>,
) -> Json<SpeakersResponse> {
    Json(SpeakersResponse {
        status: "success",
        speakers: state.synthesizer.get_speakers(&model_id),
    })
}

async fn synthesize(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SynthesizeRequest>, JsonRejection>,
) -> Result<Json<SynthesizeResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| {
        log::debug!("Rejected synthesis payload: {e}");
        ApiError::BadRequest(MISSING_FIELDS.to_string())
    })?;
    let (Some(text), Some(model_id)) = (request.text, request.model_id) else {
        return Err(ApiError::BadRequest(MISSING_FIELDS.to_string()));
    };

    let text = text.trim().to_string();
    if text.is_empty() {
        return Err(ApiError::BadRequest("Text cannot be empty".to_string()));
    }
    let speaker = request.speaker;

    log::info!("Synthesizing text: {text:?} with model: {model_id}, speaker: {speaker:?}");

    let audio_id = Uuid::new_v4().to_string();
    let audio_path = state.audio_path(&audio_id);

    let worker_state = Arc::clone(&state);
    let evaluation = tokio::task::spawn_blocking(move || -> Result<Option<Evaluation>, ApiError> {
        let ok = worker_state.synthesizer.synthesize(
            &text,
            &model_id,
            &audio_path,
            speaker.as_deref(),
        );
        if !ok {
            return Err(ApiError::Internal("Failed to synthesize speech".to_string()));
        }

        let Some(evaluator) = &worker_state.evaluator else {
            return Ok(None);
        };
        evaluator
            .evaluate(&text, &audio_path, &model_id, speaker.as_deref())
            .map(Some)
            .map_err(|e| {
                log::error!("Transcription failed: {e}");
                ApiError::Internal("Failed to transcribe audio".to_string())
            })
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))??;

    Ok(Json(SynthesizeResponse {
        status: "success".to_string(),
        audio_id,
        transcription: evaluation.as_ref().map(|e| e.transcription.clone()),
        wer_score: evaluation.as_ref().map(|e| e.wer_score),
        threshold_exceeded: evaluation.as_ref().map(|e| e.threshold_exceeded),
    }))
}

async fn get_audio(
    State(state): State<Arc<AppState>>,
    Path(audio_id): Path<String>,
) -> Result<Response, ApiError> {
    let audio_not_found = || ApiError::NotFound("Audio file not found".to_string());

    // Only ids we could have generated map to files.
    let audio_id = Uuid::parse_str(&audio_id).map_err(|_| audio_not_found())?;
    let path = state.audio_path(&audio_id.to_string());

    match tokio::fs::read(&path).await {
        Ok(bytes) => Ok(([(header::CONTENT_TYPE, "audio/wav")], bytes).into_response()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(audio_not_found()),
        Err(e) => {
            log::error!("Error serving audio {audio_id}: {e}");
            Err(ApiError::Internal(e.to_string()))
        }
    }
}

async fn download_logs(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    match tokio::fs::read(&state.quality_log).await {
        Ok(bytes) => Ok((
            [
                (header::CONTENT_TYPE, "text/csv".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{LOG_DOWNLOAD_NAME}\""),
                ),
            ],
            bytes,
        )
            .into_response()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ApiError::NotFound("No log file found".to_string()))
        }
        Err(e) => {
            log::error!("Error downloading logs: {e}");
            Err(ApiError::Internal(e.to_string()))
        }
    }
}

async fn not_found() -> ApiError {
    ApiError::NotFound("Endpoint not found".to_string())
}

// Error handling
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(serde_json::json!({
            "status": "error",
            "message": message
        }));

        (status, body).into_response()
    }
}
