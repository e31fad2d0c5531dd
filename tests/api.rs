use std::path::Path;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use kasa_tts::asr::Transcriber;
use kasa_tts::evaluation::{Evaluator, QualityLog};
use kasa_tts::registry::{ModelDescriptorBuilder, MMS_AKAN, UGTTS_SWAHILI};
use kasa_tts::server::{create_router, AppState};
use kasa_tts::{BackendKind, Capabilities, ModelRegistry, SynthesisOptions, Synthesizer};

struct EchoTranscriber(&'static str);

impl Transcriber for EchoTranscriber {
    fn transcribe(&self, audio_path: &Path) -> kasa_tts::Result<String> {
        assert!(audio_path.exists());
        Ok(self.0.to_string())
    }
}

fn state(audio_dir: &Path) -> AppState {
    let synthesizer = Synthesizer::new(
        ModelRegistry::builtin(&Capabilities::none()),
        Capabilities::none(),
        SynthesisOptions::default(),
    );
    AppState::new(synthesizer, audio_dir)
}

fn app(state: AppState) -> Router {
    create_router(Arc::new(state))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

async fn send_json(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, body) = send(app, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

fn synthesize_request(body: &str) -> Request<Body> {
    Request::post("/api/synthesize")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn lists_models() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(state(dir.path()));

    let (status, json) = send_json(&app, get("/api/models")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "success");
    let models = json["models"].as_array().unwrap();
    assert!(models.iter().any(|m| m["id"] == MMS_AKAN && m["has_speakers"] == false));
}

#[tokio::test]
async fn speakers_for_ids_with_slashes() {
    let dir = tempfile::tempdir().unwrap();
    let synthesizer = Synthesizer::new(
        ModelRegistry::builtin(&Capabilities::all()),
        Capabilities::none(),
        SynthesisOptions::default(),
    );
    let app = app(AppState::new(synthesizer, dir.path()));

    let (status, json) = send_json(&app, get(&format!("/api/speakers/{UGTTS_SWAHILI}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["speakers"], serde_json::json!(["IM", "PT", "AN"]));

    let (status, json) = send_json(&app, get("/api/speakers/nonexistent-model")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["speakers"], serde_json::json!([]));
}

#[tokio::test]
async fn empty_text_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(state(dir.path()));

    let body = format!(r#"{{"text": "   ", "model_id": "{MMS_AKAN}"}}"#);
    let (status, json) = send_json(&app, synthesize_request(&body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["status"], "error");
    assert_eq!(json["message"], "Text cannot be empty");
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn missing_fields_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(state(dir.path()));

    for body in [r#"{"text": "Hello"}"#, "not json", "{}"] {
        let (status, json) = send_json(&app, synthesize_request(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(json["message"], "Missing required fields: text, model_id");
    }
}

#[tokio::test]
async fn unknown_model_is_a_server_error() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(state(dir.path()));

    let (status, json) = send_json(
        &app,
        synthesize_request(r#"{"text": "Hello", "model_id": "nonexistent-model"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["message"], "Failed to synthesize speech");
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn synthesize_then_fetch_audio() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(state(dir.path()));

    let body = format!(r#"{{"text": " Maakye ", "model_id": "{MMS_AKAN}", "speaker": "default"}}"#);
    let (status, json) = send_json(&app, synthesize_request(&body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "success");
    assert!(json["transcription"].is_null());
    assert!(json["wer_score"].is_null());
    assert!(json["threshold_exceeded"].is_null());

    let audio_id = json["audio_id"].as_str().unwrap();
    let response = app
        .clone()
        .oneshot(get(&format!("/api/audio/{audio_id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/wav");
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();

    let reader = hound::WavReader::new(std::io::Cursor::new(bytes.to_vec())).unwrap();
    assert_eq!(reader.spec().channels, 1);
    assert_eq!(reader.spec().sample_rate, 22050);
    assert_eq!(reader.len(), 44100);
}

#[tokio::test]
async fn unknown_or_malformed_audio_id_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(state(dir.path()));

    let missing = uuid::Uuid::new_v4();
    let (status, json) = send_json(&app, get(&format!("/api/audio/{missing}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["message"], "Audio file not found");

    let (status, _) = send_json(&app, get("/api/audio/..%2Fetc%2Fpasswd")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn evaluation_scores_and_logs_poor_samples() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("poor_quality_samples.csv");
    let evaluator = Evaluator::new(
        Box::new(EchoTranscriber("something else entirely")),
        QualityLog::open(&log_path).unwrap(),
        0.3,
    );
    let audio_dir = dir.path().join("audio");
    std::fs::create_dir(&audio_dir).unwrap();
    let app = app(state(&audio_dir).with_evaluator(evaluator));

    let body = format!(r#"{{"text": "Hello", "model_id": "{MMS_AKAN}"}}"#);
    let (status, json) = send_json(&app, synthesize_request(&body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["transcription"], "something else entirely");
    assert_eq!(json["wer_score"], 1.0);
    assert_eq!(json["threshold_exceeded"], true);

    let response = app.clone().oneshot(get("/api/logs/download")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .contains("poor_quality_samples.csv"));
    let csv = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(csv.to_vec()).unwrap();
    assert!(text.starts_with("input_text,transcribed_text,wer_score"));
    assert!(text.contains("Hello,something else entirely,1.0"));
}

#[tokio::test]
async fn missing_log_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let mut state = state(dir.path());
    state.quality_log = dir.path().join("absent.csv");
    let app = app(state);

    let (status, json) = send_json(&app, get("/api/logs/download")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["message"], "No log file found");
}

#[tokio::test]
async fn unknown_endpoint_uses_error_envelope() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(state(dir.path()));

    let (status, json) = send_json(&app, get("/api/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["status"], "error");
    assert_eq!(json["message"], "Endpoint not found");
}

#[tokio::test]
async fn index_page_lists_models() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(state(dir.path()));

    let response = app.clone().oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/html"));
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let page = String::from_utf8(body.to_vec()).unwrap();

    assert!(page.contains(&format!("value=\"{MMS_AKAN}\"")));
    assert!(page.contains("Facebook MMS TTS Akan"));
    assert!(page.contains("/static/js/app.js"));
}

#[tokio::test]
async fn index_page_escapes_model_names() {
    let dir = tempfile::tempdir().unwrap();
    let mut registry = ModelRegistry::new();
    registry.register(
        ModelDescriptorBuilder::default()
            .id("local/tone")
            .name("Tone <beta>")
            .kind(BackendKind::Synthetic)
            .build()
            .unwrap(),
    );
    let synthesizer = Synthesizer::new(registry, Capabilities::none(), SynthesisOptions::default());
    let app = app(AppState::new(synthesizer, dir.path()));

    let (status, body) = send(&app, get("/")).await;
    assert_eq!(status, StatusCode::OK);
    let page = String::from_utf8(body).unwrap();
    assert!(page.contains("Tone &lt;beta&gt;"));
    assert!(!page.contains("<beta>"));
}

#[tokio::test]
async fn static_assets_are_served() {
    let dir = tempfile::tempdir().unwrap();
    let static_dir = dir.path().join("static");
    std::fs::create_dir_all(static_dir.join("js")).unwrap();
    std::fs::write(static_dir.join("js/app.js"), "console.log('kasa');").unwrap();

    let mut state = state(dir.path());
    state.static_dir = static_dir;
    let app = app(state);

    let (status, body) = send(&app, get("/static/js/app.js")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"console.log('kasa');");

    let (status, _) = send(&app, get("/static/js/missing.js")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
