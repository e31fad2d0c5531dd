//! HTTP request layer.

pub mod api;
pub mod state;

use std::sync::Arc;

use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::asr::CommandTranscriber;
use crate::capabilities::Capabilities;
use crate::config::ServerConfig;
use crate::engines::vits::VitsModelParams;
use crate::error::{Result, TtsError};
use crate::evaluation::{Evaluator, QualityLog};
use crate::orchestrator::Synthesizer;
use crate::registry::ModelRegistry;

pub use api::create_router;
pub use state::AppState;

/// Assemble registry, orchestrator and evaluator from configuration.
pub fn build_state(config: &ServerConfig, capabilities: Capabilities) -> Result<AppState> {
    let mut registry = ModelRegistry::builtin(&capabilities);
    if let Some(path) = &config.registry {
        registry.extend_from_json(path)?;
    }
    log::info!("{} model(s) registered", registry.len());

    let synthesizer = Synthesizer::with_backends(
        registry,
        capabilities,
        config.synthesis_options(),
        &config.models_dir,
        VitsModelParams {
            num_threads: config.num_threads,
        },
    );

    let audio_dir = config.audio_dir();
    std::fs::create_dir_all(&audio_dir)?;
    log::info!("Audio files are written to {}", audio_dir.display());

    let mut state = AppState::new(synthesizer, audio_dir);
    state.quality_log = config.quality_log.clone();
    state.static_dir = config.static_dir.clone();

    if config.evaluate {
        let command = config.asr_command.as_deref().ok_or_else(|| {
            TtsError::Config("--evaluate requires --asr-command".to_string())
        })?;
        let evaluator = Evaluator::new(
            Box::new(CommandTranscriber::parse(command)?),
            QualityLog::open(&config.quality_log)?,
            config.wer_threshold,
        );
        log::info!(
            "ASR evaluation enabled, WER threshold {}",
            config.wer_threshold
        );
        state = state.with_evaluator(evaluator);
    } else {
        log::info!("ASR evaluation disabled");
    }

    Ok(state)
}

/// Start the HTTP server and run until it fails.
pub async fn serve(config: ServerConfig) -> Result<()> {
    log::info!("Initializing kasa-tts HTTP server");
    log::debug!("Server configuration: {:?}", config);

    let capabilities = Capabilities::detect(&config.toolkit_program);
    let state = build_state(&config, capabilities)?;

    let app = create_router(Arc::new(state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = config.addr();
    log::info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
        log::error!("Failed to bind to {}: {}", addr, e);
        TtsError::Io(e)
    })?;

    log::info!("Server started successfully!");
    axum::serve(listener, app).await?;
    Ok(())
}
