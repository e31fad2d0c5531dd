use std::path::PathBuf;

/// Errors raised anywhere between model lookup and a finished WAV file.
#[derive(thiserror::Error, Debug)]
pub enum TtsError {
    #[error("Unknown model: {0}")]
    UnknownModel(String),
    #[error("{backend} backend is not available in this build or environment")]
    BackendUnavailable { backend: String },
    #[error("Failed to load model {model_id}: {reason}")]
    BackendLoadFailure { model_id: String, reason: String },
    #[error("Synthesis failed: {0}")]
    SynthesisFailure(String),
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[cfg(feature = "vits")]
    #[error("ONNX runtime error: {0}")]
    Ort(#[from] ort::Error),
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl TtsError {
    pub(crate) fn load_failure(model_id: &str, reason: impl std::fmt::Display) -> Self {
        TtsError::BackendLoadFailure {
            model_id: model_id.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TtsError>;
