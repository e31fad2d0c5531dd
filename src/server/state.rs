use std::path::PathBuf;
use std::sync::Arc;

use crate::evaluation::Evaluator;
use crate::orchestrator::Synthesizer;

/// Shared state behind every request handler.
#[derive(Clone)]
pub struct AppState {
    pub synthesizer: Arc<Synthesizer>,
    /// `None` when the ASR round trip is switched off.
    pub evaluator: Option<Arc<Evaluator>>,
    pub audio_dir: PathBuf,
    pub quality_log: PathBuf,
    /// Served under `/static`.
    pub static_dir: PathBuf,
}

impl AppState {
    pub fn new(synthesizer: Synthesizer, audio_dir: impl Into<PathBuf>) -> Self {
        Self {
            synthesizer: Arc::new(synthesizer),
            evaluator: None,
            audio_dir: audio_dir.into(),
            quality_log: PathBuf::from("poor_quality_samples.csv"),
            static_dir: PathBuf::from("static"),
        }
    }

    pub fn with_evaluator(mut self, evaluator: Evaluator) -> Self {
        self.quality_log = evaluator.log().path().to_path_buf();
        self.evaluator = Some(Arc::new(evaluator));
        self
    }

    /// Location of the WAV file for an audio id.
    pub fn audio_path(&self, audio_id: &str) -> PathBuf {
        self.audio_dir.join(format!("{audio_id}.wav"))
    }
}
