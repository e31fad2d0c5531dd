use std::path::PathBuf;

use clap::Parser;

use crate::capabilities::DEFAULT_TOOLKIT_PROGRAM;
use crate::evaluation::DEFAULT_WER_THRESHOLD;
use crate::orchestrator::SynthesisOptions;

/// Command line and environment configuration for the HTTP service.
#[derive(Debug, Clone, Parser)]
#[command(name = "kasa-tts", version, about = "Text-to-speech synthesis service")]
pub struct ServerConfig {
    #[arg(long, env = "KASA_HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "KASA_PORT", default_value_t = 5000)]
    pub port: u16,

    /// Directory for synthesized WAV files [default: system temp dir]
    #[arg(long, env = "KASA_AUDIO_DIR")]
    pub audio_dir: Option<PathBuf>,

    /// Root directory of ONNX model folders, one per model id
    #[arg(long, env = "KASA_MODELS_DIR", default_value = "models")]
    pub models_dir: PathBuf,

    /// JSON file with extra model descriptors
    #[arg(long, env = "KASA_REGISTRY")]
    pub registry: Option<PathBuf>,

    /// Toolkit TTS program
    #[arg(long, env = "KASA_TOOLKIT", default_value = DEFAULT_TOOLKIT_PROGRAM)]
    pub toolkit_program: String,

    /// CPU threads per ONNX session
    #[arg(long)]
    pub num_threads: Option<usize>,

    /// Fail instead of writing the test tone when a backend is unavailable
    #[arg(long)]
    pub no_tone_fallback: bool,

    /// Transcribe each result and score it with WER
    #[arg(long, env = "KASA_EVALUATE")]
    pub evaluate: bool,

    /// ASR command line; the audio path is appended. Split on whitespace,
    /// quotes are not supported

    #[arg(long, env = "ASR_COMMAND")]
    pub asr_command: Option<String>,

    #[arg(long, env = "WER_THRESHOLD", default_value_t = DEFAULT_WER_THRESHOLD)]
    pub wer_threshold: f64,

    /// Front-end assets served under /static
    #[arg(long, env = "KASA_STATIC_DIR", default_value = "static")]
    pub static_dir: PathBuf,

    /// CSV log of samples over the WER threshold
    #[arg(long, env = "KASA_QUALITY_LOG", default_value = "poor_quality_samples.csv")]
    pub quality_log: PathBuf,
}

impl ServerConfig {
    pub fn audio_dir(&self) -> PathBuf {
        self.audio_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn synthesis_options(&self) -> SynthesisOptions {
        SynthesisOptions {
            fallback_to_tone: !self.no_tone_fallback,
            ..SynthesisOptions::default()
        }
    }
}
