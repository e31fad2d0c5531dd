//! # kasa-tts
//!
//! A text-to-speech orchestration service. Requests name a model; the
//! orchestrator picks the backend that serves it, loads and caches it, and
//! writes the result as a mono 16-bit WAV file. An optional ASR round trip
//! scores the output with word error rate.
//!
//! ## Backends
//!
//! - **Pipeline inference**: VITS-style ONNX models (`vits` feature)
//! - **Toolkit inference**: an external TTS program that writes its own WAV
//! - **Synthetic**: a 440 Hz test tone, always available
//!
//! When a backend is not available the orchestrator falls back to the tone,
//! so the service works end to end with no models installed.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use kasa_tts::{Capabilities, ModelRegistry, Synthesizer, SynthesisOptions};
//!
//! let capabilities = Capabilities::detect("tts");
//! let registry = ModelRegistry::builtin(&capabilities);
//! let synthesizer = Synthesizer::new(registry, capabilities, SynthesisOptions::default());
//!
//! let ok = synthesizer.synthesize(
//!     "Maakye",
//!     "facebook/mms-tts-aka",
//!     Path::new("/tmp/out.wav"),
//!     None,
//! );
//! assert!(ok);
//! ```

pub mod asr;
pub mod audio;
pub mod cache;
pub mod capabilities;
pub mod config;
pub mod engines;
pub mod error;
pub mod evaluation;
pub mod orchestrator;
pub mod registry;
pub mod server;

use std::path::Path;

pub use capabilities::{Capabilities, Device};
pub use error::{Result, TtsError};
pub use orchestrator::{DefaultSpeaker, SynthesisOptions, SynthesisOutcome, Synthesizer};
pub use registry::{BackendKind, ModelDescriptor, ModelRegistry};

/// Normalized synthesis output: mono 16-bit PCM.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioArtifact {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

impl AudioArtifact {
    /// Write the audio to a mono 16-bit PCM WAV file.
    pub fn write_wav(&self, path: &Path) -> Result<()> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec)?;
        for &sample in &self.samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
        Ok(())
    }

    /// Duration of the audio in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}
