//! Synthetic sine-tone backend.
//!
//! Needs no model files and never fails, so a request always produces a
//! playable file even when no real backend is installed.

use std::f64::consts::PI;
use std::path::Path;
use std::sync::Arc;

use crate::audio::{RawAudio, DEFAULT_SAMPLE_RATE};
use crate::engines::{BackendAdapter, LoadedBackend, Synthesized};
use crate::error::Result;
use crate::registry::{BackendKind, ModelDescriptor};

pub const TONE_FREQUENCY_HZ: f64 = 440.0;
pub const TONE_DURATION_SECS: f64 = 2.0;
/// Peak amplitude as a fraction of full scale.
pub const TONE_AMPLITUDE: f64 = 0.3;

/// Generate a 440 Hz sine tone as 16-bit PCM.
pub fn tone(sample_rate: u32, duration_secs: f64) -> Vec<i16> {
    let num_samples = (sample_rate as f64 * duration_secs).round() as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as f64 / sample_rate as f64;
            (i16::MAX as f64 * TONE_AMPLITUDE * (2.0 * PI * TONE_FREQUENCY_HZ * t).sin()) as i16
        })
        .collect()
}

/// The default tone: 2 seconds at 22050 Hz.
pub fn default_tone() -> Vec<i16> {
    tone(DEFAULT_SAMPLE_RATE, TONE_DURATION_SECS)
}

#[derive(Debug, Default)]
pub struct ToneAdapter;

impl BackendAdapter for ToneAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::Synthetic
    }

    fn load(&self, _descriptor: &ModelDescriptor) -> Result<Arc<dyn LoadedBackend>> {
        Ok(Arc::new(ToneBackend))
    }
}

#[derive(Debug, Default)]
pub struct ToneBackend;

impl LoadedBackend for ToneBackend {
    fn run(&self, text: &str, _speaker: Option<&str>, _output_path: &Path) -> Result<Synthesized> {
        log::debug!("Generating test tone for {} chars of text", text.chars().count());
        Ok(Synthesized::Audio {
            audio: RawAudio::from(default_tone()),
            sample_rate: Some(DEFAULT_SAMPLE_RATE),
        })
    }
}
