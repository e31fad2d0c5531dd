//! Speech synthesis backends.
//!
//! Each backend kind has a [`BackendAdapter`] that loads a model descriptor
//! into a [`LoadedBackend`], which then turns text into audio.
//!
//! # Available Backends
//!
//! - [`vits`] - VITS ONNX models (pipeline inference, `vits` feature)
//! - [`toolkit`] - external TTS program that writes the WAV itself
//! - [`tone`] - synthetic 440 Hz tone, always available

pub mod tone;
pub mod toolkit;
pub mod vits;

use std::path::Path;
use std::sync::Arc;

use crate::audio::RawAudio;
use crate::error::Result;
use crate::registry::{BackendKind, ModelDescriptor};

/// What a backend produced for one request.
#[derive(Debug)]
pub enum Synthesized {
    /// In-memory audio that still has to be normalized and written.
    Audio {
        audio: RawAudio,
        /// `None` means the backend did not report a rate.
        sample_rate: Option<u32>,
    },
    /// The backend wrote the output file itself.
    Written,
}

/// A model that is ready to synthesize.
///
/// Instances are shared between requests through the orchestrator's cache.
pub trait LoadedBackend: Send + Sync {
    /// Synthesize `text`. Backends that own their encoding write straight to
    /// `output_path` and return [`Synthesized::Written`].
    fn run(&self, text: &str, speaker: Option<&str>, output_path: &Path) -> Result<Synthesized>;
}

/// Loader for one backend kind.
pub trait BackendAdapter: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Load a model. Fails with `BackendUnavailable` when the capability is
    /// missing and `BackendLoadFailure` when loading itself goes wrong.
    fn load(&self, descriptor: &ModelDescriptor) -> Result<Arc<dyn LoadedBackend>>;
}
