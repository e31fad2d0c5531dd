//! Model selection, backend loading and output normalization.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::audio::{normalize, DEFAULT_SAMPLE_RATE};
use crate::cache::ModelCache;
use crate::capabilities::Capabilities;
use crate::engines::tone::{default_tone, ToneAdapter};
use crate::engines::toolkit::ToolkitAdapter;
use crate::engines::vits::{VitsAdapter, VitsModelParams};
use crate::engines::{BackendAdapter, LoadedBackend, Synthesized};
use crate::error::{Result, TtsError};
use crate::registry::{BackendKind, ModelDescriptor, ModelRegistry, ModelSummary};
use crate::AudioArtifact;

/// Root of the ONNX model folders used by [`Synthesizer::new`].
pub const DEFAULT_MODELS_DIR: &str = "models";

/// Speaker token some clients send to mean "no particular voice".
pub const DEFAULT_SPEAKER: &str = "default";

/// How a backend kind treats the [`DEFAULT_SPEAKER`] token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultSpeaker {
    /// Drop it, as if no speaker was given.
    Ignore,
    /// Hand it to the backend unchanged.
    PassThrough,
}

#[derive(Debug, Clone)]
pub struct SynthesisOptions {
    /// Write the test tone when the requested backend is unavailable.
    pub fallback_to_tone: bool,
    pub default_speaker: HashMap<BackendKind, DefaultSpeaker>,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            fallback_to_tone: true,
            default_speaker: HashMap::from([
                (BackendKind::PipelineInference, DefaultSpeaker::Ignore),
                (BackendKind::ToolkitInference, DefaultSpeaker::PassThrough),
                (BackendKind::Synthetic, DefaultSpeaker::Ignore),
            ]),
        }
    }
}

impl SynthesisOptions {
    pub fn default_speaker_policy(&self, kind: BackendKind) -> DefaultSpeaker {
        self.default_speaker
            .get(&kind)
            .copied()
            .unwrap_or(DefaultSpeaker::Ignore)
    }
}

/// Result of a successful synthesis call.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisOutcome {
    pub output_path: PathBuf,
    pub backend: BackendKind,
    /// `None` when the backend wrote the file itself.
    pub sample_rate: Option<u32>,
    /// The requested backend was unavailable and the test tone was written.
    pub fell_back: bool,
}

/// Resolves models to backends, caches loaded backends, and writes WAV files.
pub struct Synthesizer {
    registry: ModelRegistry,
    adapters: HashMap<BackendKind, Box<dyn BackendAdapter>>,
    cache: ModelCache<dyn LoadedBackend>,
    options: SynthesisOptions,
}

impl Synthesizer {
    /// Build an orchestrator with the stock adapters for every backend kind.
    ///
    /// ONNX models are looked up under [`DEFAULT_MODELS_DIR`] and the toolkit
    /// runs `capabilities.toolkit_program`. Use [`Synthesizer::with_backends`]
    /// for another models directory.
    pub fn new(registry: ModelRegistry, capabilities: Capabilities, options: SynthesisOptions) -> Self {
        Self::with_backends(
            registry,
            capabilities,
            options,
            DEFAULT_MODELS_DIR,
            VitsModelParams::default(),
        )
    }

    pub fn with_backends(
        registry: ModelRegistry,
        capabilities: Capabilities,
        options: SynthesisOptions,
        models_dir: impl Into<PathBuf>,
        vits_params: VitsModelParams,
    ) -> Self {
        let toolkit = ToolkitAdapter::new(capabilities.toolkit_program.clone(), &capabilities);
        Self::bare(registry, options)
            .with_adapter(Box::new(VitsAdapter::new(models_dir, vits_params, &capabilities)))
            .with_adapter(Box::new(toolkit))
            .with_adapter(Box::new(ToneAdapter))
    }

    /// An orchestrator with no adapters registered.
    pub fn bare(registry: ModelRegistry, options: SynthesisOptions) -> Self {
        Self {
            registry,
            adapters: HashMap::new(),
            cache: ModelCache::new(),
            options,
        }
    }

    /// Register (or replace) the adapter for its backend kind.
    pub fn with_adapter(mut self, adapter: Box<dyn BackendAdapter>) -> Self {
        self.adapters.insert(adapter.kind(), adapter);
        self
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn list_models(&self) -> Vec<ModelSummary> {
        self.registry.list_models()
    }

    pub fn get_speakers(&self, model_id: &str) -> Vec<String> {
        self.registry.get_speakers(model_id)
    }

    /// Number of backends currently held in the cache.
    pub fn loaded_models(&self) -> usize {
        self.cache.len()
    }

    pub fn is_loaded(&self, model_id: &str) -> bool {
        self.cache.contains(model_id)
    }

    /// Synthesize `text` into a WAV file at `output_path`.
    ///
    /// Never fails past this boundary: every error is logged and reported as
    /// `false`. Use [`Synthesizer::try_synthesize`] for the error itself.
    pub fn synthesize(
        &self,
        text: &str,
        model_id: &str,
        output_path: &Path,
        speaker: Option<&str>,
    ) -> bool {
        match self.try_synthesize(text, model_id, output_path, speaker) {
            Ok(outcome) => {
                log::info!("Audio saved to: {}", outcome.output_path.display());
                true
            }
            Err(e) => {
                log::error!("Synthesis failed for model {model_id}: {e}");
                false
            }
        }
    }

    pub fn try_synthesize(
        &self,
        text: &str,
        model_id: &str,
        output_path: &Path,
        speaker: Option<&str>,
    ) -> Result<SynthesisOutcome> {
        let descriptor = self
            .registry
            .get(model_id)
            .ok_or_else(|| TtsError::UnknownModel(model_id.to_string()))?;
        log::info!(
            "Synthesizing {:?} with model {} ({}), speaker: {:?}",
            text,
            model_id,
            descriptor.kind,
            speaker
        );

        let speaker = self.resolve_speaker(descriptor, speaker)?;
        let start = Instant::now();

        let result = self
            .load_backend(descriptor)
            .and_then(|backend| backend.run(text, speaker.as_deref(), output_path));

        let outcome = match result {
            Ok(synthesized) => {
                let sample_rate = write_output(synthesized, output_path)?;
                SynthesisOutcome {
                    output_path: output_path.to_path_buf(),
                    backend: descriptor.kind,
                    sample_rate,
                    fell_back: false,
                }
            }
            Err(TtsError::BackendUnavailable { backend }) if self.options.fallback_to_tone => {
                log::warn!("{backend} backend unavailable for {model_id}, writing test tone");
                write_tone(output_path)?
            }
            Err(e) => return Err(e),
        };

        log::debug!(
            "Synthesis with {} finished in {:.2?}",
            model_id,
            start.elapsed()
        );
        Ok(outcome)
    }

    fn load_backend(&self, descriptor: &ModelDescriptor) -> Result<Arc<dyn LoadedBackend>> {
        let adapter = self.adapters.get(&descriptor.kind).ok_or_else(|| {
            TtsError::BackendUnavailable {
                backend: descriptor.kind.to_string(),
            }
        })?;

        self.cache.get_or_load(&descriptor.id, || {
            log::info!("Loading TTS model: {}", descriptor.id);
            let start = Instant::now();
            let backend = adapter.load(descriptor).map_err(|e| {
                log::error!("Failed to load model {}: {}", descriptor.id, e);
                e
            })?;
            log::info!(
                "Successfully loaded model {} in {:.2?}",
                descriptor.id,
                start.elapsed()
            );
            Ok(backend)
        })
    }

    /// Apply the default-speaker policy and check the speaker against the model.
    fn resolve_speaker(
        &self,
        descriptor: &ModelDescriptor,
        speaker: Option<&str>,
    ) -> Result<Option<String>> {
        let Some(speaker) = speaker.filter(|s| !s.is_empty()) else {
            return Ok(None);
        };

        if speaker == DEFAULT_SPEAKER {
            return Ok(match self.options.default_speaker_policy(descriptor.kind) {
                DefaultSpeaker::Ignore => None,
                DefaultSpeaker::PassThrough => Some(speaker.to_string()),
            });
        }

        if !descriptor.has_speakers() {
            log::debug!("Model {} has no speakers, ignoring {speaker}", descriptor.id);
            return Ok(None);
        }

        if descriptor.speakers().iter().any(|s| s == speaker) {
            Ok(Some(speaker.to_string()))
        } else {
            Err(TtsError::SynthesisFailure(format!(
                "Speaker {speaker} is not offered by model {}",
                descriptor.id
            )))
        }
    }
}

fn write_output(synthesized: Synthesized, output_path: &Path) -> Result<Option<u32>> {
    match synthesized {
        Synthesized::Audio { audio, sample_rate } => {
            let artifact = AudioArtifact {
                samples: normalize(audio)?,
                sample_rate: sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE),
            };
            artifact.write_wav(output_path)?;
            log::debug!(
                "Wrote {:.2}s of audio at {} Hz",
                artifact.duration_secs(),
                artifact.sample_rate
            );
            Ok(Some(artifact.sample_rate))
        }
        Synthesized::Written => {
            if !output_path.exists() {
                return Err(TtsError::FileNotFound(output_path.to_path_buf()));
            }
            Ok(None)
        }
    }
}

fn write_tone(output_path: &Path) -> Result<SynthesisOutcome> {
    let artifact = AudioArtifact {
        samples: default_tone(),
        sample_rate: DEFAULT_SAMPLE_RATE,
    };
    artifact.write_wav(output_path)?;
    Ok(SynthesisOutcome {
        output_path: output_path.to_path_buf(),
        backend: BackendKind::Synthetic,
        sample_rate: Some(DEFAULT_SAMPLE_RATE),
        fell_back: true,
    })
}
