//! Pipeline-inference backend for VITS models exported to ONNX.
//!
//! Covers the MMS-TTS family and its finetunes: a character vocabulary, a
//! single ONNX graph mapping token ids (and optionally a speaker id) to a
//! float waveform.
//!
//! # Model Directory Layout
//!
//! ```text
//! models/facebook/mms-tts-aka/
//! ├── model.onnx               # exported graph (any *.onnx is accepted)
//! ├── vocab.json               # character -> token id
//! ├── tokenizer_config.json    # optional: add_blank, normalize, pad_token
//! └── config.json              # optional: sampling_rate
//! ```
//!
//! The directory is `paths.model` from the descriptor, or
//! `<models_dir>/<model id>` when the descriptor has no paths.
//!
//! Inference needs the `vits` Cargo feature; without it the adapter reports
//! the backend as unavailable.

#[cfg(feature = "vits")]
pub mod model;
pub mod vocab;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::audio::DEFAULT_SAMPLE_RATE;
use crate::capabilities::{Capabilities, Device};
use crate::engines::{BackendAdapter, LoadedBackend};
use crate::error::{Result, TtsError};
use crate::registry::{BackendKind, ModelDescriptor};

pub use vocab::VitsTokenizer;

/// Parameters for configuring VITS model loading.
#[derive(Debug, Clone, Default)]
pub struct VitsModelParams {
    /// Number of CPU threads to use for inference.
    /// `None` uses the ORT default (typically all available cores).
    pub num_threads: Option<usize>,
}

pub struct VitsAdapter {
    models_dir: PathBuf,
    params: VitsModelParams,
    available: bool,
    device: Device,
}

impl VitsAdapter {
    pub fn new(
        models_dir: impl Into<PathBuf>,
        params: VitsModelParams,
        capabilities: &Capabilities,
    ) -> Self {
        Self {
            models_dir: models_dir.into(),
            params,
            available: capabilities.pipeline,
            device: capabilities.device,
        }
    }

    /// Directory holding the model files for `descriptor`.
    pub fn model_dir(&self, descriptor: &ModelDescriptor) -> PathBuf {
        match &descriptor.paths {
            Some(paths) => paths.model.clone(),
            None => self.models_dir.join(&descriptor.id),
        }
    }
}

impl BackendAdapter for VitsAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::PipelineInference
    }

    fn load(&self, descriptor: &ModelDescriptor) -> Result<Arc<dyn LoadedBackend>> {
        if !self.available {
            return Err(TtsError::BackendUnavailable {
                backend: self.kind().to_string(),
            });
        }

        let model_dir = self.model_dir(descriptor);
        if !model_dir.is_dir() {
            return Err(TtsError::load_failure(
                &descriptor.id,
                format!("model directory {} not found", model_dir.display()),
            ));
        }

        load_model(descriptor, &model_dir, &self.params, self.device)
    }
}

#[cfg(feature = "vits")]
fn load_model(
    descriptor: &ModelDescriptor,
    model_dir: &Path,
    params: &VitsModelParams,
    device: Device,
) -> Result<Arc<dyn LoadedBackend>> {
    let model = model::VitsModel::load(descriptor, model_dir, params, device)
        .map_err(|e| TtsError::load_failure(&descriptor.id, e))?;
    Ok(Arc::new(model))
}

#[cfg(not(feature = "vits"))]
fn load_model(
    _descriptor: &ModelDescriptor,
    _model_dir: &Path,
    _params: &VitsModelParams,
    _device: Device,
) -> Result<Arc<dyn LoadedBackend>> {
    Err(TtsError::BackendUnavailable {
        backend: BackendKind::PipelineInference.to_string(),
    })
}

/// Output sample rate from `config.json`, or the default when absent.
pub fn read_sampling_rate(model_dir: &Path) -> Result<u32> {
    let config_path = model_dir.join("config.json");
    if !config_path.exists() {
        log::debug!("config.json not found, assuming {DEFAULT_SAMPLE_RATE} Hz");
        return Ok(DEFAULT_SAMPLE_RATE);
    }

    let content = std::fs::read_to_string(&config_path)?;
    let json: serde_json::Value = serde_json::from_str(&content)?;
    match json.get("sampling_rate") {
        None => Ok(DEFAULT_SAMPLE_RATE),
        Some(value) => value
            .as_u64()
            .and_then(|rate| u32::try_from(rate).ok())
            .filter(|&rate| rate > 0)
            .ok_or_else(|| TtsError::Config(format!("Invalid sampling_rate: {value}"))),
    }
}

/// Map a speaker to the model's integer speaker id: a numeric speaker is used
/// as-is, otherwise its position in the descriptor's speaker list.
pub fn speaker_index(speaker: &str, speakers: &[String]) -> Result<i64> {
    if let Ok(index) = speaker.parse::<i64>() {
        return Ok(index);
    }
    speakers
        .iter()
        .position(|s| s == speaker)
        .map(|i| i as i64)
        .ok_or_else(|| TtsError::SynthesisFailure(format!("Unknown speaker: {speaker}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ModelDescriptorBuilder, ModelPaths};

    fn descriptor(paths: Option<ModelPaths>) -> ModelDescriptor {
        let mut builder = ModelDescriptorBuilder::default();
        builder
            .id("facebook/mms-tts-aka")
            .name("MMS Akan")
            .kind(BackendKind::PipelineInference);
        if let Some(paths) = paths {
            builder.paths(paths);
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_model_dir_defaults_under_models_dir() {
        let adapter = VitsAdapter::new("/srv/models", VitsModelParams::default(), &Capabilities::all());
        assert_eq!(
            adapter.model_dir(&descriptor(None)),
            PathBuf::from("/srv/models/facebook/mms-tts-aka")
        );

        let explicit = descriptor(Some(ModelPaths {
            model: PathBuf::from("/opt/aka"),
            config: None,
        }));
        assert_eq!(adapter.model_dir(&explicit), PathBuf::from("/opt/aka"));
    }

    #[test]
    fn test_unavailable_pipeline_fails_fast() {
        let adapter = VitsAdapter::new("models", VitsModelParams::default(), &Capabilities::none());
        assert!(matches!(
            adapter.load(&descriptor(None)),
            Err(TtsError::BackendUnavailable { .. })
        ));
    }

    #[test]
    fn test_missing_model_dir_is_load_failure() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = VitsAdapter::new(dir.path(), VitsModelParams::default(), &Capabilities::all());
        assert!(matches!(
            adapter.load(&descriptor(None)),
            Err(TtsError::BackendLoadFailure { .. })
        ));
    }

    #[test]
    fn test_sampling_rate_from_config() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(read_sampling_rate(dir.path()).unwrap(), DEFAULT_SAMPLE_RATE);

        std::fs::write(dir.path().join("config.json"), r#"{"sampling_rate": 16000}"#).unwrap();
        assert_eq!(read_sampling_rate(dir.path()).unwrap(), 16000);

        std::fs::write(dir.path().join("config.json"), r#"{"sampling_rate": "fast"}"#).unwrap();
        assert!(read_sampling_rate(dir.path()).is_err());
    }

    #[test]
    fn test_speaker_index() {
        let speakers = vec!["IM".to_string(), "PT".to_string(), "AN".to_string()];
        assert_eq!(speaker_index("PT", &speakers).unwrap(), 1);
        assert_eq!(speaker_index("4", &speakers).unwrap(), 4);
        assert!(matches!(
            speaker_index("XX", &speakers),
            Err(TtsError::SynthesisFailure(_))
        ));
    }
}
