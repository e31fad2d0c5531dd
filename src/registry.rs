//! Static table of the models this service can synthesize with.
//!
//! Lookups never fail: an unknown id yields `None` or an empty speaker list,
//! so the model listing endpoints always succeed.

use std::fmt;
use std::path::{Path, PathBuf};

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::capabilities::Capabilities;
use crate::error::Result;

/// The inference engine family responsible for turning text into audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    PipelineInference,
    ToolkitInference,
    Synthetic,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackendKind::PipelineInference => "pipeline-inference",
            BackendKind::ToolkitInference => "toolkit-inference",
            BackendKind::Synthetic => "synthetic",
        };
        f.write_str(name)
    }
}

/// Local weight and config files for a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPaths {
    pub model: PathBuf,
    #[serde(default)]
    pub config: Option<PathBuf>,
}

/// Everything needed to pick and load a backend for one model id.
///
/// ```
/// use kasa_tts::registry::{BackendKind, ModelDescriptorBuilder};
///
/// let descriptor = ModelDescriptorBuilder::default()
///     .id("local/multi")
///     .name("Local multispeaker")
///     .kind(BackendKind::ToolkitInference)
///     .speakers(vec!["IM".to_string(), "PT".to_string()])
///     .build()?;
/// assert!(descriptor.has_speakers());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[builder(setter(into))]
pub struct ModelDescriptor {
    pub id: String,
    pub name: String,
    pub kind: BackendKind,
    #[serde(default)]
    #[builder(setter(strip_option), default)]
    pub speakers: Option<Vec<String>>,
    #[serde(default)]
    #[builder(setter(strip_option), default)]
    pub paths: Option<ModelPaths>,
}

impl ModelDescriptor {
    fn new(id: &str, name: &str, kind: BackendKind) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            kind,
            speakers: None,
            paths: None,
        }
    }

    pub fn speakers(&self) -> &[String] {
        self.speakers.as_deref().unwrap_or_default()
    }

    pub fn has_speakers(&self) -> bool {
        !self.speakers().is_empty()
    }
}

/// One row of the model listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelSummary {
    pub id: String,
    pub name: String,
    pub has_speakers: bool,
}

pub const MMS_AKAN: &str = "facebook/mms-tts-aka";
pub const UGTTS_AKAN: &str =
    "hci-lab-dcug/ugtts-multispeaker-max40secs-total2hrs-sr22050-mms-aka-finetuned";
pub const UGTTS_SWAHILI: &str =
    "hci-lab-dcug/ugtts-multispeaker-max40secs-total2hrs-sr22050-mms-swh-finetuned";
pub const TONE_MODEL: &str = "synthetic/tone-440";

/// Ordered model table, at most one entry per id.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: Vec<ModelDescriptor>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in model table.
    ///
    /// When the toolkit program is installed, the Swahili finetune is served by
    /// the toolkit from its local checkpoint instead of the ONNX pipeline.
    pub fn builtin(capabilities: &Capabilities) -> Self {
        let mut registry = Self::new();
        registry.register(ModelDescriptor::new(
            MMS_AKAN,
            "Facebook MMS TTS Akan",
            BackendKind::PipelineInference,
        ));
        registry.register(ModelDescriptor::new(
            UGTTS_AKAN,
            "HCI Lab DCSUG Akan Finetuned",
            BackendKind::PipelineInference,
        ));
        registry.register(ModelDescriptor::new(
            UGTTS_SWAHILI,
            "Swahili Finetuned",
            BackendKind::PipelineInference,
        ));
        registry.register(ModelDescriptor::new(
            TONE_MODEL,
            "Test Tone (440 Hz)",
            BackendKind::Synthetic,
        ));

        if capabilities.toolkit {
            registry.register(ModelDescriptor {
                speakers: Some(vec!["IM".into(), "PT".into(), "AN".into()]),
                paths: Some(ModelPaths {
                    model: PathBuf::from("/tmp/ugtts-model/best_model.pth"),
                    config: Some(PathBuf::from("/tmp/ugtts-model/config.json")),
                }),
                ..ModelDescriptor::new(
                    UGTTS_SWAHILI,
                    "HCI Lab DCSUG Multispeaker",
                    BackendKind::ToolkitInference,
                )
            });
        }

        registry
    }

    /// Register extra models from a JSON array of descriptors.
    pub fn extend_from_json(&mut self, path: &Path) -> Result<usize> {
        let content = std::fs::read_to_string(path)?;
        let descriptors: Vec<ModelDescriptor> = serde_json::from_str(&content)?;
        let count = descriptors.len();
        for descriptor in descriptors {
            self.register(descriptor);
        }
        log::info!("Registered {count} model(s) from {}", path.display());
        Ok(count)
    }

    /// Insert a descriptor, replacing any existing entry with the same id in place.
    pub fn register(&mut self, descriptor: ModelDescriptor) {
        match self.models.iter_mut().find(|m| m.id == descriptor.id) {
            Some(existing) => {
                log::debug!("Replacing model {} ({})", descriptor.id, descriptor.kind);
                *existing = descriptor;
            }
            None => self.models.push(descriptor),
        }
    }

    pub fn get(&self, model_id: &str) -> Option<&ModelDescriptor> {
        self.models.iter().find(|m| m.id == model_id)
    }

    pub fn list_models(&self) -> Vec<ModelSummary> {
        self.models
            .iter()
            .map(|m| ModelSummary {
                id: m.id.clone(),
                name: m.name.clone(),
                has_speakers: m.has_speakers(),
            })
            .collect()
    }

    pub fn get_speakers(&self, model_id: &str) -> Vec<String> {
        self.get(model_id)
            .map(|m| m.speakers().to_vec())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
