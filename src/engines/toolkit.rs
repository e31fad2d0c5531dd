//! Toolkit-inference backend: an external TTS command line program.
//!
//! The toolkit (Coqui's `tts` CLI by default) owns its own encoding and
//! writes the WAV file directly, so its output skips normalization.
//!
//! ```text
//! tts --text "..." --out_path out.wav \
//!     (--model_path best_model.pth --config_path config.json | --model_name NAME) \
//!     [--speaker_idx IM] [--use_cuda true]
//! ```

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use crate::capabilities::{Capabilities, Device};
use crate::engines::{BackendAdapter, LoadedBackend, Synthesized};
use crate::error::{Result, TtsError};
use crate::registry::{BackendKind, ModelDescriptor};

/// Prefix stripped from model ids before handing them to the toolkit by name.
pub const MODEL_NAME_PREFIX: &str = "coqui://";

/// Where the toolkit loads a model from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    Local {
        model_path: PathBuf,
        config_path: PathBuf,
    },
    Named(String),
}

impl ModelSource {
    /// Local files when both checkpoint and config exist on disk, else the
    /// model id as a toolkit model name.
    pub fn resolve(descriptor: &ModelDescriptor) -> Self {
        if let Some(paths) = &descriptor.paths {
            if let Some(config) = &paths.config {
                if paths.model.exists() && config.exists() {
                    return ModelSource::Local {
                        model_path: paths.model.clone(),
                        config_path: config.clone(),
                    };
                }
            }
            log::debug!(
                "Local files for {} missing, loading by name",
                descriptor.id
            );
        }
        let name = descriptor.id.strip_prefix(MODEL_NAME_PREFIX).unwrap_or(&descriptor.id);
        ModelSource::Named(name.to_string())
    }
}

pub struct ToolkitAdapter {
    program: String,
    available: bool,
    device: Device,
}

impl ToolkitAdapter {
    pub fn new(program: impl Into<String>, capabilities: &Capabilities) -> Self {
        Self {
            program: program.into(),
            available: capabilities.toolkit,
            device: capabilities.device,
        }
    }
}

impl BackendAdapter for ToolkitAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::ToolkitInference
    }

    fn load(&self, descriptor: &ModelDescriptor) -> Result<Arc<dyn LoadedBackend>> {
        if !self.available {
            return Err(TtsError::BackendUnavailable {
                backend: self.kind().to_string(),
            });
        }

        let source = ModelSource::resolve(descriptor);
        if matches!(&source, ModelSource::Named(name) if name.is_empty()) {
            return Err(TtsError::load_failure(&descriptor.id, "empty toolkit model name"));
        }
        log::info!("Loaded toolkit model {}: {:?}", descriptor.id, source);

        Ok(Arc::new(ToolkitModel {
            program: self.program.clone(),
            source,
            use_cuda: self.device == Device::Cuda,
        }))
    }
}

/// A resolved toolkit invocation.
#[derive(Debug, Clone)]
pub struct ToolkitModel {
    program: String,
    source: ModelSource,
    use_cuda: bool,
}

impl ToolkitModel {
    pub fn source(&self) -> &ModelSource {
        &self.source
    }

    /// Arguments for one synthesis call.
    pub fn command_args(
        &self,
        text: &str,
        speaker: Option<&str>,
        output_path: &Path,
    ) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["--text".into(), text.into()];
        match &self.source {
            ModelSource::Local {
                model_path,
                config_path,
            } => {
                args.push("--model_path".into());
                args.push(model_path.into());
                args.push("--config_path".into());
                args.push(config_path.into());
            }
            ModelSource::Named(name) => {
                args.push("--model_name".into());
                args.push(name.into());
            }
        }
        if let Some(speaker) = speaker {
            args.push("--speaker_idx".into());
            args.push(speaker.into());
        }
        if self.use_cuda {
            args.push("--use_cuda".into());
            args.push("true".into());
        }
        args.push("--out_path".into());
        args.push(output_path.into());
        args
    }
}

impl LoadedBackend for ToolkitModel {
    fn run(&self, text: &str, speaker: Option<&str>, output_path: &Path) -> Result<Synthesized> {
        let output = Command::new(&self.program)
            .args(self.command_args(text, speaker, output_path))
            .output()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    TtsError::BackendUnavailable {
                        backend: BackendKind::ToolkitInference.to_string(),
                    }
                } else {
                    TtsError::Io(e)
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let last_line = stderr.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or("");
            return Err(TtsError::SynthesisFailure(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                last_line.trim()
            )));
        }

        if !output_path.exists() {
            return Err(TtsError::SynthesisFailure(format!(
                "{} did not write {}",
                self.program,
                output_path.display()
            )));
        }

        Ok(Synthesized::Written)
    }
}
