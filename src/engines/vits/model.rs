use std::path::{Path, PathBuf};
use std::sync::Mutex;

use ndarray::{ArrayD, IxDyn};
use ort::execution_providers::{CPUExecutionProvider, ExecutionProviderDispatch};
use ort::inputs;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;

use super::vocab::VitsTokenizer;
use super::{read_sampling_rate, speaker_index, VitsModelParams};
use crate::audio::RawAudio;
use crate::capabilities::Device;
use crate::engines::{LoadedBackend, Synthesized};
use crate::error::{Result, TtsError};
use crate::registry::ModelDescriptor;

const PREFERRED_ONNX_FILE: &str = "model.onnx";

/// A loaded VITS ONNX session plus its tokenizer.
pub struct VitsModel {
    session: Mutex<Session>,
    tokenizer: VitsTokenizer,
    /// Detected input name: "input_ids" or "text"
    ids_input_name: String,
    /// "speaker_id" or "sid" for multi-speaker exports
    speaker_input_name: Option<String>,
    sample_rate: u32,
    speakers: Vec<String>,
}

impl VitsModel {
    pub fn load(
        descriptor: &ModelDescriptor,
        model_dir: &Path,
        params: &VitsModelParams,
        device: Device,
    ) -> Result<Self> {
        let onnx_path = find_onnx_file(model_dir)?;
        log::info!("Loading VITS model {} from {}", descriptor.id, onnx_path.display());

        let session = init_session(&onnx_path, params.num_threads, device)?;

        let ids_input_name = detect_ids_input(&session);
        let speaker_input_name = detect_speaker_input(&session);
        log::info!(
            "Detected: ids_input='{}', speaker_input={:?}",
            ids_input_name,
            speaker_input_name
        );

        let tokenizer = VitsTokenizer::load(model_dir)?;
        let sample_rate = read_sampling_rate(model_dir)?;

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            ids_input_name,
            speaker_input_name,
            sample_rate,
            speakers: descriptor.speakers().to_vec(),
        })
    }

    /// Run the graph and return its first output as a float tensor.
    fn infer(&self, ids: Vec<i64>, speaker_id: Option<i64>) -> Result<ArrayD<f32>> {
        let seq_len = ids.len();
        let ids_value = Tensor::from_array(([1usize, seq_len], ids))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| TtsError::SynthesisFailure("ONNX session lock poisoned".to_string()))?;

        let output = match (&self.speaker_input_name, speaker_id) {
            (Some(speaker_input), Some(sid)) => {
                let sid_value = Tensor::from_array(([1usize], vec![sid]))?;
                session.run(inputs![
                    self.ids_input_name.as_str() => ids_value,
                    speaker_input.as_str() => sid_value,
                ])?
            }
            _ => session.run(inputs![self.ids_input_name.as_str() => ids_value])?,
        };

        let first_output = output
            .iter()
            .next()
            .ok_or_else(|| TtsError::SynthesisFailure("No output from model".to_string()))?;
        let (shape, data) = first_output.1.try_extract_tensor::<f32>()?;

        let dims: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();
        ArrayD::from_shape_vec(IxDyn(&dims), data.to_vec())
            .map_err(|e| TtsError::SynthesisFailure(format!("Unexpected output shape: {e}")))
    }
}

impl LoadedBackend for VitsModel {
    fn run(&self, text: &str, speaker: Option<&str>, _output_path: &Path) -> Result<Synthesized> {
        let ids = self.tokenizer.encode(text);
        if ids.is_empty() {
            return Err(TtsError::SynthesisFailure(format!(
                "No vocabulary tokens in text: {text:?}"
            )));
        }

        let speaker_id = match (&self.speaker_input_name, speaker) {
            (Some(_), Some(speaker)) => Some(speaker_index(speaker, &self.speakers)?),
            (Some(_), None) => Some(0),
            (None, Some(speaker)) => {
                log::warn!("Model has no speaker input, ignoring speaker {speaker}");
                None
            }
            (None, None) => None,
        };

        let waveform = self.infer(ids, speaker_id)?;
        Ok(Synthesized::Audio {
            audio: RawAudio::Float(waveform),
            sample_rate: Some(self.sample_rate),
        })
    }
}

/// Find the ONNX graph in the given directory.
///
/// Prefers `model.onnx`, then falls back to the first `.onnx` file found.
fn find_onnx_file(model_dir: &Path) -> Result<PathBuf> {
    let preferred = model_dir.join(PREFERRED_ONNX_FILE);
    if preferred.exists() {
        return Ok(preferred);
    }

    for entry in std::fs::read_dir(model_dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) == Some("onnx") {
            log::info!("Using ONNX file: {}", path.display());
            return Ok(path);
        }
    }

    Err(TtsError::FileNotFound(preferred))
}

fn init_session(onnx_path: &Path, num_threads: Option<usize>, device: Device) -> Result<Session> {
    let mut providers: Vec<ExecutionProviderDispatch> = Vec::new();
    #[cfg(feature = "cuda")]
    if device == Device::Cuda {
        providers.push(ort::execution_providers::CUDAExecutionProvider::default().build());
    }
    #[cfg(not(feature = "cuda"))]
    if device == Device::Cuda {
        log::warn!("CUDA device present but the `cuda` feature is off; running on CPU");
    }
    providers.push(CPUExecutionProvider::default().build());

    let mut builder = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_execution_providers(providers)?;

    if let Some(threads) = num_threads {
        builder = builder
            .with_intra_threads(threads)?
            .with_inter_threads(threads)?;
    }

    Ok(builder.commit_from_file(onnx_path)?)
}

fn detect_ids_input(session: &Session) -> String {
    for input in session.inputs() {
        if input.name() == "input_ids" || input.name() == "text" {
            return input.name().to_string();
        }
    }
    "input_ids".to_string()
}

fn detect_speaker_input(session: &Session) -> Option<String> {
    session
        .inputs()
        .iter()
        .map(|input| input.name())
        .find(|name| *name == "speaker_id" || *name == "sid")
        .map(str::to_string)
}
