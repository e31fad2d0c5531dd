//! Speech recognition used to score synthesized audio.

use std::path::Path;
use std::process::Command;

use crate::error::{Result, TtsError};

/// Turns an audio file back into text.
pub trait Transcriber: Send + Sync {
    fn transcribe(&self, audio_path: &Path) -> Result<String>;
}

/// Runs an external ASR command with the audio path as its last argument and
/// reads the transcription from stdout.
///
/// ```no_run
/// use kasa_tts::asr::{CommandTranscriber, Transcriber};
///
/// let asr = CommandTranscriber::parse("whisper-cli -m ggml-akan.bin -nt -np -f")?;
/// let text = asr.transcribe(std::path::Path::new("/tmp/out.wav"))?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct CommandTranscriber {
    program: String,
    args: Vec<String>,
}

impl CommandTranscriber {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Split a whitespace-separated command line into program and arguments.
    ///
    /// There is no shell quoting, so no argument may contain whitespace.
    /// Quote characters are rejected rather than passed on literally; use
    /// [`CommandTranscriber::new`] for arguments with spaces.
    pub fn parse(command_line: &str) -> Result<Self> {
        if command_line.contains(['"', '\'']) {
            return Err(TtsError::Config(format!(
                "ASR command must not contain quotes: {command_line}"
            )));
        }
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| TtsError::Config("empty ASR command".to_string()))?;
        Ok(Self::new(program, parts.collect()))
    }
}

impl Transcriber for CommandTranscriber {
    fn transcribe(&self, audio_path: &Path) -> Result<String> {
        if !audio_path.exists() {
            return Err(TtsError::FileNotFound(audio_path.to_path_buf()));
        }

        log::info!("Transcribing audio: {}", audio_path.display());
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(audio_path)
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TtsError::SynthesisFailure(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        let transcription = String::from_utf8_lossy(&output.stdout).trim().to_string();
        log::info!("Transcription completed: {transcription:?}");
        Ok(transcription)
    }
}
