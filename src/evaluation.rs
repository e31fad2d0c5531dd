//! Word error rate scoring and the poor-quality sample log.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::Serialize;

use crate::asr::Transcriber;
use crate::error::Result;
use crate::orchestrator::DEFAULT_SPEAKER;

pub const DEFAULT_WER_THRESHOLD: f64 = 0.3;

const CSV_HEADER: [&str; 6] = [
    "input_text",
    "transcribed_text",
    "wer_score",
    "model_name",
    "speaker",
    "timestamp",
];

/// Word-level Levenshtein distance divided by the reference length.
///
/// Case-insensitive. Returns 1.0 when either side is empty and clamps the
/// result to [0, 1].
pub fn word_error_rate(reference: &str, hypothesis: &str) -> f64 {
    let reference = reference.trim().to_lowercase();
    let hypothesis = hypothesis.trim().to_lowercase();
    if reference.is_empty() || hypothesis.is_empty() {
        return 1.0;
    }

    let ref_words: Vec<&str> = reference.split_whitespace().collect();
    let hyp_words: Vec<&str> = hypothesis.split_whitespace().collect();

    // Single-row dynamic programming over hypothesis positions.
    let mut row: Vec<usize> = (0..=hyp_words.len()).collect();
    for (i, ref_word) in ref_words.iter().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, hyp_word) in hyp_words.iter().enumerate() {
            let substitution = diagonal + usize::from(ref_word != hyp_word);
            diagonal = row[j + 1];
            row[j + 1] = substitution.min(row[j] + 1).min(row[j + 1] + 1);
        }
    }

    let distance = row[hyp_words.len()] as f64;
    let wer = (distance / ref_words.len() as f64).clamp(0.0, 1.0);
    log::debug!("WER {wer:.3} for reference {reference:?} vs hypothesis {hypothesis:?}");
    wer
}

/// One poor-quality sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityRecord {
    pub input_text: String,
    pub transcribed_text: String,
    pub wer_score: f64,
    pub model_name: String,
    pub speaker: String,
    pub timestamp: String,
}

impl QualityRecord {
    pub fn new(
        input_text: &str,
        transcribed_text: &str,
        wer_score: f64,
        model_name: &str,
        speaker: Option<&str>,
    ) -> Self {
        Self {
            input_text: input_text.to_string(),
            transcribed_text: transcribed_text.to_string(),
            wer_score,
            model_name: model_name.to_string(),
            speaker: speaker.unwrap_or(DEFAULT_SPEAKER).to_string(),
            timestamp: chrono::Local::now()
                .format("%Y-%m-%dT%H:%M:%S%.6f")
                .to_string(),
        }
    }
}

/// Append-only CSV of samples whose WER exceeded the threshold.
pub struct QualityLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl QualityLog {
    /// Open the log, creating it with a header row if it does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if needs_header(&path) {
            let mut writer = csv::Writer::from_path(&path)?;
            writer.write_record(CSV_HEADER)?;
            writer.flush()?;
            log::info!("Created CSV file: {}", path.display());
        }
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, record: &QualityRecord) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        // The file may have been removed or truncated since `open`.
        let write_header = needs_header(&self.path);
        let file = OpenOptions::new().append(true).create(true).open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if write_header {
            log::warn!("Quality log {} was missing, rewriting header", self.path.display());
            writer.write_record(CSV_HEADER)?;
        }
        writer.serialize(record)?;
        writer.flush()?;
        log::info!(
            "Logged poor quality sample - WER: {}, Model: {}",
            record.wer_score,
            record.model_name
        );
        Ok(())
    }
}

fn needs_header(path: &Path) -> bool {
    std::fs::metadata(path).map_or(true, |meta| meta.len() == 0)
}

/// Scores of one ASR round trip.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub transcription: String,
    pub wer_score: f64,
    pub threshold_exceeded: bool,
}

/// Transcribes synthesized audio, scores it, and logs poor samples.
pub struct Evaluator {
    transcriber: Box<dyn Transcriber>,
    log: QualityLog,
    threshold: f64,
}

impl Evaluator {
    pub fn new(transcriber: Box<dyn Transcriber>, log: QualityLog, threshold: f64) -> Self {
        Self {
            transcriber,
            log,
            threshold,
        }
    }

    pub fn log(&self) -> &QualityLog {
        &self.log
    }

    pub fn evaluate(
        &self,
        text: &str,
        audio_path: &Path,
        model_id: &str,
        speaker: Option<&str>,
    ) -> Result<Evaluation> {
        let transcription = self.transcriber.transcribe(audio_path)?;
        let wer_score = word_error_rate(text, &transcription);
        let threshold_exceeded = wer_score > self.threshold;

        if threshold_exceeded {
            let record = QualityRecord::new(text, &transcription, wer_score, model_id, speaker);
            if let Err(e) = self.log.append(&record) {
                log::error!("Failed to log poor quality sample: {e}");
            }
        }

        Ok(Evaluation {
            transcription,
            wer_score,
            threshold_exceeded,
        })
    }
}
