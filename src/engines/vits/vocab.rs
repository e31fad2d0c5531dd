use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Result, TtsError};

const DEFAULT_PAD_TOKEN: &str = "<pad>";

#[derive(Debug, Deserialize)]
struct TokenizerConfig {
    #[serde(default = "default_true")]
    add_blank: bool,
    #[serde(default = "default_true")]
    normalize: bool,
    #[serde(default)]
    pad_token: Option<String>,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            add_blank: true,
            normalize: true,
            pad_token: None,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Character-level tokenizer for VITS models.
///
/// Characters missing from the vocabulary are dropped. With `add_blank` the
/// pad id is interleaved around every token, giving `2n + 1` ids.
#[derive(Debug, Clone)]
pub struct VitsTokenizer {
    vocab: HashMap<char, i64>,
    pad_id: i64,
    add_blank: bool,
    lowercase: bool,
}

impl VitsTokenizer {
    /// Load `vocab.json` and, if present, `tokenizer_config.json` from a model directory.
    pub fn load(model_dir: &Path) -> Result<Self> {
        let vocab_path = model_dir.join("vocab.json");
        if !vocab_path.exists() {
            return Err(TtsError::FileNotFound(vocab_path));
        }
        let tokens = load_vocab(&vocab_path)?;

        let config_path = model_dir.join("tokenizer_config.json");
        let config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            serde_json::from_str(&content)?
        } else {
            log::debug!("tokenizer_config.json not found, using defaults");
            TokenizerConfig::default()
        };

        let pad_token = config.pad_token.as_deref().unwrap_or(DEFAULT_PAD_TOKEN);
        let pad_id = tokens.get(pad_token).copied().unwrap_or(0);

        let vocab = tokens
            .iter()
            .filter_map(|(token, &id)| {
                let mut chars = token.chars();
                match (chars.next(), chars.next()) {
                    (Some(ch), None) => Some((ch, id)),
                    _ => None,
                }
            })
            .collect();

        Ok(Self {
            vocab,
            pad_id,
            add_blank: config.add_blank,
            lowercase: config.normalize,
        })
    }

    pub fn from_vocab(vocab: HashMap<char, i64>, pad_id: i64, add_blank: bool) -> Self {
        Self {
            vocab,
            pad_id,
            add_blank,
            lowercase: true,
        }
    }

    pub fn encode(&self, text: &str) -> Vec<i64> {
        let normalized = if self.lowercase {
            text.to_lowercase()
        } else {
            text.to_string()
        };
        let ids: Vec<i64> = normalized
            .chars()
            .filter_map(|ch| self.vocab.get(&ch).copied())
            .collect();

        if !self.add_blank || ids.is_empty() {
            return ids;
        }

        let mut blanked = Vec::with_capacity(ids.len() * 2 + 1);
        blanked.push(self.pad_id);
        for id in ids {
            blanked.push(id);
            blanked.push(self.pad_id);
        }
        blanked
    }
}

/// Read a `vocab.json` mapping token strings to integer ids.
fn load_vocab(vocab_path: &Path) -> Result<HashMap<String, i64>> {
    let content = std::fs::read_to_string(vocab_path)?;
    let json: serde_json::Value = serde_json::from_str(&content)?;

    let vocab_obj = json
        .as_object()
        .ok_or_else(|| TtsError::Config("vocab.json must be an object".to_string()))?;

    vocab_obj
        .iter()
        .map(|(token, value)| {
            let id = value.as_i64().ok_or_else(|| {
                TtsError::Config(format!("Non-integer vocab value for token {token:?}"))
            })?;
            Ok((token.clone(), id))
        })
        .collect()
}
