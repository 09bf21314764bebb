//! ONNX Runtime sentiment classification for BERT-family sequence classifiers.
//!
//! The model directory must contain `model.onnx` and `tokenizer.json`, and may
//! contain `config.json`, whose `id2label` map names the output classes.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use ort::session::Session;
use ort::value::Tensor;
use serde::Deserialize;
use tokenizers::Tokenizer;
use tracing::info;

use crate::capability::{LabelScore, SentimentAnalyzer, lock_serialized};
use crate::error::InferenceError;
use crate::sampling::softmax;

/// Maximum input length for DistilBERT.
const MAX_TOKENS: usize = 512;

/// Labels used when the model directory has no `config.json` (SST-2 order).
const DEFAULT_LABELS: &[&str] = &["NEGATIVE", "POSITIVE"];

/// Sequence-classification sentiment model using ONNX Runtime.
pub struct OnnxSentimentAnalyzer {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    labels: Vec<String>,
    uses_token_type_ids: bool,
}

#[derive(Deserialize)]
struct ModelConfig {
    #[serde(default)]
    id2label: HashMap<String, String>,
}

impl OnnxSentimentAnalyzer {
    /// Load a classifier from a directory containing `model.onnx` and `tokenizer.json`.
    pub fn load(model_dir: &Path) -> anyhow::Result<Self> {
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");

        anyhow::ensure!(model_path.exists(), "model.onnx not found in {model_dir:?}");
        anyhow::ensure!(
            tokenizer_path.exists(),
            "tokenizer.json not found in {model_dir:?}"
        );

        let labels = read_labels(&model_dir.join("config.json"))?;
        let session = Session::builder()?.commit_from_file(&model_path)?;
        let uses_token_type_ids = session
            .inputs()
            .iter()
            .any(|input| input.name() == "token_type_ids");

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("load tokenizer: {e}"))?;
        tokenizer
            .with_truncation(Some(tokenizers::TruncationParams {
                max_length: MAX_TOKENS,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("set truncation: {e}"))?;

        info!(labels = ?labels, model = %model_path.display(), "loaded sentiment model");
        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            labels,
            uses_token_type_ids,
        })
    }

    fn classify(&self, text: &str) -> anyhow::Result<Vec<LabelScore>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| anyhow::anyhow!("tokenize: {e}"))?;

        let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        let attention_mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&m| m as i64)
            .collect();
        let token_type_ids: Vec<i64> = encoding.get_type_ids().iter().map(|&t| t as i64).collect();

        let shape = [1i64, input_ids.len() as i64];
        let ids_tensor = Tensor::from_array((shape, input_ids.into_boxed_slice()))?;
        let mask_tensor = Tensor::from_array((shape, attention_mask.into_boxed_slice()))?;

        let mut session = lock_serialized(&self.session);

        let outputs = if self.uses_token_type_ids {
            let type_tensor = Tensor::from_array((shape, token_type_ids.into_boxed_slice()))?;
            session.run(ort::inputs![
                "input_ids" => ids_tensor,
                "attention_mask" => mask_tensor,
                "token_type_ids" => type_tensor,
            ])?
        } else {
            session.run(ort::inputs![
                "input_ids" => ids_tensor,
                "attention_mask" => mask_tensor,
            ])?
        };

        // Logits: [1, n_labels].
        let (output_shape, output_data) = outputs[0].try_extract_tensor::<f32>()?;
        let dims: &[i64] = output_shape;
        anyhow::ensure!(
            dims.len() == 2 && dims[0] == 1 && dims[1] as usize == self.labels.len(),
            "unexpected logits shape: {dims:?}, expected [1, {}]",
            self.labels.len()
        );

        Ok(score_labels(&self.labels, output_data))
    }
}

impl SentimentAnalyzer for OnnxSentimentAnalyzer {
    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn invoke(&self, text: &str) -> Result<Vec<LabelScore>, InferenceError> {
        Ok(self.classify(text)?)
    }
}

/// Read class labels from a Hugging Face `config.json`, ordered by class id.
fn read_labels(config_path: &Path) -> anyhow::Result<Vec<String>> {
    if !config_path.exists() {
        return Ok(DEFAULT_LABELS.iter().map(|l| l.to_string()).collect());
    }

    let raw = std::fs::read_to_string(config_path)?;
    let config: ModelConfig = serde_json::from_str(&raw)
        .map_err(|e| anyhow::anyhow!("parse {}: {e}", config_path.display()))?;
    if config.id2label.is_empty() {
        return Ok(DEFAULT_LABELS.iter().map(|l| l.to_string()).collect());
    }

    let mut by_id = config
        .id2label
        .into_iter()
        .map(|(id, label)| {
            id.parse::<usize>()
                .map(|id| (id, label))
                .map_err(|_| anyhow::anyhow!("non-numeric label id '{id}'"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    by_id.sort_by_key(|(id, _)| *id);

    for (expected, (id, _)) in by_id.iter().enumerate() {
        anyhow::ensure!(*id == expected, "label ids are not contiguous from 0");
    }
    Ok(by_id.into_iter().map(|(_, label)| label).collect())
}

/// Pair each label with its softmax probability, highest first.
fn score_labels(labels: &[String], logits: &[f32]) -> Vec<LabelScore> {
    let mut scores: Vec<LabelScore> = labels
        .iter()
        .zip(softmax(logits))
        .map(|(label, score)| LabelScore {
            label: label.clone(),
            score,
        })
        .collect();
    scores.sort_by(|a, b| b.score.total_cmp(&a.score));
    scores
}
