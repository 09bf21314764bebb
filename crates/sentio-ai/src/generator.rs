//! ONNX Runtime text generation for GPT-2 family causal language models.
//!
//! The model directory must contain `model.onnx` (an export taking
//! `input_ids`, `attention_mask`, and optionally `position_ids`, producing
//! `logits`) and `tokenizer.json`. Decoding runs the full sequence each step;
//! there is no KV cache.

use std::path::Path;
use std::sync::Mutex;

use ort::session::Session;
use ort::value::Tensor;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use crate::capability::{GeneratedSequence, GenerationInput, TextGenerator, lock_serialized};
use crate::error::InferenceError;
use crate::sampling::{DecodeLimits, extend_batch};

/// GPT-2 context window.
const MAX_CONTEXT: usize = 1024;
const EOS_TOKEN: &str = "<|endoftext|>";

/// Causal LM text generator using ONNX Runtime.
pub struct OnnxTextGenerator {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    eos_token_id: u32,
    uses_position_ids: bool,
}

impl OnnxTextGenerator {
    /// Load a generator from a directory containing `model.onnx` and `tokenizer.json`.
    pub fn load(model_dir: &Path) -> anyhow::Result<Self> {
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");

        anyhow::ensure!(model_path.exists(), "model.onnx not found in {model_dir:?}");
        anyhow::ensure!(
            tokenizer_path.exists(),
            "tokenizer.json not found in {model_dir:?}"
        );

        let session = Session::builder()?.commit_from_file(&model_path)?;
        let uses_position_ids = session
            .inputs()
            .iter()
            .any(|input| input.name() == "position_ids");

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("load tokenizer: {e}"))?;
        let eos_token_id = tokenizer
            .token_to_id(EOS_TOKEN)
            .ok_or_else(|| anyhow::anyhow!("tokenizer has no {EOS_TOKEN} token"))?;

        info!(
            eos_token_id,
            uses_position_ids,
            model = %model_path.display(),
            "loaded text generation model"
        );
        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            eos_token_id,
            uses_position_ids,
        })
    }

    fn generate(&self, input: &GenerationInput<'_>) -> anyhow::Result<Vec<GeneratedSequence>> {
        let encoding = self
            .tokenizer
            .encode(input.prompt, false)
            .map_err(|e| anyhow::anyhow!("tokenize: {e}"))?;

        let mut prompt_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        prompt_ids.truncate(MAX_CONTEXT);
        anyhow::ensure!(!prompt_ids.is_empty(), "prompt produced no tokens");

        let rows = input.num_return_sequences.max(1);
        let limits = DecodeLimits {
            max_total: input.max_length.min(MAX_CONTEXT),
            eos: self.eos_token_id as i64,
            pad: input.pad_token_id as i64,
            temperature: input.temperature,
        };

        let mut session = lock_serialized(&self.session);
        let sequences = extend_batch(&prompt_ids, rows, limits, &mut rand::rng(), |batch| {
            self.next_token_logits(&mut session, batch)
        })?;
        drop(session);

        debug!(
            rows,
            prompt_tokens = prompt_ids.len(),
            total_tokens = sequences[0].len(),
            "generation finished"
        );

        let prompt_text = self.decode(&prompt_ids)?;
        sequences
            .iter()
            .map(|ids| {
                // Re-attach the caller's prompt verbatim; decode only the continuation.
                let full = self.decode(ids)?;
                let continuation = full.get(prompt_text.len()..).unwrap_or_default();
                Ok(GeneratedSequence {
                    generated_text: format!("{}{continuation}", input.prompt),
                })
            })
            .collect()
    }

    /// Run one forward pass and return the final-position logits per row.
    fn next_token_logits(
        &self,
        session: &mut Session,
        sequences: &[Vec<i64>],
    ) -> anyhow::Result<Vec<Vec<f32>>> {
        let batch_size = sequences.len();
        let seq_len = sequences[0].len();

        let input_ids: Vec<i64> = sequences.iter().flatten().copied().collect();
        let attention_mask = vec![1i64; batch_size * seq_len];
        let position_ids: Vec<i64> = (0..batch_size)
            .flat_map(|_| 0..seq_len as i64)
            .collect();

        let shape = [batch_size as i64, seq_len as i64];
        let ids_tensor = Tensor::from_array((shape, input_ids.into_boxed_slice()))?;
        let mask_tensor = Tensor::from_array((shape, attention_mask.into_boxed_slice()))?;

        let outputs = if self.uses_position_ids {
            let pos_tensor = Tensor::from_array((shape, position_ids.into_boxed_slice()))?;
            session.run(ort::inputs![
                "input_ids" => ids_tensor,
                "attention_mask" => mask_tensor,
                "position_ids" => pos_tensor,
            ])?
        } else {
            session.run(ort::inputs![
                "input_ids" => ids_tensor,
                "attention_mask" => mask_tensor,
            ])?
        };

        // Logits: [batch_size, seq_len, vocab].
        let (output_shape, output_data) = outputs[0].try_extract_tensor::<f32>()?;
        let dims: &[i64] = output_shape;
        anyhow::ensure!(
            dims.len() == 3 && dims[0] as usize == batch_size && dims[1] as usize == seq_len,
            "unexpected logits shape: {dims:?}, expected [{batch_size}, {seq_len}, vocab]"
        );
        let vocab = dims[2] as usize;

        Ok((0..batch_size)
            .map(|row| {
                let offset = (row * seq_len + seq_len - 1) * vocab;
                output_data[offset..offset + vocab].to_vec()
            })
            .collect())
    }

    fn decode(&self, ids: &[i64]) -> anyhow::Result<String> {
        let ids: Vec<u32> = ids.iter().map(|&id| id as u32).collect();
        self.tokenizer
            .decode(&ids, true)
            .map_err(|e| anyhow::anyhow!("decode: {e}"))
    }
}

impl TextGenerator for OnnxTextGenerator {
    fn eos_token_id(&self) -> u32 {
        self.eos_token_id
    }

    fn invoke(
        &self,
        input: &GenerationInput<'_>,
    ) -> Result<Vec<GeneratedSequence>, InferenceError> {
        Ok(self.generate(input)?)
    }
}
