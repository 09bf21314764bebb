//! The interface between task dispatch and the models behind it.
//!
//! A [`Capability`] is one of two variants, each wrapping a trait object with
//! a single `invoke` operation. Implementations are shared across request
//! handlers, so they must be `Send + Sync`; an implementation that cannot run
//! concurrently is responsible for serializing its own calls.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use sentio_core::Task;

use crate::error::InferenceError;

/// Per-call parameters for a text generator.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationInput<'a> {
    pub prompt: &'a str,
    /// Total token budget, prompt included. Output is cut at this length.
    pub max_length: usize,
    pub temperature: f32,
    pub num_return_sequences: usize,
    /// Token used to pad sequences that finish early.
    pub pad_token_id: u32,
}

/// One generated sequence. The text starts with the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedSequence {
    pub generated_text: String,
}

/// A classifier label and its probability.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelScore {
    pub label: String,
    pub score: f32,
}

/// A causal language model.
pub trait TextGenerator: Send + Sync {
    /// End-of-sequence token id.
    fn eos_token_id(&self) -> u32;

    /// Generate `input.num_return_sequences` continuations of `input.prompt`.
    fn invoke(&self, input: &GenerationInput<'_>) -> Result<Vec<GeneratedSequence>, InferenceError>;
}

/// A text classifier producing sentiment labels.
pub trait SentimentAnalyzer: Send + Sync {
    /// Every label the model can produce.
    fn labels(&self) -> &[String];

    /// Score `text` against the model's labels.
    fn invoke(&self, text: &str) -> Result<Vec<LabelScore>, InferenceError>;
}

/// An invocable inference unit.
#[derive(Clone)]
pub enum Capability {
    TextGeneration(Arc<dyn TextGenerator>),
    SentimentAnalysis(Arc<dyn SentimentAnalyzer>),
}

impl Capability {
    /// The task this capability serves.
    pub fn task(&self) -> Task {
        match self {
            Self::TextGeneration(_) => Task::TextGeneration,
            Self::SentimentAnalysis(_) => Task::SentimentAnalysis,
        }
    }
}

impl std::fmt::Debug for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Capability").field(&self.task()).finish()
    }
}

/// Lock state that serializes calls into a capability. A panic in an earlier
/// call does not disable the capability; the guarded state is reused as is.
#[cfg_attr(not(feature = "onnx"), allow(dead_code))]
pub(crate) fn lock_serialized<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
