//! Task dispatch: route a validated request to its capability and shape the
//! raw output into a response.
//!
//! Calls are synchronous and never retried. A capability failure is returned
//! as [`InferenceError`] with the original message.

use sentio_core::{
    GenerateRequest, GenerationResult, SentimentRequest, SentimentResult, Task, TaskResult,
    ValidatedRequest,
};
use tracing::info;

use crate::capability::{Capability, GenerationInput};
use crate::error::{DispatchError, InferenceError, UnknownTaskError};
use crate::registry::CapabilityRegistry;

/// Characters of input echoed into log records.
const LOG_PREVIEW_CHARS: usize = 50;

/// Routes validated requests to capabilities held by a [`CapabilityRegistry`].
pub struct Dispatcher<'a> {
    registry: &'a CapabilityRegistry,
}

impl<'a> Dispatcher<'a> {
    pub fn new(registry: &'a CapabilityRegistry) -> Self {
        Self { registry }
    }

    /// Dispatch a unified request.
    pub fn dispatch(&self, request: &ValidatedRequest) -> Result<TaskResult, DispatchError> {
        match request {
            ValidatedRequest::Generate(req) => self.generate(req).map(TaskResult::TextGeneration),
            ValidatedRequest::Sentiment(req) => {
                self.analyze(req).map(TaskResult::SentimentAnalysis)
            }
        }
    }

    /// Generate text and return the first sequence.
    ///
    /// Additional sequences requested through `num_return_sequences` are
    /// generated but not part of the response.
    pub fn generate(&self, request: &GenerateRequest) -> Result<GenerationResult, DispatchError> {
        let entry = self.registry.resolve(Task::TextGeneration)?;
        let Capability::TextGeneration(generator) = entry.capability() else {
            return Err(UnknownTaskError(Task::TextGeneration).into());
        };

        info!(
            model = entry.model_id(),
            prompt = %preview(request.prompt()),
            "generating text"
        );

        let params = request.params();
        let input = GenerationInput {
            prompt: request.prompt(),
            max_length: params.max_length() as usize,
            temperature: params.temperature(),
            num_return_sequences: params.num_return_sequences() as usize,
            pad_token_id: generator.eos_token_id(),
        };
        let sequences = generator.invoke(&input)?;
        let first = sequences
            .into_iter()
            .next()
            .ok_or_else(|| InferenceError::new("model returned no generated sequences"))?;

        info!(model = entry.model_id(), "text generation completed");
        Ok(GenerationResult {
            generated_text: first.generated_text,
            prompt: request.prompt().to_string(),
            model: entry.model_id().to_string(),
        })
    }

    /// Classify sentiment and return the highest-scoring label.
    pub fn analyze(&self, request: &SentimentRequest) -> Result<SentimentResult, DispatchError> {
        let entry = self.registry.resolve(Task::SentimentAnalysis)?;
        let Capability::SentimentAnalysis(analyzer) = entry.capability() else {
            return Err(UnknownTaskError(Task::SentimentAnalysis).into());
        };

        info!(
            model = entry.model_id(),
            text = %preview(request.text()),
            "analyzing sentiment"
        );

        let scores = analyzer.invoke(request.text())?;
        let best = scores
            .into_iter()
            .max_by(|a, b| a.score.total_cmp(&b.score))
            .ok_or_else(|| InferenceError::new("model returned no label scores"))?;

        if !(0.0..=1.0).contains(&best.score) {
            return Err(InferenceError::new(format!(
                "model returned out-of-range confidence {} for label '{}'",
                best.score, best.label
            ))
            .into());
        }

        info!(
            model = entry.model_id(),
            sentiment = %best.label,
            confidence = best.score,
            "sentiment analysis completed"
        );
        Ok(SentimentResult {
            text: request.text().to_string(),
            sentiment: best.label,
            confidence: best.score,
            model: entry.model_id().to_string(),
        })
    }
}

fn preview(text: &str) -> String {
    text.chars().take(LOG_PREVIEW_CHARS).collect()
}
