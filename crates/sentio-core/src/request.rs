//! Raw request bodies and the validator that turns them into typed requests.
//!
//! Raw shapes deserialize permissively (every field optional, numeric fields
//! kept as untyped JSON, unknown fields ignored) so that each constraint is
//! reported by the validator with the field it concerns, rather than by the
//! JSON layer. Validation stops at the first violation, in this order: task
//! name, text lengths, numeric types and ranges. Defaults are filled in only
//! after the supplied values pass.

use serde::Deserialize;
use serde_json::Value;

use crate::error::ValidationError;
use crate::task::Task;

/// Maximum prompt length on the dedicated generation route, in characters.
pub const PROMPT_MAX_CHARS: usize = 500;
/// Maximum text length on the sentiment and unified routes, in characters.
pub const TEXT_MAX_CHARS: usize = 1000;

pub const MAX_LENGTH_MIN: i64 = 10;
pub const MAX_LENGTH_MAX: i64 = 500;
pub const DEFAULT_MAX_LENGTH: u32 = 100;

pub const TEMPERATURE_MIN: f64 = 0.1;
pub const TEMPERATURE_MAX: f64 = 2.0;
pub const DEFAULT_TEMPERATURE: f32 = 1.0;

pub const NUM_RETURN_SEQUENCES_MIN: i64 = 1;
pub const NUM_RETURN_SEQUENCES_MAX: i64 = 5;
pub const DEFAULT_NUM_RETURN_SEQUENCES: u32 = 1;

// ── Raw shapes ──

/// Body of `POST /api/generate` as received.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawGenerateRequest {
    pub prompt: Option<String>,
    pub max_length: Option<Value>,
    pub temperature: Option<Value>,
    pub num_return_sequences: Option<Value>,
}

/// Body of `POST /api/sentiment` as received.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSentimentRequest {
    pub text: Option<String>,
}

/// Body of `POST /api/process` as received.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawProcessRequest {
    pub task: Option<String>,
    pub text: Option<String>,
    /// Generation only; ignored for sentiment analysis, whatever its type.
    pub max_length: Option<Value>,
    /// Generation only; ignored for sentiment analysis, whatever its type.
    pub temperature: Option<Value>,
}

// ── Validated requests ──

/// Sampling parameters for one generation call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    max_length: u32,
    temperature: f32,
    num_return_sequences: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_length: DEFAULT_MAX_LENGTH,
            temperature: DEFAULT_TEMPERATURE,
            num_return_sequences: DEFAULT_NUM_RETURN_SEQUENCES,
        }
    }
}

impl GenerationParams {
    /// Total token budget (prompt plus continuation).
    pub fn max_length(&self) -> u32 {
        self.max_length
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn num_return_sequences(&self) -> u32 {
        self.num_return_sequences
    }
}

/// A text-generation request whose fields satisfy every constraint.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    prompt: String,
    params: GenerationParams,
}

impl GenerateRequest {
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn params(&self) -> &GenerationParams {
        &self.params
    }
}

/// A sentiment request whose text satisfies the length constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentimentRequest {
    text: String,
}

impl SentimentRequest {
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// The validated form of a unified request.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidatedRequest {
    Generate(GenerateRequest),
    Sentiment(SentimentRequest),
}

// ── Validation ──

impl RawGenerateRequest {
    pub fn validate(&self) -> Result<GenerateRequest, ValidationError> {
        let prompt = bounded_text("prompt", self.prompt.as_deref(), PROMPT_MAX_CHARS)?;
        let max_length = bounded_int(
            "max_length",
            self.max_length.as_ref(),
            MAX_LENGTH_MIN,
            MAX_LENGTH_MAX,
            DEFAULT_MAX_LENGTH,
        )?;
        let temperature = bounded_temperature(self.temperature.as_ref())?;
        let num_return_sequences = bounded_int(
            "num_return_sequences",
            self.num_return_sequences.as_ref(),
            NUM_RETURN_SEQUENCES_MIN,
            NUM_RETURN_SEQUENCES_MAX,
            DEFAULT_NUM_RETURN_SEQUENCES,
        )?;

        Ok(GenerateRequest {
            prompt,
            params: GenerationParams {
                max_length,
                temperature,
                num_return_sequences,
            },
        })
    }
}

impl RawSentimentRequest {
    pub fn validate(&self) -> Result<SentimentRequest, ValidationError> {
        let text = bounded_text("text", self.text.as_deref(), TEXT_MAX_CHARS)?;
        Ok(SentimentRequest { text })
    }
}

impl RawProcessRequest {
    /// Validate against the task named in the body.
    ///
    /// Generation always requests a single sequence on this route. Numeric
    /// fields are neither checked nor used when the task is sentiment analysis.
    pub fn validate(&self) -> Result<ValidatedRequest, ValidationError> {
        let task = match self.task.as_deref() {
            None => return Err(ValidationError::new("task", "field required")),
            Some(name) => Task::from_name(name).ok_or_else(|| {
                ValidationError::new(
                    "task",
                    format!(
                        "unknown task '{name}', expected one of: {}",
                        Task::ALL.map(|t| t.as_str()).join(", ")
                    ),
                )
            })?,
        };

        let text = bounded_text("text", self.text.as_deref(), TEXT_MAX_CHARS)?;

        match task {
            Task::TextGeneration => {
                let max_length = bounded_int(
                    "max_length",
                    self.max_length.as_ref(),
                    MAX_LENGTH_MIN,
                    MAX_LENGTH_MAX,
                    DEFAULT_MAX_LENGTH,
                )?;
                let temperature = bounded_temperature(self.temperature.as_ref())?;
                Ok(ValidatedRequest::Generate(GenerateRequest {
                    prompt: text,
                    params: GenerationParams {
                        max_length,
                        temperature,
                        num_return_sequences: 1,
                    },
                }))
            }
            Task::SentimentAnalysis => Ok(ValidatedRequest::Sentiment(SentimentRequest { text })),
        }
    }
}

/// Required text field, 1..=`max_chars` Unicode scalar values. Content is
/// passed through untouched.
fn bounded_text(
    field: &'static str,
    value: Option<&str>,
    max_chars: usize,
) -> Result<String, ValidationError> {
    let value = value.ok_or_else(|| ValidationError::new(field, "field required"))?;
    let chars = value.chars().count();
    if chars < 1 {
        return Err(ValidationError::new(field, "must be at least 1 character"));
    }
    if chars > max_chars {
        return Err(ValidationError::new(
            field,
            format!("must be at most {max_chars} characters, got {chars}"),
        ));
    }
    Ok(value.to_string())
}

fn bounded_int(
    field: &'static str,
    value: Option<&Value>,
    min: i64,
    max: i64,
    default: u32,
) -> Result<u32, ValidationError> {
    match integer(field, value)? {
        None => Ok(default),
        Some(v) if (min..=max).contains(&v) => Ok(v as u32),
        Some(v) => Err(ValidationError::new(
            field,
            format!("must be between {min} and {max}, got {v}"),
        )),
    }
}

fn bounded_temperature(value: Option<&Value>) -> Result<f32, ValidationError> {
    match number("temperature", value)? {
        None => Ok(DEFAULT_TEMPERATURE),
        Some(v) if (TEMPERATURE_MIN..=TEMPERATURE_MAX).contains(&v) => Ok(v as f32),
        Some(v) => Err(ValidationError::new(
            "temperature",
            format!("must be between {TEMPERATURE_MIN} and {TEMPERATURE_MAX}, got {v}"),
        )),
    }
}

/// An integer field. Floats with no fractional part (`50.0`) count as integers;
/// `null` counts as absent.
fn integer(field: &'static str, value: Option<&Value>) -> Result<Option<i64>, ValidationError> {
    let n = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n,
        Some(_) => return Err(ValidationError::new(field, "must be an integer")),
    };
    if let Some(v) = n.as_i64() {
        return Ok(Some(v));
    }
    match n.as_f64() {
        // Saturates past i64; the range check rejects it.
        Some(v) if v.fract() == 0.0 => Ok(Some(v as i64)),
        _ => Err(ValidationError::new(field, "must be an integer")),
    }
}

fn number(field: &'static str, value: Option<&Value>) -> Result<Option<f64>, ValidationError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| ValidationError::new(field, "must be a number")),
        Some(_) => Err(ValidationError::new(field, "must be a number")),
    }
}
