//! Response bodies returned by the API.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::task::Task;

/// Output of a text-generation call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationResult {
    pub generated_text: String,
    /// Echo of the prompt as supplied by the caller.
    pub prompt: String,
    pub model: String,
}

/// Output of a sentiment-analysis call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentimentResult {
    /// Echo of the analyzed text.
    pub text: String,
    /// Highest-scoring label, e.g. `POSITIVE`.
    pub sentiment: String,
    /// Probability of `sentiment`, in `[0, 1]`.
    pub confidence: f32,
    pub model: String,
}

/// Unified-route result, tagged with the task that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "task", rename_all = "kebab-case")]
pub enum TaskResult {
    TextGeneration(GenerationResult),
    SentimentAnalysis(SentimentResult),
}

/// Body of `GET /`.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub status: &'static str,
    pub message: &'static str,
    pub available_tasks: Vec<Task>,
    /// Model identifier bound to each task at startup.
    pub models: BTreeMap<Task, String>,
}

impl ServiceStatus {
    pub fn new(models: BTreeMap<Task, String>) -> Self {
        Self {
            status: "ok",
            message: "AI Model API is running",
            available_tasks: Task::ALL.to_vec(),
            models,
        }
    }
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
}

impl HealthStatus {
    pub fn healthy() -> Self {
        Self { status: "healthy" }
    }
}
