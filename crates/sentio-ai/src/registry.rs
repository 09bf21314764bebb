//! Startup-time registry mapping each task to its loaded capability.
//!
//! The registry is built once, all-or-nothing, and is read-only afterwards.
//! Lookups never load anything.

use std::collections::{BTreeMap, HashMap};

use sentio_core::Task;
use tracing::info;

use crate::capability::Capability;
use crate::error::{InitializationError, UnknownTaskError};

pub const DEFAULT_GENERATION_MODEL: &str = "distilgpt2";
pub const DEFAULT_SENTIMENT_MODEL: &str = "distilbert-base-uncased-finetuned-sst-2-english";

/// The model identifier to load for every task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelBindings {
    pub text_generation: String,
    pub sentiment_analysis: String,
}

impl Default for ModelBindings {
    fn default() -> Self {
        Self {
            text_generation: DEFAULT_GENERATION_MODEL.to_string(),
            sentiment_analysis: DEFAULT_SENTIMENT_MODEL.to_string(),
        }
    }
}

impl ModelBindings {
    pub fn model_for(&self, task: Task) -> &str {
        match task {
            Task::TextGeneration => &self.text_generation,
            Task::SentimentAnalysis => &self.sentiment_analysis,
        }
    }
}

/// Loads the capability for a task from a model identifier.
pub trait CapabilityLoader {
    fn load(&self, task: Task, model_id: &str) -> anyhow::Result<Capability>;
}

impl<F> CapabilityLoader for F
where
    F: Fn(Task, &str) -> anyhow::Result<Capability>,
{
    fn load(&self, task: Task, model_id: &str) -> anyhow::Result<Capability> {
        self(task, model_id)
    }
}

/// A capability together with the model identifier it was loaded from.
#[derive(Debug, Clone)]
pub struct RegisteredCapability {
    model_id: String,
    capability: Capability,
}

impl RegisteredCapability {
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn capability(&self) -> &Capability {
        &self.capability
    }
}

/// Task name → capability.
#[derive(Debug)]
pub struct CapabilityRegistry {
    entries: HashMap<Task, RegisteredCapability>,
}

impl CapabilityRegistry {
    /// Load a capability for every task.
    ///
    /// Fails on the first capability that cannot be loaded; no registry is
    /// returned in that case.
    pub fn initialize(
        bindings: &ModelBindings,
        loader: &impl CapabilityLoader,
    ) -> Result<Self, InitializationError> {
        let mut registry = Self {
            entries: HashMap::with_capacity(Task::ALL.len()),
        };
        for task in Task::ALL {
            registry.register(task, bindings.model_for(task), loader)?;
        }
        Ok(registry)
    }

    fn register(
        &mut self,
        task: Task,
        model_id: &str,
        loader: &impl CapabilityLoader,
    ) -> Result<(), InitializationError> {
        info!(%task, model = model_id, "loading model");

        let capability = loader
            .load(task, model_id)
            .map_err(|e| InitializationError::Load {
                task,
                model: model_id.to_string(),
                reason: format!("{e:#}"),
            })?;

        if capability.task() != task {
            return Err(InitializationError::TaskMismatch {
                model: model_id.to_string(),
                expected: task,
                actual: capability.task(),
            });
        }

        info!(%task, model = model_id, "model loaded");
        self.entries.insert(
            task,
            RegisteredCapability {
                model_id: model_id.to_string(),
                capability,
            },
        );
        Ok(())
    }

    /// Look up the capability for `task`.
    pub fn resolve(&self, task: Task) -> Result<&RegisteredCapability, UnknownTaskError> {
        self.entries.get(&task).ok_or(UnknownTaskError(task))
    }

    /// Model identifier per registered task.
    pub fn models(&self) -> BTreeMap<Task, String> {
        self.entries
            .iter()
            .map(|(task, entry)| (*task, entry.model_id.clone()))
            .collect()
    }
}
