use sentio_core::Task;
use thiserror::Error;

/// A capability could not be brought up at startup. Fatal: the server must
/// not start with a partial registry.
#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("failed to load {task} model '{model}': {reason}")]
    Load {
        task: Task,
        model: String,
        reason: String,
    },

    #[error("model '{model}' was registered for {expected} but provides {actual}")]
    TaskMismatch {
        model: String,
        expected: Task,
        actual: Task,
    },
}

/// No capability is registered for the requested task.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no capability registered for task '{0}'")]
pub struct UnknownTaskError(pub Task);

/// The underlying model raised, or returned something unusable.
///
/// Carries only the failure's message text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct InferenceError(String);

impl InferenceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

impl From<anyhow::Error> for InferenceError {
    fn from(err: anyhow::Error) -> Self {
        Self(format!("{err:#}"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error(transparent)]
    UnknownTask(#[from] UnknownTaskError),

    #[error(transparent)]
    Inference(#[from] InferenceError),
}
