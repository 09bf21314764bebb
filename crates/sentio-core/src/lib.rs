//! Core types for the Sentio API: task names, request validation, and response shapes.

mod error;
pub mod request;
pub mod response;
pub mod task;

pub use error::ValidationError;
pub use request::{
    GenerateRequest, GenerationParams, RawGenerateRequest, RawProcessRequest,
    RawSentimentRequest, SentimentRequest, ValidatedRequest,
};
pub use response::{GenerationResult, HealthStatus, SentimentResult, ServiceStatus, TaskResult};
pub use task::Task;
