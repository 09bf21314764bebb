//! Inference layer: capability registry, task dispatch, and ONNX Runtime models
//! for text generation and sentiment classification.

mod capability;
mod dispatch;
mod error;
mod registry;
pub mod sampling;

#[cfg(feature = "onnx")]
mod generator;
#[cfg(feature = "onnx")]
mod loader;
#[cfg(feature = "onnx")]
mod sentiment;

pub use capability::{
    Capability, GeneratedSequence, GenerationInput, LabelScore, SentimentAnalyzer, TextGenerator,
};
pub use dispatch::Dispatcher;
pub use error::{DispatchError, InferenceError, InitializationError, UnknownTaskError};
pub use registry::{CapabilityLoader, CapabilityRegistry, ModelBindings, RegisteredCapability};

#[cfg(feature = "onnx")]
pub use generator::OnnxTextGenerator;
#[cfg(feature = "onnx")]
pub use loader::OnnxLoader;
#[cfg(feature = "onnx")]
pub use sentiment::OnnxSentimentAnalyzer;
