//! Loads ONNX capabilities from `<models_dir>/<model_id>/`.

use std::path::PathBuf;
use std::sync::Arc;

use sentio_core::Task;

use crate::capability::Capability;
use crate::generator::OnnxTextGenerator;
use crate::registry::CapabilityLoader;
use crate::sentiment::OnnxSentimentAnalyzer;

/// Resolves each model identifier to a sub-directory of `models_dir`.
#[derive(Debug, Clone)]
pub struct OnnxLoader {
    models_dir: PathBuf,
}

impl OnnxLoader {
    pub fn new(models_dir: impl Into<PathBuf>) -> Self {
        Self {
            models_dir: models_dir.into(),
        }
    }
}

impl CapabilityLoader for OnnxLoader {
    fn load(&self, task: Task, model_id: &str) -> anyhow::Result<Capability> {
        let dir = self.models_dir.join(model_id);
        Ok(match task {
            Task::TextGeneration => {
                Capability::TextGeneration(Arc::new(OnnxTextGenerator::load(&dir)?))
            }
            Task::SentimentAnalysis => {
                Capability::SentimentAnalysis(Arc::new(OnnxSentimentAnalyzer::load(&dir)?))
            }
        })
    }
}
