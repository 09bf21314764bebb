//! The two kinds of work the API can perform.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A task name accepted by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Task {
    TextGeneration,
    SentimentAnalysis,
}

impl Task {
    /// Every task, in the order they are advertised and registered.
    pub const ALL: [Task; 2] = [Task::TextGeneration, Task::SentimentAnalysis];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TextGeneration => "text-generation",
            Self::SentimentAnalysis => "sentiment-analysis",
        }
    }

    /// Look up a task by its wire name. Matching is exact.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|task| task.as_str() == name)
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
