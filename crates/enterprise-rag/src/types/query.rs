//! Query request types

use serde::{Deserialize, Serialize};

/// Upper bound on chunks retrieved for a single question
pub const MAX_RESULTS_LIMIT: usize = 20;

/// Query request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    /// The question to answer
    #[serde(alias = "query")]
    pub question: String,

    /// Number of chunks to retrieve (default: 3)
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

fn default_max_results() -> usize {
    3
}

impl QueryRequest {
    /// Create a new query
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            max_results: default_max_results(),
        }
    }

    /// Set the number of chunks to retrieve
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    /// Retrieval depth clamped to 1..=MAX_RESULTS_LIMIT
    pub fn effective_k(&self) -> usize {
        self.max_results.clamp(1, MAX_RESULTS_LIMIT)
    }
}
