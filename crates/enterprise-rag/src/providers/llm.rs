//! LLM provider trait for generating answers

use async_trait::async_trait;

use crate::error::Result;

/// An answer produced by a generator
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedAnswer {
    /// Answer text
    pub answer: String,
    /// Model-reported confidence, when the backend provides one
    pub score: Option<f32>,
}

impl GeneratedAnswer {
    /// Answer without a model score
    pub fn unscored(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            score: None,
        }
    }
}

/// Trait for LLM-based answer generation
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate an answer given a question and its retrieved context
    async fn generate_answer(&self, question: &str, context: &str) -> Result<GeneratedAnswer>;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Provider name for logging
    fn name(&self) -> &str;

    /// Model being used
    fn model(&self) -> &str;
}
