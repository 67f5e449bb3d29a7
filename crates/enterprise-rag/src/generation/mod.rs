//! Answer generation: prompts, the Ollama client and the extractive fallback

pub mod extractive;
pub mod ollama;
pub mod prompt;

pub use extractive::{extractive_answer, EXTRACTIVE_CONFIDENCE, NO_ANSWER};
pub use ollama::OllamaClient;
pub use prompt::PromptBuilder;
