//! Prompt templates for grounded answer generation

use crate::providers::vector_store::VectorSearchResult;

/// Prompt builder for RAG queries
pub struct PromptBuilder;

impl PromptBuilder {
    /// Join retrieved chunk contents into the answer context
    pub fn build_context(results: &[VectorSearchResult]) -> String {
        results
            .iter()
            .map(|r| r.chunk.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Build the generation prompt with strict grounding
    pub fn build_rag_prompt(question: &str, context: &str) -> String {
        format!(
            r#"You are a document-grounded assistant that ONLY uses information from the provided context.

RULES:
1. Use only information explicitly stated in the CONTEXT below.
2. If the answer is not in the context, respond with "No answer found in the context."
3. Answer in one to three sentences, quoting the context where possible.

CONTEXT:
{context}

QUESTION: {question}

ANSWER:"#,
            context = context,
            question = question,
        )
    }
}
