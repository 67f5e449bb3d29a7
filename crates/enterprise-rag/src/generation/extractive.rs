//! Keyword-overlap answer extraction used when no generator is available

/// Answer text when no sentence shares a word with the question
pub const NO_ANSWER: &str = "No answer found in the context.";

/// Confidence reported for extractive answers
pub const EXTRACTIVE_CONFIDENCE: f32 = 0.5;

/// Pick the context sentence sharing the most words with the question
///
/// Sentences are separated by `". "`. Each question word (repeats included)
/// scores one point if it appears among the sentence's words; matching is
/// case-insensitive on whitespace-separated tokens, punctuation included.
/// Ties keep the earliest sentence.
pub fn extractive_answer(question: &str, context: &str) -> String {
    let question_lower = question.to_lowercase();
    let question_words: Vec<&str> = question_lower.split_whitespace().collect();

    let mut best_sentence = "";
    let mut max_matches = 0usize;

    for sentence in context.split(". ") {
        let sentence_lower = sentence.to_lowercase();
        let sentence_words: Vec<&str> = sentence_lower.split_whitespace().collect();
        let matches = question_words
            .iter()
            .filter(|word| sentence_words.contains(word))
            .count();

        if matches > max_matches {
            max_matches = matches;
            best_sentence = sentence.trim();
        }
    }

    if best_sentence.is_empty() {
        NO_ANSWER.to_string()
    } else {
        best_sentence.to_string()
    }
}
