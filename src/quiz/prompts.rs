//! Prompt templates sent to the generation provider

use crate::types::{DifficultyTier, QuizQuestion};

/// Prompt for a single question at a given tier
pub fn single_question(tier: DifficultyTier, topic: &str) -> String {
    format!("Generate a {} level quiz question on {}.", tier, topic)
}

/// Prompt for a multiple-choice quiz over the given weak topics
pub fn weak_topic_quiz(topics: &[String], questions: usize) -> String {
    format!(
        "Generate a multiple-choice quiz with {} questions about {}.\n\
         Format every question as six lines: the question, four options labelled \
         A) to D), and a final line \"Answer: <letter>\". \
         Separate questions with one blank line and add nothing else.",
        questions,
        topics.join(", ")
    )
}

/// Prompt asking for an explanation of a wrong answer
pub fn explanation(question: &QuizQuestion, learner_answer: &str) -> String {
    format!(
        "The student answered incorrectly.\n\nQuestion: {}\nCorrect Answer: {}\nStudent Answer: {}\n\nProvide an explanation:",
        question.question, question.answer, learner_answer
    )
}

/// Prompt for the next topics a learner should study
pub fn learning_path(weak_topics: &[String]) -> String {
    let areas = if weak_topics.is_empty() {
        "none identified".to_string()
    } else {
        weak_topics.join(", ")
    };
    format!(
        "A student is learning programming. Their weak areas: {}. Suggest the next three topics they should study.",
        areas
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_question_mentions_tier_and_topic() {
        let prompt = single_question(DifficultyTier::Hard, "loops");
        assert_eq!(prompt, "Generate a hard level quiz question on loops.");
    }

    #[test]
    fn test_weak_topic_quiz_joins_topics() {
        let prompt = weak_topic_quiz(&["algebra".to_string(), "sets".to_string()], 3);
        assert!(prompt.starts_with("Generate a multiple-choice quiz with 3 questions about algebra, sets."));
        assert!(prompt.contains("Answer: <letter>"));
    }

    #[test]
    fn test_learning_path_without_weak_topics() {
        assert!(learning_path(&[]).contains("none identified"));
    }
}
