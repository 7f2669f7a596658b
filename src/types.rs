//! Shared types used across modules
//!
//! Records read from the performance store and the questions produced
//! by the quiz flows. Kept here so the store, the quiz logic and the
//! server can all depend on them without depending on each other.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single graded attempt by a learner on a topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub id: i64,
    pub learner_id: String,
    pub topic: String,
    pub correct: bool,
    pub created_at: DateTime<Utc>,
}

/// A graded score (0-100) a learner obtained on a topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicScore {
    pub id: i64,
    pub learner_id: String,
    pub topic: String,
    pub score: f64,
    pub created_at: DateTime<Utc>,
}

/// Difficulty tier of a generated question
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyTier {
    Easy,
    Medium,
    Hard,
}

impl DifficultyTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            DifficultyTier::Easy => "easy",
            DifficultyTier::Medium => "medium",
            DifficultyTier::Hard => "hard",
        }
    }
}

impl std::fmt::Display for DifficultyTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single generated question at a chosen tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedQuestion {
    pub question: String,
    pub difficulty: DifficultyTier,
}

/// One multiple-choice question of a weak-topic quiz
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub id: String,
    pub learner_id: String,
    pub question: String,
    pub options: [String; 4],
    /// Full text of the correct option
    pub answer: String,
}

/// Result of the weak-topic quiz flow
#[derive(Debug, Clone, PartialEq)]
pub enum WeakTopicQuiz {
    Quiz(Vec<QuizQuestion>),
    NoWeakAreas,
}

/// Outcome of checking a learner's answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerCheck {
    pub correct: bool,
    pub message: String,
}

/// Suggested next topics for a learner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningPath {
    pub learner_id: String,
    pub weak_topics: Vec<String>,
    pub recommendations: Vec<String>,
}
