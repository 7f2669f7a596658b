//! Performance store
//!
//! Provides:
//! - The `PerformanceStore` trait the quiz service reads history through
//! - A SQLite implementation used by the server and the CLI

pub mod sqlite;

use crate::error::StoreError;
use crate::types::{PerformanceRecord, QuizQuestion, TopicScore};

pub use sqlite::{SqliteStore, StoreStats};

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Storage of learner history and generated quizzes
#[async_trait::async_trait]
pub trait PerformanceStore: Send + Sync {
    /// Most recent attempts for a learner on a topic.
    ///
    /// Implementations must return at most `limit` records ordered by
    /// `created_at` descending (latest insert first on ties).
    async fn recent_attempts(
        &self,
        learner_id: &str,
        topic: &str,
        limit: usize,
    ) -> StoreResult<Vec<PerformanceRecord>>;

    /// Every score recorded for a learner
    async fn topic_scores(&self, learner_id: &str) -> StoreResult<Vec<TopicScore>>;

    /// Append a graded attempt
    async fn record_attempt(
        &self,
        learner_id: &str,
        topic: &str,
        correct: bool,
    ) -> StoreResult<PerformanceRecord>;

    /// Append a topic score
    async fn record_score(&self, learner_id: &str, topic: &str, score: f64) -> StoreResult<TopicScore>;

    /// Persist generated quiz questions
    async fn save_quiz(&self, questions: &[QuizQuestion]) -> StoreResult<()>;

    /// Look up a stored quiz question
    async fn find_question(&self, id: &str) -> StoreResult<Option<QuizQuestion>>;
}
