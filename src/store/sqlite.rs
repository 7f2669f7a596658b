//! SQLite-based storage for attempts, scores and generated quizzes

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use super::{PerformanceStore, StoreResult};
use crate::error::StoreError;
use crate::types::{PerformanceRecord, QuizQuestion, TopicScore};

/// SQLite-backed performance store
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

/// Row counts per table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub attempts: usize,
    pub scores: usize,
    pub quiz_questions: usize,
}

impl SqliteStore {
    /// Open (or create) a store at the given path
    pub async fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let conn = Connection::open(&path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        Self::init_schema(&conn)?;
        debug!("Opened performance store at {}", path.display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open a private in-memory store
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init_schema(conn: &Connection) -> StoreResult<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS attempts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                learner_id TEXT NOT NULL,
                topic TEXT NOT NULL,
                correct INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS topic_scores (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                learner_id TEXT NOT NULL,
                topic TEXT NOT NULL,
                score REAL NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS quiz_questions (
                id TEXT PRIMARY KEY,
                learner_id TEXT NOT NULL,
                question TEXT NOT NULL,
                options TEXT NOT NULL,
                answer TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_attempts_learner_topic
                ON attempts(learner_id, topic, created_at DESC);
            CREATE INDEX IF NOT EXISTS idx_scores_learner ON topic_scores(learner_id);
            CREATE INDEX IF NOT EXISTS idx_quiz_learner ON quiz_questions(learner_id);
        "#,
        )?;
        Ok(())
    }

    /// Append an attempt with an explicit timestamp
    pub async fn record_attempt_at(
        &self,
        learner_id: &str,
        topic: &str,
        correct: bool,
        created_at: DateTime<Utc>,
    ) -> StoreResult<PerformanceRecord> {
        // Stored with microsecond precision; return what a read gives back
        let created_at = created_at.trunc_subsecs(6);
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO attempts (learner_id, topic, correct, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![learner_id, topic, correct, encode_time(&created_at)],
        )?;

        Ok(PerformanceRecord {
            id: conn.last_insert_rowid(),
            learner_id: learner_id.to_string(),
            topic: topic.to_string(),
            correct,
            created_at,
        })
    }

    /// Append a score with an explicit timestamp
    pub async fn record_score_at(
        &self,
        learner_id: &str,
        topic: &str,
        score: f64,
        created_at: DateTime<Utc>,
    ) -> StoreResult<TopicScore> {
        // Stored with microsecond precision; return what a read gives back
        let created_at = created_at.trunc_subsecs(6);
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO topic_scores (learner_id, topic, score, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![learner_id, topic, score, encode_time(&created_at)],
        )?;

        Ok(TopicScore {
            id: conn.last_insert_rowid(),
            learner_id: learner_id.to_string(),
            topic: topic.to_string(),
            score,
            created_at,
        })
    }

    /// Row counts
    pub async fn stats(&self) -> StoreResult<StoreStats> {
        let conn = self.conn.lock().await;
        let count = |table: &str| -> StoreResult<usize> {
            let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
            Ok(n as usize)
        };

        Ok(StoreStats {
            attempts: count("attempts")?,
            scores: count("topic_scores")?,
            quiz_questions: count("quiz_questions")?,
        })
    }
}

#[async_trait]
impl PerformanceStore for SqliteStore {
    async fn recent_attempts(
        &self,
        learner_id: &str,
        topic: &str,
        limit: usize,
    ) -> StoreResult<Vec<PerformanceRecord>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(
            "SELECT id, learner_id, topic, correct, created_at FROM attempts
             WHERE learner_id = ?1 AND topic = ?2
             ORDER BY created_at DESC, id DESC
             LIMIT ?3",
        )?;

        let rows = stmt
            .query_map(params![learner_id, topic, limit as i64], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, bool>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, learner_id, topic, correct, created_at)| {
                Ok(PerformanceRecord {
                    id,
                    learner_id,
                    topic,
                    correct,
                    created_at: decode_time(&created_at)?,
                })
            })
            .collect()
    }

    async fn topic_scores(&self, learner_id: &str) -> StoreResult<Vec<TopicScore>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(
            "SELECT id, learner_id, topic, score, created_at FROM topic_scores
             WHERE learner_id = ?1
             ORDER BY created_at DESC, id DESC",
        )?;

        let rows = stmt
            .query_map(params![learner_id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, learner_id, topic, score, created_at)| {
                Ok(TopicScore {
                    id,
                    learner_id,
                    topic,
                    score,
                    created_at: decode_time(&created_at)?,
                })
            })
            .collect()
    }

    async fn record_attempt(
        &self,
        learner_id: &str,
        topic: &str,
        correct: bool,
    ) -> StoreResult<PerformanceRecord> {
        self.record_attempt_at(learner_id, topic, correct, Utc::now()).await
    }

    async fn record_score(&self, learner_id: &str, topic: &str, score: f64) -> StoreResult<TopicScore> {
        self.record_score_at(learner_id, topic, score, Utc::now()).await
    }

    async fn save_quiz(&self, questions: &[QuizQuestion]) -> StoreResult<()> {
        let mut conn = self.conn.lock().await;
        let now = encode_time(&Utc::now());

        // All or nothing, like a bulk insert
        let tx = conn.transaction()?;
        for q in questions {
            let options = serde_json::to_string(&q.options)?;
            tx.execute(
                "INSERT INTO quiz_questions (id, learner_id, question, options, answer, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![q.id, q.learner_id, q.question, options, q.answer, now],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    async fn find_question(&self, id: &str) -> StoreResult<Option<QuizQuestion>> {
        let conn = self.conn.lock().await;
        let row = conn
            .query_row(
                "SELECT id, learner_id, question, options, answer FROM quiz_questions WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((id, learner_id, question, options, answer)) => {
                let options: [String; 4] = serde_json::from_str(&options)?;
                Ok(Some(QuizQuestion {
                    id,
                    learner_id,
                    question,
                    options,
                    answer,
                }))
            }
            None => Ok(None),
        }
    }
}

/// Fixed-width UTC timestamps so text order matches time order
fn encode_time(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_time(s: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("bad timestamp '{}': {}", s, e)))
}
