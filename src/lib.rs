//! Smart Quiz - adaptive quiz service library
//!
//! - Difficulty tiers from a learner's five most recent attempts
//! - Weak-topic detection from aggregated scores
//! - Question and quiz generation through an OpenAI-compatible provider
//! - Answer checking with generated explanations
//! - SQLite persistence, JWT-protected HTTP API
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use smart_quiz::{Config, LlmClient, QuizService, SqliteStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let store = SqliteStore::open(config.database_path()?).await?;
//!     let provider = LlmClient::new(config.provider_config()?)?;
//!     let quiz = QuizService::new(Arc::new(store), Arc::new(provider), config.quiz_settings());
//!     let q = quiz.generate_question("learner-1", "loops").await?;
//!     println!("[{}] {}", q.difficulty, q.question);
//!     Ok(())
//! }
//! ```

// Core modules (order matters for cross-module dependencies)
pub mod types;
pub mod error;
pub mod store;
pub mod generation;
pub mod quiz;
pub mod config;
pub mod server;
pub mod cli;

pub use config::Config;
pub use error::{GenerationError, QuizError, StoreError};
pub use generation::{GenerationProvider, LlmClient, ProviderConfig};
pub use quiz::{QuizService, QuizSettings};
pub use server::{router, ServerState};
pub use store::{PerformanceStore, SqliteStore};
pub use types::{DifficultyTier, GeneratedQuestion, QuizQuestion, WeakTopicQuiz};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
