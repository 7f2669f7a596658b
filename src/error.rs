//! Error types for the quiz flows, the generation provider and the store

use std::time::Duration;
use thiserror::Error;

/// Failure talking to the generative text provider
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("provider did not answer within {0:?}")]
    Timeout(Duration),

    #[error("request to provider failed: {0}")]
    Transport(String),

    #[error("provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("provider response could not be parsed: {0}")]
    InvalidResponse(String),

    #[error("provider returned no text")]
    EmptyResponse,
}

/// Failure in the performance store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

/// Error surfaced by the quiz service
#[derive(Error, Debug)]
pub enum QuizError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("not allowed to act for learner {0}")]
    Forbidden(String),

    #[error("question not found: {0}")]
    QuestionNotFound(String),

    #[error("generation failed: {0}")]
    UpstreamGeneration(#[from] GenerationError),

    #[error("generation output malformed: {0}")]
    MalformedGenerationOutput(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type QuizResult<T> = std::result::Result<T, QuizError>;
