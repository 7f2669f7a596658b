//! Adaptive quiz selection
//!
//! - `difficulty`: recent correctness to difficulty tier
//! - `weak_topics`: aggregate scores to the set of weak topics
//! - `prompts`: prompt templates for the generation provider
//! - `parser`: generated text to multiple-choice questions
//! - `service`: the request-level flows tying them to the store and provider

pub mod difficulty;
pub mod parser;
pub mod prompts;
pub mod service;
pub mod weak_topics;

pub use difficulty::{classify, count_correct, RECENT_WINDOW};
pub use parser::parse_quiz;
pub use service::{QuizService, QuizSettings};
pub use weak_topics::{select_weak_topics, WEAK_THRESHOLD};
