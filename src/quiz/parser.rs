//! Parsing of generated multiple-choice quizzes
//!
//! The provider is asked for blocks separated by a blank line, each made of
//! a question stem, four options and an answer line:
//!
//! ```text
//! What does `break` do inside a loop?
//! A) Skips one iteration
//! B) Exits the loop
//! C) Restarts the loop
//! D) Nothing
//! Answer: B
//! ```
//!
//! Blocks that do not have exactly that shape are rejected one by one and
//! logged. The parse only fails when no block survives.

use tracing::warn;

use crate::error::{QuizError, QuizResult};
use crate::types::QuizQuestion;

/// Lines in a well-formed block: stem, four options, answer
const BLOCK_LINES: usize = 6;

/// Why a single block was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockRejection {
    WrongLineCount(usize),
    EmptyOption(usize),
    UnknownAnswer(String),
}

impl std::fmt::Display for BlockRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockRejection::WrongLineCount(n) => write!(f, "expected {} lines, got {}", BLOCK_LINES, n),
            BlockRejection::EmptyOption(i) => write!(f, "option {} is empty", i + 1),
            BlockRejection::UnknownAnswer(a) => write!(f, "answer '{}' designates no option", a),
        }
    }
}

/// Parse provider output into quiz questions for `learner_id`.
pub fn parse_quiz(text: &str, learner_id: &str) -> QuizResult<Vec<QuizQuestion>> {
    let blocks = split_blocks(text);
    let total = blocks.len();
    let mut questions = Vec::with_capacity(total);

    for (n, block) in blocks.into_iter().enumerate() {
        match parse_block(&block, learner_id) {
            Ok(q) => questions.push(q),
            Err(reason) => warn!("Rejected quiz block {}/{}: {}", n + 1, total, reason),
        }
    }

    if questions.is_empty() {
        return Err(QuizError::MalformedGenerationOutput(format!(
            "none of {} block(s) had a question, four options and an answer",
            total
        )));
    }
    Ok(questions)
}

/// Split text into groups of non-blank trimmed lines
fn split_blocks(text: &str) -> Vec<Vec<&str>> {
    let mut blocks = Vec::new();
    let mut current = Vec::new();
    for line in text.lines().map(str::trim) {
        if line.is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }
    blocks
}

fn parse_block(lines: &[&str], learner_id: &str) -> Result<QuizQuestion, BlockRejection> {
    if lines.len() != BLOCK_LINES {
        return Err(BlockRejection::WrongLineCount(lines.len()));
    }

    let mut options: [String; 4] = Default::default();
    for (i, line) in lines[1..5].iter().enumerate() {
        let text = match split_label(line) {
            Some((_, rest)) => rest,
            None => line.trim(),
        };
        if text.is_empty() {
            return Err(BlockRejection::EmptyOption(i));
        }
        options[i] = text.to_string();
    }

    let answer_line = lines[5];
    let index = resolve_option(answer_line, &options)
        .ok_or_else(|| BlockRejection::UnknownAnswer(answer_line.to_string()))?;

    Ok(QuizQuestion {
        id: uuid::Uuid::new_v4().to_string(),
        learner_id: learner_id.to_string(),
        question: lines[0].to_string(),
        answer: options[index].clone(),
        options,
    })
}

/// Find which option an answer designates, by letter or by text.
///
/// Accepts an optional `Answer:` prefix, a bare or labelled letter
/// (`B`, `b)`, `(B)`) or the option text itself. A letter followed by
/// text (`B. Exits the loop`) only counts when the text is that option's.
pub fn resolve_option(answer: &str, options: &[String; 4]) -> Option<usize> {
    let text = strip_answer_prefix(answer);
    if let Some((index, rest)) = split_label(text) {
        if rest.is_empty() || rest.eq_ignore_ascii_case(&options[index]) {
            return Some(index);
        }
    }
    options.iter().position(|o| o.eq_ignore_ascii_case(text))
}

fn strip_answer_prefix(line: &str) -> &str {
    let line = line.trim();
    let lower = line.to_ascii_lowercase();
    for prefix in ["correct answer:", "answer:"] {
        if lower.starts_with(prefix) {
            return line[prefix.len()..].trim();
        }
    }
    line
}

/// Split a leading `A)` / `(a)` / `C.` / `D:` label off a line
fn split_label(line: &str) -> Option<(usize, &str)> {
    let line = line.trim();
    let body = line.strip_prefix('(').unwrap_or(line);
    let mut chars = body.chars();
    let index = match chars.next()?.to_ascii_uppercase() {
        'A' => 0,
        'B' => 1,
        'C' => 2,
        'D' => 3,
        _ => return None,
    };
    match chars.next() {
        None => Some((index, "")),
        Some(')') | Some('.') | Some(':') => Some((index, body[2..].trim())),
        _ => None,
    }
}
