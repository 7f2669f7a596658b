//! Quiz service: composes the store, the generation provider and the
//! selection rules into the request-level flows.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::difficulty::{classify, count_correct, RECENT_WINDOW};
use super::parser::{parse_quiz, resolve_option};
use super::prompts;
use super::weak_topics::{select_weak_topics, WEAK_THRESHOLD};
use crate::error::{GenerationError, QuizError, QuizResult};
use crate::generation::GenerationProvider;
use crate::store::PerformanceStore;
use crate::types::{
    AnswerCheck, DifficultyTier, GeneratedQuestion, LearningPath, PerformanceRecord, QuizQuestion,
    TopicScore, WeakTopicQuiz,
};

/// Tunables for the quiz flows
#[derive(Debug, Clone)]
pub struct QuizSettings {
    pub recent_window: usize,
    pub weak_threshold: f64,
    pub weak_quiz_questions: usize,
    pub question_max_tokens: u32,
    pub quiz_max_tokens: u32,
    pub explanation_max_tokens: u32,
    pub path_max_tokens: u32,
    pub generation_timeout: Duration,
}

impl Default for QuizSettings {
    fn default() -> Self {
        Self {
            recent_window: RECENT_WINDOW,
            weak_threshold: WEAK_THRESHOLD,
            weak_quiz_questions: 3,
            question_max_tokens: 100,
            quiz_max_tokens: 500,
            explanation_max_tokens: 150,
            path_max_tokens: 100,
            generation_timeout: Duration::from_secs(30),
        }
    }
}

/// Adaptive quiz service
#[derive(Clone)]
pub struct QuizService {
    store: Arc<dyn PerformanceStore>,
    provider: Arc<dyn GenerationProvider>,
    settings: QuizSettings,
}

impl QuizService {
    pub fn new(
        store: Arc<dyn PerformanceStore>,
        provider: Arc<dyn GenerationProvider>,
        settings: QuizSettings,
    ) -> Self {
        Self {
            store,
            provider,
            settings,
        }
    }

    /// Tier for a learner on a topic, from the most recent attempts
    pub async fn classify_learner(&self, learner_id: &str, topic: &str) -> QuizResult<DifficultyTier> {
        let learner_id = require("learner_id", learner_id)?;
        let topic = require("topic", topic)?;

        let recent = self
            .store
            .recent_attempts(learner_id, topic, self.settings.recent_window)
            .await?;
        let correct = count_correct(&recent, self.settings.recent_window);
        let tier = classify(correct);
        debug!(learner_id, topic, attempts = recent.len(), correct, %tier, "Classified learner");
        Ok(tier)
    }

    /// Generate one question at the learner's current tier for `topic`
    pub async fn generate_question(&self, learner_id: &str, topic: &str) -> QuizResult<GeneratedQuestion> {
        let tier = self.classify_learner(learner_id, topic).await?;
        let prompt = prompts::single_question(tier, topic.trim());

        let text = self.generate(&prompt, self.settings.question_max_tokens).await?;
        let question = text.trim();
        if question.is_empty() {
            return Err(QuizError::MalformedGenerationOutput("empty question".to_string()));
        }

        info!(learner_id, topic, %tier, "Generated question");
        Ok(GeneratedQuestion {
            question: question.to_string(),
            difficulty: tier,
        })
    }

    /// Topics the learner scores below the threshold on
    pub async fn weak_topics(&self, learner_id: &str) -> QuizResult<Vec<String>> {
        let learner_id = require("learner_id", learner_id)?;
        let scores = self.store.topic_scores(learner_id).await?;
        Ok(select_weak_topics(&scores, self.settings.weak_threshold))
    }

    /// Build and persist a multiple-choice quiz over the learner's weak topics
    pub async fn generate_weak_topic_quiz(&self, learner_id: &str) -> QuizResult<WeakTopicQuiz> {
        let weak = self.weak_topics(learner_id).await?;
        if weak.is_empty() {
            info!(learner_id, "No weak areas, skipping generation");
            return Ok(WeakTopicQuiz::NoWeakAreas);
        }

        let prompt = prompts::weak_topic_quiz(&weak, self.settings.weak_quiz_questions);
        let text = self.generate(&prompt, self.settings.quiz_max_tokens).await?;
        let questions = parse_quiz(&text, learner_id.trim())?;

        self.store.save_quiz(&questions).await?;
        info!(learner_id, topics = ?weak, questions = questions.len(), "Generated weak-topic quiz");
        Ok(WeakTopicQuiz::Quiz(questions))
    }

    /// Look up a stored quiz question
    pub async fn question(&self, question_id: &str) -> QuizResult<QuizQuestion> {
        let question_id = require("question_id", question_id)?;
        self.store
            .find_question(question_id)
            .await?
            .ok_or_else(|| QuizError::QuestionNotFound(question_id.to_string()))
    }

    /// Check an answer; wrong answers get a generated explanation
    pub async fn check_answer(&self, question: &QuizQuestion, answer: &str) -> QuizResult<AnswerCheck> {
        let answer = require("answer", answer)?;

        if is_correct(question, answer) {
            return Ok(AnswerCheck {
                correct: true,
                message: "Correct!".to_string(),
            });
        }

        let prompt = prompts::explanation(question, answer);
        let explanation = self.generate(&prompt, self.settings.explanation_max_tokens).await?;
        Ok(AnswerCheck {
            correct: false,
            message: explanation.trim().to_string(),
        })
    }

    /// Ask for the next topics the learner should study
    pub async fn learning_path(&self, learner_id: &str) -> QuizResult<LearningPath> {
        let weak = self.weak_topics(learner_id).await?;
        let prompt = prompts::learning_path(&weak);
        let text = self.generate(&prompt, self.settings.path_max_tokens).await?;

        let recommendations = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();

        Ok(LearningPath {
            learner_id: learner_id.trim().to_string(),
            weak_topics: weak,
            recommendations,
        })
    }

    /// Record a graded attempt
    pub async fn record_attempt(&self, learner_id: &str, topic: &str, correct: bool) -> QuizResult<PerformanceRecord> {
        let learner_id = require("learner_id", learner_id)?;
        let topic = require("topic", topic)?;
        Ok(self.store.record_attempt(learner_id, topic, correct).await?)
    }

    /// Record a topic score in 0..=100
    pub async fn record_score(&self, learner_id: &str, topic: &str, score: f64) -> QuizResult<TopicScore> {
        let learner_id = require("learner_id", learner_id)?;
        let topic = require("topic", topic)?;
        if !score.is_finite() || !(0.0..=100.0).contains(&score) {
            return Err(QuizError::InvalidRequest(format!("score must be within 0..=100, got {}", score)));
        }
        Ok(self.store.record_score(learner_id, topic, score).await?)
    }

    /// One provider call, bounded by the configured timeout, never retried
    async fn generate(&self, prompt: &str, max_tokens: u32) -> QuizResult<String> {
        debug!(prompt, max_tokens, "Sending prompt");
        let timeout = self.settings.generation_timeout;
        match tokio::time::timeout(timeout, self.provider.generate(prompt, max_tokens)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(GenerationError::Timeout(timeout).into()),
        }
    }
}

fn require<'a>(field: &str, value: &'a str) -> QuizResult<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(QuizError::InvalidRequest(format!("{} must not be empty", field)));
    }
    Ok(value)
}

/// Answers match by text (case-insensitive) or by the correct option's letter
fn is_correct(question: &QuizQuestion, answer: &str) -> bool {
    if answer.eq_ignore_ascii_case(question.answer.trim()) {
        return true;
    }
    let correct_index = question.options.iter().position(|o| o == &question.answer);
    correct_index.is_some() && resolve_option(answer, &question.options) == correct_index
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::MockGenerationProvider;
    use crate::store::SqliteStore;
    use chrono::{Duration as ChronoDuration, Utc};

    const QUIZ_TEXT: &str = "What is 2^3?
A) 6
B) 8
C) 9
D) 5
Answer: B

Which set operation keeps common elements?
A) Union
B) Difference
C) Intersection
D) Complement
Answer: C";

    fn service(store: SqliteStore, provider: MockGenerationProvider) -> QuizService {
        QuizService::new(Arc::new(store), Arc::new(provider), QuizSettings::default())
    }

    async fn seed_attempts(store: &SqliteStore, learner: &str, topic: &str, pattern: &[bool]) {
        // pattern[0] is the most recent attempt
        let now = Utc::now();
        for (i, &correct) in pattern.iter().enumerate().rev() {
            store
                .record_attempt_at(learner, topic, correct, now - ChronoDuration::minutes(i as i64))
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_hard_question_for_strong_learner() {
        let store = SqliteStore::in_memory().unwrap();
        seed_attempts(&store, "learner-1", "loops", &[true, true, false, true, true]).await;

        let mut provider = MockGenerationProvider::new();
        provider
            .expect_generate()
            .withf(|prompt, max_tokens| prompt.contains("hard") && prompt.contains("loops") && *max_tokens == 100)
            .times(1)
            .returning(|_, _| Ok("  Write a loop that sums the digits of n.\n".to_string()));

        let q = service(store, provider).generate_question("learner-1", "loops").await.unwrap();
        assert_eq!(q.difficulty, DifficultyTier::Hard);
        assert_eq!(q.question, "Write a loop that sums the digits of n.");
    }

    #[tokio::test]
    async fn test_easy_question_for_struggling_learner() {
        let store = SqliteStore::in_memory().unwrap();
        seed_attempts(&store, "learner-1", "recursion", &[false, true, false, false, false]).await;

        let mut provider = MockGenerationProvider::new();
        provider
            .expect_generate()
            .withf(|prompt, _| prompt.contains("easy") && prompt.contains("recursion"))
            .times(1)
            .returning(|_, _| Ok("What is a base case?".to_string()));

        let q = service(store, provider).generate_question("learner-1", "recursion").await.unwrap();
        assert_eq!(q.difficulty, DifficultyTier::Easy);
    }

    #[tokio::test]
    async fn test_no_history_is_easy() {
        let store = SqliteStore::in_memory().unwrap();
        let mut provider = MockGenerationProvider::new();
        provider
            .expect_generate()
            .withf(|prompt, _| prompt.contains("easy"))
            .times(1)
            .returning(|_, _| Ok("Q".to_string()));

        let q = service(store, provider).generate_question("new-learner", "graphs").await.unwrap();
        assert_eq!(q.difficulty, DifficultyTier::Easy);
    }

    #[tokio::test]
    async fn test_only_latest_five_attempts_count() {
        let store = SqliteStore::in_memory().unwrap();
        // Latest five have 2 correct; older ones are all correct
        seed_attempts(
            &store,
            "learner-1",
            "sorting",
            &[true, false, true, false, false, true, true, true],
        )
        .await;

        let svc = service(store, MockGenerationProvider::new());
        assert_eq!(svc.classify_learner("learner-1", "sorting").await.unwrap(), DifficultyTier::Medium);
    }

    #[tokio::test]
    async fn test_blank_topic_is_rejected_without_generation() {
        let store = SqliteStore::in_memory().unwrap();
        let mut provider = MockGenerationProvider::new();
        provider.expect_generate().never();

        let err = service(store, provider).generate_question("learner-1", "  ").await.unwrap_err();
        assert!(matches!(err, QuizError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_provider_failure_propagates_once() {
        let store = SqliteStore::in_memory().unwrap();
        let mut provider = MockGenerationProvider::new();
        provider
            .expect_generate()
            .times(1)
            .returning(|_, _| Err(GenerationError::Status { status: 503, body: "busy".to_string() }));

        let err = service(store, provider).generate_question("learner-1", "loops").await.unwrap_err();
        assert!(matches!(err, QuizError::UpstreamGeneration(GenerationError::Status { status: 503, .. })));
    }

    #[tokio::test]
    async fn test_no_weak_areas_skips_generation() {
        let store = SqliteStore::in_memory().unwrap();
        store.record_score("learner-1", "algebra", 75.0).await.unwrap();
        store.record_score("learner-1", "loops", 50.0).await.unwrap();

        let mut provider = MockGenerationProvider::new();
        provider.expect_generate().never();

        let result = service(store, provider).generate_weak_topic_quiz("learner-1").await.unwrap();
        assert_eq!(result, WeakTopicQuiz::NoWeakAreas);
    }

    #[tokio::test]
    async fn test_weak_topic_quiz_is_generated_and_saved() {
        let store = SqliteStore::in_memory().unwrap();
        store.record_score("learner-1", "algebra", 30.0).await.unwrap();
        store.record_score("learner-1", "sets", 45.0).await.unwrap();
        store.record_score("learner-1", "loops", 90.0).await.unwrap();

        let mut provider = MockGenerationProvider::new();
        provider
            .expect_generate()
            .withf(|prompt, max_tokens| {
                prompt.contains("3 questions about algebra, sets.") && !prompt.contains("loops") && *max_tokens == 500
            })
            .times(1)
            .returning(|_, _| Ok(QUIZ_TEXT.to_string()));

        let svc = service(store.clone(), provider);
        let quiz = match svc.generate_weak_topic_quiz("learner-1").await.unwrap() {
            WeakTopicQuiz::Quiz(q) => q,
            WeakTopicQuiz::NoWeakAreas => panic!("expected a quiz"),
        };
        assert_eq!(quiz.len(), 2);
        assert_eq!(quiz[0].answer, "8");
        assert_eq!(quiz[1].answer, "Intersection");

        let stored = store.find_question(&quiz[1].id).await.unwrap().unwrap();
        assert_eq!(stored, quiz[1]);
    }

    #[tokio::test]
    async fn test_malformed_quiz_is_not_saved() {
        let store = SqliteStore::in_memory().unwrap();
        store.record_score("learner-1", "algebra", 30.0).await.unwrap();

        let mut provider = MockGenerationProvider::new();
        provider
            .expect_generate()
            .times(1)
            .returning(|_, _| Ok("Here is your quiz!\nGood luck.".to_string()));

        let err = service(store.clone(), provider)
            .generate_weak_topic_quiz("learner-1")
            .await
            .unwrap_err();
        assert!(matches!(err, QuizError::MalformedGenerationOutput(_)));
        assert_eq!(store.stats().await.unwrap().quiz_questions, 0);
    }

    #[tokio::test]
    async fn test_correct_answer_skips_generation() {
        let store = SqliteStore::in_memory().unwrap();
        let mut provider = MockGenerationProvider::new();
        provider.expect_generate().never();
        let svc = service(store, provider);

        let question = parse_quiz(QUIZ_TEXT, "learner-1").unwrap().remove(0);
        assert!(svc.check_answer(&question, "8").await.unwrap().correct);
        assert!(svc.check_answer(&question, " b ").await.unwrap().correct);
    }

    #[tokio::test]
    async fn test_wrong_answer_gets_explanation() {
        let store = SqliteStore::in_memory().unwrap();
        let mut provider = MockGenerationProvider::new();
        provider
            .expect_generate()
            .withf(|prompt, max_tokens| {
                prompt.contains("Correct Answer: 8") && prompt.contains("Student Answer: 6") && *max_tokens == 150
            })
            .times(1)
            .returning(|_, _| Ok("2^3 means 2*2*2, which is 8.\n".to_string()));
        let svc = service(store, provider);

        let question = parse_quiz(QUIZ_TEXT, "learner-1").unwrap().remove(0);
        let check = svc.check_answer(&question, "6").await.unwrap();
        assert!(!check.correct);
        assert_eq!(check.message, "2^3 means 2*2*2, which is 8.");
    }

    #[tokio::test]
    async fn test_right_letter_with_wrong_text_is_incorrect() {
        let store = SqliteStore::in_memory().unwrap();
        let mut provider = MockGenerationProvider::new();
        provider
            .expect_generate()
            .withf(|prompt, _| prompt.contains("Student Answer: B) 6"))
            .times(1)
            .returning(|_, _| Ok("Option B is 8, not 6.".to_string()));
        let svc = service(store, provider);

        let question = parse_quiz(QUIZ_TEXT, "learner-1").unwrap().remove(0);
        assert!(svc.check_answer(&question, "B) 8").await.unwrap().correct);
        assert!(!svc.check_answer(&question, "B) 6").await.unwrap().correct);
    }

    #[tokio::test]
    async fn test_unknown_question() {
        let svc = service(SqliteStore::in_memory().unwrap(), MockGenerationProvider::new());
        assert!(matches!(svc.question("nope").await, Err(QuizError::QuestionNotFound(_))));
    }

    #[tokio::test]
    async fn test_learning_path_splits_lines() {
        let store = SqliteStore::in_memory().unwrap();
        store.record_score("learner-1", "pointers", 20.0).await.unwrap();

        let mut provider = MockGenerationProvider::new();
        provider
            .expect_generate()
            .withf(|prompt, _| prompt.contains("Their weak areas: pointers."))
            .times(1)
            .returning(|_, _| Ok("1. Memory layout\n\n2. References\n3. Ownership\n".to_string()));

        let path = service(store, provider).learning_path("learner-1").await.unwrap();
        assert_eq!(path.weak_topics, vec!["pointers"]);
        assert_eq!(path.recommendations, vec!["1. Memory layout", "2. References", "3. Ownership"]);
    }

    #[tokio::test]
    async fn test_record_score_range() {
        let svc = service(SqliteStore::in_memory().unwrap(), MockGenerationProvider::new());
        assert!(svc.record_score("l", "t", 100.0).await.is_ok());
        assert!(matches!(svc.record_score("l", "t", 101.0).await, Err(QuizError::InvalidRequest(_))));
        assert!(matches!(svc.record_score("l", "t", f64::NAN).await, Err(QuizError::InvalidRequest(_))));
    }

    struct SlowProvider;

    #[async_trait::async_trait]
    impl GenerationProvider for SlowProvider {
        async fn generate(&self, _prompt: &str, _max_tokens: u32) -> Result<String, GenerationError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("too late".to_string())
        }
    }

    #[tokio::test]
    async fn test_slow_provider_times_out() {
        let settings = QuizSettings {
            generation_timeout: Duration::from_millis(50),
            ..QuizSettings::default()
        };
        let svc = QuizService::new(Arc::new(SqliteStore::in_memory().unwrap()), Arc::new(SlowProvider), settings);

        let err = svc.generate_question("learner-1", "loops").await.unwrap_err();
        assert!(matches!(err, QuizError::UpstreamGeneration(GenerationError::Timeout(_))));
    }
}
