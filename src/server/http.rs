//! HTTP handlers

use axum::{
    extract::{rejection::JsonRejection, Extension, FromRequest, Json, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, warn};

use crate::error::{GenerationError, QuizError, QuizResult};
use crate::server::auth::{issue_token_pair, Claims, LogoutRequest, RefreshRequest, TokenType};
use crate::server::ServerState;
use crate::types::{
    AnswerCheck, GeneratedQuestion, LearningPath, PerformanceRecord, QuizQuestion, TopicScore,
    WeakTopicQuiz,
};

/// JSON body whose rejections are reported as `{"error": ...}` with 400
#[derive(FromRequest)]
#[from_request(via(Json), rejection(QuizError))]
pub struct ApiJson<T>(pub T);

impl From<JsonRejection> for QuizError {
    fn from(rejection: JsonRejection) -> Self {
        QuizError::InvalidRequest(rejection.body_text())
    }
}

/// Single question request
#[derive(Debug, Deserialize)]
pub struct GenerateQuestionRequest {
    pub learner_id: String,
    pub topic: String,
}

/// Weak-topic quiz request
#[derive(Debug, Deserialize)]
pub struct GenerateQuizRequest {
    pub learner_id: String,
}

/// Weak-topic quiz response
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum GenerateQuizResponse {
    Quiz { quiz: Vec<QuizQuestion> },
    NoWeakAreas { message: String },
}

impl From<WeakTopicQuiz> for GenerateQuizResponse {
    fn from(result: WeakTopicQuiz) -> Self {
        match result {
            WeakTopicQuiz::Quiz(quiz) => GenerateQuizResponse::Quiz { quiz },
            WeakTopicQuiz::NoWeakAreas => GenerateQuizResponse::NoWeakAreas {
                message: "no weak areas".to_string(),
            },
        }
    }
}

/// Answer check request
#[derive(Debug, Deserialize)]
pub struct CheckAnswerRequest {
    pub question_id: String,
    pub answer: String,
}

/// Attempt recording request
#[derive(Debug, Deserialize)]
pub struct RecordAttemptRequest {
    pub learner_id: String,
    pub topic: String,
    pub correct: bool,
}

/// Score recording request
#[derive(Debug, Deserialize)]
pub struct RecordScoreRequest {
    pub learner_id: String,
    pub topic: String,
    pub score: f64,
}

/// Status response
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
    pub version: String,
}

impl IntoResponse for QuizError {
    fn into_response(self) -> Response {
        let status = match &self {
            QuizError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            QuizError::Forbidden(_) => StatusCode::FORBIDDEN,
            QuizError::QuestionNotFound(_) => StatusCode::NOT_FOUND,
            QuizError::UpstreamGeneration(GenerationError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            QuizError::UpstreamGeneration(_) | QuizError::MalformedGenerationOutput(_) => StatusCode::BAD_GATEWAY,
            QuizError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!("Request failed: {}", self);
        } else {
            warn!("Request rejected: {}", self);
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

fn authorize(claims: &Claims, learner_id: &str) -> QuizResult<()> {
    if claims.can_act_for(learner_id) {
        Ok(())
    } else {
        Err(QuizError::Forbidden(learner_id.to_string()))
    }
}

/// POST /api/quiz/generate
pub async fn generate_question_handler(
    State(state): State<ServerState>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<GenerateQuestionRequest>,
) -> QuizResult<Json<GeneratedQuestion>> {
    authorize(&claims, &req.learner_id)?;
    let question = state.quiz.generate_question(&req.learner_id, &req.topic).await?;
    Ok(Json(question))
}

/// POST /api/generate-quiz
pub async fn generate_quiz_handler(
    State(state): State<ServerState>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<GenerateQuizRequest>,
) -> QuizResult<Json<GenerateQuizResponse>> {
    authorize(&claims, &req.learner_id)?;
    let result = state.quiz.generate_weak_topic_quiz(&req.learner_id).await?;
    Ok(Json(result.into()))
}

/// POST /api/check-answer
pub async fn check_answer_handler(
    State(state): State<ServerState>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<CheckAnswerRequest>,
) -> QuizResult<Json<AnswerCheck>> {
    let question = state.quiz.question(&req.question_id).await?;
    authorize(&claims, &question.learner_id)?;
    let check = state.quiz.check_answer(&question, &req.answer).await?;
    Ok(Json(check))
}

/// GET /api/learning-path/{learner_id}
pub async fn learning_path_handler(
    State(state): State<ServerState>,
    Extension(claims): Extension<Claims>,
    Path(learner_id): Path<String>,
) -> QuizResult<Json<LearningPath>> {
    authorize(&claims, &learner_id)?;
    let path = state.quiz.learning_path(&learner_id).await?;
    Ok(Json(path))
}

/// POST /api/performance/attempts
pub async fn record_attempt_handler(
    State(state): State<ServerState>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<RecordAttemptRequest>,
) -> QuizResult<(StatusCode, Json<PerformanceRecord>)> {
    authorize(&claims, &req.learner_id)?;
    let record = state.quiz.record_attempt(&req.learner_id, &req.topic, req.correct).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// POST /api/performance/scores
pub async fn record_score_handler(
    State(state): State<ServerState>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<RecordScoreRequest>,
) -> QuizResult<(StatusCode, Json<TopicScore>)> {
    // Scores are grades; only staff may write them
    if !claims.is_staff() {
        return Err(QuizError::Forbidden(req.learner_id));
    }
    let score = state.quiz.record_score(&req.learner_id, &req.topic, req.score).await?;
    Ok((StatusCode::CREATED, Json(score)))
}

/// POST /api/auth/refresh
pub async fn refresh_handler(
    State(state): State<ServerState>,
    ApiJson(req): ApiJson<RefreshRequest>,
) -> impl IntoResponse {
    let claims = match state.auth_state.validate_token(&req.refresh_token) {
        Ok(claims) => claims,
        Err(e) => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({
                    "error": "Invalid refresh token",
                    "details": e.to_string()
                })),
            )
                .into_response();
        }
    };

    if claims.token_type != TokenType::Refresh {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "Invalid token type" }))).into_response();
    }

    // Refresh tokens are single use
    if !state.auth_state.consume_refresh(&claims.jti) {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "Refresh token already used" }))).into_response();
    }

    match issue_token_pair(&state.auth_state, &claims.sub, &claims.permissions) {
        Ok(pair) => (StatusCode::OK, Json(pair)).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "error": "Failed to generate tokens",
                "details": e.to_string()
            })),
        )
            .into_response(),
    }
}

/// POST /api/auth/logout
pub async fn logout_handler(
    State(state): State<ServerState>,
    ApiJson(req): ApiJson<LogoutRequest>,
) -> impl IntoResponse {
    match state.auth_state.validate_token(&req.token) {
        Ok(claims) => {
            state.auth_state.revoke_token(&claims.jti);
            (StatusCode::OK, Json(json!({ "status": "logged_out" }))).into_response()
        }
        Err(_) => (StatusCode::UNAUTHORIZED, Json(json!({ "error": "Invalid token" }))).into_response(),
    }
}

/// GET /api/status
pub async fn status_handler() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok".to_string(),
        version: crate::VERSION.to_string(),
    })
}
