use crate::error::AppError;
use crate::models::{AttemptResult, LearnerResponse, QuizSet};
use crate::normalize::{build_quiz_set, RawRow};
use crate::recommend::{recommend, Recommendation, FIRST_ATTEMPT};
use crate::scoring::{evaluate_attempt, ScoringError};
use crate::state::{AppState, AttemptError, AttemptRecord, AttemptStatus, Submission};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::{Validate, ValidationError};

fn request_id_from_headers(headers: &HeaderMap) -> String {
    headers
        .get("x-request-id")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

fn scoring_error(err: &ScoringError, req_id: String) -> AppError {
    match err {
        ScoringError::EmptyQuizSet => {
            AppError::new(StatusCode::UNPROCESSABLE_ENTITY, "EMPTY_QUIZ_SET", err.to_string(), req_id)
        }
        ScoringError::LengthMismatch { .. } | ScoringError::QuestionOutOfRange { .. } => {
            AppError::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", err.to_string(), req_id)
        }
    }
}

fn attempt_error(err: AttemptError, req_id: String) -> AppError {
    match &err {
        AttemptError::NotFound(_) => AppError::new(StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string(), req_id),
        AttemptError::NotStarted(_) => AppError::new(
            StatusCode::CONFLICT,
            "ATTEMPT_NOT_STARTED",
            "Please start the quiz first",
            req_id,
        ),
        AttemptError::AlreadySubmitted(_) => {
            AppError::new(StatusCode::CONFLICT, "ALREADY_SUBMITTED", err.to_string(), req_id)
        }
        AttemptError::QuestionOutOfRange { .. } => {
            AppError::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", err.to_string(), req_id)
        }
        AttemptError::Scoring(inner) => scoring_error(inner, req_id),
    }
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank").with_message("must not be blank".into()));
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
pub struct QuizRowsPayload {
    #[validate(
        length(min = 1, max = 200, message = "must be 1-200 characters"),
        custom(function = "not_blank")
    )]
    pub topic: String,
    #[validate(length(max = 5000, message = "too many rows"))]
    pub rows: Vec<RawRow>,
}

pub async fn normalize_quiz(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<QuizRowsPayload>,
) -> Result<Json<QuizSet>, AppError> {
    let req_id = request_id_from_headers(&headers);
    payload
        .validate()
        .map_err(|e| AppError::validation(&e, req_id))?;
    Ok(Json(build_quiz_set(&payload.topic, &payload.rows, &state.config.quiz)))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub index: usize,
    pub text: String,
    pub options: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptCreated {
    pub attempt_id: i64,
    pub topic: String,
    pub total_questions: usize,
    pub questions: Vec<QuestionView>,
}

pub async fn create_attempt(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<QuizRowsPayload>,
) -> Result<(StatusCode, Json<AttemptCreated>), AppError> {
    let req_id = request_id_from_headers(&headers);
    payload
        .validate()
        .map_err(|e| AppError::validation(&e, req_id.clone()))?;

    let quiz = build_quiz_set(&payload.topic, &payload.rows, &state.config.quiz);
    let questions = quiz
        .items
        .iter()
        .enumerate()
        .map(|(index, item)| QuestionView {
            index,
            text: item.text.clone(),
            options: item.options.to_vec(),
        })
        .collect();
    let topic = quiz.topic.clone();
    let total_questions = quiz.len();

    let attempt_id = state
        .attempts
        .create(quiz, Utc::now())
        .await
        .map_err(|e| attempt_error(e, req_id))?;
    info!(attempt_id, topic = %topic, total_questions, source_rows = payload.rows.len(), "attempt created");

    Ok((
        StatusCode::CREATED,
        Json(AttemptCreated {
            attempt_id,
            topic,
            total_questions,
            questions,
        }),
    ))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptView {
    pub attempt_id: i64,
    pub topic: String,
    pub status: AttemptStatus,
    pub total_questions: usize,
    pub recorded_answers: usize,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission: Option<Submission>,
}

impl From<AttemptRecord> for AttemptView {
    fn from(record: AttemptRecord) -> Self {
        Self {
            attempt_id: record.id,
            status: record.status(),
            topic: record.quiz.topic,
            total_questions: record.quiz.items.len(),
            recorded_answers: record.response.recorded_count(),
            created_at: record.created_at,
            started_at: record.started_at,
            submission: record.submission,
        }
    }
}

pub async fn get_attempt(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<AttemptView>, AppError> {
    let req_id = request_id_from_headers(&headers);
    let record = state
        .attempts
        .get(id)
        .await
        .ok_or_else(|| attempt_error(AttemptError::NotFound(id), req_id))?;
    Ok(Json(record.into()))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptStarted {
    pub attempt_id: i64,
    pub started_at: DateTime<Utc>,
}

pub async fn start_attempt(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<AttemptStarted>, AppError> {
    let req_id = request_id_from_headers(&headers);
    let started_at = state
        .attempts
        .start(id, Utc::now())
        .await
        .map_err(|e| attempt_error(e, req_id))?;
    info!(attempt_id = id, "attempt started");
    Ok(Json(AttemptStarted {
        attempt_id: id,
        started_at,
    }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct SelectionPayload {
    #[validate(length(max = 2000, message = "selection is too long"))]
    pub selected: Option<String>,
}

pub async fn record_selection(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((id, index)): Path<(i64, usize)>,
    Json(payload): Json<SelectionPayload>,
) -> Result<StatusCode, AppError> {
    let req_id = request_id_from_headers(&headers);
    payload
        .validate()
        .map_err(|e| AppError::validation(&e, req_id.clone()))?;
    state
        .attempts
        .record_selection(id, index, payload.selected)
        .await
        .map_err(|e| attempt_error(e, req_id))?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionView {
    pub attempt_id: i64,
    #[serde(flatten)]
    pub submission: Submission,
}

pub async fn submit_attempt(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<SubmissionView>, AppError> {
    let req_id = request_id_from_headers(&headers);
    let submission = state
        .attempts
        .submit(id, Utc::now(), state.predictor.as_ref())
        .await
        .map_err(|e| attempt_error(e, req_id))?;
    Ok(Json(SubmissionView {
        attempt_id: id,
        submission,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScorePayload {
    pub quiz: QuizSet,
    #[serde(default)]
    pub response: LearnerResponse,
    pub started_at: DateTime<Utc>,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ScoreView {
    pub result: AttemptResult,
    pub recommendation: Recommendation,
}

pub async fn score_attempt(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<ScorePayload>,
) -> Result<Json<ScoreView>, AppError> {
    let req_id = request_id_from_headers(&headers);
    let cap = state.config.quiz.max_questions;
    if payload.quiz.len() > cap {
        return Err(AppError::new(
            StatusCode::BAD_REQUEST,
            "VALIDATION_ERROR",
            format!("quiz has {} questions, at most {} are allowed", payload.quiz.len(), cap),
            req_id,
        ));
    }

    let result = evaluate_attempt(&payload.quiz, &payload.response, payload.started_at, payload.submitted_at)
        .map_err(|e| scoring_error(&e, req_id))?;
    let recommendation = recommend(state.predictor.as_ref(), &result, FIRST_ATTEMPT);
    Ok(Json(ScoreView { result, recommendation }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_id_prefers_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-request-id", "abc-123".parse().unwrap());
        assert_eq!(request_id_from_headers(&headers), "abc-123");
        assert_eq!(request_id_from_headers(&HeaderMap::new()).len(), 36);
    }

    #[test]
    fn whitespace_topic_is_rejected() {
        let payload = QuizRowsPayload {
            topic: "   ".into(),
            rows: Vec::new(),
        };
        let errors = payload.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("topic"));

        let payload = QuizRowsPayload {
            topic: " Optics ".into(),
            rows: Vec::new(),
        };
        assert!(payload.validate().is_ok());
    }

    #[test]
    fn attempt_errors_map_to_statuses() {
        let cases = [
            (AttemptError::NotFound(1), StatusCode::NOT_FOUND, "NOT_FOUND"),
            (AttemptError::NotStarted(1), StatusCode::CONFLICT, "ATTEMPT_NOT_STARTED"),
            (AttemptError::AlreadySubmitted(1), StatusCode::CONFLICT, "ALREADY_SUBMITTED"),
            (
                AttemptError::QuestionOutOfRange { index: 3, total: 2 },
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
            ),
            (
                AttemptError::Scoring(ScoringError::QuestionOutOfRange { index: 5, total: 5 }),
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
            ),
            (
                AttemptError::Scoring(ScoringError::EmptyQuizSet),
                StatusCode::UNPROCESSABLE_ENTITY,
                "EMPTY_QUIZ_SET",
            ),
        ];
        for (err, status, code) in cases {
            let app = attempt_error(err, "r".into());
            assert_eq!(app.status, status);
            assert_eq!(app.code, code);
        }
    }
}
