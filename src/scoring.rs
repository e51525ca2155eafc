use crate::matcher::resolve_selection;
use crate::models::{AnswerKey, AttemptResult, Difficulty, LearnerResponse, QuizSet, Selection};
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScoringError {
    #[error("quiz has no questions, a score cannot be computed")]
    EmptyQuizSet,
    #[error("expected {expected} selections, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("question {index} is out of range, quiz has {total} questions")]
    QuestionOutOfRange { index: usize, total: usize },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tally {
    pub correct_count: usize,
    pub answered_count: usize,
    pub total_questions: usize,
    pub score: f64,
}

pub fn tally(selections: &[Selection], keys: &[AnswerKey]) -> Result<Tally, ScoringError> {
    if keys.is_empty() {
        return Err(ScoringError::EmptyQuizSet);
    }
    if selections.len() != keys.len() {
        return Err(ScoringError::LengthMismatch {
            expected: keys.len(),
            actual: selections.len(),
        });
    }

    let correct_count = selections
        .iter()
        .zip(keys)
        .filter(|pair| matches!(pair, (Selection::Answered(a), AnswerKey::Known(c)) if a == c))
        .count();
    let answered_count = selections.iter().filter(|s| s.is_answered()).count();
    let total_questions = keys.len();

    Ok(Tally {
        correct_count,
        answered_count,
        total_questions,
        score: correct_count as f64 / total_questions as f64 * 100.0,
    })
}

/// Bands: below 40 is Easy, below 70 is Medium, anything else is Hard.
pub fn classify_difficulty(score: f64) -> Difficulty {
    if score < 40.0 {
        Difficulty::Easy
    } else if score < 70.0 {
        Difficulty::Medium
    } else {
        Difficulty::Hard
    }
}

pub fn elapsed_seconds(started_at: DateTime<Utc>, submitted_at: DateTime<Utc>) -> f64 {
    let millis = (submitted_at - started_at).num_milliseconds().max(0);
    (millis as f64 / 10.0).round() / 100.0
}

pub fn resolve_selections(quiz: &QuizSet, response: &LearnerResponse) -> Vec<Selection> {
    quiz.items
        .iter()
        .enumerate()
        .map(|(idx, item)| resolve_selection(response.selected(idx), &item.options))
        .collect()
}

pub fn evaluate_attempt(
    quiz: &QuizSet,
    response: &LearnerResponse,
    started_at: DateTime<Utc>,
    submitted_at: DateTime<Utc>,
) -> Result<AttemptResult, ScoringError> {
    if quiz.is_empty() {
        return Err(ScoringError::EmptyQuizSet);
    }
    if let Some(index) = response.last_position().filter(|i| *i >= quiz.len()) {
        return Err(ScoringError::QuestionOutOfRange {
            index,
            total: quiz.len(),
        });
    }
    let selections = resolve_selections(quiz, response);
    let tally = tally(&selections, &quiz.answer_keys())?;
    Ok(AttemptResult {
        score: tally.score,
        answered_count: tally.answered_count,
        correct_count: tally.correct_count,
        total_questions: tally.total_questions,
        elapsed_seconds: elapsed_seconds(started_at, submitted_at),
        difficulty: classify_difficulty(tally.score),
    })
}
