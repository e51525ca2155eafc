use crate::config::{AppConfig, AttemptConfig};
use crate::models::{AttemptResult, LearnerResponse, QuizSet};
use crate::recommend::{recommend, PredictionService, Recommendation, FIRST_ATTEMPT};
use crate::scoring::{evaluate_attempt, ScoringError};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AttemptError {
    #[error("attempt {0} not found")]
    NotFound(i64),
    #[error("attempt {0} has not been started")]
    NotStarted(i64),
    #[error("attempt {0} was already submitted")]
    AlreadySubmitted(i64),
    #[error("question {index} is out of range, quiz has {total} questions")]
    QuestionOutOfRange { index: usize, total: usize },
    #[error(transparent)]
    Scoring(#[from] ScoringError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptStatus {
    Created,
    Started,
    Submitted,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub submitted_at: DateTime<Utc>,
    pub result: AttemptResult,
    pub recommendation: Recommendation,
}

#[derive(Debug, Clone)]
pub struct AttemptRecord {
    pub id: i64,
    pub quiz: QuizSet,
    pub response: LearnerResponse,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub submission: Option<Submission>,
}

impl AttemptRecord {
    pub fn status(&self) -> AttemptStatus {
        match (&self.started_at, &self.submission) {
            (_, Some(_)) => AttemptStatus::Submitted,
            (Some(_), None) => AttemptStatus::Started,
            (None, None) => AttemptStatus::Created,
        }
    }
}

pub struct AttemptRegistry {
    attempts: RwLock<HashMap<i64, AttemptRecord>>,
    next_attempt_id: AtomicI64,
    limits: AttemptConfig,
}

impl Default for AttemptRegistry {
    fn default() -> Self {
        Self::new(AttemptConfig::default())
    }
}

fn drop_expired(attempts: &mut HashMap<i64, AttemptRecord>, cutoff: DateTime<Utc>) -> usize {
    let before = attempts.len();
    attempts.retain(|_, record| record.created_at > cutoff);
    before - attempts.len()
}

// Oldest submitted attempt first, then the oldest open one.
fn eviction_candidate(attempts: &HashMap<i64, AttemptRecord>) -> Option<i64> {
    attempts
        .values()
        .min_by_key(|record| (record.submission.is_none(), record.created_at, record.id))
        .map(|record| record.id)
}

impl AttemptRegistry {
    pub fn new(limits: AttemptConfig) -> Self {
        Self {
            attempts: RwLock::new(HashMap::new()),
            next_attempt_id: AtomicI64::new(1),
            limits,
        }
    }

    fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::seconds(self.limits.retention_secs)
    }

    pub async fn create(&self, quiz: QuizSet, now: DateTime<Utc>) -> Result<i64, AttemptError> {
        if quiz.is_empty() {
            return Err(ScoringError::EmptyQuizSet.into());
        }
        let mut attempts = self.attempts.write().await;
        let mut evicted = drop_expired(&mut attempts, self.cutoff(now));
        while attempts.len() >= self.limits.max_live {
            match eviction_candidate(&attempts) {
                Some(victim) => {
                    attempts.remove(&victim);
                    evicted += 1;
                }
                None => break,
            }
        }
        if evicted > 0 {
            debug!(evicted, live = attempts.len(), "attempts evicted");
        }

        let id = self.next_attempt_id.fetch_add(1, Ordering::SeqCst);
        let record = AttemptRecord {
            id,
            quiz,
            response: LearnerResponse::new(),
            created_at: now,
            started_at: None,
            submission: None,
        };
        attempts.insert(id, record);
        Ok(id)
    }

    pub async fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut attempts = self.attempts.write().await;
        drop_expired(&mut attempts, self.cutoff(now))
    }

    pub async fn len(&self) -> usize {
        self.attempts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.attempts.read().await.is_empty()
    }

    pub async fn get(&self, id: i64) -> Option<AttemptRecord> {
        self.attempts.read().await.get(&id).cloned()
    }

    pub async fn start(&self, id: i64, now: DateTime<Utc>) -> Result<DateTime<Utc>, AttemptError> {
        let mut attempts = self.attempts.write().await;
        let record = attempts.get_mut(&id).ok_or(AttemptError::NotFound(id))?;
        if record.submission.is_some() {
            return Err(AttemptError::AlreadySubmitted(id));
        }
        record.started_at = Some(now);
        Ok(now)
    }

    pub async fn record_selection(
        &self,
        id: i64,
        index: usize,
        selected: Option<String>,
    ) -> Result<(), AttemptError> {
        let mut attempts = self.attempts.write().await;
        let record = attempts.get_mut(&id).ok_or(AttemptError::NotFound(id))?;
        if record.submission.is_some() {
            return Err(AttemptError::AlreadySubmitted(id));
        }
        let total = record.quiz.len();
        if index >= total {
            return Err(AttemptError::QuestionOutOfRange { index, total });
        }
        record.response.set(index, selected);
        Ok(())
    }

    pub async fn submit(
        &self,
        id: i64,
        now: DateTime<Utc>,
        predictor: &dyn PredictionService,
    ) -> Result<Submission, AttemptError> {
        let mut attempts = self.attempts.write().await;
        let record = attempts.get_mut(&id).ok_or(AttemptError::NotFound(id))?;
        if record.submission.is_some() {
            return Err(AttemptError::AlreadySubmitted(id));
        }
        let started_at = record.started_at.ok_or(AttemptError::NotStarted(id))?;

        let result = evaluate_attempt(&record.quiz, &record.response, started_at, now)?;
        let recommendation = recommend(predictor, &result, FIRST_ATTEMPT);
        info!(
            attempt_id = id,
            topic = %record.quiz.topic,
            score = result.score,
            difficulty = %result.difficulty,
            "attempt submitted"
        );

        let submission = Submission {
            submitted_at: now,
            result,
            recommendation,
        };
        record.submission = Some(submission.clone());
        Ok(submission)
    }
}

#[derive(Clone)]
pub struct AppState {
    pub attempts: Arc<AttemptRegistry>,
    pub predictor: Arc<dyn PredictionService>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(predictor: Arc<dyn PredictionService>, config: AppConfig) -> Self {
        Self {
            attempts: Arc::new(AttemptRegistry::new(config.attempts)),
            predictor,
            config: Arc::new(config),
        }
    }
}
