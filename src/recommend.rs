use crate::models::AttemptResult;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub const FEATURE_DIFFICULTY: &str = "diff_enc";
pub const FEATURE_SCORE: &str = "score";
pub const FEATURE_ATTEMPT: &str = "quiz_attempt";
pub const FEATURE_ELAPSED: &str = "time_taken";

pub const CANONICAL_FEATURE_ORDER: [&str; 4] =
    [FEATURE_DIFFICULTY, FEATURE_SCORE, FEATURE_ATTEMPT, FEATURE_ELAPSED];

pub const FIRST_ATTEMPT: u32 = 1;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredictionError {
    #[error("label {label:?} is not known to the encoder")]
    UnknownLabel { label: String },
    #[error("code {code} is outside the label space")]
    UnknownCode { code: i64 },
    #[error("feature mismatch: {0}")]
    FeatureMismatch(String),
    #[error("prediction service unavailable: {0}")]
    Unavailable(String),
}

pub trait PredictionService: Send + Sync {
    fn feature_names(&self) -> &[String];

    fn encode_difficulty(&self, label: &str) -> Result<i64, PredictionError>;

    fn predict(&self, row: &[f64]) -> Result<i64, PredictionError>;

    fn decode_topic(&self, code: i64) -> Result<String, PredictionError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationFeatures {
    pub difficulty_code: i64,
    pub score: f64,
    pub attempt_number: u32,
    pub elapsed_seconds: f64,
}

impl RecommendationFeatures {
    pub fn new(result: &AttemptResult, difficulty_code: i64, attempt_number: u32) -> Self {
        Self {
            difficulty_code,
            score: result.score,
            attempt_number,
            elapsed_seconds: result.elapsed_seconds,
        }
    }

    pub fn value_of(&self, name: &str) -> Option<f64> {
        match name {
            FEATURE_DIFFICULTY => Some(self.difficulty_code as f64),
            FEATURE_SCORE => Some(self.score),
            FEATURE_ATTEMPT => Some(f64::from(self.attempt_number)),
            FEATURE_ELAPSED => Some(self.elapsed_seconds),
            _ => None,
        }
    }

    pub fn arrange(&self, order: &[String]) -> Result<Vec<f64>, PredictionError> {
        let mut row = Vec::with_capacity(order.len());
        for (pos, name) in order.iter().enumerate() {
            if order[..pos].contains(name) {
                return Err(PredictionError::FeatureMismatch(format!("duplicate feature {name:?}")));
            }
            let value = self
                .value_of(name)
                .ok_or_else(|| PredictionError::FeatureMismatch(format!("unexpected feature {name:?}")))?;
            row.push(value);
        }
        if let Some(missing) = CANONICAL_FEATURE_ORDER
            .iter()
            .find(|name| !order.iter().any(|o| o == *name))
        {
            return Err(PredictionError::FeatureMismatch(format!("missing feature {missing:?}")));
        }
        Ok(row)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageTone {
    NeedsPractice,
    SteadyProgress,
    StrongPerformance,
    Mastery,
}

impl MessageTone {
    /// Cut points here are 40/60/80 and do not line up with the difficulty bands.
    pub fn for_score(score: f64) -> Self {
        if score < 40.0 {
            MessageTone::NeedsPractice
        } else if score <= 60.0 {
            MessageTone::SteadyProgress
        } else if score <= 80.0 {
            MessageTone::StrongPerformance
        } else {
            MessageTone::Mastery
        }
    }

    pub fn message(self, topic: &str) -> String {
        match self {
            MessageTone::NeedsPractice => {
                format!("😐 You need more practice. Let's go back to an easier topic: {topic}.")
            }
            MessageTone::SteadyProgress => {
                format!("🙂 You're doing okay. Let's try another medium topic: {topic}.")
            }
            MessageTone::StrongPerformance => {
                format!("🔥 Great job! You're ready for a harder topic: {topic}.")
            }
            MessageTone::Mastery => {
                format!("🎉 Well done! You're ready for a mixed questions practice: {topic}.")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Recommendation {
    Ready {
        topic: String,
        message: String,
        tone: MessageTone,
    },
    Unavailable {
        notice: String,
    },
}

impl Recommendation {
    pub fn topic(&self) -> Option<&str> {
        match self {
            Recommendation::Ready { topic, .. } => Some(topic),
            Recommendation::Unavailable { .. } => None,
        }
    }
}

pub fn build_features(
    service: &dyn PredictionService,
    result: &AttemptResult,
    attempt_number: u32,
) -> Result<RecommendationFeatures, PredictionError> {
    let difficulty_code = service.encode_difficulty(result.difficulty.label())?;
    Ok(RecommendationFeatures::new(result, difficulty_code, attempt_number))
}

pub fn predict_next_topic(
    service: &dyn PredictionService,
    result: &AttemptResult,
    attempt_number: u32,
) -> Result<String, PredictionError> {
    let features = build_features(service, result, attempt_number)?;
    let row = features.arrange(service.feature_names())?;
    let code = service.predict(&row)?;
    debug!(?features, code, "next topic predicted");
    service.decode_topic(code)
}

pub fn recommend(
    service: &dyn PredictionService,
    result: &AttemptResult,
    attempt_number: u32,
) -> Recommendation {
    match predict_next_topic(service, result, attempt_number) {
        Ok(topic) => {
            let tone = MessageTone::for_score(result.score);
            Recommendation::Ready {
                message: tone.message(&topic),
                topic,
                tone,
            }
        }
        Err(err) => {
            warn!("recommendation failed: {}", err);
            Recommendation::Unavailable {
                notice: format!("Recommendation unavailable: {err}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StubPredictionService;
    use crate::models::Difficulty;

    fn result(score: f64, difficulty: Difficulty) -> AttemptResult {
        AttemptResult {
            score,
            answered_count: 10,
            correct_count: (score / 10.0) as usize,
            total_questions: 10,
            elapsed_seconds: 42.5,
            difficulty,
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    struct Recording {
        order: Vec<String>,
        seen: std::sync::Mutex<Vec<Vec<f64>>>,
    }

    impl PredictionService for Recording {
        fn feature_names(&self) -> &[String] {
            &self.order
        }
        fn encode_difficulty(&self, label: &str) -> Result<i64, PredictionError> {
            match label {
                "Easy" => Ok(0),
                "Hard" => Ok(1),
                "Medium" => Ok(2),
                other => Err(PredictionError::UnknownLabel { label: other.into() }),
            }
        }
        fn predict(&self, row: &[f64]) -> Result<i64, PredictionError> {
            self.seen.lock().unwrap().push(row.to_vec());
            Ok(0)
        }
        fn decode_topic(&self, code: i64) -> Result<String, PredictionError> {
            match code {
                0 => Ok("Thermodynamics".into()),
                _ => Err(PredictionError::UnknownCode { code }),
            }
        }
    }

    struct Broken(Vec<String>);

    impl PredictionService for Broken {
        fn feature_names(&self) -> &[String] {
            &self.0
        }
        fn encode_difficulty(&self, _label: &str) -> Result<i64, PredictionError> {
            Err(PredictionError::Unavailable("model not loaded".into()))
        }
        fn predict(&self, _row: &[f64]) -> Result<i64, PredictionError> {
            unreachable!()
        }
        fn decode_topic(&self, _code: i64) -> Result<String, PredictionError> {
            unreachable!()
        }
    }

    #[test]
    fn features_follow_service_order() {
        let service = Recording {
            order: names(&["time_taken", "quiz_attempt", "diff_enc", "score"]),
            seen: Default::default(),
        };
        let rec = recommend(&service, &result(55.0, Difficulty::Medium), FIRST_ATTEMPT);
        assert_eq!(rec.topic(), Some("Thermodynamics"));
        assert_eq!(service.seen.lock().unwrap()[0], vec![42.5, 1.0, 2.0, 55.0]);
    }

    #[test]
    fn arrange_rejects_unknown_missing_and_duplicate() {
        let f = RecommendationFeatures::new(&result(10.0, Difficulty::Easy), 0, 1);
        assert!(f.arrange(&names(&CANONICAL_FEATURE_ORDER)).is_ok());
        assert!(matches!(
            f.arrange(&names(&["diff_enc", "score", "quiz_attempt", "time_taken", "grade"])),
            Err(PredictionError::FeatureMismatch(_))
        ));
        assert!(matches!(
            f.arrange(&names(&["diff_enc", "score", "quiz_attempt"])),
            Err(PredictionError::FeatureMismatch(_))
        ));
        assert!(matches!(
            f.arrange(&names(&["diff_enc", "score", "score", "time_taken"])),
            Err(PredictionError::FeatureMismatch(_))
        ));
    }

    #[test]
    fn message_bands() {
        assert_eq!(MessageTone::for_score(39.99), MessageTone::NeedsPractice);
        assert_eq!(MessageTone::for_score(40.0), MessageTone::SteadyProgress);
        assert_eq!(MessageTone::for_score(60.0), MessageTone::SteadyProgress);
        assert_eq!(MessageTone::for_score(60.01), MessageTone::StrongPerformance);
        assert_eq!(MessageTone::for_score(80.0), MessageTone::StrongPerformance);
        assert_eq!(MessageTone::for_score(80.01), MessageTone::Mastery);
    }

    #[test]
    fn message_mentions_topic() {
        let service = StubPredictionService::default();
        let rec = recommend(&service, &result(90.0, Difficulty::Hard), FIRST_ATTEMPT);
        match rec {
            Recommendation::Ready { topic, message, tone } => {
                assert_eq!(tone, MessageTone::Mastery);
                assert!(message.contains(&topic));
                assert!(message.contains("mixed questions practice"));
            }
            other => panic!("expected a recommendation, got {other:?}"),
        }
    }

    #[test]
    fn service_failure_becomes_notice() {
        let rec = recommend(&Broken(Vec::new()), &result(50.0, Difficulty::Medium), FIRST_ATTEMPT);
        match rec {
            Recommendation::Unavailable { notice } => {
                assert!(notice.starts_with("Recommendation unavailable"));
                assert!(notice.contains("model not loaded"));
            }
            other => panic!("expected unavailable, got {other:?}"),
        }
    }

    #[test]
    fn unknown_topic_code_becomes_notice() {
        struct OffByOne(StubPredictionService);
        impl PredictionService for OffByOne {
            fn feature_names(&self) -> &[String] {
                self.0.feature_names()
            }
            fn encode_difficulty(&self, label: &str) -> Result<i64, PredictionError> {
                self.0.encode_difficulty(label)
            }
            fn predict(&self, _row: &[f64]) -> Result<i64, PredictionError> {
                Ok(999)
            }
            fn decode_topic(&self, code: i64) -> Result<String, PredictionError> {
                self.0.decode_topic(code)
            }
        }
        let rec = recommend(
            &OffByOne(StubPredictionService::default()),
            &result(20.0, Difficulty::Easy),
            FIRST_ATTEMPT,
        );
        assert!(matches!(rec, Recommendation::Unavailable { .. }));
    }
}
