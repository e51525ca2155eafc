use std::path::PathBuf;

pub const DEFAULT_MAX_QUESTIONS: usize = 30;
pub const DEFAULT_SAMPLE_SEED: u64 = 42;
pub const DEFAULT_ATTEMPT_RETENTION_SECS: i64 = 3600;
pub const DEFAULT_MAX_LIVE_ATTEMPTS: usize = 10_000;
const MAX_ATTEMPT_RETENTION_SECS: i64 = 365 * 24 * 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizConfig {
    pub max_questions: usize,
    pub sample_seed: u64,
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            max_questions: DEFAULT_MAX_QUESTIONS,
            sample_seed: DEFAULT_SAMPLE_SEED,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptConfig {
    pub retention_secs: i64,
    pub max_live: usize,
}

impl Default for AttemptConfig {
    fn default() -> Self {
        Self {
            retention_secs: DEFAULT_ATTEMPT_RETENTION_SECS,
            max_live: DEFAULT_MAX_LIVE_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub quiz: QuizConfig,
    pub attempts: AttemptConfig,
    pub model_path: Option<PathBuf>,
    pub cors_origins: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let host = var("BACKEND_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = var("BACKEND_PORT")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(8080);
        let max_questions = var("QUIZ_MAX_QUESTIONS")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_MAX_QUESTIONS);
        let sample_seed = var("QUIZ_SAMPLE_SEED")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(DEFAULT_SAMPLE_SEED);
        let retention_secs = var("ATTEMPT_RETENTION_SECS")
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|v| (1..=MAX_ATTEMPT_RETENTION_SECS).contains(v))
            .unwrap_or(DEFAULT_ATTEMPT_RETENTION_SECS);
        let max_live = var("ATTEMPT_MAX_LIVE")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_MAX_LIVE_ATTEMPTS);
        let model_path = var("MODEL_PATH").map(PathBuf::from);
        let cors_origins = var("CORS_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_else(|| vec!["http://localhost:5173".to_string()]);

        Self {
            host,
            port,
            quiz: QuizConfig {
                max_questions,
                sample_seed,
            },
            attempts: AttemptConfig {
                retention_secs,
                max_live,
            },
            model_path,
            cors_origins,
        }
    }
}
