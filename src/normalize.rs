use crate::config::QuizConfig;
use crate::matcher::{resolve_answer_key, value_text};
use crate::models::{AnswerKey, QuizItem, QuizSet, OPTION_COUNT};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;
use serde_json::{Map, Value};

pub type RawRow = Map<String, Value>;

const QUESTION_ALIASES: &[&str] = &["Question", "question"];

const OPTION_ALIASES: [&[&str]; OPTION_COUNT] = [
    &["option_1", "Option1"],
    &["option_2", "Option2"],
    &["option_3", "Option3"],
    &["option_4", "Option4"],
];

const CORRECT_MARKER: &str = "correct";

fn present_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        other => Some(value_text(other)),
    }
}

fn first_present(row: &RawRow, aliases: &[&str]) -> Option<String> {
    aliases
        .iter()
        .find_map(|alias| row.get(*alias).and_then(present_text))
}

pub fn detect_correct_column(rows: &[RawRow]) -> Option<&str> {
    rows.iter()
        .flat_map(|row| row.keys())
        .find(|name| name.to_lowercase().contains(CORRECT_MARKER))
        .map(String::as_str)
}

pub fn extract_options(row: &RawRow) -> [String; OPTION_COUNT] {
    OPTION_ALIASES.map(|aliases| first_present(row, aliases).unwrap_or_default())
}

pub fn normalize_row(row: &RawRow, number: usize, correct_column: Option<&str>) -> QuizItem {
    let text = first_present(row, QUESTION_ALIASES).unwrap_or_else(|| format!("Question {number}"));
    let options = extract_options(row);
    let correct = match correct_column {
        Some(column) => resolve_answer_key(row.get(column), &options),
        None => AnswerKey::Unscoreable,
    };
    QuizItem {
        text,
        options,
        correct,
    }
}

pub fn sample_positions(pool_size: usize, config: &QuizConfig) -> Vec<usize> {
    if pool_size <= config.max_questions {
        return (0..pool_size).collect();
    }
    let mut rng = StdRng::seed_from_u64(config.sample_seed);
    index::sample(&mut rng, pool_size, config.max_questions).into_vec()
}

pub fn build_quiz_set(topic: &str, rows: &[RawRow], config: &QuizConfig) -> QuizSet {
    let correct_column = detect_correct_column(rows);
    let items = sample_positions(rows.len(), config)
        .into_iter()
        .enumerate()
        .map(|(position, row_idx)| normalize_row(&rows[row_idx], position + 1, correct_column))
        .collect();
    QuizSet {
        topic: topic.trim().to_string(),
        items,
    }
}
