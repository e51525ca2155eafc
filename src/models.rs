use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

pub const OPTION_COUNT: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("option index must be between 1 and 4, got {0}")]
pub struct InvalidOptionIndex(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct OptionIndex(u8);

impl OptionIndex {
    pub fn new(value: i64) -> Option<Self> {
        if (1..=OPTION_COUNT as i64).contains(&value) {
            Some(Self(value as u8))
        } else {
            None
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn slot(self) -> usize {
        usize::from(self.0) - 1
    }

    pub fn all() -> impl Iterator<Item = OptionIndex> {
        (1..=OPTION_COUNT as u8).map(OptionIndex)
    }
}

impl TryFrom<i64> for OptionIndex {
    type Error = InvalidOptionIndex;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(InvalidOptionIndex(value))
    }
}

impl From<OptionIndex> for i64 {
    fn from(value: OptionIndex) -> Self {
        i64::from(value.0)
    }
}

impl fmt::Display for OptionIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "index", rename_all = "lowercase")]
pub enum AnswerKey {
    Known(OptionIndex),
    Unscoreable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "index", rename_all = "lowercase")]
pub enum Selection {
    Answered(OptionIndex),
    Unanswered,
}

impl Selection {
    pub fn is_answered(&self) -> bool {
        matches!(self, Selection::Answered(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizItem {
    pub text: String,
    pub options: [String; OPTION_COUNT],
    pub correct: AnswerKey,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizSet {
    pub topic: String,
    pub items: Vec<QuizItem>,
}

impl QuizSet {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn answer_keys(&self) -> Vec<AnswerKey> {
        self.items.iter().map(|item| item.correct).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LearnerResponse {
    selections: BTreeMap<usize, Option<String>>,
}

impl LearnerResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, index: usize, selected: Option<String>) {
        self.selections.insert(index, selected);
    }

    pub fn selected(&self, index: usize) -> Option<&str> {
        self.selections.get(&index).and_then(|s| s.as_deref())
    }

    pub fn last_position(&self) -> Option<usize> {
        self.selections.keys().next_back().copied()
    }

    pub fn recorded_count(&self) -> usize {
        self.selections.values().filter(|s| s.is_some()).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn label(self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptResult {
    pub score: f64,
    pub answered_count: usize,
    pub correct_count: usize,
    pub total_questions: usize,
    pub elapsed_seconds: f64,
    pub difficulty: Difficulty,
}
