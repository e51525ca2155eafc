use crate::models::{AnswerKey, OptionIndex, Selection, OPTION_COUNT};
use serde_json::Value;

pub fn normalize_text(text: &str) -> String {
    text.trim().to_lowercase()
}

pub fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn numeric_index(value: &Value) -> Option<OptionIndex> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !number.is_finite() {
        return None;
    }
    OptionIndex::new(number.trunc() as i64)
}

pub fn text_index(raw: &str, options: &[String; OPTION_COUNT]) -> Option<OptionIndex> {
    let wanted = normalize_text(raw);
    OptionIndex::all().find(|idx| normalize_text(&options[idx.slot()]) == wanted)
}

pub fn match_answer(raw: &Value, options: &[String; OPTION_COUNT]) -> Option<OptionIndex> {
    numeric_index(raw).or_else(|| text_index(&value_text(raw), options))
}

pub fn resolve_selection(raw: Option<&str>, options: &[String; OPTION_COUNT]) -> Selection {
    let Some(raw) = raw else {
        return Selection::Unanswered;
    };
    match match_answer(&Value::String(raw.to_string()), options) {
        Some(idx) => Selection::Answered(idx),
        None => Selection::Unanswered,
    }
}

pub fn resolve_answer_key(cell: Option<&Value>, options: &[String; OPTION_COUNT]) -> AnswerKey {
    let Some(cell) = cell else {
        return AnswerKey::Unscoreable;
    };
    let blank = match cell {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    };
    if blank {
        return AnswerKey::Unscoreable;
    }
    match match_answer(cell, options) {
        Some(idx) => AnswerKey::Known(idx),
        None => AnswerKey::Unscoreable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn opts(values: [&str; 4]) -> [String; 4] {
        values.map(String::from)
    }

    fn idx(v: i64) -> OptionIndex {
        OptionIndex::new(v).unwrap()
    }

    #[test]
    fn numeric_text_takes_priority_over_option_text() {
        let options = opts(["1", "B", "C", "D"]);
        assert_eq!(match_answer(&json!("2"), &options), Some(idx(2)));
        assert_eq!(match_answer(&json!("1"), &options), Some(idx(1)));
    }

    #[test]
    fn out_of_range_number_falls_back_to_text() {
        let options = opts(["10", "20", "30", "40"]);
        assert_eq!(match_answer(&json!("30"), &options), Some(idx(3)));
        assert_eq!(match_answer(&json!(40), &options), Some(idx(4)));
        assert_eq!(match_answer(&json!("50"), &options), None);
    }

    #[test]
    fn numeric_values_truncate() {
        let options = opts(["a", "b", "c", "d"]);
        assert_eq!(match_answer(&json!(3.0), &options), Some(idx(3)));
        assert_eq!(match_answer(&json!("4.9"), &options), Some(idx(4)));
        assert_eq!(match_answer(&json!(" 2 "), &options), Some(idx(2)));
        assert_eq!(match_answer(&json!(0.5), &options), None);
        assert_eq!(match_answer(&json!("inf"), &options), None);
    }

    #[test]
    fn case_and_whitespace_tolerant() {
        let options = opts(["London", "Berlin", "paris", "Rome"]);
        assert_eq!(match_answer(&json!("  Paris "), &options), Some(idx(3)));
        assert_eq!(text_index("ROME", &options), Some(idx(4)));
    }

    #[test]
    fn first_matching_option_wins() {
        let options = opts(["Same", "same", "other", "SAME "]);
        assert_eq!(text_index("same", &options), Some(idx(1)));
    }

    #[test]
    fn matching_is_repeatable() {
        let options = opts(["Volt", "Ampere", "Ohm", "Watt"]);
        let first = match_answer(&json!(" ohm"), &options);
        for _ in 0..5 {
            assert_eq!(match_answer(&json!(" ohm"), &options), first);
        }
        assert_eq!(first, Some(idx(3)));
    }

    #[test]
    fn selection_resolution() {
        let options = opts(["Volt", "Ampere", "Ohm", "Watt"]);
        assert_eq!(resolve_selection(None, &options), Selection::Unanswered);
        assert_eq!(resolve_selection(Some("Newton"), &options), Selection::Unanswered);
        assert_eq!(resolve_selection(Some("watt"), &options), Selection::Answered(idx(4)));
    }

    #[test]
    fn answer_key_resolution() {
        let options = opts(["Volt", "Ampere", "Ohm", "Watt"]);
        assert_eq!(resolve_answer_key(None, &options), AnswerKey::Unscoreable);
        assert_eq!(resolve_answer_key(Some(&Value::Null), &options), AnswerKey::Unscoreable);
        assert_eq!(resolve_answer_key(Some(&json!("  ")), &options), AnswerKey::Unscoreable);
        assert_eq!(resolve_answer_key(Some(&json!(2)), &options), AnswerKey::Known(idx(2)));
        assert_eq!(resolve_answer_key(Some(&json!("ohm")), &options), AnswerKey::Known(idx(3)));
        assert_eq!(resolve_answer_key(Some(&json!("Tesla")), &options), AnswerKey::Unscoreable);
    }
}
