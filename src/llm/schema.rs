//! Structured-output parsing for model replies.
//!
//! A reply conforms to the question schema when, after fence stripping, it is
//! a JSON object with a `questions` array whose elements are objects. Field
//! level checks (four choices, one true flag) are left to
//! [`crate::question::Question::try_from`], so one bad record never sinks the
//! rest of the set.

use crate::error::ModelError;
use crate::question::{RawQuestion, RawQuestionSet};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[a-zA-Z]*\s*\n(.*?)\n?```\s*$").unwrap());

/// Remove a surrounding Markdown code fence, if any.
pub fn strip_code_fences(input: &str) -> &str {
    let trimmed = input.trim();
    match RE_OUTER_FENCES.captures(trimmed).and_then(|c| c.get(1)) {
        Some(body) => body.as_str().trim(),
        None => trimmed,
    }
}

/// Parse a question-set reply.
///
/// Accepts `{"questions": [...]}`, the legacy `{"test": {"questions": [...]}}`
/// wrapper, and a bare array. Leading or trailing prose around the JSON
/// object is tolerated.
pub fn parse_question_set(reply: &str) -> Result<RawQuestionSet, ModelError> {
    let body = strip_code_fences(reply);
    let value = parse_json_lenient(body)?;

    let questions = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => {
            let inner = match map.remove("test") {
                Some(Value::Object(mut test)) => test.remove("questions"),
                _ => map.remove("questions"),
            };
            match inner {
                Some(Value::Array(items)) => items,
                Some(_) => return Err(ModelError::Schema("`questions` is not an array".into())),
                None => return Err(ModelError::Schema("missing `questions` array".into())),
            }
        }
        _ => return Err(ModelError::Schema("reply is not a JSON object".into())),
    };

    let questions = questions
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            if !item.is_object() {
                return Err(ModelError::Schema(format!("question {i} is not an object")));
            }
            serde_json::from_value::<RawQuestion>(item)
                .map_err(|e| ModelError::Schema(format!("question {i}: {e}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RawQuestionSet { questions })
}

fn parse_json_lenient(body: &str) -> Result<Value, ModelError> {
    if let Ok(v) = serde_json::from_str::<Value>(body) {
        return Ok(v);
    }
    let start = body.find('{');
    let end = body.rfind('}');
    match (start, end) {
        (Some(s), Some(e)) if s < e => serde_json::from_str::<Value>(&body[s..=e])
            .map_err(|err| ModelError::Schema(format!("invalid JSON: {err}"))),
        _ => Err(ModelError::Schema("no JSON object in reply".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE: &str = r#"{"questions":[{"question":"Q?","choices":["a","b","c","d"],"correctness":[true,false,false,false],"explanation":"e"}]}"#;

    #[test]
    fn plain_object() {
        assert_eq!(parse_question_set(ONE).unwrap().questions.len(), 1);
    }

    #[test]
    fn fenced_object() {
        let fenced = format!("```json\n{ONE}\n```");
        assert_eq!(parse_question_set(&fenced).unwrap().questions.len(), 1);
    }

    #[test]
    fn legacy_wrapper_and_prose() {
        let wrapped = format!("Here you go:\n{{\"test\": {ONE}}}\nThanks");
        assert_eq!(parse_question_set(&wrapped).unwrap().questions.len(), 1);
    }

    #[test]
    fn empty_questions_array_is_valid() {
        assert!(parse_question_set(r#"{"questions": []}"#)
            .unwrap()
            .questions
            .is_empty());
    }

    #[test]
    fn non_conforming_replies_are_schema_errors() {
        for reply in [
            "no json here",
            r#"{"items": []}"#,
            r#"{"questions": "none"}"#,
            r#"{"questions": [1, 2]}"#,
        ] {
            assert!(
                matches!(parse_question_set(reply), Err(ModelError::Schema(_))),
                "accepted: {reply}"
            );
        }
    }

    #[test]
    fn malformed_record_still_parses_at_schema_level() {
        let reply = r#"{"questions":[{"question":"Q?","choices":["a"],"correctness":[true]}]}"#;
        let set = parse_question_set(reply).unwrap();
        assert_eq!(set.questions[0].choices.len(), 1);
    }
}
