use std::sync::OnceLock;

use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::api::{QuizResponse, STATUS_SUCCESS};
use crate::core::{snippet, ResponseBody};
use crate::error::ApiError;

/// Kind of a root JSON structure found inside free text.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum NodeType {
    Object,
    Array,
}

/// Byte span of a balanced JSON structure; `end` is the inclusive index of
/// the closing bracket/brace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjCoords {
    pub start: usize,
    pub end: usize,
    pub kind: NodeType,
}

impl ObjCoords {
    pub fn slice<'a>(&self, text: &'a str) -> &'a str {
        &text[self.start..=self.end]
    }
}

/// Find all outermost JSON object/array structures in the given text.
/// String literals are skipped so brackets inside them do not count.
#[instrument(target = "study_client::json", skip(text))]
pub fn find_json_structures(text: &str) -> Vec<ObjCoords> {
    let mut results = Vec::new();
    let mut stack: Vec<(usize, NodeType)> = Vec::new();
    let mut in_string = false;
    let mut escape = false;

    for (i, &b) in text.as_bytes().iter().enumerate() {
        if in_string {
            if escape {
                escape = false;
            } else if b == b'\\' {
                escape = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }

        let closing = match b {
            b'"' if !stack.is_empty() => {
                in_string = true;
                continue;
            }
            b'{' => {
                stack.push((i, NodeType::Object));
                continue;
            }
            b'[' => {
                stack.push((i, NodeType::Array));
                continue;
            }
            b'}' => NodeType::Object,
            b']' => NodeType::Array,
            _ => continue,
        };

        match stack.last() {
            Some(&(start, kind)) if kind == closing => {
                stack.pop();
                if stack.is_empty() {
                    results.push(ObjCoords { start, end: i, kind });
                }
            }
            // Unbalanced closer: drop the partial structure
            Some(_) => stack.clear(),
            None => {}
        }
    }

    debug!(target: "study_client::json", count = results.len(), "found root structures");
    results
}

fn noise_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r#"(?m)^\s*Partial Transcript Snippet:".*?"\s*,?\s*$"#).ok())
        .as_ref()
}

/// Remove whole `Partial Transcript Snippet:"..."` lines (and a trailing comma).
pub fn strip_transcript_noise(text: &str) -> String {
    match noise_pattern() {
        Some(pattern) => pattern.replace_all(text, "").into_owned(),
        None => text.to_string(),
    }
}

/// Decode a `/api/generate-quizzes` body into a [`QuizResponse`].
///
/// Structured bodies decode directly. A bare array is wrapped as a
/// successful quiz. String bodies go through [`clean_and_parse_quiz`].
pub fn decode_quiz_body(body: ResponseBody) -> Result<QuizResponse, ApiError> {
    match body {
        ResponseBody::Json(Value::String(text)) | ResponseBody::Text(text) => {
            warn!(len = text.len(), "Received quiz data as string, attempting cleaning and parsing");
            clean_and_parse_quiz(&text)
        }
        ResponseBody::Json(value @ Value::Array(_)) => quiz_from_value(value),
        ResponseBody::Json(value) => {
            let raw = value.to_string();
            serde_json::from_value(value).map_err(|e| ApiError::Decode(e, snippet(&raw, 500)))
        }
    }
}

#[instrument(target = "study_client::json", skip(text), fields(len = text.len()))]
pub fn clean_and_parse_quiz(text: &str) -> Result<QuizResponse, ApiError> {
    let cleaned = strip_transcript_noise(text);

    match serde_json::from_str::<Value>(&cleaned) {
        Ok(value) => quiz_from_value(value),
        Err(parse_error) => {
            // Last resort: the payload may be wrapped in prose
            for coords in find_json_structures(&cleaned) {
                if let Ok(value) = serde_json::from_str::<Value>(coords.slice(&cleaned)) {
                    debug!(start = coords.start, end = coords.end, "Recovered embedded quiz JSON");
                    return quiz_from_value(value);
                }
            }
            warn!(snippet = %snippet(text, 500), "Failed to clean and parse quiz JSON");
            Err(ApiError::QuizPayload(parse_error.to_string()))
        }
    }
}

fn quiz_from_value(value: Value) -> Result<QuizResponse, ApiError> {
    match value {
        Value::Array(questions) => Ok(QuizResponse {
            quiz_id: Some(format!("cleaned-{}", Utc::now().timestamp_millis())),
            status: STATUS_SUCCESS.to_string(),
            questions,
            error: None,
        }),
        Value::Object(map) if map.get("questions").map_or(false, Value::is_array) => {
            let value = Value::Object(map);
            let raw = value.to_string();
            serde_json::from_value(value).map_err(|e| ApiError::Decode(e, snippet(&raw, 500)))
        }
        _ => Err(ApiError::QuizPayload(
            "Cleaned quiz JSON is not in the expected array format.".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_find_roots_skips_brackets_in_strings() {
        let text = r#"noise {"a":"}{"} tail [1,[2]]"#;
        let roots = find_json_structures(text);
        assert_eq!(roots.len(), 2);
        assert_eq!(roots[0].slice(text), r#"{"a":"}{"}"#);
        assert_eq!(roots[1].kind, NodeType::Array);
        assert_eq!(roots[1].slice(text), "[1,[2]]");
    }

    #[test]
    fn test_strip_noise_lines() {
        let text = "[\n  Partial Transcript Snippet:\"he said [x]\",\n  {\"type\":\"MCQ\"}\n]";
        let cleaned = strip_transcript_noise(text);
        assert!(!cleaned.contains("Partial Transcript"));
        let value: Value = serde_json::from_str(&cleaned).expect("cleaned text parses");
        assert_eq!(value, json!([{"type": "MCQ"}]));
    }

    #[test]
    fn test_bare_array_is_wrapped() {
        let quiz = clean_and_parse_quiz(r#"[{"type":"True/False","question":"Sky is blue?"}]"#)
            .expect("array parses");
        assert_eq!(quiz.status, "success");
        assert_eq!(quiz.questions.len(), 1);
        assert!(quiz.quiz_id.as_deref().unwrap_or_default().starts_with("cleaned-"));
    }

    #[test]
    fn test_object_with_questions_kept() {
        let quiz = clean_and_parse_quiz(r#"{"quiz_id":"q1","status":"success","questions":[]}"#)
            .expect("object parses");
        assert_eq!(quiz.quiz_id.as_deref(), Some("q1"));
    }

    #[test]
    fn test_object_without_questions_rejected() {
        let err = clean_and_parse_quiz(r#"{"status":"success"}"#).unwrap_err();
        assert!(matches!(err, ApiError::QuizPayload(_)));
    }

    #[test]
    fn test_prose_wrapped_payload_recovered() {
        let quiz = clean_and_parse_quiz("Here you go:\n[{\"type\":\"MCQ\"}]\nEnjoy!").expect("recovered");
        assert_eq!(quiz.questions.len(), 1);
    }

    #[test]
    fn test_unrecoverable_payload_errors() {
        let err = clean_and_parse_quiz("no json here at all").unwrap_err();
        assert!(err.to_string().starts_with("Failed to parse quiz JSON after cleaning"));
    }

    #[test]
    fn test_json_string_body_is_cleaned() {
        let body = ResponseBody::Json(Value::String(r#"[{"type":"MCQ"}]"#.to_string()));
        let quiz = decode_quiz_body(body).expect("string body decodes");
        assert_eq!(quiz.questions.len(), 1);
    }
}
