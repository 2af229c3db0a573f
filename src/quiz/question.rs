//! Typed quiz questions and validated question sets.
//!
//! Raw questions arrive as loosely-shaped JSON. They are decoded once here;
//! anything failing its shape check is dropped and never gets an index.

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::api::{QuizResponse, STATUS_SUCCESS};
use crate::error::QuizError;

pub const MIN_MCQ_OPTIONS: usize = 3;
pub const MATCHING_PAIRS: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub enum QuestionBody {
    Mcq { options: Vec<String>, correct: String },
    TrueFalse { correct: String },
    /// Any of `accepted` matches, case-insensitively and trimmed.
    FillInTheBlank { accepted: Vec<String> },
    ShortAnswer { ideal_answer: String },
    /// `key` holds the raw `"<a>-<b>"` pairs; they are parsed at grading time.
    Matching {
        column_a: Vec<String>,
        column_b: Vec<String>,
        key: Vec<String>,
    },
    Unsupported { kind: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Question {
    pub prompt: String,
    pub explanation: Option<String>,
    pub difficulty: Option<String>,
    pub body: QuestionBody,
}

impl Question {
    /// Wire name of the question type.
    pub fn kind(&self) -> &str {
        match &self.body {
            QuestionBody::Mcq { .. } => "MCQ",
            QuestionBody::TrueFalse { .. } => "True/False",
            QuestionBody::FillInTheBlank { .. } => "Fill_in_the_Blank",
            QuestionBody::ShortAnswer { .. } => "Short_Answer",
            QuestionBody::Matching { .. } => "Matching",
            QuestionBody::Unsupported { kind } => kind,
        }
    }

    /// Human label shown next to the prompt.
    pub fn label(&self) -> &str {
        match &self.body {
            QuestionBody::Mcq { .. } => "Multiple Choice",
            QuestionBody::TrueFalse { .. } => "True/False",
            QuestionBody::FillInTheBlank { .. } => "Fill in the Blank",
            QuestionBody::ShortAnswer { .. } => "Short Answer",
            QuestionBody::Matching { .. } => "Matching (5x5)",
            QuestionBody::Unsupported { kind } => kind,
        }
    }

    pub fn is_matching(&self) -> bool {
        matches!(self.body, QuestionBody::Matching { .. })
    }

    /// Decode one raw question, or explain why it must be dropped.
    pub fn from_raw(raw: &Value) -> Result<Self, String> {
        let raw = RawQuestion::deserialize(raw).map_err(|e| format!("not a question object: {}", e))?;

        let kind = raw.kind.as_ref().map(text_of).unwrap_or_default();
        let prompt = raw.question.as_ref().map(text_of).unwrap_or_default();
        if kind.is_empty() || prompt.trim().is_empty() {
            return Err("missing type or question text".to_string());
        }

        let correct = raw.correct_answer.unwrap_or(Value::Null);
        let body = match kind.as_str() {
            "MCQ" => {
                let options = match &raw.options {
                    Some(Value::Array(items)) if items.len() >= MIN_MCQ_OPTIONS => {
                        items.iter().map(text_of).collect()
                    }
                    _ => return Err(format!("MCQ needs at least {} options", MIN_MCQ_OPTIONS)),
                };
                QuestionBody::Mcq { options, correct: text_of(&correct) }
            }
            "True/False" => {
                let correct = match correct {
                    Value::Bool(true) => "True".to_string(),
                    Value::Bool(false) => "False".to_string(),
                    other => text_of(&other),
                };
                QuestionBody::TrueFalse { correct }
            }
            "Fill_in_the_Blank" => {
                let accepted = match correct {
                    Value::Array(items) => items
                        .into_iter()
                        .filter_map(|item| match item {
                            Value::String(s) if !s.is_empty() => Some(s),
                            _ => None,
                        })
                        .collect(),
                    Value::String(s) if !s.is_empty() => vec![s],
                    _ => Vec::new(),
                };
                QuestionBody::FillInTheBlank { accepted }
            }
            "Short_Answer" => QuestionBody::ShortAnswer { ideal_answer: text_of(&correct) },
            "Matching" => matching_body(raw.options.as_ref(), &correct)?,
            other => QuestionBody::Unsupported { kind: other.to_string() },
        };

        Ok(Self {
            prompt,
            explanation: raw.explanation.as_ref().map(text_of).filter(|s| !s.is_empty()),
            difficulty: raw.difficulty.as_ref().map(text_of).filter(|s| !s.is_empty()),
            body,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawQuestion {
    #[serde(rename = "type", default)]
    kind: Option<Value>,
    #[serde(default)]
    question: Option<Value>,
    #[serde(default)]
    options: Option<Value>,
    #[serde(default)]
    correct_answer: Option<Value>,
    #[serde(default)]
    explanation: Option<Value>,
    #[serde(default)]
    difficulty: Option<Value>,
}

fn matching_body(options: Option<&Value>, correct: &Value) -> Result<QuestionBody, String> {
    let column = |name: &str| -> Option<Vec<String>> {
        match options?.get(name)? {
            Value::Array(items) if items.len() == MATCHING_PAIRS => Some(items.iter().map(text_of).collect()),
            _ => None,
        }
    };
    let key = match correct {
        Value::Array(items) if items.len() == MATCHING_PAIRS => Some(items.iter().map(text_of).collect()),
        _ => None,
    };

    match (column("column_a"), column("column_b"), key) {
        (Some(column_a), Some(column_b), Some(key)) => Ok(QuestionBody::Matching { column_a, column_b, key }),
        _ => Err(format!(
            "Matching needs {n} items per column and {n} answers",
            n = MATCHING_PAIRS
        )),
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationStatus {
    Success,
    Error(String),
}

/// The active, validated collection of questions.
///
/// Indices are dense over the surviving questions. Once submitted the set
/// is frozen: answers can no longer change.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionSet {
    pub id: Option<String>,
    pub status: GenerationStatus,
    questions: Vec<Question>,
    dropped: usize,
    submitted: bool,
}

impl QuestionSet {
    pub fn ingest(id: Option<String>, raw: &[Value]) -> Self {
        let mut questions = Vec::with_capacity(raw.len());
        let mut dropped = 0;

        for (position, item) in raw.iter().enumerate() {
            match Question::from_raw(item) {
                Ok(question) => questions.push(question),
                Err(reason) => {
                    warn!(position, %reason, "Skipping invalid question");
                    dropped += 1;
                }
            }
        }

        debug!(kept = questions.len(), dropped, "Ingested question set");
        Self { id, status: GenerationStatus::Success, questions, dropped, submitted: false }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            id: None,
            status: GenerationStatus::Error(message.into()),
            questions: Vec::new(),
            dropped: 0,
            submitted: false,
        }
    }

    pub fn from_response(response: QuizResponse) -> Self {
        if response.status != STATUS_SUCCESS {
            let message = response
                .error
                .unwrap_or_else(|| "Invalid response or failed to generate questions.".to_string());
            return Self::failed(message);
        }
        Self::ingest(response.quiz_id, &response.questions)
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn get(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Number of raw questions rejected at ingest.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn is_submitted(&self) -> bool {
        self.submitted
    }

    pub fn submit(&mut self) -> Result<(), QuizError> {
        if self.submitted {
            return Err(QuizError::AlreadySubmitted);
        }
        self.submitted = true;
        Ok(())
    }
}
