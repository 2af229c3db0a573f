//! Answers recorded against the active question set.

use std::collections::BTreeMap;

use crate::error::QuizError;
use crate::quiz::question::{QuestionBody, QuestionSet, MATCHING_PAIRS};

/// A stored answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerValue {
    Text(String),
    /// Column-B index to the raw selected column-A value (`""` when unselected).
    Matching(BTreeMap<usize, String>),
}

/// Raw input coming from the answer controls of one question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerInput {
    /// A picked option (MCQ, True/False), stored verbatim.
    Choice(String),
    /// Typed text, stored trimmed.
    Text(String),
    /// The value of every column-B select, in column-B order.
    Selections(Vec<String>),
}

/// Per-question answers keyed by position in the active set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerRecord {
    answers: BTreeMap<usize, AnswerValue>,
}

impl AnswerRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, index: usize) -> Option<&AnswerValue> {
        self.answers.get(&index)
    }

    pub fn text(&self, index: usize) -> Option<&str> {
        match self.answers.get(&index) {
            Some(AnswerValue::Text(text)) => Some(text),
            _ => None,
        }
    }

    pub fn clear(&mut self) {
        self.answers.clear();
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    /// Store the answer for `index`, replacing any previous one.
    ///
    /// Matching input always overwrites the whole mapping so the record
    /// reflects the full current selection state of that question.
    pub fn record(&mut self, set: &QuestionSet, index: usize, input: AnswerInput) -> Result<(), QuizError> {
        if set.is_submitted() {
            return Err(QuizError::AlreadySubmitted);
        }
        let question = set.get(index).ok_or(QuizError::IndexOutOfRange(index))?;

        let value = match (&question.body, input) {
            (QuestionBody::Mcq { .. } | QuestionBody::TrueFalse { .. }, AnswerInput::Choice(choice)) => {
                AnswerValue::Text(choice)
            }
            (
                QuestionBody::FillInTheBlank { .. }
                | QuestionBody::ShortAnswer { .. }
                | QuestionBody::Unsupported { .. },
                AnswerInput::Text(text),
            ) => AnswerValue::Text(text.trim().to_string()),
            (QuestionBody::Matching { .. }, AnswerInput::Selections(values)) => {
                AnswerValue::Matching(values.into_iter().enumerate().collect())
            }
            _ => return Err(QuizError::AnswerKindMismatch(index)),
        };

        self.answers.insert(index, value);
        Ok(())
    }

    /// Whether every question in `set` has a usable answer. An empty set is
    /// never submittable.
    pub fn all_answered(&self, set: &QuestionSet) -> bool {
        if set.is_empty() {
            return false;
        }
        set.questions().iter().enumerate().all(|(index, question)| {
            match (question.is_matching(), self.answers.get(&index)) {
                (true, Some(AnswerValue::Matching(selected))) => (0..MATCHING_PAIRS)
                    .all(|b| selected.get(&b).map_or(false, |value| !value.is_empty())),
                (false, Some(AnswerValue::Text(text))) => !text.is_empty(),
                _ => false,
            }
        })
    }
}
