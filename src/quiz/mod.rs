//! Quiz model: validated question sets, recorded answers and grading.

pub mod answers;
pub mod evaluator;
pub mod question;

pub use answers::{AnswerInput, AnswerRecord, AnswerValue};
pub use evaluator::{
    evaluate, grade, AnswerScorer, Evaluation, PendingShortAnswer, QuestionResult, QuizReport, ResultRecord,
    ShortAnswerScore, SHORT_ANSWER_PASS,
};
pub use question::{GenerationStatus, Question, QuestionBody, QuestionSet, MATCHING_PAIRS, MIN_MCQ_OPTIONS};

/// Options for requesting a new question set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizOptions {
    pub question_types: Vec<String>,
    pub num_questions: u32,
    pub difficulty: String,
}

impl Default for QuizOptions {
    fn default() -> Self {
        Self {
            question_types: vec!["MCQ".to_string()],
            num_questions: 5,
            difficulty: "Apply".to_string(),
        }
    }
}
