//! Grading of a submitted question set.
//!
//! Objective types are graded eagerly by [`grade`]. Short answers produce
//! pending results plus one outstanding scoring request each; the
//! authoritative [`QuizReport`] only exists once [`Evaluation::settle`] has
//! joined every one of those requests.

use std::collections::BTreeMap;

use async_trait::async_trait;
use futures_util::future::join_all;
use tracing::{debug, info, instrument, warn};

use crate::api::{EvaluateAnswerRequest, ServerStatus};
use crate::core::{ApiClient, Transport};
use crate::error::{ApiError, QuizError};
use crate::quiz::answers::{AnswerRecord, AnswerValue};
use crate::quiz::question::{Question, QuestionBody, QuestionSet};

/// Short answers scoring at or above this count as correct.
pub const SHORT_ANSWER_PASS: f64 = 7.0;

#[derive(Debug, Clone, PartialEq)]
pub struct QuestionResult {
    /// `None` while a short answer is still being scored.
    pub correct: Option<bool>,
    pub score: Option<f64>,
    pub feedback: String,
    /// Matching only: how many of the pairs were right.
    pub matched: Option<usize>,
}

impl QuestionResult {
    fn graded(correct: bool, feedback: String) -> Self {
        Self { correct: Some(correct), score: None, feedback, matched: None }
    }

    fn pending() -> Self {
        Self { correct: None, score: None, feedback: "Evaluating your answer...".to_string(), matched: None }
    }

    pub fn is_pending(&self) -> bool {
        self.correct.is_none()
    }
}

/// Per-question outcomes keyed by position in the active set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultRecord {
    results: BTreeMap<usize, QuestionResult>,
}

impl ResultRecord {
    pub fn get(&self, index: usize) -> Option<&QuestionResult> {
        self.results.get(&index)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &QuestionResult)> {
        self.results.iter().map(|(index, result)| (*index, result))
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn correct_count(&self) -> usize {
        self.results.values().filter(|r| r.correct == Some(true)).count()
    }

    fn set(&mut self, index: usize, result: QuestionResult) {
        self.results.insert(index, result);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShortAnswerScore {
    pub score: f64,
    pub feedback: String,
}

/// Scores one short answer remotely.
#[async_trait]
pub trait AnswerScorer: Send + Sync {
    async fn score(&self, request: &EvaluateAnswerRequest) -> Result<ShortAnswerScore, ApiError>;
}

#[async_trait]
impl<T: Transport> AnswerScorer for ApiClient<T> {
    async fn score(&self, request: &EvaluateAnswerRequest) -> Result<ShortAnswerScore, ApiError> {
        let response = self.evaluate_answer(request).await?.ensure_success("Evaluation failed")?;
        let score = response
            .score
            .ok_or_else(|| ApiError::Server("Evaluation response carried no score".to_string()))?;
        Ok(ShortAnswerScore { score, feedback: response.feedback })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingShortAnswer {
    pub index: usize,
    pub request: EvaluateAnswerRequest,
}

/// Final, joined outcome of a submission.
#[derive(Debug, Clone, PartialEq)]
pub struct QuizReport {
    pub results: ResultRecord,
    pub total_correct: usize,
    /// Number of graded questions (the active set, not the generated count).
    pub total: usize,
}

impl QuizReport {
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.total_correct as f64 / self.total as f64
        }
    }

    pub fn summary(&self) -> String {
        format!("Score: {} / {}", self.total_correct, self.total)
    }
}

/// Eagerly graded results plus the short answers still awaiting a score.
#[derive(Debug, Clone)]
pub struct Evaluation {
    results: ResultRecord,
    pending: Vec<PendingShortAnswer>,
    total: usize,
}

impl Evaluation {
    /// Partial results; pending short answers have `correct == None`.
    pub fn results(&self) -> &ResultRecord {
        &self.results
    }

    pub fn pending(&self) -> &[PendingShortAnswer] {
        &self.pending
    }

    /// Issue every pending scoring request concurrently and wait for all of
    /// them. A failed request fixes that question at incorrect; nothing is
    /// retried here.
    #[instrument(target = "study_client::quiz", skip_all, fields(pending = self.pending.len()))]
    pub async fn settle<S>(self, scorer: &S) -> QuizReport
    where
        S: AnswerScorer + ?Sized,
    {
        let Evaluation { mut results, pending, total } = self;

        let outcomes = join_all(pending.into_iter().map(|item| async move {
            let outcome = scorer.score(&item.request).await;
            (item.index, outcome)
        }))
        .await;

        for (index, outcome) in outcomes {
            let result = match outcome {
                Ok(ShortAnswerScore { score, feedback }) => {
                    debug!(index, score, "Short answer scored");
                    QuestionResult {
                        correct: Some(score >= SHORT_ANSWER_PASS),
                        score: Some(score),
                        feedback: format!("Score: {}/10. {}", score, feedback).trim_end().to_string(),
                        matched: None,
                    }
                }
                Err(e) => {
                    warn!(index, error = %e, "Evaluation failed");
                    QuestionResult::graded(false, format!("Evaluation failed: {}", e))
                }
            };
            results.set(index, result);
        }

        let total_correct = results.correct_count();
        info!(total_correct, total, "Quiz evaluation finished");
        QuizReport { results, total_correct, total }
    }
}

/// Grade every question of `set` once, in index order.
pub fn grade(set: &QuestionSet, answers: &AnswerRecord, notes_context: &str) -> Evaluation {
    let mut results = ResultRecord::default();
    let mut pending = Vec::new();

    for (index, question) in set.questions().iter().enumerate() {
        let answer = answers.get(index);
        let result = match &question.body {
            QuestionBody::Mcq { correct, .. } | QuestionBody::TrueFalse { correct } => {
                let given = text_answer(answer);
                let is_correct = given == Some(correct.as_str());
                QuestionResult::graded(
                    is_correct,
                    with_explanation(
                        format!("Your Answer: {}. {}", given.unwrap_or("N/A"), verdict(is_correct)),
                        question,
                    ),
                )
            }
            QuestionBody::FillInTheBlank { accepted } => {
                let given = text_answer(answer);
                let is_correct = given.map_or(false, |given| blank_matches(given, accepted));
                QuestionResult::graded(
                    is_correct,
                    with_explanation(
                        format!(
                            "Your Answer: {}. Correct Answer(s): {}. {}",
                            given.unwrap_or("N/A"),
                            accepted.join("/"),
                            verdict(is_correct)
                        ),
                        question,
                    ),
                )
            }
            QuestionBody::Matching { column_a, column_b, key } => {
                let selected = match answer {
                    Some(AnswerValue::Matching(selected)) => Some(selected),
                    _ => None,
                };
                match grade_matching(key, selected) {
                    Ok(matched) => {
                        let is_correct = matched == key.len();
                        let feedback = format!(
                            "You matched {} out of {} correctly. {}\nCorrect pairings:\n{}",
                            matched,
                            key.len(),
                            if is_correct { "All Correct!" } else { "Partially Correct." },
                            correct_pairings(key, column_a, column_b)
                        );
                        let mut result = QuestionResult::graded(is_correct, with_explanation(feedback, question));
                        result.matched = Some(matched);
                        result
                    }
                    Err(e) => {
                        warn!(index, error = %e, "Error processing matching answer");
                        QuestionResult::graded(false, format!("Error evaluating matching answer: {}", e))
                    }
                }
            }
            QuestionBody::ShortAnswer { ideal_answer } => {
                pending.push(PendingShortAnswer {
                    index,
                    request: EvaluateAnswerRequest {
                        question: question.prompt.clone(),
                        ideal_answer: ideal_answer.clone(),
                        user_answer: text_answer(answer).unwrap_or_default().to_string(),
                        notes_context: notes_context.to_string(),
                    },
                });
                QuestionResult::pending()
            }
            QuestionBody::Unsupported { .. } => {
                QuestionResult::graded(false, "Cannot evaluate this question type.".to_string())
            }
        };
        results.set(index, result);
    }

    debug!(graded = results.len(), pending = pending.len(), "Objective grading done");
    Evaluation { results, pending, total: set.len() }
}

/// Submit `set` once: freeze it, grade it and wait for every short answer.
pub async fn evaluate<S>(
    set: &mut QuestionSet,
    answers: &AnswerRecord,
    notes_context: &str,
    scorer: &S,
) -> Result<QuizReport, QuizError>
where
    S: AnswerScorer + ?Sized,
{
    if set.is_empty() {
        return Err(QuizError::NoActiveSet);
    }
    if set.is_submitted() {
        return Err(QuizError::AlreadySubmitted);
    }
    if !answers.all_answered(set) {
        return Err(QuizError::NotAllAnswered);
    }
    set.submit()?;
    Ok(grade(set, answers, notes_context).settle(scorer).await)
}

fn text_answer(answer: Option<&AnswerValue>) -> Option<&str> {
    match answer {
        Some(AnswerValue::Text(text)) => Some(text.as_str()),
        _ => None,
    }
}

fn verdict(correct: bool) -> &'static str {
    if correct {
        "Correct!"
    } else {
        "Incorrect."
    }
}

fn with_explanation(feedback: String, question: &Question) -> String {
    match &question.explanation {
        Some(explanation) => format!("{} {}", feedback, explanation),
        None => feedback,
    }
}

/// Case-insensitive, whitespace-trimmed comparison against every accepted answer.
pub fn blank_matches(given: &str, accepted: &[String]) -> bool {
    let given = given.trim().to_lowercase();
    !given.is_empty() && accepted.iter().any(|answer| answer.trim().to_lowercase() == given)
}

/// Parse `"<a>-<b>"` pairs into a column-B to column-A mapping.
pub fn matching_key(key: &[String]) -> Result<BTreeMap<usize, usize>, QuizError> {
    let mut mapping = BTreeMap::new();
    for pair in key {
        let parsed = pair
            .split_once('-')
            .and_then(|(a, b)| Some((a.trim().parse::<usize>().ok()?, b.trim().parse::<usize>().ok()?)));
        match parsed {
            Some((a, b)) => {
                mapping.insert(b, a);
            }
            None => return Err(QuizError::MalformedMatchingKey(pair.clone())),
        }
    }
    Ok(mapping)
}

/// Count user `b -> a` selections that agree with the key.
pub fn grade_matching(key: &[String], selected: Option<&BTreeMap<usize, String>>) -> Result<usize, QuizError> {
    let canonical = matching_key(key)?;
    let matched = selected.map_or(0, |selected| {
        selected
            .iter()
            .filter(|(b, a)| {
                a.trim().parse::<usize>().ok().map_or(false, |a| canonical.get(b) == Some(&a))
            })
            .count()
    });
    Ok(matched)
}

fn correct_pairings(key: &[String], column_a: &[String], column_b: &[String]) -> String {
    key.iter()
        .filter_map(|pair| {
            let (a, b) = pair.split_once('-')?;
            let (a, b) = (a.trim().parse::<usize>().ok()?, b.trim().parse::<usize>().ok()?);
            let letter = char::from(b'A' + u8::try_from(a).ok()?.min(25));
            let a_text = column_a.get(a).cloned().unwrap_or_else(|| format!("Item A{}", a));
            let b_text = column_b.get(b).cloned().unwrap_or_else(|| format!("Item B{}", b));
            Some(format!("{}. {} -> {}", letter, a_text, b_text))
        })
        .collect::<Vec<_>>()
        .join("\n")
}
