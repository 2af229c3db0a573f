//! Application state and the remote flows that update it.
//!
//! State sits behind a mutex that is never held across an await. Every flow
//! captures a [`SessionToken`] before its remote call and only applies the
//! result if no new content was loaded in the meantime.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{info, instrument, warn};

use crate::api::{
    ChatRequest, ChatTurn, ContentForm, FlashcardsResponse, GenerateFlashcardsRequest, GenerateMindmapRequest,
    GenerateQuizRequest, MindmapResponse, ProcessedContent, QuizResponse, ServerStatus, STATUS_SUCCESS,
};
use crate::chat::ChatHistory;
use crate::core::{ApiClient, Transport};
use crate::error::{ApiError, QuizError, StudyError};
use crate::flashcards::{FlashcardDeck, DEFAULT_FLASHCARD_COUNT};
use crate::mindmap::{default_renderers, parse, render_graph, GraphModel, MindmapView};
use crate::notes::{self, NotesExport, NotesFormat};
use crate::quiz::{grade, AnswerInput, AnswerRecord, QuestionSet, QuizOptions, QuizReport, ResultRecord};
use crate::session::{SessionClock, SessionToken};

/// Notes and source text of the processed content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadedContent {
    pub content_id: Option<String>,
    pub title: String,
    pub notes: String,
    pub original_text: String,
    pub web_search_enabled: bool,
}

impl From<&ProcessedContent> for LoadedContent {
    fn from(data: &ProcessedContent) -> Self {
        Self {
            content_id: data.content_id.clone(),
            title: data.title.clone(),
            notes: data.notes.clone(),
            original_text: data.original_text.clone(),
            web_search_enabled: data.web_search_enabled,
        }
    }
}

impl LoadedContent {
    pub fn export_notes(&self, format: NotesFormat) -> NotesExport {
        notes::export(&self.title, &self.notes, format)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MindmapState {
    pub syntax: String,
    pub graph: GraphModel,
}

impl MindmapState {
    fn from_syntax(syntax: String) -> Self {
        let graph = parse(&syntax);
        Self { syntax, graph }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub content: Option<LoadedContent>,
    pub quiz: Option<QuestionSet>,
    pub answers: AnswerRecord,
    /// Partial results while short answers are scored.
    pub results: ResultRecord,
    pub report: Option<QuizReport>,
    pub flashcards: FlashcardDeck,
    pub mindmap: Option<MindmapState>,
    pub chat: ChatHistory,
}

impl AppState {
    fn clear_quiz_progress(&mut self) {
        self.answers.clear();
        self.results = ResultRecord::default();
        self.report = None;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutcome {
    pub title: String,
    /// Server warnings plus failures of the initial generations.
    pub warnings: Vec<String>,
}

/// Owns the API client and the shared application state.
#[derive(Debug, Clone)]
pub struct StudyStore<T: Transport> {
    client: ApiClient<T>,
    state: Arc<Mutex<AppState>>,
    clock: SessionClock,
    /// Advanced whenever the displayed question set changes.
    quiz_clock: SessionClock,
}

impl<T: Transport> StudyStore<T> {
    pub fn new(client: ApiClient<T>) -> Self {
        Self {
            client,
            state: Arc::new(Mutex::new(AppState::default())),
            clock: SessionClock::new(),
            quiz_clock: SessionClock::new(),
        }
    }

    pub fn client(&self) -> &ApiClient<T> {
        &self.client
    }

    pub fn session(&self) -> SessionToken {
        self.clock.token()
    }

    /// Run `f` against the current state.
    pub fn with_state<R>(&self, f: impl FnOnce(&AppState) -> R) -> R {
        f(&self.lock())
    }

    pub fn snapshot(&self) -> AppState {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, AppState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn ensure_current(&self, token: SessionToken, flow: &str) -> Result<(), StudyError> {
        if self.clock.is_current(token) {
            Ok(())
        } else {
            warn!(flow, "Discarding result from a replaced session");
            Err(StudyError::Stale)
        }
    }

    fn ensure_quiz_current(&self, token: SessionToken) -> Result<(), StudyError> {
        if self.quiz_clock.is_current(token) {
            Ok(())
        } else {
            warn!("Discarding evaluation of a replaced question set");
            Err(StudyError::Stale)
        }
    }

    fn content(&self) -> Result<LoadedContent, StudyError> {
        self.lock().content.clone().ok_or(StudyError::NoContent)
    }

    pub fn export_notes(&self, format: NotesFormat) -> Result<NotesExport, StudyError> {
        Ok(self.content()?.export_notes(format))
    }

    /// Drop everything tied to the current content and start a new session.
    pub fn reset_for_new_content(&self) -> SessionToken {
        let mut state = self.lock();
        *state = AppState::default();
        self.quiz_clock.advance();
        self.clock.advance()
    }

    #[instrument(target = "study_client::store", skip_all)]
    pub async fn process_content(&self, form: ContentForm) -> Result<ProcessOutcome, StudyError> {
        if !form.has_input() {
            return Err(StudyError::MissingInput(
                "Provide at least one URL, upload a file, or enter both a topic and description",
            ));
        }

        let token = self.session();
        let response = self.client.process_content(form).await?;
        self.ensure_current(token, "process_content")?;

        let data = response.data;
        let mut warnings = response.warnings;
        let mut state = self.lock();
        *state = AppState::default();
        self.clock.advance();
        self.quiz_clock.advance();
        state.content = Some(LoadedContent::from(&data));

        if let Some(quiz) = data.initial_quiz {
            match initial_quiz(quiz) {
                Ok(set) => state.quiz = Some(set),
                Err(e) => warnings.push(format!("Initial Quiz Generation: {}", e)),
            }
        }
        if let Some(cards) = data.initial_flashcards {
            match initial_flashcards(cards) {
                Ok(deck) => state.flashcards = deck,
                Err(e) => warnings.push(format!("Initial Flashcard Generation: {}", e)),
            }
        }
        if let Some(mindmap) = data.initial_mindmap {
            match initial_mindmap(mindmap) {
                Ok(mindmap) => state.mindmap = Some(mindmap),
                Err(e) => warnings.push(format!("Initial Mind Map Generation: {}", e)),
            }
        }

        for warning in &warnings {
            warn!(%warning, "Content processing warning");
        }
        info!(title = %data.title, warnings = warnings.len(), "Content processed");
        Ok(ProcessOutcome { title: data.title, warnings })
    }

    /// Request a new question set; it replaces the current one.
    #[instrument(target = "study_client::store", skip_all, fields(num_questions = options.num_questions))]
    pub async fn generate_quiz(&self, options: QuizOptions) -> Result<QuestionSet, StudyError> {
        let token = self.session();
        let content = self.content()?;
        if options.question_types.is_empty() {
            return Err(StudyError::MissingInput("Select at least one question type"));
        }

        let request = GenerateQuizRequest {
            notes: content.notes,
            original_text: content.original_text,
            existing_questions: "[]".to_string(),
            question_types: options.question_types,
            num_questions: options.num_questions,
            difficulty: options.difficulty,
        };

        let response = self.client.generate_quizzes(&request).await?;
        self.ensure_current(token, "generate_quiz")?;

        let set = QuestionSet::from_response(
            response.ensure_success("Invalid response or failed to generate questions.")?,
        );
        info!(questions = set.len(), dropped = set.dropped(), "Quiz generated");

        let mut state = self.lock();
        state.quiz = Some(set.clone());
        state.clear_quiz_progress();
        self.quiz_clock.advance();
        Ok(set)
    }

    pub fn record_answer(&self, index: usize, input: AnswerInput) -> Result<(), StudyError> {
        let mut state = self.lock();
        let AppState { quiz, answers, .. } = &mut *state;
        let quiz = quiz.as_ref().ok_or(QuizError::NoActiveSet)?;
        answers.record(quiz, index, input)?;
        Ok(())
    }

    pub fn all_answered(&self) -> bool {
        let state = self.lock();
        state.quiz.as_ref().map_or(false, |quiz| state.answers.all_answered(quiz))
    }

    /// Freeze the quiz, grade it and wait for every short answer score.
    #[instrument(target = "study_client::store", skip_all)]
    pub async fn submit_quiz(&self) -> Result<QuizReport, StudyError> {
        let token = self.session();
        let (quiz_token, evaluation) = {
            let mut state = self.lock();
            let notes = state.content.as_ref().map(|c| c.notes.clone()).unwrap_or_default();
            let AppState { quiz, answers, results, .. } = &mut *state;
            let quiz = quiz.as_mut().ok_or(QuizError::NoActiveSet)?;
            if quiz.is_submitted() {
                return Err(QuizError::AlreadySubmitted.into());
            }
            if !answers.all_answered(quiz) {
                return Err(QuizError::NotAllAnswered.into());
            }
            quiz.submit()?;
            let evaluation = grade(quiz, answers, &notes);
            *results = evaluation.results().clone();
            (self.quiz_clock.token(), evaluation)
        };

        let report = evaluation.settle(&self.client).await;

        let mut state = self.lock();
        self.ensure_current(token, "submit_quiz")?;
        self.ensure_quiz_current(quiz_token)?;
        state.results = report.results.clone();
        state.report = Some(report.clone());
        info!(summary = %report.summary(), "Quiz submitted");
        Ok(report)
    }

    #[instrument(target = "study_client::store", skip_all)]
    pub async fn generate_flashcards(&self) -> Result<usize, StudyError> {
        let token = self.session();
        let content = self.content()?;
        let request = GenerateFlashcardsRequest {
            notes: content.notes,
            original_text: content.original_text,
            existing_flashcards: "[]".to_string(),
            num_flashcards: DEFAULT_FLASHCARD_COUNT,
        };

        let response = self.client.generate_flashcards(&request).await?;
        self.ensure_current(token, "generate_flashcards")?;

        let response = response.ensure_success("Failed to generate flashcards")?;
        let count = response.flashcards.len();
        self.lock().flashcards = FlashcardDeck::new(response.flashcards);
        info!(count, "Flashcards generated");
        Ok(count)
    }

    /// Flip or move within the deck through `f`.
    pub fn with_flashcards<R>(&self, f: impl FnOnce(&mut FlashcardDeck) -> R) -> R {
        f(&mut self.lock().flashcards)
    }

    #[instrument(target = "study_client::store", skip_all)]
    pub async fn generate_mindmap(&self) -> Result<GraphModel, StudyError> {
        let token = self.session();
        let content = self.content()?;
        let request = GenerateMindmapRequest { notes: content.notes, original_text: content.original_text };

        let response = self.client.generate_mindmap(&request).await?;
        self.ensure_current(token, "generate_mindmap")?;

        let mindmap = MindmapState::from_syntax(
            response.ensure_success("Failed to generate mind map")?.mindmap_syntax,
        );
        let graph = mindmap.graph.clone();
        self.lock().mindmap = Some(mindmap);
        info!(nodes = graph.nodes.len(), edges = graph.edges.len(), "Mind map generated");
        Ok(graph)
    }

    /// Render the stored mind map through the default renderer chain.
    pub fn render_mindmap(&self) -> Option<MindmapView> {
        let state = self.lock();
        let mindmap = state.mindmap.as_ref()?;
        Some(render_graph(&mindmap.syntax, &mindmap.graph, &default_renderers()))
    }

    /// Send one chat message. The user turn is recorded before the call and
    /// removed again if the call fails.
    #[instrument(target = "study_client::store", skip_all)]
    pub async fn send_chat(&self, message: &str) -> Result<String, StudyError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(StudyError::MissingInput("Message is empty"));
        }
        let token = self.session();
        let content = self.content()?;
        if content.notes.is_empty() && content.original_text.is_empty() {
            return Err(StudyError::NoContent);
        }

        let history = {
            let mut state = self.lock();
            state.chat.push(ChatTurn::user(message));
            state.chat.window()
        };
        let request = ChatRequest {
            notes: content.notes,
            original_text: content.original_text,
            history,
            message: message.to_string(),
            web_search_enabled: content.web_search_enabled,
        };

        let outcome = match self.client.chat(&request).await {
            Ok(response) => response.ensure_success("Failed to get chat response").and_then(|response| {
                match response.response {
                    Some(reply) if !reply.is_empty() => Ok((reply, response.history)),
                    _ => Err(ApiError::Server("Failed to get chat response".to_string())),
                }
            }),
            Err(e) => Err(e),
        };
        self.ensure_current(token, "send_chat")?;

        let mut state = self.lock();
        match outcome {
            Ok((reply, Some(history))) => {
                state.chat.replace(history);
                Ok(reply)
            }
            Ok((reply, None)) => {
                warn!("Chat response carried no history, appending reply");
                state.chat.push(ChatTurn::model(reply.clone()));
                Ok(reply)
            }
            Err(e) => {
                state.chat.pop();
                Err(e.into())
            }
        }
    }
}

fn initial_quiz(quiz: QuizResponse) -> Result<QuestionSet, String> {
    if quiz.status == STATUS_SUCCESS {
        Ok(QuestionSet::from_response(quiz))
    } else {
        Err(quiz.error.unwrap_or_else(|| "unknown error".to_string()))
    }
}

fn initial_flashcards(cards: FlashcardsResponse) -> Result<FlashcardDeck, String> {
    if cards.status == STATUS_SUCCESS {
        Ok(FlashcardDeck::new(cards.flashcards))
    } else {
        Err(cards.error.unwrap_or_else(|| "unknown error".to_string()))
    }
}

fn initial_mindmap(mindmap: MindmapResponse) -> Result<MindmapState, String> {
    if mindmap.status != STATUS_SUCCESS {
        return Err(mindmap.error.unwrap_or_else(|| "unknown error".to_string()));
    }
    if mindmap.mindmap_syntax.trim().is_empty() {
        return Err("empty mind map syntax".to_string());
    }
    Ok(MindmapState::from_syntax(mindmap.mindmap_syntax))
}
