//! Wire models for the study-assistant backend.
//!
//! Request types serialize to the exact JSON bodies the server expects;
//! response types are decoded once at the API boundary and carry a
//! `status` field checked through [`ServerStatus`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ApiError;

pub const STATUS_SUCCESS: &str = "success";

/// Responses that report their own success through a `status` field.
pub trait ServerStatus {
    fn status(&self) -> &str;
    fn error(&self) -> Option<&str>;

    /// Turn a `status != "success"` response into [`ApiError::Server`].
    fn ensure_success(self, fallback: &str) -> Result<Self, ApiError>
    where
        Self: Sized,
    {
        if self.status() == STATUS_SUCCESS {
            Ok(self)
        } else {
            let message = self.error().unwrap_or(fallback).to_string();
            Err(ApiError::Server(message))
        }
    }
}

macro_rules! impl_server_status {
    ($($ty:ty),* $(,)?) => {
        $(impl ServerStatus for $ty {
            fn status(&self) -> &str { &self.status }
            fn error(&self) -> Option<&str> { self.error.as_deref() }
        })*
    };
}

/// Body of a non-2xx response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub details: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub mime: Option<String>,
}

/// Owned description of the `process-content` multipart form.
///
/// Kept as plain data so the form can be rebuilt for every retry attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentForm {
    pub urls: Vec<String>,
    pub topic: String,
    pub description: String,
    pub web_search: bool,
    pub generate_quiz: bool,
    pub generate_flashcards: bool,
    pub generate_mindmap: bool,
    pub files: Vec<UploadFile>,
}

impl ContentForm {
    /// Text fields in the order the server reads them.
    pub fn text_fields(&self) -> Vec<(&'static str, String)> {
        let urls = serde_json::to_string(&self.urls).unwrap_or_else(|_| "[]".to_string());
        vec![
            ("urls", urls),
            ("topic", self.topic.clone()),
            ("description", self.description.clone()),
            ("web_search", self.web_search.to_string()),
            ("generate_quiz", self.generate_quiz.to_string()),
            ("generate_flashcards", self.generate_flashcards.to_string()),
            ("generate_mindmap", self.generate_mindmap.to_string()),
        ]
    }

    pub fn has_input(&self) -> bool {
        !self.urls.is_empty()
            || !self.files.is_empty()
            || (!self.topic.trim().is_empty() && !self.description.trim().is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessContentResponse {
    pub data: ProcessedContent,
    #[serde(default)]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProcessedContent {
    #[serde(default)]
    pub content_id: Option<String>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub original_text: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub web_search_enabled: bool,
    #[serde(default)]
    pub initial_quiz: Option<QuizResponse>,
    #[serde(default)]
    pub initial_flashcards: Option<FlashcardsResponse>,
    #[serde(default)]
    pub initial_mindmap: Option<MindmapResponse>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateQuizRequest {
    pub notes: String,
    pub original_text: String,
    pub existing_questions: String,
    pub question_types: Vec<String>,
    pub num_questions: u32,
    pub difficulty: String,
}

/// Questions stay untyped here; validation into `Question` happens at ingest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuizResponse {
    #[serde(default)]
    pub quiz_id: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub questions: Vec<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateFlashcardsRequest {
    pub notes: String,
    pub original_text: String,
    pub existing_flashcards: String,
    pub num_flashcards: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashcard {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FlashcardsResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub flashcards: Vec<Flashcard>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateMindmapRequest {
    pub notes: String,
    pub original_text: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MindmapResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub mindmap_syntax: String,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluateAnswerRequest {
    pub question: String,
    pub ideal_answer: String,
    pub user_answer: String,
    pub notes_context: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EvaluateAnswerResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub feedback: String,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub parts: Vec<String>,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: "user".to_string(), parts: vec![text.into()] }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self { role: "model".to_string(), parts: vec![text.into()] }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub notes: String,
    pub original_text: String,
    pub history: Vec<ChatTurn>,
    pub message: String,
    pub web_search_enabled: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub history: Option<Vec<ChatTurn>>,
    #[serde(default)]
    pub error: Option<String>,
}

impl_server_status!(
    QuizResponse,
    FlashcardsResponse,
    MindmapResponse,
    EvaluateAnswerResponse,
    ChatResponse,
);
