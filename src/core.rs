//! Core request API: wraps a low-level transport with bounded retry for
//! connectivity failures, per-endpoint timeouts, uniform non-2xx error
//! mapping, and typed decoding of every backend endpoint.
//!
//! Quick start:
//! - Build an [`ApiClient`] over [`crate::clients::HttpTransport`] for real traffic
//! - Use [`crate::clients::MockTransport`] in tests to script responses
//! - Higher-level flows (state updates, staleness checks) live in [`crate::store`]

use crate::api::{
    ChatRequest, ChatResponse, ContentForm, ErrorBody, EvaluateAnswerRequest,
    EvaluateAnswerResponse, FlashcardsResponse, GenerateFlashcardsRequest,
    GenerateMindmapRequest, GenerateQuizRequest, MindmapResponse, ProcessContentResponse,
    QuizResponse,
};
use crate::config::{ClientConfig, TimeoutPolicy};
use crate::error::ApiError;
use crate::json_utils::decode_quiz_body;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt::{self, Debug};
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// Timeout class of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointClass {
    ContentProcessing,
    Generation,
    Interactive,
}

/// Every backend endpoint the client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    ProcessContent,
    GenerateQuizzes,
    GenerateFlashcards,
    GenerateMindmap,
    EvaluateAnswer,
    Chat,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::ProcessContent => "/api/process-content",
            Endpoint::GenerateQuizzes => "/api/generate-quizzes",
            Endpoint::GenerateFlashcards => "/api/generate-flashcards",
            Endpoint::GenerateMindmap => "/api/generate-mindmap",
            Endpoint::EvaluateAnswer => "/api/evaluate-answer",
            Endpoint::Chat => "/api/chat",
        }
    }

    pub fn class(&self) -> EndpointClass {
        match self {
            Endpoint::ProcessContent => EndpointClass::ContentProcessing,
            Endpoint::GenerateQuizzes | Endpoint::GenerateFlashcards | Endpoint::GenerateMindmap => {
                EndpointClass::Generation
            }
            Endpoint::EvaluateAnswer | Endpoint::Chat => EndpointClass::Interactive,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(Value),
    Multipart(ContentForm),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub endpoint: Endpoint,
    pub body: RequestBody,
}

impl ApiRequest {
    pub fn json<B: Serialize>(endpoint: Endpoint, body: &B) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiError::Decode(e, format!("unserializable request for {}", endpoint)))?;
        Ok(Self { endpoint, body: RequestBody::Json(value) })
    }

    pub fn multipart(endpoint: Endpoint, form: ContentForm) -> Self {
        Self { endpoint, body: RequestBody::Multipart(form) }
    }
}

/// Response payload, discriminated by the declared content type.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub reason: String,
    pub body: ResponseBody,
}

impl ApiResponse {
    pub fn ok_json(body: Value) -> Self {
        Self { status: 200, reason: "OK".to_string(), body: ResponseBody::Json(body) }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Low-level transport abstraction.
///
/// Implementors perform exactly one attempt of a request within `timeout`.
/// A failure before any response arrives must be reported as
/// [`ApiError::Connectivity`]; an elapsed timeout as [`ApiError::Timeout`].
/// Retry, status mapping and decoding are the job of [`ApiClient`].
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    async fn send(&self, request: ApiRequest, timeout: Duration) -> Result<ApiResponse, ApiError>;

    /// Clone this transport into a boxed trait object
    fn clone_box(&self) -> Box<dyn Transport>;
}

impl Clone for Box<dyn Transport> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

#[async_trait]
impl Transport for Box<dyn Transport> {
    async fn send(&self, request: ApiRequest, timeout: Duration) -> Result<ApiResponse, ApiError> {
        self.as_ref().send(request, timeout).await
    }

    fn clone_box(&self) -> Box<dyn Transport> {
        self.as_ref().clone_box()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Extra attempts after the first one, for connectivity failures only.
    pub max_retries: usize,
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (0-based): 1s, 2s, 4s with the defaults.
    pub fn backoff(&self, attempt: usize) -> Duration {
        let factor = 1u32.checked_shl(attempt as u32).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

#[derive(Clone, Debug)]
/// API client that wraps a [`Transport`] and provides every typed endpoint.
pub struct ApiClient<T: Transport> {
    transport: T,
    timeouts: TimeoutPolicy,
    retry: RetryConfig,
}

impl<T: Transport> ApiClient<T> {
    pub fn new(transport: T, timeouts: TimeoutPolicy, retry: RetryConfig) -> Self {
        info!(max_retries = retry.max_retries, "Creating new ApiClient");
        Self { transport, timeouts, retry }
    }

    pub fn with_config(transport: T, config: &ClientConfig) -> Self {
        Self::new(transport, config.timeouts, config.retry.clone())
    }

    /// Get a reference to the underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Send one request, retrying only connectivity failures, and map non-2xx
    /// responses to [`ApiError::Http`].
    #[instrument(target = "study_client::api", skip(self, request), fields(endpoint = %request.endpoint))]
    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let endpoint = request.endpoint;
        let timeout = self.timeouts.for_endpoint(endpoint);
        let mut attempt = 0usize;

        let response = loop {
            debug!(attempt, timeout_secs = timeout.as_secs(), "Sending request");
            match self.transport.send(request.clone(), timeout).await {
                Ok(response) => break response,
                Err(e) if e.is_connectivity() => {
                    if attempt >= self.retry.max_retries {
                        error!(attempts = attempt + 1, error = %e, "Giving up after connectivity failures");
                        return Err(ApiError::MaxRetriesExceeded {
                            endpoint: endpoint.to_string(),
                            attempts: attempt + 1,
                            last: e.to_string(),
                        });
                    }
                    let delay = self.retry.backoff(attempt);
                    warn!(
                        attempts_left = self.retry.max_retries - attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Network error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(error = %e, "Request failed");
                    return Err(e);
                }
            }
        };

        if !response.is_success() {
            let err = http_error(&response);
            error!(status = response.status, error = %err, "API error");
            return Err(err);
        }

        debug!(status = response.status, "Received response");
        Ok(response)
    }

    async fn post_json<B, R>(&self, endpoint: Endpoint, body: &B) -> Result<R, ApiError>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        let response = self.execute(ApiRequest::json(endpoint, body)?).await?;
        decode_body(response.body)
    }

    pub async fn process_content(&self, form: ContentForm) -> Result<ProcessContentResponse, ApiError> {
        let response = self
            .execute(ApiRequest::multipart(Endpoint::ProcessContent, form))
            .await?;
        decode_body(response.body)
    }

    /// Quiz bodies may arrive as noisy text; they go through the cleaning path.
    pub async fn generate_quizzes(&self, request: &GenerateQuizRequest) -> Result<QuizResponse, ApiError> {
        let response = self
            .execute(ApiRequest::json(Endpoint::GenerateQuizzes, request)?)
            .await?;
        decode_quiz_body(response.body)
    }

    pub async fn generate_flashcards(
        &self,
        request: &GenerateFlashcardsRequest,
    ) -> Result<FlashcardsResponse, ApiError> {
        self.post_json(Endpoint::GenerateFlashcards, request).await
    }

    pub async fn generate_mindmap(&self, request: &GenerateMindmapRequest) -> Result<MindmapResponse, ApiError> {
        self.post_json(Endpoint::GenerateMindmap, request).await
    }

    pub async fn evaluate_answer(
        &self,
        request: &EvaluateAnswerRequest,
    ) -> Result<EvaluateAnswerResponse, ApiError> {
        self.post_json(Endpoint::EvaluateAnswer, request).await
    }

    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ApiError> {
        self.post_json(Endpoint::Chat, request).await
    }
}

/// Decode a successful body into `R`. Text bodies are tried as JSON too.
pub fn decode_body<R: DeserializeOwned>(body: ResponseBody) -> Result<R, ApiError> {
    match body {
        ResponseBody::Json(value) => {
            let raw = value.to_string();
            serde_json::from_value(value).map_err(|e| ApiError::Decode(e, snippet(&raw, 500)))
        }
        ResponseBody::Text(text) => {
            serde_json::from_str(&text).map_err(|e| ApiError::Decode(e, snippet(&text, 500)))
        }
    }
}

fn http_error(response: &ApiResponse) -> ApiError {
    let parsed = match &response.body {
        ResponseBody::Json(value) => serde_json::from_value::<ErrorBody>(value.clone()).ok(),
        ResponseBody::Text(_) => None,
    };

    match parsed {
        Some(ErrorBody { error: Some(error), details }) => {
            let details = details.unwrap_or_default();
            let message = if details.is_empty() {
                error
            } else {
                format!("{} - Details: {}", error, details.join(", "))
            };
            ApiError::Http { status: response.status, message, details }
        }
        _ => {
            let raw = match &response.body {
                ResponseBody::Json(value) => value.to_string(),
                ResponseBody::Text(text) => text.clone(),
            };
            ApiError::Http {
                status: response.status,
                message: format!(
                    "HTTP error {}: {} Raw Response: {}...",
                    response.status,
                    response.reason,
                    snippet(&raw, 200)
                ),
                details: Vec::new(),
            }
        }
    }
}

pub(crate) fn snippet(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
