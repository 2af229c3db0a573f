use thiserror::Error;

#[derive(Error, Debug)]
pub enum StudyError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),
    #[error("Quiz error: {0}")]
    Quiz(#[from] QuizError),
    #[error("Missing input: {0}")]
    MissingInput(&'static str),
    #[error("No content has been processed yet")]
    NoContent,
    #[error("Result discarded: the session it belonged to was replaced")]
    Stale,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Connectivity(String),
    #[error("Request to {endpoint} timed out after {seconds} seconds. The server might be busy or the task is too complex. Please try again.")]
    Timeout { endpoint: String, seconds: u64 },
    #[error("{message}")]
    Http {
        status: u16,
        message: String,
        details: Vec<String>,
    },
    #[error("Server returned invalid JSON (Status: {status}). Check server logs.")]
    InvalidJson { status: u16 },
    #[error("Server reported failure: {0}")]
    Server(String),
    #[error("JSON deserialization error: {0}. Raw response: {1}")]
    Decode(#[source] serde_json::Error, String),
    #[error("Failed to parse quiz JSON after cleaning: {0}")]
    QuizPayload(String),
    #[error("Max retries exceeded for {endpoint} after {attempts} attempts: {last}")]
    MaxRetriesExceeded {
        endpoint: String,
        attempts: usize,
        last: String,
    },
}

impl ApiError {
    /// Only failures where no response was ever received are retried.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, ApiError::Connectivity(_))
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum QuizError {
    #[error("No question at index {0}")]
    IndexOutOfRange(usize),
    #[error("Quiz has already been submitted")]
    AlreadySubmitted,
    #[error("Every question must be answered before submitting")]
    NotAllAnswered,
    #[error("No active quiz")]
    NoActiveSet,
    #[error("Answer kind does not fit question {0}")]
    AnswerKindMismatch(usize),
    #[error("Invalid correct_answer format for matching: {0}")]
    MalformedMatchingKey(String),
}

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Could not parse mind map syntax")]
    ParseFailed,
    #[error("Mind map has no nodes to render")]
    Empty,
    #[error("No mind map renderer available")]
    NoRenderer,
    #[error("Renderer failed: {0}")]
    Backend(String),
    #[error("Failed to serialize graph elements: {0}")]
    Serialize(#[from] serde_json::Error),
}
