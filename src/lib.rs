pub mod api;
pub mod chat;
pub mod clients;
pub mod config;
pub mod core;
pub mod error;
pub mod flashcards;
pub mod json_utils;
pub mod mindmap;
pub mod notes;
pub mod quiz;
pub mod session;
pub mod store;

// Convenient re-exports
pub use crate::core::{ApiClient, RetryConfig, Transport};
pub use error::{ApiError, QuizError, StudyError};
pub use mindmap::parse as parse_mindmap;
pub use store::StudyStore;
