//! Content-session generations.
//!
//! Each remote flow captures a [`SessionToken`] before awaiting. Loading new
//! content advances the clock, so results that belong to the previous
//! content can be recognised and dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct SessionClock {
    generation: Arc<AtomicU64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionToken(u64);

impl SessionClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> SessionToken {
        SessionToken(self.generation.load(Ordering::SeqCst))
    }

    /// Start a new session; every outstanding token becomes stale.
    pub fn advance(&self) -> SessionToken {
        SessionToken(self.generation.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, token: SessionToken) -> bool {
        self.token() == token
    }
}
