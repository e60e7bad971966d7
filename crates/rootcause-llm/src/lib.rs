//! Reasoning service clients.
//!
//! Everything above this crate talks to the model through [`ReasoningClient`]:
//! submit a prompt, get text back. Overload handling lives in
//! [`RetryingClient`], which wraps any client and retries the rate-limit class
//! of failures with capped, jittered exponential backoff.

mod http;
mod retry;

pub use http::ChatCompletionsClient;
pub use retry::{RetryPolicy, RetryingClient};

use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReasoningError {
    /// The service asked us to slow down (HTTP 429 or an overload status).
    #[error("reasoning service rate limited after {attempts} attempt(s): {detail}")]
    RateLimited {
        attempts: u32,
        retry_after: Option<Duration>,
        detail: String,
    },
    #[error("reasoning service error: {0}")]
    Service(String),
}

impl ReasoningError {
    pub fn rate_limited(detail: impl Into<String>) -> Self {
        ReasoningError::RateLimited {
            attempts: 1,
            retry_after: None,
            detail: detail.into(),
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ReasoningError::RateLimited { .. })
    }
}

pub trait ReasoningClient {
    fn submit(&self, prompt: &str) -> Result<String, ReasoningError>;
}

impl<T: ReasoningClient + ?Sized> ReasoningClient for Arc<T> {
    fn submit(&self, prompt: &str) -> Result<String, ReasoningError> {
        (**self).submit(prompt)
    }
}

impl<T: ReasoningClient + ?Sized> ReasoningClient for Box<T> {
    fn submit(&self, prompt: &str) -> Result<String, ReasoningError> {
        (**self).submit(prompt)
    }
}
