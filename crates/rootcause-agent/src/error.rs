use rootcause_llm::ReasoningError;
use rootcause_store::StoreError;

/// Shown to the reporter when the reasoning service stays overloaded.
pub const RATE_LIMITED_FALLBACK: &str = "The reasoning service is currently overloaded. \
Investigation progress has been saved; resume the session shortly to continue.";

/// Shown to the reporter when the reasoning service fails outright.
pub const SERVICE_FAILURE_FALLBACK: &str = "The investigation could not reach the reasoning \
service. Progress up to the last completed step has been saved; retry, or start over with --fresh.";

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("reasoning service rate limited: {source}")]
    RateLimited {
        fallback: String,
        #[source]
        source: ReasoningError,
    },
    #[error("reasoning service failed: {source}")]
    ReasoningFailed {
        fallback: String,
        #[source]
        source: ReasoningError,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),
    #[error("failed to schedule continuation: {0}")]
    Continuation(String),
    #[error("session '{session_id}' did not finish within {bound} invocations")]
    InvocationBound { session_id: String, bound: u64 },
}

impl AgentError {
    pub fn fallback_message(&self) -> Option<&str> {
        match self {
            AgentError::RateLimited { fallback, .. }
            | AgentError::ReasoningFailed { fallback, .. } => Some(fallback),
            _ => None,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, AgentError::RateLimited { .. })
    }
}

impl From<ReasoningError> for AgentError {
    fn from(source: ReasoningError) -> Self {
        if source.is_rate_limited() {
            AgentError::RateLimited {
                fallback: RATE_LIMITED_FALLBACK.to_string(),
                source,
            }
        } else {
            AgentError::ReasoningFailed {
                fallback: SERVICE_FAILURE_FALLBACK.to_string(),
                source,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasoning_errors_carry_fallback_messages() {
        let limited = AgentError::from(ReasoningError::rate_limited("429"));
        assert!(limited.is_rate_limited());
        assert_eq!(limited.fallback_message(), Some(RATE_LIMITED_FALLBACK));

        let failed = AgentError::from(ReasoningError::Service("boom".to_string()));
        assert!(!failed.is_rate_limited());
        assert_eq!(failed.fallback_message(), Some(SERVICE_FAILURE_FALLBACK));
        assert!(failed.to_string().contains("boom"));
    }
}
