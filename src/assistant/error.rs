//! Error types for the assistants client.

use thiserror::Error;

/// Failures while driving an assistant exchange.
///
/// Transport-level and rate-limit failures are retried by the client's
/// retry policy; whatever survives the retries reaches the caller.
#[derive(Debug, Error)]
pub enum AssistantError {
    /// The service returned HTTP 429.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Any other HTTP error (invalid key, server error, bad request).
    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    /// The run reached a terminal state other than `completed`.
    #[error("assistant run ended with status {0}")]
    RunFailed(String),

    /// Polling exceeded the configured run timeout.
    #[error("timed out waiting for the assistant run to complete")]
    Timeout,

    /// The run completed but produced no assistant text.
    #[error("assistant returned no text reply")]
    EmptyReply,

    /// Underlying network failure (DNS, refused connection, timeout).
    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_display() {
        let err = AssistantError::ApiError {
            status: 401,
            message: "Invalid API key".into(),
        };
        assert_eq!(err.to_string(), "API error (status 401): Invalid API key");
    }

    #[test]
    fn run_failed_display() {
        let err = AssistantError::RunFailed("expired".into());
        assert_eq!(err.to_string(), "assistant run ended with status expired");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AssistantError>();
    }
}
