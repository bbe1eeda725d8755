use thiserror::Error;

/// Failure of a single call to the chat-completion gateway.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GatewayError {
    /// Transport failure, timeout or non-2xx status.
    #[error("network failure: {message}")]
    Network { message: String, status: Option<u16> },

    /// The body was empty, unparsable or not the requested shape.
    #[error("unexpected response shape: {0}")]
    ResponseShape(String),

    /// Missing or invalid key / base URL.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),
}

impl GatewayError {
    pub fn network(message: impl Into<String>) -> Self {
        GatewayError::Network {
            message: message.into(),
            status: None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::Network { .. })
    }
}

/// Background checks: a failure is swapped for a safe default and never reaches the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SoftFailure;

impl SoftFailure {
    pub fn settle<T, F>(self, outcome: Result<T, GatewayError>, fallback: F) -> T
    where
        F: FnOnce(&GatewayError) -> T,
    {
        outcome.unwrap_or_else(|err| fallback(&err))
    }
}

/// Primary user actions: a failure is passed to the orchestrator, which shows it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HardFailure;

impl HardFailure {
    pub fn settle<T>(self, outcome: Result<T, GatewayError>) -> Result<T, GatewayError> {
        if let Err(err) = &outcome {
            tracing::debug!(retryable = err.is_retryable(), "Surfacing gateway failure: {}", err);
        }
        outcome
    }
}

/// Rejected estimator inputs.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum InputError {
    #[error("{field} must be a finite number")]
    NotFinite { field: &'static str },
    #[error("{field} must not be negative")]
    Negative { field: &'static str },
    #[error("{field} must be greater than zero")]
    NotPositive { field: &'static str },
    #[error("{field} must be between {min} and {max}")]
    OutOfRange {
        field: &'static str,
        min: u32,
        max: u32,
    },
}

/// Raised by the analysis reducer for an event that does not fit the current stage.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("event {event} is not valid in stage {stage}")]
pub struct TransitionError {
    pub stage: String,
    pub event: String,
}
