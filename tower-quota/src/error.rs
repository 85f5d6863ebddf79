use std::fmt::Display;
use std::time::Duration;

use quota_ledger::ConfigurationError;
use tower::BoxError;

/// Error code the remote service answers with when it rate limits a request.
pub const REQUEST_THROTTLED: &str = "RequestThrottled";

/// Errors produced by the throttling layer itself.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ThrottleError {
    /// The action is unknown or the quota table is invalid.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Waiting for quota would take longer than the caller allowed.
    ///
    /// No tokens were consumed. `retry_after` is the wait the bucket reported, or
    /// `None` if the deadline passed while queued behind other callers.
    #[error("waiting for quota on `{action}` would exceed {max_wait:?}")]
    QuotaExceededTimeout {
        action: String,
        max_wait: Duration,
        retry_after: Option<Duration>,
    },
}

/// Outcome of a failed throttled call.
#[derive(Debug, thiserror::Error)]
pub enum CallError<E> {
    /// The call never reached the remote service.
    #[error(transparent)]
    Throttle(#[from] ThrottleError),

    /// The remote service rejected the call as rate limited despite local metering.
    #[error("remote service throttled the request: {0}")]
    RemoteThrottled(E),

    /// Any other failure reported by the remote invoker.
    #[error("remote call failed: {0}")]
    Remote(E),
}

impl<E> CallError<E> {
    /// The remote error, if the call got as far as the remote service.
    pub fn remote(&self) -> Option<&E> {
        match self {
            Self::RemoteThrottled(err) | Self::Remote(err) => Some(err),
            Self::Throttle(_) => None,
        }
    }

    pub fn into_remote(self) -> Result<E, ThrottleError> {
        match self {
            Self::RemoteThrottled(err) | Self::Remote(err) => Ok(err),
            Self::Throttle(err) => Err(err),
        }
    }

    pub fn is_remote_throttled(&self) -> bool {
        matches!(self, Self::RemoteThrottled(_))
    }
}

/// Classification of errors returned by a remote invoker.
pub trait RemoteError: Display {
    /// Whether the remote service refused the call because of its own rate limit.
    fn is_throttled(&self) -> bool {
        false
    }
}

/// An error reported by the remote service.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ServiceError {
    pub code: String,
    pub message: String,
    /// HTTP status of the response, when one was received.
    pub status: Option<u16>,
}

impl ServiceError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            status: None,
        }
    }

    pub fn throttled(message: impl Into<String>) -> Self {
        Self::new(REQUEST_THROTTLED, message).with_status(503)
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

impl RemoteError for ServiceError {
    fn is_throttled(&self) -> bool {
        self.code == REQUEST_THROTTLED
    }
}

impl RemoteError for BoxError {
    fn is_throttled(&self) -> bool {
        self.downcast_ref::<ServiceError>()
            .is_some_and(RemoteError::is_throttled)
    }
}
