//! Error classification and user-facing messages
//!
//! Upstream failures are logged in full but reach clients only as one of a
//! few fixed sentences, chosen by [`ErrorCategory`].

use std::fmt;

use crate::backend::BackendError;

/// Generic message used when nothing more specific applies
pub const GENERIC_ERROR_MESSAGE: &str = "AI service temporarily unavailable, please try again later";

/// Broad category of a generation failure
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Connection refused, reset or dropped
    Network,
    /// Upstream did not answer in time
    Timeout,
    /// Upstream rejected the credentials
    Authentication,
    /// Upstream quota or rate limit hit
    RateLimited,
    /// Model missing or unavailable upstream
    ModelUnavailable,
    /// Upstream rejected the request as malformed
    InvalidRequest,
    /// Upstream server-side failure
    Internal,
    /// Unclassified
    Unknown,
}

impl ErrorCategory {
    /// Classify an upstream transport error
    #[must_use]
    pub fn classify(error: &BackendError) -> Self {
        match error {
            BackendError::Connect(_) | BackendError::Stream(_) => Self::Network,
            BackendError::Timeout(_) => Self::Timeout,
            BackendError::Status { status, .. } => match status {
                401 | 403 => Self::Authentication,
                429 => Self::RateLimited,
                404 => Self::ModelUnavailable,
                400 | 413 | 422 => Self::InvalidRequest,
                500..=599 => Self::Internal,
                _ => Self::Unknown,
            },
            BackendError::Request(_) => Self::Unknown,
        }
    }

    /// Message safe to show to a client
    #[must_use]
    pub fn user_message(self) -> &'static str {
        match self {
            Self::Network => "Could not reach the AI service, please check the connection and try again",
            Self::Timeout => "The AI service took too long to respond, please try again later",
            Self::Authentication => "The AI service rejected our credentials, please contact the administrator",
            Self::RateLimited => "The AI service is busy right now, please try again in a moment",
            Self::ModelUnavailable => "The selected model is currently unavailable, please choose another model",
            Self::InvalidRequest => "The AI service could not process this request, please rephrase and try again",
            Self::Internal | Self::Unknown => GENERIC_ERROR_MESSAGE,
        }
    }

    /// Whether the failure is transient
    #[must_use]
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            Self::Network | Self::Timeout | Self::RateLimited | Self::Internal
        )
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::Authentication => "authentication",
            Self::RateLimited => "rate_limited",
            Self::ModelUnavailable => "model_unavailable",
            Self::InvalidRequest => "invalid_request",
            Self::Internal => "internal",
            Self::Unknown => "unknown",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn status(code: u16) -> BackendError {
        BackendError::Status {
            status: code,
            body: "secret upstream detail".into(),
        }
    }

    #[test]
    fn test_classify_statuses() {
        assert_eq!(ErrorCategory::classify(&status(401)), ErrorCategory::Authentication);
        assert_eq!(ErrorCategory::classify(&status(429)), ErrorCategory::RateLimited);
        assert_eq!(ErrorCategory::classify(&status(404)), ErrorCategory::ModelUnavailable);
        assert_eq!(ErrorCategory::classify(&status(400)), ErrorCategory::InvalidRequest);
        assert_eq!(ErrorCategory::classify(&status(503)), ErrorCategory::Internal);
        assert_eq!(ErrorCategory::classify(&status(302)), ErrorCategory::Unknown);
    }

    #[test]
    fn test_classify_transport() {
        assert_eq!(
            ErrorCategory::classify(&BackendError::Connect("refused".into())),
            ErrorCategory::Network
        );
        assert_eq!(
            ErrorCategory::classify(&BackendError::Timeout(Duration::from_secs(30))),
            ErrorCategory::Timeout
        );
        assert_eq!(
            ErrorCategory::classify(&BackendError::Stream("connection reset by peer".into())),
            ErrorCategory::Network
        );
    }

    #[test]
    fn test_messages_do_not_leak_details() {
        let message = ErrorCategory::classify(&status(500)).user_message();
        assert_eq!(message, GENERIC_ERROR_MESSAGE);
        assert!(!message.contains("secret"));
    }

    #[test]
    fn test_transient_categories() {
        assert!(ErrorCategory::Network.is_transient());
        assert!(ErrorCategory::Internal.is_transient());
        assert!(!ErrorCategory::Authentication.is_transient());
        assert!(!ErrorCategory::InvalidRequest.is_transient());
    }
}
