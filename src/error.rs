// Error types shared by every layer of the storefront client

use thiserror::Error;

// Fallback shown when the server gives us nothing usable
pub const GENERIC_FAILURE_MESSAGE: &str = "Something went wrong, please try again";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    #[error("Unauthorized: {}", .message.as_deref().unwrap_or("session cleared"))]
    Unauthorized { message: Option<String> },

    #[error("API error: {status} - {}", .message.as_deref().unwrap_or("no message"))]
    Api {
        status: u16,
        message: Option<String>,
        errors: Vec<String>,
    },

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Other error: {0}")]
    Other(String),
}

impl ApiError {
    /// Message suitable for an inline error panel.
    ///
    /// Server-provided text wins; the server does not always send one, so
    /// every other case degrades to [`GENERIC_FAILURE_MESSAGE`].
    pub fn user_message(&self) -> String {
        self.server_message()
            .unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_string())
    }

    /// The server's own explanation, if the response carried one.
    pub fn server_message(&self) -> Option<String> {
        match self {
            ApiError::Api { message, errors, .. } => message
                .iter()
                .chain(errors.iter())
                .map(|m| m.trim())
                .find(|m| !m.is_empty())
                .map(str::to_string),
            ApiError::Unauthorized { message } => message
                .as_deref()
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::to_string),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Api { status, .. } => Some(*status),
            ApiError::Unauthorized { .. } => Some(401),
            _ => None,
        }
    }

    // Validation and auth failures are final; transport and server trouble is not
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Network(_) | ApiError::Timeout(_) => true,
            ApiError::Api { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::Deserialization(e.to_string())
    }
}

impl From<std::io::Error> for ApiError {
    fn from(e: std::io::Error) -> Self {
        ApiError::Storage(e.to_string())
    }
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Initialization error: {0}")]
    InitError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_prefers_server_message() {
        let err = ApiError::Api {
            status: 400,
            message: Some("Trip is fully booked".to_string()),
            errors: vec![],
        };
        assert_eq!(err.user_message(), "Trip is fully booked");
    }

    #[test]
    fn user_message_falls_back_to_error_list_then_generic() {
        let err = ApiError::Api {
            status: 422,
            message: Some("  ".to_string()),
            errors: vec!["Phone is required".to_string()],
        };
        assert_eq!(err.user_message(), "Phone is required");

        let err = ApiError::Api {
            status: 500,
            message: None,
            errors: vec![],
        };
        assert_eq!(err.user_message(), GENERIC_FAILURE_MESSAGE);
        assert_eq!(
            ApiError::Network("connection refused".into()).user_message(),
            GENERIC_FAILURE_MESSAGE
        );
    }

    #[test]
    fn unauthorized_keeps_server_text() {
        let err = ApiError::Unauthorized {
            message: Some("Invalid email or password".to_string()),
        };
        assert_eq!(err.user_message(), "Invalid email or password");
        assert_eq!(err.status(), Some(401));
        assert_eq!(
            ApiError::Unauthorized { message: None }.user_message(),
            GENERIC_FAILURE_MESSAGE
        );
    }

    #[test]
    fn retryable_classification() {
        assert!(ApiError::Network("reset".into()).is_retryable());
        assert!(ApiError::Timeout(30_000).is_retryable());
        assert!(ApiError::Api { status: 503, message: None, errors: vec![] }.is_retryable());
        assert!(ApiError::Api { status: 429, message: None, errors: vec![] }.is_retryable());
        assert!(!ApiError::Api { status: 400, message: None, errors: vec![] }.is_retryable());
        assert!(!ApiError::Unauthorized { message: None }.is_retryable());
        assert!(!ApiError::Deserialization("eof".into()).is_retryable());
    }
}
