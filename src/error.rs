use thiserror::Error;

/// Fallback message for non-success responses that carry no `detail` field
pub const GENERIC_FAILURE_MESSAGE: &str = "Request failed";

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Transport-level failures (connection refused, reset, undecodable body)
    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx response from the backend
    #[error("{message}")]
    Server { status: u16, message: String },

    /// Unknown incident id
    #[error("Not found: {0}")]
    NotFound(String),

    /// Client-side validation, raised before any request is sent
    #[error("Validation error: {0}")]
    Validation(String),

    /// Backward navigation with an empty cursor history
    #[error("No previous page")]
    NoHistory,

    /// A response superseded by a later request for the same key
    #[error("Stale response discarded")]
    Stale,

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AppError {
    /// Build a server error, falling back to the generic message when the
    /// response carried none.
    pub fn server(status: u16, message: Option<String>) -> Self {
        AppError::Server {
            status,
            message: message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_string()),
        }
    }

    /// Get error code string
    pub fn error_code(&self) -> &str {
        match self {
            AppError::Network(_) => "NETWORK_FAILURE",
            AppError::Server { .. } => "SERVER_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::NoHistory => "NO_HISTORY",
            AppError::Stale => "STALE",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::Io(_) => "IO_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Whether a user-triggered retry (refresh or re-navigation) can succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::Network(_) | AppError::Server { .. } | AppError::NotFound(_)
        )
    }

    /// Message stored in a cache entry and shown next to the data
    pub fn user_message(&self) -> String {
        match self {
            AppError::Server { message, .. } => message.clone(),
            AppError::NotFound(_) => "Incident not found".to_string(),
            other => other.to_string(),
        }
    }
}

/// Conversion from serde_json::Error
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Conversion from validator::ValidationErrors
impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

/// Conversion from config::ConfigError
impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

/// Conversion from reqwest::Error
impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AppError::Serialization(err.to_string())
        } else {
            AppError::Network(err.to_string())
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;
