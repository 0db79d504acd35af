//! Error types for the registration funnel.

use std::time::Duration;

/// Top-level error type for the crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Funnel error: {0}")]
    Funnel(#[from] FunnelError),

    #[error("Submission error: {0}")]
    Submission(#[from] SubmissionError),

    #[error("Admin error: {0}")]
    Admin(#[from] AdminError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Session store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to open store: {0}")]
    Open(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Local input errors raised while collecting form data.
///
/// These never move the funnel; the user corrects the field and retries.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    MissingField { field: &'static str },

    #[error("Missing required fields: {}", fields.join(", "))]
    MissingFields { fields: Vec<&'static str> },

    #[error("Invalid value for {field}: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("Unknown field: {0}")]
    UnknownField(String),
}

/// Failures talking to the registration endpoint.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmissionError {
    /// The server refused the application. Terminal for the session.
    #[error("Registration declined: {message}")]
    Declined { message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Server returned {status}: {message}")]
    Server { status: u16, message: String },

    #[error("Invalid response from registration service: {0}")]
    InvalidResponse(String),
}

impl SubmissionError {
    /// Whether the same submission may be tried again.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Declined { .. })
    }

    /// Message suitable for showing to the applicant.
    pub fn user_message(&self) -> String {
        match self {
            Self::Declined { message } => message.clone(),
            Self::Network(_) | Self::Timeout(_) => {
                "Network error. Please try again later.".to_string()
            }
            Self::Server { .. } | Self::InvalidResponse(_) => {
                "The registration service is unavailable. Please try again.".to_string()
            }
        }
    }
}

/// Admin viewer errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdminError {
    #[error("Invalid Secret Key")]
    Unauthorized,

    #[error("Not logged in")]
    NotLoggedIn,

    #[error("Network Error or Server Offline: {0}")]
    Network(String),

    #[error("Server returned {status}")]
    Server { status: u16 },

    #[error("Invalid response from admin API: {0}")]
    InvalidResponse(String),
}

/// Errors raised by the funnel state machines and their coordinators.
#[derive(Debug, thiserror::Error)]
pub enum FunnelError {
    #[error("Action {action} is not valid in step {step}")]
    InvalidAction { step: String, action: String },

    #[error("Session is finished ({step}); reset to start again")]
    Terminal { step: String },

    #[error("A submission is already in progress")]
    SubmissionInFlight,

    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    Submission(#[from] SubmissionError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
