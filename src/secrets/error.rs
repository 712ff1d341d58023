//! Error types for secret-store operations.

use thiserror::Error;

/// Result type for secret-store operations.
pub type Result<T> = std::result::Result<T, SecretsError>;

/// Errors that can occur while talking to the secret backend.
#[derive(Error, Debug)]
pub enum SecretsError {
    /// Client configuration is unusable. Fatal at construction.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// The backend holds nothing at the requested path.
    #[error("Secret not found: {key}")]
    NotFound { key: String },

    /// The secret was rejected before being written.
    #[error("Invalid secret: {message}")]
    Validation { message: String, field: Option<String> },

    /// Network failure or non-2xx response from the backend.
    #[error("{}", transport_message(.context, .status, .message))]
    Transport { context: Option<String>, status: Option<u16>, message: String },

    /// The backend returned a payload that does not match the expected shape.
    #[error("Unexpected payload shape: {message}")]
    Shape { message: String },

    /// The identity handshake or a token renewal failed.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn transport_message(context: &Option<String>, status: &Option<u16>, message: &str) -> String {
    let mut out = String::from("Backend request failed");
    if let Some(context) = context {
        out.push_str(&format!(" ({})", context));
    }
    if let Some(status) = status {
        out.push_str(&format!(" with status {}", status));
    }
    out.push_str(": ");
    out.push_str(message);
    out
}

impl SecretsError {
    /// Create a config error.
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }

    /// Create a not found error.
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into(), field: None }
    }

    /// Create a validation error pointing at a specific field.
    pub fn validation_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Validation { message: message.into(), field: Some(field.into()) }
    }

    /// Create a transport error without a status code (network failure).
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport { context: None, status: None, message: message.into() }
    }

    /// Create a transport error for a non-2xx backend response.
    pub fn http_status(status: u16, message: impl Into<String>) -> Self {
        Self::Transport { context: None, status: Some(status), message: message.into() }
    }

    /// Create a shape error.
    pub fn shape(message: impl Into<String>) -> Self {
        Self::Shape { message: message.into() }
    }

    /// Create an authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication { message: message.into() }
    }

    /// Attach operation context (operation name and secret identity) to a
    /// transport or shape error. Other kinds already describe themselves.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        match self {
            Self::Transport { status, message, .. } => {
                Self::Transport { context: Some(context.into()), status, message }
            }
            Self::Shape { message } => {
                Self::Shape { message: format!("{}: {}", context.into(), message) }
            }
            other => other,
        }
    }

    /// Whether this error means the backend had nothing at the path.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// HTTP status reported by the backend, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport { status, .. } => *status,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for SecretsError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport {
            context: None,
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}
