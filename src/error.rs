//! Error types
//!
//! One variant family per failure class a fill session can meet: local
//! validation, anti-forgery token trouble, access-code problems, transport
//! failures and schema problems.

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// Message shown when a transport failure carries nothing user-facing.
pub const GENERIC_SUBMIT_ERROR: &str = "An error occurred while submitting the form";

/// Result type alias for form operations
pub type Result<T> = std::result::Result<T, FormError>;

/// Form client error types
#[derive(Debug, Error)]
pub enum FormError {
    /// Required/length/size/type violation for one question, never sent to the server
    #[error("validation error on {question_id}: {message}")]
    Validation {
        question_id: String,
        message: String,
    },

    /// Anti-forgery token could not be obtained
    #[error("anti-forgery token unavailable")]
    Token,

    /// Access code missing or malformed locally
    #[error("access code error: {0}")]
    AccessCode(String),

    /// Server answered with a non-success status
    #[error("request rejected ({status}): {message}")]
    Rejected {
        status: u16,
        message: String,
        user_message: Option<String>,
    },

    /// Server answered 401; refreshing the anti-forgery token cannot fix this
    #[error("authentication required: {message}")]
    Unauthenticated { message: String },

    /// Submission is not allowed in the current session state
    #[error("invalid session state: {0}")]
    State(String),

    /// Unknown answer type or malformed options
    #[error("schema error on {question_id}: {message}")]
    Schema {
        question_id: String,
        message: String,
    },

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Local file error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),
}

impl FormError {
    /// Build a rejection from a response status and its (possibly non-JSON) body
    pub fn rejected(status: StatusCode, body: &[u8]) -> Self {
        let parsed = serde_json::from_slice::<Value>(body).ok();
        let user_message = parsed.as_ref().and_then(extract_user_message);
        let message = user_message
            .clone()
            .unwrap_or_else(|| String::from_utf8_lossy(body).trim().to_string());
        FormError::Rejected {
            status: status.as_u16(),
            message,
            user_message,
        }
    }

    /// Returns true if this is an authentication error (401)
    pub fn is_authentication_error(&self) -> bool {
        matches!(self, FormError::Unauthenticated { .. })
    }

    /// Returns true if this is an authorization error (403)
    pub fn is_authorization_error(&self) -> bool {
        matches!(self, FormError::Rejected { status: 403, .. })
    }

    /// Returns true if this is a local validation error
    pub fn is_validation_error(&self) -> bool {
        matches!(self, FormError::Validation { .. } | FormError::AccessCode(_))
    }

    /// Returns true if the user can fix this by trying again from the code dialog
    pub fn is_retryable(&self) -> bool {
        match self {
            FormError::Rejected { .. } | FormError::Token | FormError::AccessCode(_) => true,
            FormError::Validation { .. } => true,
            FormError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }

    /// Text to show inside the access-code dialog
    pub fn user_message(&self) -> String {
        match self {
            FormError::Rejected {
                user_message: Some(msg),
                ..
            } => msg.clone(),
            FormError::Validation { message, .. } => message.clone(),
            FormError::AccessCode(msg) => msg.clone(),
            FormError::Unauthenticated { message } if !message.is_empty() => message.clone(),
            _ => GENERIC_SUBMIT_ERROR.to_string(),
        }
    }
}

/// Pull a user-facing message out of a backend error body.
///
/// Priority: `message`, `error`, `detail`, then the first entry of
/// `non_field_errors`, then the first string in any field-error list.
pub fn extract_user_message(body: &Value) -> Option<String> {
    let obj = match body {
        Value::String(s) if !s.trim().is_empty() => return Some(s.clone()),
        Value::Object(obj) => obj,
        _ => return None,
    };

    for key in ["message", "error", "detail"] {
        if let Some(msg) = obj.get(key).and_then(first_string) {
            return Some(msg);
        }
    }

    if let Some(msg) = obj.get("non_field_errors").and_then(first_string) {
        return Some(msg);
    }

    obj.values()
        .filter(|v| v.is_array())
        .find_map(first_string)
}

fn first_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Array(items) => items.iter().find_map(first_string),
        _ => None,
    }
}
