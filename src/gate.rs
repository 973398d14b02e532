//! Access-code dialog state

use crate::error::{FormError, Result};
use std::fmt;

/// Conventional length of an issued code; input is capped here
pub const CODE_LENGTH: usize = 6;

pub const CODE_REQUIRED_MESSAGE: &str = "User code is required";

/// Upper-cased, trimmed, non-empty code
#[derive(Clone, PartialEq, Eq)]
pub struct AccessCode(String);

impl AccessCode {
    pub fn parse(raw: &str) -> Result<Self> {
        let code = raw.trim().to_uppercase();
        if code.is_empty() {
            return Err(FormError::AccessCode(CODE_REQUIRED_MESSAGE.into()));
        }
        Ok(Self(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Matches the six-character convention (advisory only; the server decides)
    pub fn is_conventional(&self) -> bool {
        self.0.chars().count() == CODE_LENGTH && self.0.chars().all(|c| c.is_ascii_alphanumeric())
    }
}

// Codes never end up in logs in full
impl fmt::Debug for AccessCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccessCode({})", crate::telemetry::redact(&self.0))
    }
}

/// The dialog guarding final submission
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AccessCodeGate {
    open: bool,
    code: String,
    error: Option<String>,
}

impl AccessCodeGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open with a blank code and no error
    pub fn open(&mut self) {
        self.open = true;
        self.code.clear();
        self.error = None;
    }

    /// Close and forget everything typed
    pub fn close(&mut self) {
        self.open = false;
        self.code.clear();
        self.error = None;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Replace the typed code; trimmed, upper-cased, capped at `CODE_LENGTH`, clears the error
    pub fn input(&mut self, raw: &str) {
        self.code = raw.trim().to_uppercase().chars().take(CODE_LENGTH).collect();
        self.error = None;
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Whether the confirm action is enabled
    pub fn can_confirm(&self) -> bool {
        self.open && !self.code.trim().is_empty()
    }

    /// Validate the typed code; on failure the message is shown in the dialog
    pub fn confirm(&mut self) -> Result<AccessCode> {
        if !self.open {
            return Err(FormError::State("access code dialog is not open".into()));
        }
        match AccessCode::parse(&self.code) {
            Ok(code) => {
                self.error = None;
                Ok(code)
            }
            Err(e) => {
                self.error = Some(e.user_message());
                Err(e)
            }
        }
    }

    /// Show a failure while keeping the dialog and the typed code
    pub fn reject(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }
}
