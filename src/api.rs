//! Backend endpoints used by a fill session

use crate::config::ClientConfig;
use crate::error::{FormError, Result};
use crate::schema::Form;
use crate::submission::{SubmitResponse, Submission};
use crate::transport::{RequestBody, Transport};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::OnceLock;

pub const INVALID_EMAIL_MESSAGE: &str = "Enter valid mail address to continue";
pub const EMPTY_AI_INPUT_MESSAGE: &str = "Please enter some text to describe your response";

/// Local shape check before asking the backend to mail a code
pub fn is_valid_email(email: &str) -> bool {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL
        .get_or_init(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").ok())
        .as_ref()
        .map(|re| re.is_match(email))
        .unwrap_or(false)
}

/// Reply of the code re-send endpoint
#[derive(Clone, Debug, Deserialize)]
pub struct UserCodeResponse {
    #[serde(default)]
    pub detail: String,
}

#[derive(Clone, Debug, Serialize)]
struct AiFillRequest<'a> {
    #[serde(rename = "formId")]
    form_id: &'a str,
    #[serde(rename = "userInput")]
    user_input: &'a str,
}

/// Suggested answers produced from a natural-language description
#[derive(Clone, Debug, Default, Deserialize)]
pub struct AiFillResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub responses: HashMap<String, Value>,
}

/// Typed access to the forms backend
#[derive(Clone)]
pub struct FormsApi {
    transport: Transport,
}

impl FormsApi {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Ok(Self::with_transport(Transport::new(config)?))
    }

    pub fn with_transport(transport: Transport) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Warm the anti-forgery token; None when the server cannot issue one
    pub async fn init_csrf(&self) -> Option<String> {
        self.transport.tokens().token().await
    }

    /// Fetch a form with its questions sorted into display order
    pub async fn fetch_form(&self, form_id: &str) -> Result<Form> {
        let mut form: Form = self
            .transport
            .get(&format!("/forms/{}/", form_id), None)
            .await?;
        form.sort_questions();
        tracing::info!(
            "Fetched form {} with {} questions",
            form.id,
            form.form_questions.len()
        );
        Ok(form)
    }

    /// Send an assembled submission
    pub async fn submit(&self, submission: &Submission) -> Result<SubmitResponse> {
        let body = submission.to_body()?;
        let encoding = match body {
            RequestBody::Multipart(_) => "multipart",
            _ => "json",
        };
        tracing::info!(
            "Submitting form {} as {} ({} files)",
            submission.form_id,
            encoding,
            submission.files.len()
        );
        self.transport.post("/forms/submit", &body).await
    }

    /// Ask the backend to e-mail the respondent their access code
    pub async fn resend_code(&self, email: &str) -> Result<String> {
        if email.trim().is_empty() || !is_valid_email(email) {
            return Err(FormError::Validation {
                question_id: "email".into(),
                message: INVALID_EMAIL_MESSAGE.into(),
            });
        }
        let response: UserCodeResponse = self
            .transport
            .get("/resend_code/", Some(&[("email", email)]))
            .await?;
        Ok(response.detail)
    }

    /// Ask the backend to draft answers from free text
    pub async fn ai_fill(&self, form_id: &str, user_input: &str) -> Result<AiFillResponse> {
        if user_input.trim().is_empty() {
            return Err(FormError::Validation {
                question_id: "userInput".into(),
                message: EMPTY_AI_INPUT_MESSAGE.into(),
            });
        }
        let body = serde_json::to_value(AiFillRequest {
            form_id,
            user_input: user_input.trim(),
        })?;
        self.transport
            .post("/forms/ai-fill", &RequestBody::Json(body))
            .await
    }
}
