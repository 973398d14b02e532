//! Per-question validation and form-level readiness
//!
//! Everything here is a pure function of the schema and the current answer
//! state; callers recompute after every mutation.

use crate::answers::{AnswerMap, AnswerValue, BoundFile, FileBindings};
use crate::schema::{AnswerType, Form, Question};
use serde::Serialize;

pub const REQUIRED_MESSAGE: &str = "This field is required";

/// Outcome of validating one question
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Validation {
    pub valid: bool,
    pub message: Option<String>,
}

impl Validation {
    pub fn ok() -> Self {
        Self {
            valid: true,
            message: None,
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            message: Some(message.into()),
        }
    }
}

/// Validate one question against its current value and, for file
/// questions, its bound file.
pub fn validate(question: &Question, value: Option<&AnswerValue>, file: Option<&BoundFile>) -> Validation {
    if question.answer_type == AnswerType::File {
        return validate_file(question, file);
    }

    if question.required && !is_present(value) {
        return Validation::invalid(REQUIRED_MESSAGE);
    }

    if question.answer_type == AnswerType::Text {
        if let Some(AnswerValue::Text(text)) = value {
            if let Some(message) = text_length_error(question, text) {
                return Validation::invalid(message);
            }
        }
    }

    Validation::ok()
}

/// Required-field presence, by value shape
fn is_present(value: Option<&AnswerValue>) -> bool {
    match value {
        None => false,
        Some(AnswerValue::Boolean(_)) => true,
        Some(AnswerValue::Number(_)) => true,
        Some(AnswerValue::Text(text)) => !text.trim().is_empty(),
        Some(AnswerValue::Choices(items)) => !items.is_empty(),
        Some(AnswerValue::File(_)) => true,
    }
}

fn text_length_error(question: &Question, text: &str) -> Option<String> {
    if text.trim().is_empty() {
        return None;
    }
    let len = text.chars().count();
    if question.min_len > 0 && len < question.min_len as usize {
        return Some(format!("Minimum {} characters required", question.min_len));
    }
    if question.max_len > 0 && len > question.max_len as usize {
        return Some(format!("Maximum {} characters allowed", question.max_len));
    }
    None
}

fn validate_file(question: &Question, file: Option<&BoundFile>) -> Validation {
    let Some(file) = file else {
        return if question.required {
            Validation::invalid(REQUIRED_MESSAGE)
        } else {
            Validation::ok()
        };
    };

    if let Some(message) = file_size_error(question, file.size_mb()) {
        return Validation::invalid(message);
    }

    if let Some(accept) = question.accept() {
        if !file.content_type.is_empty() && !accept.accepts(&file.content_type) {
            return Validation::invalid(format!("File type not accepted. {}", accept.description()));
        }
    }

    Validation::ok()
}

/// Size check in megabytes with 0 meaning unbounded
pub fn file_size_error(question: &Question, size_mb: f64) -> Option<String> {
    if question.min_len > 0 && size_mb < question.min_len as f64 {
        return Some(format!("File size must be at least {} MB", question.min_len));
    }
    if question.max_len > 0 && size_mb > question.max_len as f64 {
        return Some(format!("File size must be less than {} MB", question.max_len));
    }
    None
}

/// Validate `question` against the session maps
pub fn validate_in(question: &Question, answers: &AnswerMap, files: &FileBindings) -> Validation {
    validate(question, answers.get(&question.id), files.get(&question.id))
}

/// Required-question completion across a form
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Readiness {
    pub completed: usize,
    pub required: usize,
    pub form_valid: bool,
}

impl Readiness {
    /// Completion percentage, 100 when nothing is required
    pub fn percent(&self) -> f64 {
        if self.required == 0 {
            return 100.0;
        }
        self.completed as f64 / self.required as f64 * 100.0
    }
}

/// Compute progress and overall validity in display order
pub fn readiness(form: &Form, answers: &AnswerMap, files: &FileBindings) -> Readiness {
    let mut required = 0;
    let mut completed = 0;
    for question in form.required_questions() {
        required += 1;
        if validate_in(question, answers, files).valid {
            completed += 1;
        }
    }
    Readiness {
        completed,
        required,
        form_valid: completed == required,
    }
}

/// True when every required question passes validation
pub fn is_form_valid(form: &Form, answers: &AnswerMap, files: &FileBindings) -> bool {
    form.required_questions()
        .all(|q| validate_in(q, answers, files).valid)
}
