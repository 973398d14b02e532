//! Fill session controller
//!
//! Owns the answer state for one form and drives the submission state
//! machine:
//!
//! ```text
//! Filling ──(required satisfied)──▶ ReadyToSubmit ──open_gate──▶ AwaitingCode
//!    ▲                                                               │ begin_submit
//!    │                                                               ▼
//!    └──────────── Submitted ◀──(ok)── Submitting ◀──────────── Assembling
//!                                          │
//!                                          └──(error)──▶ AwaitingCode
//! ```
//!
//! Every transition is a plain method call returning a value, so the whole
//! flow can be driven without any rendering surface.

use crate::answers::{AnswerMap, AnswerValue, BoundFile, ErrorMap, FileBindings};
use crate::api::FormsApi;
use crate::error::{FormError, Result};
use crate::gate::AccessCodeGate;
use crate::schema::{AnswerType, Form, Question};
use crate::submission::{assemble, SubmitResponse, Submission};
use crate::validation::{self, Readiness, Validation};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Where a session is in the submission flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SubmissionState {
    Filling,
    ReadyToSubmit,
    AwaitingCode,
    Assembling,
    Submitting,
    Submitted,
}

/// An assembled submission handed out for sending
#[derive(Debug, Clone)]
pub struct PendingSubmission {
    pub attempt: u64,
    pub submission: Submission,
}

/// Result of feeding a send result back into the session
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Accepted; session state was cleared
    Submitted(SubmitResponse),
    /// Rejected or failed; the message is shown in the code dialog
    Failed { message: String },
    /// The dialog was closed or the session reset while the request was in flight
    Superseded,
}

/// What applying externally drafted answers did to the answer map
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FillReport {
    pub applied: Vec<String>,
    /// (question id, reason)
    pub skipped: Vec<(String, String)>,
}

/// Pending problem with an attached file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileIssue {
    pub question_id: String,
    pub question: String,
    pub message: String,
}

/// Answer state and submission flow for one form
pub struct FillSession {
    id: Uuid,
    form: Form,
    answers: AnswerMap,
    files: FileBindings,
    errors: ErrorMap,
    gate: AccessCodeGate,
    state: SubmissionState,
    attempt: u64,
    last_response: Option<SubmitResponse>,
    submitted_at: Option<DateTime<Utc>>,
}

impl FillSession {
    pub fn new(mut form: Form) -> Self {
        form.sort_questions();
        let mut session = Self {
            id: Uuid::new_v4(),
            form,
            answers: AnswerMap::new(),
            files: FileBindings::new(),
            errors: ErrorMap::new(),
            gate: AccessCodeGate::new(),
            state: SubmissionState::Filling,
            attempt: 0,
            last_response: None,
            submitted_at: None,
        };
        session.refresh_state();
        tracing::debug!("Session {} started for form {}", session.id, session.form.id);
        session
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn form(&self) -> &Form {
        &self.form
    }

    pub fn answers(&self) -> &AnswerMap {
        &self.answers
    }

    pub fn files(&self) -> &FileBindings {
        &self.files
    }

    pub fn errors(&self) -> &ErrorMap {
        &self.errors
    }

    pub fn error(&self, question_id: &str) -> Option<&str> {
        self.errors.get(question_id).map(String::as_str)
    }

    pub fn gate(&self) -> &AccessCodeGate {
        &self.gate
    }

    pub fn state(&self) -> SubmissionState {
        self.state
    }

    /// Success indicator
    pub fn is_submitted(&self) -> bool {
        self.state == SubmissionState::Submitted
    }

    pub fn last_response(&self) -> Option<&SubmitResponse> {
        self.last_response.as_ref()
    }

    pub fn submitted_at(&self) -> Option<DateTime<Utc>> {
        self.submitted_at
    }

    // =========================================================================
    // Answer mutations
    // =========================================================================

    /// Set a non-file answer and revalidate that question
    pub fn set_answer(&mut self, question_id: &str, value: AnswerValue) -> Result<Validation> {
        let question = self.editable_question(question_id)?;
        if question.answer_type == AnswerType::File || !value.fits(&question.answer_type) {
            return Err(schema_error(
                question,
                format!("value does not fit a {} question", question.answer_type),
            ));
        }
        check_options(question, &value)?;

        self.answers.set(question_id, value);
        Ok(self.after_mutation(question_id))
    }

    pub fn set_text(&mut self, question_id: &str, text: &str) -> Result<Validation> {
        self.set_answer(question_id, AnswerValue::text(text))
    }

    /// Numeric input; anything unparsable clears the answer
    pub fn set_number(&mut self, question_id: &str, raw: &str) -> Result<Validation> {
        match AnswerValue::parse_number(raw) {
            Some(value) => self.set_answer(question_id, value),
            None => self.clear_answer(question_id),
        }
    }

    pub fn set_boolean(&mut self, question_id: &str, value: bool) -> Result<Validation> {
        self.set_answer(question_id, AnswerValue::Boolean(value))
    }

    /// Pick the single option of a radio or select question
    pub fn choose(&mut self, question_id: &str, option: &str) -> Result<Validation> {
        self.set_answer(question_id, AnswerValue::text(option))
    }

    /// Check or uncheck a checkbox option
    pub fn toggle_option(&mut self, question_id: &str, option: &str, checked: bool) -> Result<Validation> {
        let mut current = match self.answers.get(question_id) {
            Some(AnswerValue::Choices(items)) => items.clone(),
            _ => Vec::new(),
        };
        if checked {
            current.push(option.to_string());
        } else {
            current.retain(|item| item != option);
        }
        self.set_answer(question_id, AnswerValue::Choices(current))
    }

    pub fn clear_answer(&mut self, question_id: &str) -> Result<Validation> {
        self.editable_question(question_id)?;
        self.answers.remove(question_id);
        self.files.unbind(question_id);
        Ok(self.after_mutation(question_id))
    }

    /// Bind a file and record its metadata
    pub fn attach_file(&mut self, question_id: &str, file: BoundFile) -> Result<Validation> {
        let question = self.editable_question(question_id)?;
        if question.answer_type != AnswerType::File {
            return Err(schema_error(question, "not a file question".to_string()));
        }

        tracing::debug!("Attaching {} ({:.2} MB) to {}", file.name, file.size_mb(), question_id);
        self.answers.set(question_id, AnswerValue::File(file.descriptor()));
        self.files.bind(question_id, file);
        Ok(self.after_mutation(question_id))
    }

    /// Drop a file together with its metadata
    pub fn remove_file(&mut self, question_id: &str) -> Result<Validation> {
        self.clear_answer(question_id)
    }

    /// Feed drafted answers (AI fill, answer files) through the normal mutation path
    pub fn apply_answers(&mut self, responses: &HashMap<String, Value>) -> FillReport {
        let mut report = FillReport::default();
        let mut ids: Vec<_> = responses.keys().cloned().collect();
        ids.sort_by_key(|id| self.display_position(id));

        for id in ids {
            let raw = &responses[&id];
            let Some(question) = self.form.question(&id) else {
                report.skipped.push((id, "unknown question".into()));
                continue;
            };
            if question.answer_type == AnswerType::File {
                report.skipped.push((id, "file questions need an upload".into()));
                continue;
            }
            let Some(value) = AnswerValue::from_json(&question.answer_type, raw) else {
                let reason = format!("value does not fit a {} question", question.answer_type);
                report.skipped.push((id, reason));
                continue;
            };
            match self.set_answer(&id, value) {
                Ok(_) => report.applied.push(id),
                Err(e) => report.skipped.push((id, e.to_string())),
            }
        }

        tracing::info!(
            "Applied {} drafted answers, skipped {}",
            report.applied.len(),
            report.skipped.len()
        );
        report
    }

    // =========================================================================
    // Validation views
    // =========================================================================

    /// Current validation of one question
    pub fn validation(&self, question_id: &str) -> Option<Validation> {
        self.form
            .question(question_id)
            .map(|q| validation::validate_in(q, &self.answers, &self.files))
    }

    pub fn readiness(&self) -> Readiness {
        validation::readiness(&self.form, &self.answers, &self.files)
    }

    pub fn is_form_valid(&self) -> bool {
        validation::is_form_valid(&self.form, &self.answers, &self.files)
    }

    /// Every attached file currently failing its constraints
    pub fn file_issues(&self) -> Vec<FileIssue> {
        self.form
            .questions()
            .filter(|q| q.answer_type == AnswerType::File && self.files.get(&q.id).is_some())
            .filter_map(|q| {
                let result = validation::validate_in(q, &self.answers, &self.files);
                result.message.map(|message| FileIssue {
                    question_id: q.id.clone(),
                    question: q.question.clone(),
                    message,
                })
            })
            .collect()
    }

    /// Form valid and no attached file out of bounds
    pub fn can_submit(&self) -> bool {
        self.is_form_valid() && self.file_issues().is_empty()
    }

    /// Record the current message of every question, touched or not
    pub fn reveal_errors(&mut self) {
        let ids: Vec<_> = self.form.questions().map(|q| q.id.clone()).collect();
        for id in ids {
            self.revalidate(&id);
        }
    }

    // =========================================================================
    // Gate and submission
    // =========================================================================

    /// Open the access-code dialog
    pub fn open_gate(&mut self) -> Result<()> {
        if !matches!(self.state, SubmissionState::ReadyToSubmit | SubmissionState::AwaitingCode) {
            self.reveal_errors();
            return Err(FormError::State(format!(
                "cannot open access code dialog while {:?}",
                self.state
            )));
        }
        self.gate.open();
        self.state = SubmissionState::AwaitingCode;
        Ok(())
    }

    /// Type into the access-code field
    pub fn enter_code(&mut self, raw: &str) {
        self.gate.input(raw);
    }

    /// Close the dialog; an in-flight send is disowned
    pub fn cancel_gate(&mut self) {
        self.gate.close();
        self.attempt += 1;
        self.state = SubmissionState::Filling;
        self.refresh_state();
    }

    /// Validate the code and assemble the payload.
    ///
    /// On any failure the session stays in `AwaitingCode` with the message in
    /// the dialog and every answer and file untouched.
    pub fn begin_submit(&mut self) -> Result<PendingSubmission> {
        if self.state != SubmissionState::AwaitingCode {
            return Err(FormError::State(format!("cannot submit while {:?}", self.state)));
        }
        let code = self.gate.confirm()?;

        if !self.can_submit() {
            self.reveal_errors();
            let err = self.first_blocking_error();
            self.gate.reject(err.user_message());
            return Err(err);
        }

        self.state = SubmissionState::Assembling;
        let submission = match assemble(&self.form, &self.answers, &self.files, code) {
            Ok(submission) => submission,
            Err(e) => {
                self.gate.reject(e.user_message());
                self.state = SubmissionState::AwaitingCode;
                return Err(e);
            }
        };

        self.attempt += 1;
        self.state = SubmissionState::Submitting;
        tracing::debug!("Session {} submission attempt {}", self.id, self.attempt);
        Ok(PendingSubmission {
            attempt: self.attempt,
            submission,
        })
    }

    /// Apply the result of sending `attempt`
    pub fn complete_submit(&mut self, attempt: u64, result: Result<SubmitResponse>) -> SubmitOutcome {
        if attempt != self.attempt || self.state != SubmissionState::Submitting {
            tracing::info!("Ignoring result of superseded submission attempt {}", attempt);
            return SubmitOutcome::Superseded;
        }

        match result {
            Ok(response) => {
                tracing::info!("Form {} submitted: {}", self.form.id, response.message);
                self.answers.clear();
                self.files.clear();
                self.errors.clear();
                self.gate.close();
                self.last_response = Some(response.clone());
                self.submitted_at = Some(Utc::now());
                self.state = SubmissionState::Submitted;
                SubmitOutcome::Submitted(response)
            }
            Err(e) => {
                tracing::warn!("Submission of form {} failed: {}", self.form.id, e);
                let message = e.user_message();
                self.gate.reject(message.clone());
                self.state = SubmissionState::AwaitingCode;
                SubmitOutcome::Failed { message }
            }
        }
    }

    /// Assemble, send and apply the result in one go
    pub async fn submit(&mut self, api: &FormsApi) -> Result<SubmitOutcome> {
        let pending = self.begin_submit()?;
        let result = api.submit(&pending.submission).await;
        Ok(self.complete_submit(pending.attempt, result))
    }

    /// Navigate away: drop all state and disown anything in flight
    pub fn reset(&mut self) {
        self.answers.clear();
        self.files.clear();
        self.errors.clear();
        self.gate.close();
        self.attempt += 1;
        self.state = SubmissionState::Filling;
        self.refresh_state();
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn editable_question(&self, question_id: &str) -> Result<&Question> {
        let question = self.form.question(question_id).ok_or_else(|| FormError::Schema {
            question_id: question_id.to_string(),
            message: "unknown question".into(),
        })?;
        if let Some(issue) = question.schema_issue() {
            return Err(schema_error(question, issue));
        }
        Ok(question)
    }

    fn display_position(&self, question_id: &str) -> usize {
        self.form
            .questions()
            .position(|q| q.id == question_id)
            .unwrap_or(usize::MAX)
    }

    fn after_mutation(&mut self, question_id: &str) -> Validation {
        let result = self.revalidate(question_id);
        self.refresh_state();
        result
    }

    fn revalidate(&mut self, question_id: &str) -> Validation {
        let result = self.validation(question_id).unwrap_or_else(Validation::ok);
        match &result.message {
            Some(message) => {
                self.errors.insert(question_id.to_string(), message.clone());
            }
            None => {
                self.errors.remove(question_id);
            }
        }
        result
    }

    fn refresh_state(&mut self) {
        match self.state {
            SubmissionState::Filling | SubmissionState::ReadyToSubmit | SubmissionState::Submitted => {
                self.state = if self.can_submit() {
                    SubmissionState::ReadyToSubmit
                } else {
                    SubmissionState::Filling
                };
            }
            SubmissionState::AwaitingCode if !self.can_submit() => {
                self.gate.close();
                self.state = SubmissionState::Filling;
            }
            _ => {}
        }
    }

    fn first_blocking_error(&self) -> FormError {
        self.form
            .questions()
            .find_map(|q| {
                let result = validation::validate_in(q, &self.answers, &self.files);
                result.message.map(|message| FormError::Validation {
                    question_id: q.id.clone(),
                    message,
                })
            })
            .unwrap_or_else(|| FormError::State("form is not ready".into()))
    }
}

fn schema_error(question: &Question, message: String) -> FormError {
    FormError::Schema {
        question_id: question.id.clone(),
        message,
    }
}

/// Choice answers must come from the question's option list
fn check_options(question: &Question, value: &AnswerValue) -> Result<()> {
    if !question.answer_type.uses_options() {
        return Ok(());
    }
    let options = question.option_list();
    let chosen: Vec<&String> = match value {
        AnswerValue::Text(s) if s.is_empty() => Vec::new(),
        AnswerValue::Text(s) => vec![s],
        AnswerValue::Choices(items) => items.iter().collect(),
        _ => Vec::new(),
    };
    match chosen.into_iter().find(|c| !options.contains(c)) {
        Some(bad) => Err(schema_error(question, format!("'{bad}' is not one of the options"))),
        None => Ok(()),
    }
}
