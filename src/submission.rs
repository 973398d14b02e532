//! Turning a filled session into a transmit-ready payload

use crate::answers::{AnswerMap, AnswerValue, BoundFile, FileBindings};
use crate::error::{FormError, Result};
use crate::gate::AccessCode;
use crate::schema::{AnswerType, Form};
use crate::transport::{FilePart, MultipartBody, RequestBody};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// Per-question record stored with the response
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AnswerEnvelope {
    pub question: String,
    pub answer_type: String,
    pub value: Option<AnswerValue>,
    pub required: bool,
}

/// Envelopes keyed by question id, serialized in display order
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Responses(Vec<(String, AnswerEnvelope)>);

impl Responses {
    pub fn get(&self, question_id: &str) -> Option<&AnswerEnvelope> {
        self.0.iter().find(|(id, _)| id == question_id).map(|(_, env)| env)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for Responses {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (id, envelope) in &self.0 {
            map.serialize_entry(id, envelope)?;
        }
        map.end()
    }
}

/// A fully assembled submission
#[derive(Clone, Debug)]
pub struct Submission {
    pub user_code: AccessCode,
    pub form_id: String,
    pub responses: Responses,
    /// (question id, file) for every bound file
    pub files: Vec<(String, BoundFile)>,
}

/// Server acknowledgement of a submission
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResponse {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub response_id: Option<String>,
}

/// Multipart field name carrying the binary of `question_id`
pub fn file_field(question_id: &str) -> String {
    format!("file_{question_id}")
}

/// Build the submission for `form`.
///
/// Fails if a required file question, or any file question with metadata,
/// has no bound file behind it.
pub fn assemble(
    form: &Form,
    answers: &AnswerMap,
    files: &FileBindings,
    user_code: AccessCode,
) -> Result<Submission> {
    let mut responses = Vec::with_capacity(form.form_questions.len());
    let mut attachments = Vec::new();

    for question in form.questions() {
        let answer = answers.get(&question.id);

        let value = if question.answer_type == AnswerType::File {
            let bound = files.get(&question.id);
            if bound.is_none() && (question.required || answer.is_some()) {
                return Err(FormError::Validation {
                    question_id: question.id.clone(),
                    message: format!("File upload is required for: {}", question.question),
                });
            }
            bound.map(|file| {
                attachments.push((question.id.clone(), file.clone()));
                AnswerValue::File(file.descriptor())
            })
        } else {
            answer.cloned()
        };

        responses.push((
            question.id.clone(),
            AnswerEnvelope {
                question: question.question.clone(),
                answer_type: question.answer_type.to_string(),
                value,
                required: question.required,
            },
        ));
    }

    tracing::debug!(
        "Assembled {} responses with {} files for form {}",
        responses.len(),
        attachments.len(),
        form.id
    );

    Ok(Submission {
        user_code,
        form_id: form.id.clone(),
        responses: Responses(responses),
        files: attachments,
    })
}

impl Submission {
    pub fn has_files(&self) -> bool {
        !self.files.is_empty()
    }

    /// Multipart when any file is bound, JSON otherwise
    pub fn to_body(&self) -> Result<RequestBody> {
        if !self.has_files() {
            return Ok(RequestBody::Json(serde_json::json!({
                "user_code": self.user_code.as_str(),
                "formId": self.form_id,
                "responses": self.responses,
            })));
        }

        let mut body = MultipartBody::new()
            .text("user_code", self.user_code.as_str())
            .text("formId", self.form_id.clone())
            .text("responses", serde_json::to_string(&self.responses)?);
        for (question_id, file) in &self.files {
            body = body.file(FilePart {
                field: file_field(question_id),
                file_name: file.name.clone(),
                content_type: file.content_type.clone(),
                data: file.data.clone(),
            });
        }
        Ok(RequestBody::Multipart(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::tests::question;
    use crate::schema::{FormQuestion, Question};
    use serde_json::json;

    fn form_of(questions: Vec<Question>) -> Form {
        Form {
            id: "form-1".into(),
            name: "Test".into(),
            form_questions: questions
                .into_iter()
                .enumerate()
                .map(|(i, q)| FormQuestion {
                    id: i.to_string(),
                    question: q,
                    form_index: i as u32,
                })
                .collect(),
        }
    }

    fn code() -> AccessCode {
        AccessCode::parse("abc123").unwrap()
    }

    #[test]
    fn test_json_body_without_files() {
        let form = form_of(vec![
            question("name", "text", true, 0, 0),
            question("nick", "text", false, 0, 0),
        ]);
        let mut answers = AnswerMap::new();
        answers.set("name", AnswerValue::text("Ada"));

        let submission = assemble(&form, &answers, &FileBindings::new(), code()).unwrap();
        let RequestBody::Json(body) = submission.to_body().unwrap() else {
            panic!("expected JSON body");
        };
        assert_eq!(
            body,
            json!({
                "user_code": "ABC123",
                "formId": "form-1",
                "responses": {
                    "name": { "question": "Question name", "answer_type": "text", "value": "Ada", "required": true },
                    "nick": { "question": "Question nick", "answer_type": "text", "value": null, "required": false }
                }
            })
        );
    }

    #[test]
    fn test_required_file_needs_binding() {
        let form = form_of(vec![question("cv", "file", true, 0, 0)]);
        let mut answers = AnswerMap::new();
        let meta = BoundFile::new("cv.pdf", "application/pdf", vec![1u8; 4]).descriptor();
        answers.set("cv", AnswerValue::File(meta));

        let err = assemble(&form, &answers, &FileBindings::new(), code()).unwrap_err();
        match err {
            FormError::Validation { question_id, message } => {
                assert_eq!(question_id, "cv");
                assert_eq!(message, "File upload is required for: Question cv");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_optional_file_metadata_without_binding_fails() {
        let form = form_of(vec![question("photo", "file", false, 0, 0)]);
        let mut answers = AnswerMap::new();
        answers.set(
            "photo",
            AnswerValue::File(BoundFile::new("a.png", "image/png", vec![1u8]).descriptor()),
        );
        assert!(assemble(&form, &answers, &FileBindings::new(), code()).is_err());

        answers.remove("photo");
        let submission = assemble(&form, &answers, &FileBindings::new(), code()).unwrap();
        assert_eq!(submission.responses.get("photo").unwrap().value, None);
    }

    #[test]
    fn test_multipart_body_with_files() {
        let form = form_of(vec![
            question("name", "text", true, 0, 0),
            question("cv", "file", true, 0, 5),
        ]);
        let mut answers = AnswerMap::new();
        answers.set("name", AnswerValue::text("Ada"));
        let mut files = FileBindings::new();
        let cv = BoundFile::new("cv.pdf", "application/pdf", vec![7u8; 1024]);
        answers.set("cv", AnswerValue::File(cv.descriptor()));
        files.bind("cv", cv.clone());

        let submission = assemble(&form, &answers, &files, code()).unwrap();
        assert_eq!(
            submission.responses.get("cv").unwrap().value,
            Some(AnswerValue::File(cv.descriptor()))
        );

        let RequestBody::Multipart(body) = submission.to_body().unwrap() else {
            panic!("expected multipart body");
        };
        let fields: Vec<_> = body.text_fields().iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(fields, ["user_code", "formId", "responses"]);

        let responses: serde_json::Value = serde_json::from_str(&body.text_fields()[2].1).unwrap();
        assert_eq!(responses["cv"]["value"]["name"], "cv.pdf");
        assert_eq!(responses["cv"]["value"]["size"], 1024);

        let part = &body.file_parts()[0];
        assert_eq!(part.field, "file_cv");
        assert_eq!(part.file_name, "cv.pdf");
        assert_eq!(part.data.len(), 1024);
    }

    #[test]
    fn test_responses_follow_display_order() {
        let form = form_of(vec![
            question("z", "text", false, 0, 0),
            question("a", "text", false, 0, 0),
        ]);
        let submission = assemble(&form, &AnswerMap::new(), &FileBindings::new(), code()).unwrap();
        let text = serde_json::to_string(&submission.responses).unwrap();
        assert!(text.find("\"z\"").unwrap() < text.find("\"a\"").unwrap());
    }

    #[test]
    fn test_submit_response_parses() {
        let resp: SubmitResponse =
            serde_json::from_value(json!({ "message": "Saved", "response_id": "r-1" })).unwrap();
        assert_eq!(resp.response_id.as_deref(), Some("r-1"));
    }
}
