//! Fill sessions driven end to end against a mock backend

use formgate_client::{
    BoundFile, ClientConfig, FillSession, FormError, FormsApi, SubmissionState, SubmitOutcome,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use wiremock::matchers::{body_partial_json, body_string_contains, header_regex, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn form_json() -> Value {
    json!({
        "id": "f1",
        "name": "Intake",
        "form_questions": [
            {
                "id": 11,
                "form_index": 1,
                "question": {
                    "id": "q-cv",
                    "question": "Upload your CV",
                    "required": true,
                    "answer_type": "file",
                    "min_len": null,
                    "max_len": 5,
                    "file_type": "application/pdf"
                }
            },
            {
                "id": 10,
                "form_index": 0,
                "question": {
                    "id": "q-name",
                    "question": "Your name",
                    "required": true,
                    "answer_type": "text",
                    "min_len": 2,
                    "max_len": 40
                }
            },
            {
                "id": 12,
                "form_index": 2,
                "question": {
                    "id": "q-color",
                    "question": "Favourite color",
                    "required": false,
                    "answer_type": "select",
                    "options": "Red||Green||Blue"
                }
            }
        ]
    })
}

async fn setup() -> (MockServer, FormsApi) {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/csrf-token/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "csrf_token": "tok" })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/forms/f1/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(form_json()))
        .mount(&server)
        .await;
    let api = FormsApi::new(&ClientConfig::new(server.uri())).unwrap();
    (server, api)
}

fn cv() -> BoundFile {
    BoundFile::new("cv.pdf", "application/pdf", b"%PDF-1.4 resume".to_vec())
}

#[tokio::test]
async fn test_fetch_form_sorts_questions() {
    let (_server, api) = setup().await;
    let form = api.fetch_form("f1").await.unwrap();
    let ids: Vec<_> = form.questions().map(|q| q.id.as_str()).collect();
    assert_eq!(ids, ["q-name", "q-cv", "q-color"]);
    assert_eq!(form.question("q-cv").unwrap().min_len, 0);
}

#[tokio::test]
async fn test_submit_with_file_uses_multipart() {
    let (server, api) = setup().await;
    Mock::given(method("POST"))
        .and(path("/forms/submit"))
        .and(header_regex("content-type", "^multipart/form-data"))
        .and(body_string_contains("name=\"file_q-cv\""))
        .and(body_string_contains("ABC123"))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!({ "message": "Response saved", "response_id": "r-9" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut session = FillSession::new(api.fetch_form("f1").await.unwrap());
    session.set_text("q-name", "Ada").unwrap();
    session.attach_file("q-cv", cv()).unwrap();
    assert_eq!(session.state(), SubmissionState::ReadyToSubmit);

    session.open_gate().unwrap();
    session.enter_code("abc123");
    let outcome = session.submit(&api).await.unwrap();

    match outcome {
        SubmitOutcome::Submitted(response) => {
            assert_eq!(response.message, "Response saved");
            assert_eq!(response.response_id.as_deref(), Some("r-9"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(session.is_submitted());
    assert!(session.answers().is_empty());
    assert!(session.files().is_empty());
    assert!(session.submitted_at().is_some());
}

#[tokio::test]
async fn test_submit_without_file_uses_json() {
    let server = MockServer::start().await;
    let mut form = form_json();
    form["form_questions"][0]["question"]["required"] = json!(false);
    Mock::given(method("GET"))
        .and(path("/forms/f1/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(form))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/csrf-token/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "csrf_token": "tok" })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/forms/submit"))
        .and(header_regex("content-type", "^application/json"))
        .and(body_partial_json(json!({
            "user_code": "XYZ789",
            "formId": "f1",
            "responses": {
                "q-name": { "question": "Your name", "answer_type": "text", "value": "Ada", "required": true },
                "q-cv": { "value": null },
                "q-color": { "value": "Green" }
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "ok" })))
        .expect(1)
        .mount(&server)
        .await;

    let api = FormsApi::new(&ClientConfig::new(server.uri())).unwrap();
    let mut session = FillSession::new(api.fetch_form("f1").await.unwrap());
    session.set_text("q-name", "Ada").unwrap();
    session.choose("q-color", "Green").unwrap();
    session.open_gate().unwrap();
    session.enter_code(" xyz789 ");

    let outcome = session.submit(&api).await.unwrap();
    assert!(matches!(outcome, SubmitOutcome::Submitted(_)));
}

#[tokio::test]
async fn test_rejected_code_keeps_answers() {
    let (server, api) = setup().await;
    Mock::given(method("POST"))
        .and(path("/forms/submit"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({ "error": "Invalid or expired code" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut session = FillSession::new(api.fetch_form("f1").await.unwrap());
    session.set_text("q-name", "Ada").unwrap();
    session.attach_file("q-cv", cv()).unwrap();
    session.open_gate().unwrap();
    session.enter_code("bad000");

    let outcome = session.submit(&api).await.unwrap();
    assert_eq!(
        outcome,
        SubmitOutcome::Failed {
            message: "Invalid or expired code".into()
        }
    );
    assert_eq!(session.state(), SubmissionState::AwaitingCode);
    assert_eq!(session.gate().error(), Some("Invalid or expired code"));
    assert_eq!(session.answers().len(), 2);
    assert!(session.files().get("q-cv").is_some());
}

#[tokio::test]
async fn test_unreadable_failure_gets_generic_message() {
    let (server, api) = setup().await;
    Mock::given(method("POST"))
        .and(path("/forms/submit"))
        .respond_with(ResponseTemplate::new(500).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let mut session = FillSession::new(api.fetch_form("f1").await.unwrap());
    session.set_text("q-name", "Ada").unwrap();
    session.attach_file("q-cv", cv()).unwrap();
    session.open_gate().unwrap();
    session.enter_code("abc123");

    match session.submit(&api).await.unwrap() {
        SubmitOutcome::Failed { message } => {
            assert_eq!(message, formgate_client::error::GENERIC_SUBMIT_ERROR);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn test_wrong_file_type_blocks_gate() {
    let (server, api) = setup().await;
    Mock::given(method("POST"))
        .and(path("/forms/submit"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut session = FillSession::new(api.fetch_form("f1").await.unwrap());
    session.set_text("q-name", "Ada").unwrap();
    let result = session
        .attach_file("q-cv", BoundFile::new("cv.png", "image/png", b"png".to_vec()))
        .unwrap();
    assert!(result.message.unwrap().starts_with("File type not accepted."));
    assert!(matches!(session.open_gate(), Err(FormError::State(_))));
}

#[tokio::test]
async fn test_ai_fill_applies_through_session() {
    let (server, api) = setup().await;
    Mock::given(method("POST"))
        .and(path("/forms/ai-fill"))
        .and(body_partial_json(json!({ "formId": "f1", "userInput": "I'm Ada, I love green" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "responses": { "q-name": "Ada", "q-color": "Green", "q-cv": "cv.pdf" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = FillSession::new(api.fetch_form("f1").await.unwrap());
    let drafted = api.ai_fill("f1", "  I'm Ada, I love green ").await.unwrap();
    assert!(drafted.success);

    let report = session.apply_answers(&drafted.responses);
    assert_eq!(report.applied, ["q-name", "q-color"]);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].0, "q-cv");
    assert_eq!(session.state(), SubmissionState::Filling);
}

#[tokio::test]
async fn test_resend_code() {
    let (server, api) = setup().await;
    Mock::given(method("GET"))
        .and(path("/resend_code/"))
        .and(query_param("email", "ada+forms@example.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "detail": "Code sent" })))
        .expect(1)
        .mount(&server)
        .await;

    let detail = api.resend_code("ada+forms@example.com").await.unwrap();
    assert_eq!(detail, "Code sent");
}

#[test]
fn test_missing_upload_path_is_io_error() {
    let result = tokio_test::block_on(BoundFile::from_path("/nonexistent/formgate/cv.pdf", None));
    assert!(matches!(result, Err(FormError::Io(_))));
}

#[test]
fn test_answers_file_shape() {
    let raw = r#"{ "q-name": "Ada", "q-color": "Blue" }"#;
    let parsed: HashMap<String, Value> = serde_json::from_str(raw).unwrap();
    assert_eq!(parsed.len(), 2);
}

#[tokio::test]
async fn test_malformed_email_never_reaches_server() {
    let (server, api) = setup().await;
    Mock::given(method("GET"))
        .and(path("/resend_code/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "detail": "Code sent" })))
        .expect(0)
        .mount(&server)
        .await;

    for email in ["", "   ", "ada@example", "not an email"] {
        let err = api.resend_code(email).await.unwrap_err();
        assert!(err.is_validation_error());
        assert_eq!(err.user_message(), formgate_client::api::INVALID_EMAIL_MESSAGE);
    }
}

#[tokio::test]
async fn test_blank_ai_input_never_reaches_server() {
    let (server, api) = setup().await;
    Mock::given(method("POST"))
        .and(path("/forms/ai-fill"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(0)
        .mount(&server)
        .await;

    let err = api.ai_fill("f1", " \n\t ").await.unwrap_err();
    match err {
        FormError::Validation { message, .. } => {
            assert_eq!(message, formgate_client::api::EMPTY_AI_INPUT_MESSAGE);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_init_csrf_warms_token_for_submit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/csrf-token/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "csrf_token": "warm" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/forms/ai-fill"))
        .and(wiremock::matchers::header("X-CSRFToken", "warm"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": false })))
        .expect(1)
        .mount(&server)
        .await;

    let api = FormsApi::new(&ClientConfig::new(server.uri())).unwrap();
    assert_eq!(api.init_csrf().await.as_deref(), Some("warm"));
    assert_eq!(api.transport().tokens().fetch_count(), 1);

    let drafted = api.ai_fill("f1", "anything").await.unwrap();
    assert!(!drafted.success);
    assert_eq!(api.transport().tokens().fetch_count(), 1);
}
