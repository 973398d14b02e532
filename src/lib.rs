//! Formgate Client - Schema-Driven Form Filling
//!
//! Interprets a published question schema into input widgets and validation
//! rules, keeps the respondent's answers and attached files, and submits them
//! once per access code against a backend protected by a rotating
//! anti-forgery token.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           FORMGATE CLIENT                               │
//! │                                                                         │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐  ┌─────────────┐ │
//! │  │    Schema    │  │  Validation  │  │  Submission  │  │ Access-Code │ │
//! │  │    Model     │─▶│    Engine    │  │  Assembler   │  │    Gate     │ │
//! │  │  (widgets)   │  │   (pure)     │  │ (JSON/multi) │  │  (dialog)   │ │
//! │  └──────┬───────┘  └──────┬───────┘  └──────┬───────┘  └──────┬──────┘ │
//! │         │                 │                 │                 │        │
//! │  ┌──────▼─────────────────▼─────────────────▼─────────────────▼──────┐ │
//! │  │                    Fill Session (state machine)                    │ │
//! │  └──────────────────────────────────┬─────────────────────────────────┘ │
//! │                                     │                                   │
//! │  ┌──────────────┐  ┌────────────────▼─────┐  ┌──────────────┐          │
//! │  │  Forms API   │─▶│      Transport       │─▶│ Token Store  │          │
//! │  │ (endpoints)  │  │ (X-CSRFToken, retry) │  │ (coalesced)  │          │
//! │  └──────────────┘  └──────────────────────┘  └──────────────┘          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use formgate_client::{ClientConfig, FillSession, FormsApi, SubmitOutcome};
//!
//! # async fn run() -> formgate_client::Result<()> {
//! let api = FormsApi::new(&ClientConfig::new("https://forms.example.com/api"))?;
//! let form = api.fetch_form("8b9f0c1e-0000-4000-8000-000000000001").await?;
//!
//! let mut session = FillSession::new(form);
//! session.set_text("q-name", "Ada Lovelace")?;
//! session.open_gate()?;
//! session.enter_code("abc123");
//!
//! if let SubmitOutcome::Submitted(resp) = session.submit(&api).await? {
//!     println!("stored as {:?}", resp.response_id);
//! }
//! # Ok(())
//! # }
//! ```

pub mod answers;
pub mod api;
pub mod config;
pub mod error;
pub mod gate;
pub mod schema;
pub mod session;
pub mod submission;
pub mod telemetry;
pub mod token;
pub mod transport;
pub mod validation;

pub use answers::{AnswerMap, AnswerValue, BoundFile, FileBindings, FileDescriptor};
pub use api::{AiFillResponse, FormsApi};
pub use config::ClientConfig;
pub use error::{extract_user_message, FormError, Result};
pub use gate::{AccessCode, AccessCodeGate};
pub use schema::{AnswerType, FileAccept, Form, FormQuestion, InputShape, Question, Widget};
pub use session::{FillReport, FillSession, SubmissionState, SubmitOutcome};
pub use submission::{assemble, AnswerEnvelope, SubmitResponse, Submission};
pub use token::{TokenSnapshot, TokenStore};
pub use transport::{RequestBody, Transport};
pub use validation::{is_form_valid, readiness, validate, Readiness, Validation};
