//! Form schema and its mapping onto input widgets

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Separator between entries of a question's `options` string
pub const OPTION_DELIMITER: &str = "||";

/// Answer type of a question. Unknown names are kept verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AnswerType {
    Text,
    Number,
    Boolean,
    Radio,
    Checkbox,
    Select,
    File,
    Unknown(String),
}

impl AnswerType {
    pub fn as_str(&self) -> &str {
        match self {
            AnswerType::Text => "text",
            AnswerType::Number => "number",
            AnswerType::Boolean => "boolean",
            AnswerType::Radio => "radio",
            AnswerType::Checkbox => "checkbox",
            AnswerType::Select => "select",
            AnswerType::File => "file",
            AnswerType::Unknown(name) => name,
        }
    }

    /// Radio, checkbox and select draw their choices from `options`
    pub fn uses_options(&self) -> bool {
        matches!(self, AnswerType::Radio | AnswerType::Checkbox | AnswerType::Select)
    }
}

impl From<String> for AnswerType {
    fn from(name: String) -> Self {
        match name.as_str() {
            "text" => AnswerType::Text,
            "number" => AnswerType::Number,
            "boolean" => AnswerType::Boolean,
            "radio" => AnswerType::Radio,
            "checkbox" => AnswerType::Checkbox,
            "select" => AnswerType::Select,
            "file" => AnswerType::File,
            _ => AnswerType::Unknown(name),
        }
    }
}

impl From<&str> for AnswerType {
    fn from(name: &str) -> Self {
        AnswerType::from(name.to_string())
    }
}

impl From<AnswerType> for String {
    fn from(kind: AnswerType) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for AnswerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single question.
///
/// `min_len`/`max_len` are character bounds for text and megabyte bounds for
/// file questions; 0 leaves that side unbounded.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Question {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub question: String,
    #[serde(default)]
    pub required: bool,
    pub answer_type: AnswerType,
    #[serde(default, deserialize_with = "zero_if_null")]
    pub min_len: u32,
    #[serde(default, deserialize_with = "zero_if_null")]
    pub max_len: u32,
    #[serde(default)]
    pub options: Option<String>,
    #[serde(default)]
    pub file_type: Option<String>,
}

/// Question placed in a form at `form_index`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FormQuestion {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub question: Question,
    #[serde(default)]
    pub form_index: u32,
}

/// A published form
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Form {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub form_questions: Vec<FormQuestion>,
}

impl Form {
    /// Stable sort by `form_index`
    pub fn sort_questions(&mut self) {
        self.form_questions.sort_by_key(|fq| fq.form_index);
    }

    /// Questions in stored order (display order once sorted)
    pub fn questions(&self) -> impl Iterator<Item = &Question> {
        self.form_questions.iter().map(|fq| &fq.question)
    }

    pub fn question(&self, question_id: &str) -> Option<&Question> {
        self.questions().find(|q| q.id == question_id)
    }

    pub fn required_questions(&self) -> impl Iterator<Item = &Question> {
        self.questions().filter(|q| q.required)
    }
}

/// Input shape a question is rendered with
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InputShape {
    MultiLineText,
    Numeric,
    Toggle,
    SingleSelectList,
    MultiSelectList,
    Dropdown,
    FilePicker,
    Unsupported,
}

/// Everything a renderer needs to draw one question
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Widget {
    pub shape: InputShape,
    pub options: Vec<String>,
    /// Character limit for text inputs
    pub max_input_len: Option<u32>,
    pub accept: Option<FileAccept>,
    pub size_hint: Option<String>,
    pub icon: &'static str,
    /// Set when the field must be shown disabled
    pub disabled_reason: Option<String>,
}

impl Question {
    pub fn kind(&self) -> &AnswerType {
        &self.answer_type
    }

    /// `options` split on the delimiter, order and duplicates kept
    pub fn option_list(&self) -> Vec<String> {
        match self.options.as_deref() {
            Some(raw) if !raw.is_empty() => raw.split(OPTION_DELIMITER).map(String::from).collect(),
            _ => Vec::new(),
        }
    }

    /// Accepted file pattern, None for non-file questions
    pub fn accept(&self) -> Option<FileAccept> {
        (self.answer_type == AnswerType::File)
            .then(|| FileAccept::new(self.file_type.as_deref().unwrap_or("none")))
    }

    /// "Size: 1 MB - 5 MB" style hint when a file bound is configured
    pub fn size_hint(&self) -> Option<String> {
        if self.answer_type != AnswerType::File || (self.min_len == 0 && self.max_len == 0) {
            return None;
        }
        let min = format!("{} MB", self.min_len);
        let max = if self.max_len > 0 {
            format!("{} MB", self.max_len)
        } else {
            "Unlimited".to_string()
        };
        Some(format!("Size: {min} - {max}"))
    }

    /// Problem that forces the field to render disabled
    pub fn schema_issue(&self) -> Option<String> {
        match &self.answer_type {
            AnswerType::Unknown(name) => Some(format!("Unsupported question type: {name}")),
            kind if kind.uses_options() && self.option_list().is_empty() => {
                Some("No options configured".to_string())
            }
            _ => None,
        }
    }

    /// Map the answer type onto a concrete widget
    pub fn widget(&self) -> Widget {
        let mut widget = Widget {
            shape: InputShape::Unsupported,
            options: Vec::new(),
            max_input_len: None,
            accept: None,
            size_hint: None,
            icon: "alert-circle",
            disabled_reason: self.schema_issue(),
        };

        match self.answer_type {
            AnswerType::Text => {
                widget.shape = InputShape::MultiLineText;
                widget.max_input_len = (self.max_len > 0).then_some(self.max_len);
                widget.icon = "file-text";
            }
            AnswerType::Number => {
                widget.shape = InputShape::Numeric;
                widget.icon = "hash";
            }
            AnswerType::Boolean => {
                widget.shape = InputShape::Toggle;
                widget.icon = "check-circle";
            }
            AnswerType::Radio => {
                widget.shape = InputShape::SingleSelectList;
                widget.icon = "circle";
            }
            AnswerType::Checkbox => {
                widget.shape = InputShape::MultiSelectList;
                widget.icon = "check-square";
            }
            AnswerType::Select => {
                widget.shape = InputShape::Dropdown;
                widget.icon = "chevron-down";
            }
            AnswerType::File => {
                widget.shape = InputShape::FilePicker;
                widget.accept = self.accept();
                widget.size_hint = self.size_hint();
                widget.icon = "upload";
            }
            AnswerType::Unknown(_) => {}
        }

        if self.answer_type.uses_options() {
            widget.options = self.option_list();
        }
        if widget.disabled_reason.is_some() {
            widget.shape = InputShape::Unsupported;
        }
        widget
    }
}

/// Accepted MIME pattern of a file question
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FileAccept {
    pattern: String,
}

impl FileAccept {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into().trim().to_string(),
        }
    }

    /// True for the "none" and "*/*" sentinels
    pub fn accepts_all(&self) -> bool {
        matches!(self.pattern.as_str(), "" | "none" | "*/*")
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Does `mime` match? `type/*` patterns match on the top-level type.
    pub fn accepts(&self, mime: &str) -> bool {
        if self.accepts_all() {
            return true;
        }
        let mime = mime.trim().to_ascii_lowercase();
        let pattern = self.pattern.to_ascii_lowercase();
        match pattern.strip_suffix("/*") {
            Some(top) => mime.split('/').next() == Some(top),
            None => mime == pattern,
        }
    }

    /// Human description of what can be uploaded
    pub fn description(&self) -> String {
        if self.accepts_all() {
            return "All file types accepted".to_string();
        }
        let desc = match self.pattern.as_str() {
            "image/*" => "Images (jpg, png, gif, etc.)",
            "application/pdf" => "PDF files",
            "application/msword" => "Word documents (.doc)",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                "Word documents (.docx)"
            }
            "text/csv" => "CSV files",
            "text/plain" => "Text files (.txt)",
            "application/vnd.ms-excel" => "Excel files (.xls)",
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => {
                "Excel files (.xlsx)"
            }
            "application/zip" => "ZIP archives",
            other => other,
        };
        format!("Accepted: {desc}")
    }
}

fn zero_if_null<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    Ok(Option::<u32>::deserialize(deserializer)?.unwrap_or(0))
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Int(i64),
    }
    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Int(n) => n.to_string(),
    })
}
