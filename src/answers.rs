//! Answer state of a fill session
//!
//! `AnswerMap` holds serializable values, `FileBindings` holds the bytes of
//! attached files, and `ErrorMap` the current message per question.

use crate::error::Result;
use crate::schema::AnswerType;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

/// Bytes per megabyte used for file size bounds
pub const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Current value of one question
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Boolean(bool),
    Number(serde_json::Number),
    Text(String),
    Choices(Vec<String>),
    File(FileDescriptor),
}

impl AnswerValue {
    pub fn text(value: impl Into<String>) -> Self {
        AnswerValue::Text(value.into())
    }

    /// None for NaN and infinities
    pub fn number(value: f64) -> Option<Self> {
        if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
            return Some(AnswerValue::Number((value as i64).into()));
        }
        serde_json::Number::from_f64(value).map(AnswerValue::Number)
    }

    /// Parse user input the way a numeric field would; empty or junk gives None
    pub fn parse_number(raw: &str) -> Option<Self> {
        raw.trim().parse::<f64>().ok().and_then(Self::number)
    }

    /// Does this value have the shape `kind` stores?
    pub fn fits(&self, kind: &AnswerType) -> bool {
        matches!(
            (kind, self),
            (AnswerType::Text | AnswerType::Radio | AnswerType::Select, AnswerValue::Text(_))
                | (AnswerType::Number, AnswerValue::Number(_))
                | (AnswerType::Boolean, AnswerValue::Boolean(_))
                | (AnswerType::Checkbox, AnswerValue::Choices(_))
                | (AnswerType::File, AnswerValue::File(_))
        )
    }

    /// Convert loosely typed JSON (AI fill, answer files) into the shape `kind` stores
    pub fn from_json(kind: &AnswerType, value: &Value) -> Option<Self> {
        match (kind, value) {
            (_, Value::Null) => None,
            (AnswerType::Text | AnswerType::Radio | AnswerType::Select, Value::String(s)) => {
                Some(AnswerValue::Text(s.clone()))
            }
            (AnswerType::Text, Value::Number(n)) => Some(AnswerValue::Text(n.to_string())),
            (AnswerType::Number, Value::Number(n)) => Some(AnswerValue::Number(n.clone())),
            (AnswerType::Number, Value::String(s)) => Self::parse_number(s),
            (AnswerType::Boolean, Value::Bool(b)) => Some(AnswerValue::Boolean(*b)),
            (AnswerType::Boolean, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" => Some(AnswerValue::Boolean(true)),
                "false" | "no" => Some(AnswerValue::Boolean(false)),
                _ => None,
            },
            (AnswerType::Checkbox, Value::Array(items)) => items
                .iter()
                .map(|item| item.as_str().map(String::from))
                .collect::<Option<Vec<_>>>()
                .map(AnswerValue::Choices),
            (AnswerType::Checkbox, Value::String(s)) => Some(AnswerValue::Choices(vec![s.clone()])),
            _ => None,
        }
    }
}

/// Lightweight metadata of an attached file, safe to serialize
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub name: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub content_type: String,
    #[serde(rename = "lastModified")]
    pub last_modified: i64,
}

/// An attached file with its content
#[derive(Clone, Debug, PartialEq)]
pub struct BoundFile {
    pub name: String,
    pub content_type: String,
    pub last_modified: DateTime<Utc>,
    pub data: Bytes,
}

impl BoundFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            last_modified: Utc::now(),
            data: data.into(),
        }
    }

    /// Read a file from disk; the content type is guessed from its extension
    /// unless given.
    pub async fn from_path(path: impl AsRef<Path>, content_type: Option<&str>) -> Result<Self> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await?;
        let modified = tokio::fs::metadata(path).await?.modified()?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "upload".to_string());

        tracing::debug!("Loaded {} ({} bytes)", name, data.len());
        Ok(Self {
            content_type: content_type
                .map(String::from)
                .unwrap_or_else(|| content_type_for(path).to_string()),
            name,
            last_modified: DateTime::<Utc>::from(modified),
            data: Bytes::from(data),
        })
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn size_mb(&self) -> f64 {
        self.size() as f64 / BYTES_PER_MB
    }

    pub fn descriptor(&self) -> FileDescriptor {
        FileDescriptor {
            name: self.name.clone(),
            size: self.size(),
            content_type: self.content_type.clone(),
            last_modified: self.last_modified.timestamp_millis(),
        }
    }
}

/// Guess a MIME type for the file kinds forms usually ask for
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "csv" => "text/csv",
        "txt" => "text/plain",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    }
}

/// Question id -> current value. A missing key means unanswered.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AnswerMap(HashMap<String, AnswerValue>);

impl AnswerMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, question_id: &str) -> Option<&AnswerValue> {
        self.0.get(question_id)
    }

    pub fn set(&mut self, question_id: impl Into<String>, value: AnswerValue) {
        self.0.insert(question_id.into(), value);
    }

    pub fn remove(&mut self, question_id: &str) -> Option<AnswerValue> {
        self.0.remove(question_id)
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AnswerValue)> {
        self.0.iter()
    }
}

/// Question id -> attached file content
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FileBindings(HashMap<String, BoundFile>);

impl FileBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, question_id: &str) -> Option<&BoundFile> {
        self.0.get(question_id)
    }

    pub fn bind(&mut self, question_id: impl Into<String>, file: BoundFile) {
        self.0.insert(question_id.into(), file);
    }

    pub fn unbind(&mut self, question_id: &str) -> Option<BoundFile> {
        self.0.remove(question_id)
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Question id -> message currently shown under the question
pub type ErrorMap = HashMap<String, String>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_number_rejects_nan() {
        assert!(AnswerValue::number(f64::NAN).is_none());
        assert!(AnswerValue::number(f64::INFINITY).is_none());
        assert_eq!(serde_json::to_value(AnswerValue::number(4.0).unwrap()).unwrap(), json!(4));
        assert_eq!(serde_json::to_value(AnswerValue::number(2.5).unwrap()).unwrap(), json!(2.5));
        assert!(AnswerValue::parse_number("").is_none());
        assert!(AnswerValue::parse_number("abc").is_none());
        assert_eq!(AnswerValue::parse_number(" 42 "), AnswerValue::number(42.0));
    }

    #[test]
    fn test_from_json_by_type() {
        let text = AnswerType::Text;
        assert_eq!(
            AnswerValue::from_json(&text, &json!("hello")),
            Some(AnswerValue::text("hello"))
        );
        assert_eq!(AnswerValue::from_json(&text, &json!(["a"])), None);
        assert_eq!(AnswerValue::from_json(&text, &Value::Null), None);

        assert_eq!(
            AnswerValue::from_json(&AnswerType::Boolean, &json!("Yes")),
            Some(AnswerValue::Boolean(true))
        );
        assert_eq!(
            AnswerValue::from_json(&AnswerType::Checkbox, &json!(["a", "b"])),
            Some(AnswerValue::Choices(vec!["a".into(), "b".into()]))
        );
        assert_eq!(AnswerValue::from_json(&AnswerType::Checkbox, &json!(["a", 1])), None);
        assert_eq!(AnswerValue::from_json(&AnswerType::File, &json!("cv.pdf")), None);
    }

    #[test]
    fn test_fits() {
        assert!(AnswerValue::text("x").fits(&AnswerType::Radio));
        assert!(!AnswerValue::text("x").fits(&AnswerType::Checkbox));
        assert!(AnswerValue::Boolean(false).fits(&AnswerType::Boolean));
        assert!(!AnswerValue::Boolean(false).fits(&AnswerType::Unknown("x".into())));
    }

    #[test]
    fn test_descriptor_wire_names() {
        let mut file = BoundFile::new("cv.pdf", "application/pdf", vec![0u8; 2048]);
        file.last_modified = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();
        assert_eq!(
            serde_json::to_value(file.descriptor()).unwrap(),
            json!({ "name": "cv.pdf", "size": 2048, "type": "application/pdf", "lastModified": 1_700_000_000_000i64 })
        );
    }

    #[test]
    fn test_content_type_guess() {
        assert_eq!(content_type_for(Path::new("scan.PDF")), "application/pdf");
        assert_eq!(content_type_for(Path::new("photo.jpeg")), "image/jpeg");
        assert_eq!(content_type_for(Path::new("blob")), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_from_path() {
        let path = std::env::temp_dir().join(format!("formgate-{}.txt", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, b"hello").await.unwrap();

        let file = BoundFile::from_path(&path, None).await.unwrap();
        assert_eq!(file.size(), 5);
        assert_eq!(file.content_type, "text/plain");
        assert!(file.name.ends_with(".txt"));

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[test]
    fn test_maps() {
        let mut answers = AnswerMap::new();
        answers.set("q1", AnswerValue::text("a"));
        assert_eq!(answers.len(), 1);
        assert!(answers.remove("q1").is_some());
        assert!(answers.is_empty());

        let mut files = FileBindings::new();
        files.bind("q2", BoundFile::new("a.txt", "text/plain", "x"));
        assert_eq!(files.get("q2").unwrap().size(), 1);
        files.clear();
        assert!(files.is_empty());
    }
}
