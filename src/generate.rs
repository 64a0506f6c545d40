//! The boundary to whatever produces notebook markdown.
//!
//! Only the request shape and the collaborator trait live here. Prompting,
//! retries and credentials belong to the implementor.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GenerateError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("Note generation failed: {0}")]
    Backend(String),
}

/// Language the notes are written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Language {
    #[default]
    English,
    Bengali,
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::English => f.write_str("English"),
            Language::Bengali => f.write_str("Bengali"),
        }
    }
}

/// What the user asked notes for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteRequest {
    pub topic: String,
    pub grade: String,
    pub language: Language,
}

impl NoteRequest {
    /// Build a request from form input. Topic and grade are trimmed and must
    /// not be empty.
    pub fn new(
        topic: impl Into<String>,
        grade: impl Into<String>,
        language: Language,
    ) -> Result<Self, GenerateError> {
        let topic = topic.into().trim().to_string();
        let grade = grade.into().trim().to_string();
        if topic.is_empty() {
            return Err(GenerateError::MissingField("topic"));
        }
        if grade.is_empty() {
            return Err(GenerateError::MissingField("grade"));
        }
        Ok(Self {
            topic,
            grade,
            language,
        })
    }
}

/// Produces the markdown body of a notebook.
pub trait NoteGenerator {
    fn generate(&self, request: &NoteRequest) -> Result<String, GenerateError>;
}

impl<F> NoteGenerator for F
where
    F: Fn(&NoteRequest) -> Result<String, GenerateError>,
{
    fn generate(&self, request: &NoteRequest) -> Result<String, GenerateError> {
        self(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_trims_fields() {
        let request = NoteRequest::new("  Photosynthesis ", " 8 ", Language::Bengali).unwrap();
        assert_eq!(request.topic, "Photosynthesis");
        assert_eq!(request.grade, "8");
        assert_eq!(request.language, Language::Bengali);
    }

    #[test]
    fn request_requires_topic_and_grade() {
        assert_eq!(
            NoteRequest::new("", "8", Language::English),
            Err(GenerateError::MissingField("topic"))
        );
        assert_eq!(
            NoteRequest::new("Cells", "   ", Language::English),
            Err(GenerateError::MissingField("grade"))
        );
    }

    #[test]
    fn closures_are_generators() {
        let generator =
            |request: &NoteRequest| Ok::<_, GenerateError>(format!("# {}", request.topic));
        let request = NoteRequest::new("Cells", "6", Language::default()).unwrap();
        assert_eq!(generator.generate(&request).unwrap(), "# Cells");
    }

    #[test]
    fn request_serializes_language_by_name() {
        let request = NoteRequest::new("Cells", "6", Language::Bengali).unwrap();
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(json, r#"{"topic":"Cells","grade":"6","language":"Bengali"}"#);
    }
}
