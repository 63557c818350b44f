//! # Question Import
//!
//! Parses question sets from uploaded or local JSON files.

use super::model::NewQuestion;
use super::validation::ValidationError;

/// Classification applied to questions that carry none of their own
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportDefaults {
    pub grade: Option<String>,
    pub lesson: Option<i64>,
}

/// Parse a JSON array of questions and normalize each entry
///
/// The whole file is rejected if any entry is invalid.
pub fn parse_questions(
    bytes: &[u8],
    defaults: &ImportDefaults,
) -> Result<Vec<NewQuestion>, ValidationError> {
    let raw: Vec<NewQuestion> =
        serde_json::from_slice(bytes).map_err(|_| ValidationError::InvalidFile)?;
    if raw.is_empty() {
        return Err(ValidationError::InvalidFile);
    }

    raw.into_iter()
        .enumerate()
        .map(|(index, mut question)| {
            if question.grade.is_none() {
                question.grade = defaults.grade.clone();
            }
            if question.lesson.is_none() {
                question.lesson = defaults.lesson;
            }
            question
                .normalize()
                .map_err(|reason| ValidationError::InvalidQuestion { index, reason })
        })
        .collect()
}
