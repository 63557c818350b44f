//! # Request Validation
//!
//! Checks on the submit payload and on listing query parameters.
//!
//! The submit body is inspected as a raw JSON value so that a missing field,
//! a wrong type and an out-of-range value each get their own message.

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use super::filters::{QuestionFilter, ResultFilter, StatisticsFilter};
use super::model::Submission;

pub const USERNAME_MIN_CHARS: usize = 3;
pub const USERNAME_MAX_CHARS: usize = 50;
pub const CLASS_NAME_MAX_CHARS: usize = 50;

/// Client input errors; every variant maps to 400
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid JSON payload")]
    InvalidPayload,

    #[error("Missing required fields")]
    MissingFields,

    #[error("Username must be string between 3-50 characters")]
    InvalidUsername,

    #[error("Score must be a non-negative integer")]
    InvalidScore,

    #[error("Answers must be a list")]
    AnswersNotList,

    #[error("Invalid answers format")]
    InvalidAnswers,

    #[error("Class name must be a string of at most 50 characters")]
    InvalidClassName,

    /// An optional numeric body field is present but not a non-negative integer
    #[error("{0} must be a non-negative integer")]
    InvalidCount(&'static str),

    #[error("lesson_from must not exceed lesson_to")]
    InvalidLessonRange,

    #[error("Score must not exceed total_questions")]
    ScoreExceedsTotal,

    /// A numeric query parameter did not parse
    #[error("{0} must be an integer")]
    InvalidFilter(&'static str),

    #[error("Invalid query parameters")]
    InvalidQuery,

    #[error("No file uploaded")]
    MissingFile,

    #[error("Uploaded file must be a JSON array of questions")]
    InvalidFile,

    #[error("Invalid question at index {index}: {reason}")]
    InvalidQuestion { index: usize, reason: String },

    #[error("Invalid multipart payload")]
    InvalidMultipart,
}

/// Validate a raw submit body
pub fn validate_submission(body: &[u8]) -> Result<Submission, ValidationError> {
    let data: Map<String, Value> = match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) if !map.is_empty() => map,
        _ => return Err(ValidationError::InvalidPayload),
    };

    if ["username", "score", "answers"]
        .iter()
        .any(|field| !data.contains_key(*field))
    {
        return Err(ValidationError::MissingFields);
    }

    let username = match &data["username"] {
        Value::String(s)
            if (USERNAME_MIN_CHARS..=USERNAME_MAX_CHARS).contains(&s.chars().count()) =>
        {
            s.clone()
        }
        _ => return Err(ValidationError::InvalidUsername),
    };

    let score = non_negative_int(&data["score"]).ok_or(ValidationError::InvalidScore)?;

    let answers = match &data["answers"] {
        Value::Array(items) => {
            serde_json::to_string(items).map_err(|_| ValidationError::InvalidAnswers)?
        }
        _ => return Err(ValidationError::AnswersNotList),
    };

    let class_name = match optional(&data, "class_name") {
        None => None,
        Some(Value::String(s)) if s.chars().count() <= CLASS_NAME_MAX_CHARS => {
            Some(s.trim().to_string()).filter(|s| !s.is_empty())
        }
        Some(_) => return Err(ValidationError::InvalidClassName),
    };

    let lesson_from = optional_count(&data, "lesson_from")?;
    let lesson_to = optional_count(&data, "lesson_to")?;
    let total_questions = optional_count(&data, "total_questions")?;

    if let (Some(from), Some(to)) = (lesson_from, lesson_to) {
        if from > to {
            return Err(ValidationError::InvalidLessonRange);
        }
    }
    if matches!(total_questions, Some(total) if score > total) {
        return Err(ValidationError::ScoreExceedsTotal);
    }

    Ok(Submission {
        username,
        score,
        answers,
        class_name,
        lesson_from,
        lesson_to,
        total_questions,
    })
}

/// A JSON integer >= 0; floats and booleans are rejected
fn non_negative_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().filter(|v| *v >= 0),
        _ => None,
    }
}

/// A field that is absent or explicitly null counts as not provided
fn optional<'a>(data: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
    data.get(field).filter(|v| !v.is_null())
}

fn optional_count(
    data: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<i64>, ValidationError> {
    match optional(data, field) {
        None => Ok(None),
        Some(value) => non_negative_int(value)
            .map(Some)
            .ok_or(ValidationError::InvalidCount(field)),
    }
}

/// Parse an optional integer query parameter; blank counts as absent
pub(crate) fn parse_int_param(
    raw: Option<&str>,
    name: &'static str,
) -> Result<Option<i64>, ValidationError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => s
            .parse::<i64>()
            .map(Some)
            .map_err(|_| ValidationError::InvalidFilter(name)),
    }
}

fn text_param(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Query string of `GET /api/questions`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuestionParams {
    pub grade: Option<String>,
    pub lesson_from: Option<String>,
    pub lesson_to: Option<String>,
}

impl QuestionParams {
    pub fn into_filter(self) -> Result<QuestionFilter, ValidationError> {
        Ok(QuestionFilter {
            lesson_from: parse_int_param(self.lesson_from.as_deref(), "lesson_from")?,
            lesson_to: parse_int_param(self.lesson_to.as_deref(), "lesson_to")?,
            grade: text_param(self.grade),
        })
    }
}

/// Query string of `GET /api/results` and `GET /api/history`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultParams {
    pub username: Option<String>,
    pub class_name: Option<String>,
}

impl ResultParams {
    pub fn into_filter(self) -> ResultFilter {
        ResultFilter {
            username: text_param(self.username),
            class_name: text_param(self.class_name),
        }
    }
}

/// Query string of `GET /api/statistics`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatisticsParams {
    pub class_name: Option<String>,
    pub lesson_from: Option<String>,
    pub lesson_to: Option<String>,
}

impl StatisticsParams {
    pub fn into_filter(self) -> Result<StatisticsFilter, ValidationError> {
        Ok(StatisticsFilter {
            lesson_from: parse_int_param(self.lesson_from.as_deref(), "lesson_from")?,
            lesson_to: parse_int_param(self.lesson_to.as_deref(), "lesson_to")?,
            class_name: text_param(self.class_name),
        })
    }
}
