//! # Quiz Domain
//!
//! Questions, submissions, validation rules and file formats.

pub mod export;
pub mod filters;
pub mod import;
pub mod model;
pub mod validation;

pub use filters::{QuestionFilter, ResultFilter, StatisticsFilter};
pub use import::{parse_questions, ImportDefaults};
pub use model::{
    LeaderboardEntry, NewQuestion, Question, ResultRecord, ResultRow, Statistics, Submission,
};
pub use validation::{validate_submission, ValidationError};
