//! # Quiz Records
//!
//! Rows read from and written to the `questions` and `results` tables, and
//! the JSON shapes returned to clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fixed-width UTC timestamp; text order equals time order
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// Format a timestamp for storage in `created_at`
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// The current time, formatted for `created_at`
pub fn timestamp_now() -> String {
    format_timestamp(Utc::now())
}

/// A multiple-choice question as served to quiz takers
///
/// The correct option is stored but never listed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Question {
    pub id: i64,
    pub question: String,
    pub option_a: String,
    pub option_b: String,
    pub option_c: String,
    pub option_d: String,
    pub image: Option<String>,
    pub grade: Option<String>,
    pub lesson: Option<i64>,
}

/// A question to be imported; the id is assigned by the database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewQuestion {
    pub question: String,
    pub option_a: String,
    pub option_b: String,
    pub option_c: String,
    pub option_d: String,
    pub answer: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub grade: Option<String>,
    #[serde(default)]
    pub lesson: Option<i64>,
}

impl NewQuestion {
    /// Trim text fields and normalize the answer marker to `A`..`D`
    pub fn normalize(mut self) -> Result<Self, String> {
        for (name, field) in [
            ("question", &mut self.question),
            ("option_a", &mut self.option_a),
            ("option_b", &mut self.option_b),
            ("option_c", &mut self.option_c),
            ("option_d", &mut self.option_d),
        ] {
            *field = field.trim().to_string();
            if field.is_empty() {
                return Err(format!("{} must not be empty", name));
            }
        }

        let answer = self.answer.trim().to_ascii_uppercase();
        if !matches!(answer.as_str(), "A" | "B" | "C" | "D") {
            return Err("answer must be one of A, B, C, D".to_string());
        }
        self.answer = answer;

        self.image = self.image.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        self.grade = self.grade.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        if matches!(self.lesson, Some(n) if n < 0) {
            return Err("lesson must be a non-negative integer".to_string());
        }
        Ok(self)
    }
}

/// A validated quiz submission, ready to insert
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub username: String,
    pub score: i64,
    /// The answer list serialized as JSON text
    pub answers: String,
    pub class_name: Option<String>,
    pub lesson_from: Option<i64>,
    pub lesson_to: Option<i64>,
    pub total_questions: Option<i64>,
}

/// One leaderboard row
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct LeaderboardEntry {
    pub id: i64,
    pub username: String,
    pub score: i64,
    pub created_at: String,
}

/// A full `results` row as stored
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ResultRow {
    pub id: i64,
    pub username: String,
    pub class_name: Option<String>,
    pub lesson_from: Option<i64>,
    pub lesson_to: Option<i64>,
    pub total_questions: Option<i64>,
    pub score: i64,
    pub answers: String,
    pub created_at: String,
}

/// A result as returned by the history endpoint, answers decoded
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRecord {
    pub id: i64,
    pub username: String,
    pub class_name: Option<String>,
    pub lesson_from: Option<i64>,
    pub lesson_to: Option<i64>,
    pub total_questions: Option<i64>,
    pub score: i64,
    pub answers: Value,
    pub created_at: String,
}

impl From<ResultRow> for ResultRecord {
    fn from(row: ResultRow) -> Self {
        // Rows written by older imports may hold plain text
        let answers = serde_json::from_str(&row.answers).unwrap_or(Value::String(row.answers));
        Self {
            id: row.id,
            username: row.username,
            class_name: row.class_name,
            lesson_from: row.lesson_from,
            lesson_to: row.lesson_to,
            total_questions: row.total_questions,
            score: row.score,
            answers,
            created_at: row.created_at,
        }
    }
}

/// Per-student aggregate row
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct StudentScoreRow {
    pub username: String,
    pub attempts: i64,
    pub best_score: i64,
    pub total_score: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentScore {
    pub username: String,
    pub attempts: i64,
    pub best_score: i64,
    pub average_score: f64,
}

/// Aggregate counts plus per-student scores
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statistics {
    pub total_submissions: i64,
    pub distinct_students: usize,
    pub average_score: f64,
    pub highest_score: Option<i64>,
    pub students: Vec<StudentScore>,
}

impl Statistics {
    /// Fold per-student rows into the overall figures
    pub fn from_rows(rows: Vec<StudentScoreRow>) -> Self {
        let total_submissions: i64 = rows.iter().map(|r| r.attempts).sum();
        let total_score: i64 = rows.iter().map(|r| r.total_score).sum();
        let highest_score = rows.iter().map(|r| r.best_score).max();

        let students: Vec<StudentScore> = rows
            .into_iter()
            .map(|r| StudentScore {
                average_score: average(r.total_score, r.attempts),
                username: r.username,
                attempts: r.attempts,
                best_score: r.best_score,
            })
            .collect();

        Self {
            total_submissions,
            distinct_students: students.len(),
            average_score: average(total_score, total_submissions),
            highest_score,
            students,
        }
    }
}

/// Mean rounded to two decimals; zero when there is nothing to average
fn average(total: i64, count: i64) -> f64 {
    if count == 0 {
        return 0.0;
    }
    (total as f64 / count as f64 * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn new_question() -> NewQuestion {
        NewQuestion {
            question: "  2 + 2 = ?  ".to_string(),
            option_a: "3".to_string(),
            option_b: "4".to_string(),
            option_c: "5".to_string(),
            option_d: "22".to_string(),
            answer: " b ".to_string(),
            image: Some("".to_string()),
            grade: Some(" 7 ".to_string()),
            lesson: Some(1),
        }
    }

    #[test]
    fn test_timestamp_is_fixed_width() {
        let early = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 11, 2, 3, 4, 5).unwrap();
        assert_eq!(format_timestamp(early), "2024-01-02T03:04:05.000000Z");
        assert!(format_timestamp(early) < format_timestamp(late));
    }

    #[test]
    fn test_normalize_question() {
        let q = new_question().normalize().unwrap();
        assert_eq!(q.question, "2 + 2 = ?");
        assert_eq!(q.answer, "B");
        assert_eq!(q.image, None);
        assert_eq!(q.grade.as_deref(), Some("7"));
    }

    #[test]
    fn test_normalize_rejects_bad_answer() {
        let mut q = new_question();
        q.answer = "E".to_string();
        assert!(q.normalize().is_err());

        let mut q = new_question();
        q.option_c = "   ".to_string();
        assert_eq!(q.normalize().unwrap_err(), "option_c must not be empty");
    }

    #[test]
    fn test_result_record_decodes_answers() {
        let row = ResultRow {
            id: 1,
            username: "ana".to_string(),
            class_name: None,
            lesson_from: None,
            lesson_to: None,
            total_questions: None,
            score: 7,
            answers: r#"["a","b"]"#.to_string(),
            created_at: "2024-01-01T00:00:00.000000Z".to_string(),
        };
        let record = ResultRecord::from(row.clone());
        assert_eq!(record.answers, json!(["a", "b"]));

        let legacy = ResultRecord::from(ResultRow {
            answers: "a,b".to_string(),
            ..row
        });
        assert_eq!(legacy.answers, json!("a,b"));
    }

    #[test]
    fn test_statistics_from_rows() {
        let stats = Statistics::from_rows(vec![
            StudentScoreRow {
                username: "ana".to_string(),
                attempts: 2,
                best_score: 9,
                total_score: 16,
            },
            StudentScoreRow {
                username: "bob".to_string(),
                attempts: 1,
                best_score: 5,
                total_score: 5,
            },
        ]);
        assert_eq!(stats.total_submissions, 3);
        assert_eq!(stats.distinct_students, 2);
        assert_eq!(stats.average_score, 7.0);
        assert_eq!(stats.highest_score, Some(9));
        assert_eq!(stats.students[0].average_score, 8.0);
    }

    #[test]
    fn test_statistics_empty() {
        let stats = Statistics::from_rows(Vec::new());
        assert_eq!(stats.total_submissions, 0);
        assert_eq!(stats.average_score, 0.0);
        assert_eq!(stats.highest_score, None);
    }
}
