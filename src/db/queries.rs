//! # Query Executor
//!
//! One fixed SQL shape per endpoint. Optional filters append a conjunctive
//! `WHERE` clause; every literal travels as a bound parameter.

use sqlx::any::AnyArguments;
use sqlx::query::{QueryAs, QueryScalar};
use sqlx::{Any, AnyConnection, Connection};

use super::errors::DbResult;
use super::filter::{FilterSet, SqlValue};
use crate::quiz::{
    LeaderboardEntry, NewQuestion, Question, QuestionFilter, ResultFilter, ResultRow,
    StatisticsFilter, Submission,
};
use crate::quiz::model::StudentScoreRow;

/// Upper bound on leaderboard rows
pub const LEADERBOARD_LIMIT: i64 = 50;

const QUESTION_COLUMNS: &str =
    "id, question, option_a, option_b, option_c, option_d, image, grade, lesson";

const RESULT_COLUMNS: &str = "id, username, class_name, lesson_from, lesson_to, \
     total_questions, score, answers, created_at";

type AnyQueryAs<'q, O> = QueryAs<'q, Any, O, AnyArguments<'q>>;
type AnyQueryScalar<'q, O> = QueryScalar<'q, Any, O, AnyArguments<'q>>;

fn bind_values<'q, O>(
    mut query: AnyQueryAs<'q, O>,
    values: impl IntoIterator<Item = SqlValue>,
) -> AnyQueryAs<'q, O> {
    for value in values {
        query = match value {
            SqlValue::Text(s) => query.bind(s),
            SqlValue::Int(i) => query.bind(i),
        };
    }
    query
}

fn bind_scalar_values<'q, O>(
    mut query: AnyQueryScalar<'q, O>,
    values: impl IntoIterator<Item = SqlValue>,
) -> AnyQueryScalar<'q, O> {
    for value in values {
        query = match value {
            SqlValue::Text(s) => query.bind(s),
            SqlValue::Int(i) => query.bind(i),
        };
    }
    query
}

fn owned_values(filters: &FilterSet) -> Vec<SqlValue> {
    filters.values().cloned().collect()
}

/// Build `INSERT INTO table (..) VALUES ($1, ..) RETURNING id` from the
/// columns that carry a value; absent optional columns stay NULL.
fn insert_statement(table: &str, columns: &[(&str, SqlValue)]) -> String {
    let names: Vec<&str> = columns.iter().map(|(name, _)| *name).collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("${}", i)).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING id",
        table,
        names.join(", "),
        placeholders.join(", ")
    )
}

fn submission_columns(submission: &Submission, created_at: &str) -> Vec<(&'static str, SqlValue)> {
    let mut columns = vec![
        ("username", SqlValue::Text(submission.username.clone())),
        ("score", SqlValue::Int(submission.score)),
        ("answers", SqlValue::Text(submission.answers.clone())),
        ("created_at", SqlValue::Text(created_at.to_string())),
    ];
    if let Some(class_name) = &submission.class_name {
        columns.push(("class_name", SqlValue::Text(class_name.clone())));
    }
    for (name, value) in [
        ("lesson_from", submission.lesson_from),
        ("lesson_to", submission.lesson_to),
        ("total_questions", submission.total_questions),
    ] {
        if let Some(v) = value {
            columns.push((name, SqlValue::Int(v)));
        }
    }
    columns
}

fn question_columns(question: &NewQuestion) -> Vec<(&'static str, SqlValue)> {
    let mut columns = vec![
        ("question", SqlValue::Text(question.question.clone())),
        ("option_a", SqlValue::Text(question.option_a.clone())),
        ("option_b", SqlValue::Text(question.option_b.clone())),
        ("option_c", SqlValue::Text(question.option_c.clone())),
        ("option_d", SqlValue::Text(question.option_d.clone())),
        ("answer", SqlValue::Text(question.answer.clone())),
    ];
    if let Some(image) = &question.image {
        columns.push(("image", SqlValue::Text(image.clone())));
    }
    if let Some(grade) = &question.grade {
        columns.push(("grade", SqlValue::Text(grade.clone())));
    }
    if let Some(lesson) = question.lesson {
        columns.push(("lesson", SqlValue::Int(lesson)));
    }
    columns
}

/// List questions matching every filter present, by id
pub async fn fetch_questions(
    conn: &mut AnyConnection,
    filter: &QuestionFilter,
) -> DbResult<Vec<Question>> {
    let filters = filter.filter_set();
    let sql = format!(
        "SELECT {} FROM questions{} ORDER BY id",
        QUESTION_COLUMNS,
        filters.where_clause(1)
    );
    let query = bind_values(sqlx::query_as::<_, Question>(&sql), owned_values(&filters));
    Ok(query.fetch_all(&mut *conn).await?)
}

/// Insert one result inside a transaction and return its assigned id
///
/// On failure the transaction is rolled back before the error is returned.
pub async fn insert_result(
    conn: &mut AnyConnection,
    submission: &Submission,
    created_at: &str,
) -> DbResult<i64> {
    let columns = submission_columns(submission, created_at);
    let sql = insert_statement("results", &columns);

    let mut tx = conn.begin().await?;
    let query = bind_scalar_values(
        sqlx::query_scalar::<_, i64>(&sql),
        columns.into_iter().map(|(_, v)| v),
    );
    match query.fetch_one(&mut *tx).await {
        Ok(id) => {
            tx.commit().await?;
            Ok(id)
        }
        Err(e) => {
            if let Err(rollback) = tx.rollback().await {
                tracing::warn!(error = %rollback, "rollback after failed insert also failed");
            }
            Err(e.into())
        }
    }
}

/// Top results by score, ties broken by recency
pub async fn fetch_leaderboard(
    conn: &mut AnyConnection,
    filter: &ResultFilter,
) -> DbResult<Vec<LeaderboardEntry>> {
    let filters = filter.filter_set();
    let sql = format!(
        "SELECT id, username, score, created_at FROM results{} \
         ORDER BY score DESC, created_at DESC, id DESC LIMIT {}",
        filters.where_clause(1),
        LEADERBOARD_LIMIT
    );
    let query = bind_values(
        sqlx::query_as::<_, LeaderboardEntry>(&sql),
        owned_values(&filters),
    );
    Ok(query.fetch_all(&mut *conn).await?)
}

/// Every matching result, newest first
pub async fn fetch_history(
    conn: &mut AnyConnection,
    filter: &ResultFilter,
) -> DbResult<Vec<ResultRow>> {
    let filters = filter.filter_set();
    let sql = format!(
        "SELECT {} FROM results{} ORDER BY created_at DESC, id DESC",
        RESULT_COLUMNS,
        filters.where_clause(1)
    );
    let query = bind_values(sqlx::query_as::<_, ResultRow>(&sql), owned_values(&filters));
    Ok(query.fetch_all(&mut *conn).await?)
}

/// Every result, oldest first, for export
pub async fn fetch_all_results(conn: &mut AnyConnection) -> DbResult<Vec<ResultRow>> {
    let sql = format!("SELECT {} FROM results ORDER BY id", RESULT_COLUMNS);
    Ok(sqlx::query_as::<_, ResultRow>(&sql)
        .fetch_all(&mut *conn)
        .await?)
}

/// Attempts, best and summed score per student
pub async fn fetch_student_scores(
    conn: &mut AnyConnection,
    filter: &StatisticsFilter,
) -> DbResult<Vec<StudentScoreRow>> {
    let filters = filter.filter_set();
    let sql = format!(
        "SELECT username, COUNT(*) AS attempts, MAX(score) AS best_score, \
         CAST(SUM(score) AS BIGINT) AS total_score FROM results{} \
         GROUP BY username ORDER BY best_score DESC, username ASC",
        filters.where_clause(1)
    );
    let query = bind_values(
        sqlx::query_as::<_, StudentScoreRow>(&sql),
        owned_values(&filters),
    );
    Ok(query.fetch_all(&mut *conn).await?)
}

/// Insert all questions in one transaction; nothing is kept on failure
pub async fn insert_questions(
    conn: &mut AnyConnection,
    questions: &[NewQuestion],
) -> DbResult<u64> {
    let mut tx = conn.begin().await?;
    let mut inserted = 0u64;

    for question in questions {
        let columns = question_columns(question);
        let sql = insert_statement("questions", &columns);
        let query = bind_scalar_values(
            sqlx::query_scalar::<_, i64>(&sql),
            columns.into_iter().map(|(_, v)| v),
        );
        if let Err(e) = query.fetch_one(&mut *tx).await {
            if let Err(rollback) = tx.rollback().await {
                tracing::warn!(error = %rollback, "rollback after failed import also failed");
            }
            return Err(e.into());
        }
        inserted += 1;
    }

    tx.commit().await?;
    Ok(inserted)
}
