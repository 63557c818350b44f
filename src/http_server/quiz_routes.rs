//! Quiz HTTP Routes
//!
//! Endpoints for questions, submissions, leaderboard, history, statistics,
//! results export and question upload.
//!
//! Every handler follows the same path: validate input, lease one
//! connection, run one statement (or one short transaction), serialize the
//! rows. The lease is dropped on every exit path.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{
        multipart::MultipartRejection, rejection::QueryRejection, Multipart, Query, State,
    },
    http::{header, HeaderMap, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use super::config::{routes, RateLimitConfig};
use super::errors::{ApiError, ApiResult};
use super::rate_limit::{enforce_rate_limit, RateLimiter, RouteLimit};
use crate::db::{queries, ConnectionPool, DbError, Lease};
use crate::observability::MetricsRegistry;
use crate::quiz::export::results_to_csv;
use crate::quiz::validation::{
    parse_int_param, QuestionParams, ResultParams, StatisticsParams, ValidationError,
};
use crate::quiz::{
    model::timestamp_now, parse_questions, validate_submission, ImportDefaults,
    LeaderboardEntry, Question, ResultRecord, Statistics,
};

// ==================
// Shared State
// ==================

/// Quiz state shared across handlers
pub struct QuizState {
    pub pool: ConnectionPool,
    pub metrics: Arc<MetricsRegistry>,
}

impl QuizState {
    pub fn new(pool: ConnectionPool, metrics: Arc<MetricsRegistry>) -> Self {
        Self { pool, metrics }
    }

    /// Borrow a connection or fail with `Database unavailable`
    async fn lease(&self) -> ApiResult<Lease> {
        match self.pool.acquire().await {
            Ok(lease) => {
                self.metrics.increment_leases_acquired();
                Ok(lease)
            }
            Err(e) => {
                self.metrics.increment_database_errors();
                tracing::error!(error = %e, "could not acquire database connection");
                Err(ApiError::DatabaseUnavailable)
            }
        }
    }

    /// Log the driver error and replace it with a generic message
    fn query_failed(&self, context: &'static str, err: DbError) -> ApiError {
        self.metrics.increment_database_errors();
        tracing::error!(error = %err, "{}", context);
        ApiError::Query(context)
    }

    fn rejected(&self, err: ValidationError) -> ApiError {
        self.metrics.increment_validation_failures();
        tracing::debug!(reason = %err, "request rejected");
        ApiError::Validation(err)
    }
}

// ==================
// Response Types
// ==================

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub imported: u64,
}

// ==================
// Quiz Routes
// ==================

/// Create quiz routes; each route gets its own rate limits
pub fn quiz_routes(
    state: Arc<QuizState>,
    limits: &RateLimitConfig,
    limiter: Arc<RateLimiter>,
) -> Router {
    let limit = |route: &'static str| {
        middleware::from_fn_with_state(
            RouteLimit {
                route,
                limits: limits.limits_for(route).into(),
                limiter: Arc::clone(&limiter),
                metrics: Arc::clone(&state.metrics),
            },
            enforce_rate_limit,
        )
    };

    Router::new()
        .route(
            "/questions",
            get(list_questions_handler).layer(limit(routes::QUESTIONS)),
        )
        .route(
            "/submit",
            post(submit_handler).layer(limit(routes::SUBMIT)),
        )
        .route(
            "/results",
            get(leaderboard_handler).layer(limit(routes::RESULTS)),
        )
        .route(
            "/history",
            get(history_handler).layer(limit(routes::HISTORY)),
        )
        .route(
            "/statistics",
            get(statistics_handler).layer(limit(routes::STATISTICS)),
        )
        .route(
            "/download-results",
            get(download_results_handler).layer(limit(routes::DOWNLOAD_RESULTS)),
        )
        .route(
            "/upload",
            post(upload_handler).layer(limit(routes::UPLOAD)),
        )
        .with_state(state)
}

// ==================
// Handlers
// ==================

/// `application/json` or an `application/*+json` type, parameters ignored
fn has_json_content_type(headers: &HeaderMap) -> bool {
    let Some(value) = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
    else {
        return false;
    };
    let essence = value
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence == "application/json"
        || (essence.starts_with("application/") && essence.ends_with("+json"))
}

/// List questions, optionally narrowed by grade and lesson range
async fn list_questions_handler(
    State(state): State<Arc<QuizState>>,
    params: Result<Query<QuestionParams>, QueryRejection>,
) -> ApiResult<Json<Vec<Question>>> {
    let Query(params) = params.map_err(|_| state.rejected(ValidationError::InvalidQuery))?;
    let filter = params.into_filter().map_err(|e| state.rejected(e))?;

    let mut lease = state.lease().await?;
    let questions = queries::fetch_questions(&mut lease, &filter)
        .await
        .map_err(|e| state.query_failed("Failed to fetch questions", e))?;

    Ok(Json(questions))
}

/// Store one quiz result
///
/// Only JSON bodies are accepted. Other content types are form-encodable
/// simple requests that skip the CORS preflight.
async fn submit_handler(
    State(state): State<Arc<QuizState>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    if !has_json_content_type(&headers) {
        return Err(state.rejected(ValidationError::InvalidPayload));
    }
    let submission = validate_submission(&body).map_err(|e| state.rejected(e))?;

    let mut lease = state.lease().await?;
    let id = queries::insert_result(&mut lease, &submission, &timestamp_now())
        .await
        .map_err(|e| state.query_failed("Failed to save results", e))?;

    state.metrics.increment_submissions_saved();
    tracing::info!(
        id,
        username = %submission.username,
        score = submission.score,
        "results saved"
    );

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "Results saved successfully!".to_string(),
        }),
    ))
}

/// Top 50 results by score, then recency
async fn leaderboard_handler(
    State(state): State<Arc<QuizState>>,
    params: Result<Query<ResultParams>, QueryRejection>,
) -> ApiResult<Json<Vec<LeaderboardEntry>>> {
    let Query(params) = params.map_err(|_| state.rejected(ValidationError::InvalidQuery))?;
    let filter = params.into_filter();

    let mut lease = state.lease().await?;
    let entries = queries::fetch_leaderboard(&mut lease, &filter)
        .await
        .map_err(|e| state.query_failed("Failed to fetch results", e))?;

    Ok(Json(entries))
}

/// Every matching result with its answers, newest first
async fn history_handler(
    State(state): State<Arc<QuizState>>,
    params: Result<Query<ResultParams>, QueryRejection>,
) -> ApiResult<Json<Vec<ResultRecord>>> {
    let Query(params) = params.map_err(|_| state.rejected(ValidationError::InvalidQuery))?;
    let filter = params.into_filter();

    let mut lease = state.lease().await?;
    let rows = queries::fetch_history(&mut lease, &filter)
        .await
        .map_err(|e| state.query_failed("Failed to fetch history", e))?;

    Ok(Json(rows.into_iter().map(ResultRecord::from).collect()))
}

/// Aggregate counts and per-student scores
async fn statistics_handler(
    State(state): State<Arc<QuizState>>,
    params: Result<Query<StatisticsParams>, QueryRejection>,
) -> ApiResult<Json<Statistics>> {
    let Query(params) = params.map_err(|_| state.rejected(ValidationError::InvalidQuery))?;
    let filter = params.into_filter().map_err(|e| state.rejected(e))?;

    let mut lease = state.lease().await?;
    let rows = queries::fetch_student_scores(&mut lease, &filter)
        .await
        .map_err(|e| state.query_failed("Failed to fetch statistics", e))?;

    Ok(Json(Statistics::from_rows(rows)))
}

/// All results as a CSV attachment
async fn download_results_handler(State(state): State<Arc<QuizState>>) -> ApiResult<Response> {
    let mut lease = state.lease().await?;
    let rows = queries::fetch_all_results(&mut lease)
        .await
        .map_err(|e| state.query_failed("Failed to export results", e))?;
    lease.release();

    let csv = results_to_csv(&rows);
    tracing::info!(rows = rows.len(), "results exported");

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"results.csv\"",
            ),
        ],
        csv,
    )
        .into_response())
}

/// Import a JSON array of questions from a multipart `file` field
///
/// Optional `grade` and `lesson` fields classify questions that carry no
/// classification of their own.
async fn upload_handler(
    State(state): State<Arc<QuizState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<UploadResponse>> {
    let mut multipart =
        multipart.map_err(|_| state.rejected(ValidationError::InvalidMultipart))?;

    let mut file: Option<Bytes> = None;
    let mut defaults = ImportDefaults::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| state.rejected(ValidationError::InvalidMultipart))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|_| state.rejected(ValidationError::InvalidMultipart))?;
                file = Some(bytes).filter(|b| !b.is_empty());
            }
            Some("grade") => {
                let text = field
                    .text()
                    .await
                    .map_err(|_| state.rejected(ValidationError::InvalidMultipart))?;
                defaults.grade = Some(text.trim().to_string()).filter(|s| !s.is_empty());
            }
            Some("lesson") => {
                let text = field
                    .text()
                    .await
                    .map_err(|_| state.rejected(ValidationError::InvalidMultipart))?;
                defaults.lesson =
                    parse_int_param(Some(text.as_str()), "lesson").map_err(|e| state.rejected(e))?;
            }
            _ => {}
        }
    }

    let file = file.ok_or_else(|| state.rejected(ValidationError::MissingFile))?;
    let questions = parse_questions(&file, &defaults).map_err(|e| state.rejected(e))?;

    let mut lease = state.lease().await?;
    let imported = queries::insert_questions(&mut lease, &questions)
        .await
        .map_err(|e| state.query_failed("Failed to import questions", e))?;

    state.metrics.add_questions_imported(imported);
    tracing::info!(imported, grade = ?defaults.grade, "questions imported");

    Ok(Json(UploadResponse {
        message: format!("Imported {} questions", imported),
        imported,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn with_content_type(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_json_content_types() {
        assert!(has_json_content_type(&with_content_type("application/json")));
        assert!(has_json_content_type(&with_content_type(
            "Application/JSON; charset=utf-8"
        )));
        assert!(has_json_content_type(&with_content_type(
            "application/vnd.quiz+json"
        )));
    }

    #[test]
    fn test_non_json_content_types() {
        assert!(!has_json_content_type(&HeaderMap::new()));
        assert!(!has_json_content_type(&with_content_type("text/plain")));
        assert!(!has_json_content_type(&with_content_type(
            "application/x-www-form-urlencoded"
        )));
        assert!(!has_json_content_type(&with_content_type(
            "multipart/form-data; boundary=x"
        )));
    }
}
