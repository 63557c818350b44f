//! Observability HTTP Routes
//!
//! Health checks and operational counters. Health checks are never rate
//! limited.

use std::sync::Arc;

use axum::{
    extract::State, http::StatusCode, middleware, response::IntoResponse, routing::get, Json,
    Router,
};
use serde::Serialize;

use super::config::{routes, RateLimitConfig};
use super::quiz_routes::QuizState;
use super::rate_limit::{enforce_rate_limit, RateLimiter, RouteLimit};
use crate::observability::MetricsSnapshot;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Connection pool gauges
#[derive(Debug, Serialize)]
pub struct PoolStats {
    pub size: u32,
    pub idle: usize,
    pub in_use: usize,
}

/// Metrics response
#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    #[serde(flatten)]
    pub counters: MetricsSnapshot,
    pub pool: PoolStats,
}

/// Health check at `/` and `/health`
pub fn health_routes() -> Router {
    Router::new()
        .route("/", get(health_handler))
        .route("/health", get(health_handler))
}

/// Create observability routes; `/metrics` is rate limited like `/api`
pub fn observability_routes(
    state: Arc<QuizState>,
    limits: &RateLimitConfig,
    limiter: Arc<RateLimiter>,
) -> Router {
    let limit = middleware::from_fn_with_state(
        RouteLimit {
            route: routes::METRICS,
            limits: limits.limits_for(routes::METRICS).into(),
            limiter,
            metrics: Arc::clone(&state.metrics),
        },
        enforce_rate_limit,
    );

    Router::new()
        .route("/metrics", get(metrics_handler).layer(limit))
        .with_state(state)
}

/// Health check handler; never touches the database
async fn health_handler() -> impl IntoResponse {
    let response = HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    (StatusCode::OK, Json(response))
}

/// Metrics handler - returns counters and pool gauges as JSON
async fn metrics_handler(State(state): State<Arc<QuizState>>) -> impl IntoResponse {
    let response = MetricsResponse {
        counters: state.metrics.snapshot(),
        pool: PoolStats {
            size: state.pool.size(),
            idle: state.pool.idle(),
            in_use: state.pool.in_use(),
        },
    };

    (StatusCode::OK, Json(response))
}
