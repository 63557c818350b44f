//! # Quiz HTTP Server Module
//!
//! Axum server exposing the quiz API.
//!
//! # Endpoints
//!
//! - `/`, `/health` - Health check
//! - `/metrics` - Operational counters and pool gauges
//! - `/api/*` - Questions, submissions, results, statistics, export, upload

pub mod config;
pub mod errors;
pub mod observability_routes;
pub mod quiz_routes;
pub mod rate_limit;
pub mod server;

pub use config::{HttpServerConfig, RateLimitConfig};
pub use errors::{ApiError, ApiResult};
pub use quiz_routes::QuizState;
pub use rate_limit::{Period, RateLimit, RateLimiter};
pub use server::HttpServer;
