//! HTTP Server Configuration
//!
//! Configuration for the HTTP server including host, port, CORS, cache
//! headers and rate limits.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::rate_limit::{Period, RateLimit};

/// Route names used as rate-limit keys
pub mod routes {
    pub const QUESTIONS: &str = "questions";
    pub const SUBMIT: &str = "submit";
    pub const RESULTS: &str = "results";
    pub const HISTORY: &str = "history";
    pub const STATISTICS: &str = "statistics";
    pub const DOWNLOAD_RESULTS: &str = "download-results";
    pub const UPLOAD: &str = "upload";
    pub const METRICS: &str = "metrics";
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpServerConfig {
    /// Host to bind to (default: "0.0.0.0")
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind to (default: 5000)
    #[serde(default = "default_port")]
    pub port: u16,

    /// CORS allowed origins for `/api/*` (default: empty, meaning any)
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Attach cache-disabling headers to every response (default: true)
    #[serde(default = "default_true")]
    pub no_cache: bool,

    /// Per-route request ceilings
    #[serde(default)]
    pub rate_limits: RateLimitConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_true() -> bool {
    true
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
            no_cache: true,
            rate_limits: RateLimitConfig::default(),
        }
    }
}

impl HttpServerConfig {
    /// Create a new config with specified port
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            ..Default::default()
        }
    }

    /// Get the socket address string
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// True when CORS should admit any origin
    pub fn allows_any_origin(&self) -> bool {
        self.cors_origins.is_empty() || self.cors_origins.iter().any(|o| o.trim() == "*")
    }
}

/// Rate limits per route, with a default set for unlisted routes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Disable to admit every request (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Limits for routes without an entry in `routes`
    #[serde(default = "default_limits")]
    pub default_limits: Vec<RateLimit>,

    /// Route name to its own limits
    #[serde(default = "default_route_limits")]
    pub routes: BTreeMap<String, Vec<RateLimit>>,
}

fn default_limits() -> Vec<RateLimit> {
    vec![
        RateLimit::new(200, Period::Day),
        RateLimit::new(50, Period::Hour),
    ]
}

fn default_route_limits() -> BTreeMap<String, Vec<RateLimit>> {
    BTreeMap::from([
        (
            routes::QUESTIONS.to_string(),
            vec![RateLimit::new(100, Period::Hour)],
        ),
        (
            routes::SUBMIT.to_string(),
            vec![RateLimit::new(10, Period::Hour)],
        ),
        (
            routes::RESULTS.to_string(),
            vec![RateLimit::new(50, Period::Hour)],
        ),
    ])
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_limits: default_limits(),
            routes: default_route_limits(),
        }
    }
}

impl RateLimitConfig {
    /// Limits that apply to `route`; empty when limiting is disabled
    pub fn limits_for(&self, route: &str) -> Vec<RateLimit> {
        if !self.enabled {
            return Vec::new();
        }
        self.routes
            .get(route)
            .cloned()
            .unwrap_or_else(|| self.default_limits.clone())
    }
}
