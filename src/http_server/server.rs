//! # HTTP Server
//!
//! Main HTTP server combining all endpoint routers.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{header, HeaderValue};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use super::config::HttpServerConfig;
use super::errors::ApiError;
use super::observability_routes::{health_routes, observability_routes};
use super::quiz_routes::{quiz_routes, QuizState};
use super::rate_limit::{RateLimiter, SWEEP_INTERVAL};

/// HTTP server for the quiz API
pub struct HttpServer {
    config: HttpServerConfig,
    state: Arc<QuizState>,
    limiter: Arc<RateLimiter>,
    router: Router,
}

impl HttpServer {
    /// Create a server over an opened pool
    pub fn new(config: HttpServerConfig, state: Arc<QuizState>) -> Self {
        // One limiter for every route; windows are keyed by route name
        let limiter = Arc::new(RateLimiter::new());
        let router = Self::build_router(&config, Arc::clone(&state), Arc::clone(&limiter));
        Self {
            config,
            state,
            limiter,
            router,
        }
    }

    /// Build the combined router with all endpoints
    fn build_router(
        config: &HttpServerConfig,
        state: Arc<QuizState>,
        limiter: Arc<RateLimiter>,
    ) -> Router {
        let cors = if config.allows_any_origin() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<HeaderValue> = config
                .cors_origins
                .iter()
                .filter_map(|s| s.trim().parse().ok())
                .collect();

            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        };

        let router = Router::new()
            .merge(health_routes())
            .merge(observability_routes(
                Arc::clone(&state),
                &config.rate_limits,
                Arc::clone(&limiter),
            ))
            .nest(
                "/api",
                quiz_routes(state, &config.rate_limits, limiter).layer(cors),
            )
            .fallback(not_found_handler)
            .layer(TraceLayer::new_for_http());

        if !config.no_cache {
            return router;
        }

        router
            .layer(SetResponseHeaderLayer::overriding(
                header::CACHE_CONTROL,
                HeaderValue::from_static("no-store, no-cache, must-revalidate, max-age=0"),
            ))
            .layer(SetResponseHeaderLayer::overriding(
                header::PRAGMA,
                HeaderValue::from_static("no-cache"),
            ))
            .layer(SetResponseHeaderLayer::overriding(
                header::EXPIRES,
                HeaderValue::from_static("0"),
            ))
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> String {
        self.config.socket_addr()
    }

    /// Get the router (for testing)
    pub fn router(self) -> Router {
        self.router
    }

    /// Serve until Ctrl-C, then close the pool
    ///
    /// The pool is closed whether serving ends cleanly or with an error.
    pub async fn start(self) -> Result<(), std::io::Error> {
        let Self {
            config,
            state,
            limiter,
            router,
        } = self;

        let result = serve(&config, router, limiter).await;

        state.pool.close().await;
        match &result {
            Ok(()) => tracing::info!("server stopped"),
            Err(e) => tracing::error!(error = %e, "server failed"),
        }
        result
    }
}

async fn serve(
    config: &HttpServerConfig,
    router: Router,
    limiter: Arc<RateLimiter>,
) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(config.socket_addr()).await?;
    let addr = listener.local_addr()?;

    tracing::info!(%addr, "quiz API listening");

    // Frees windows of clients that went quiet even when no traffic arrives
    let sweeper = tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            limiter.sweep().await;
        }
    });

    let served = axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await;

    sweeper.abort();
    served
}

async fn not_found_handler() -> ApiError {
    ApiError::NotFound
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        return;
    }
    tracing::info!("shutdown requested");
}
