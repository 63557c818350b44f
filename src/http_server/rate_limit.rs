//! # Rate Limiting
//!
//! Per-route request ceilings keyed by client address, enforced as
//! middleware ahead of validation and database access.
//!
//! Windows are rolling: a request is admitted only if, for every limit of
//! its route, fewer than `count` admitted requests from the same client fall
//! inside the trailing period.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::errors::ApiError;
use crate::observability::MetricsRegistry;

/// Minimum time between sweeps of expired keys
pub(crate) const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Length of a rate-limit window
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Period {
    Second,
    Minute,
    Hour,
    Day,
}

impl Period {
    pub fn as_duration(&self) -> Duration {
        match self {
            Period::Second => Duration::from_secs(1),
            Period::Minute => Duration::from_secs(60),
            Period::Hour => Duration::from_secs(60 * 60),
            Period::Day => Duration::from_secs(24 * 60 * 60),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Second => "second",
            Period::Minute => "minute",
            Period::Hour => "hour",
            Period::Day => "day",
        }
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().trim_end_matches('s') {
            "second" | "sec" => Ok(Period::Second),
            "minute" | "min" => Ok(Period::Minute),
            "hour" => Ok(Period::Hour),
            "day" => Ok(Period::Day),
            other => Err(format!("unknown rate limit period: {}", other)),
        }
    }
}

/// `count` requests per `period`
///
/// Parses `10/hour`, `10 per hour` and `200 per day`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RateLimit {
    pub count: u32,
    pub period: Period,
}

impl RateLimit {
    pub fn new(count: u32, period: Period) -> Self {
        Self { count, period }
    }

    /// Parse a list of limit strings
    pub fn parse_all<S: AsRef<str>>(specs: &[S]) -> Result<Vec<Self>, String> {
        specs.iter().map(|s| s.as_ref().parse()).collect()
    }
}

impl FromStr for RateLimit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        let (count, period) = lowered
            .split_once('/')
            .or_else(|| lowered.split_once(" per "))
            .ok_or_else(|| format!("invalid rate limit: {}", s))?;

        let count: u32 = count
            .trim()
            .parse()
            .map_err(|_| format!("invalid rate limit count: {}", s))?;
        if count == 0 {
            return Err(format!("rate limit count must be > 0: {}", s));
        }
        Ok(Self {
            count,
            period: period.parse()?,
        })
    }
}

impl fmt::Display for RateLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} per {}", self.count, self.period.as_str())
    }
}

impl TryFrom<String> for RateLimit {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RateLimit> for String {
    fn from(limit: RateLimit) -> Self {
        limit.to_string()
    }
}

/// A rejected request: the limit it hit and when a slot frees up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exceeded {
    pub limit: RateLimit,
    pub retry_after: Duration,
}

/// Admission log shared by every limited route
#[derive(Debug, Default)]
pub struct RateLimiter {
    windows: Mutex<Windows>,
}

#[derive(Debug, Default)]
struct Windows {
    by_key: HashMap<(&'static str, IpAddr), Window>,
    last_sweep: Option<Instant>,
}

/// Admissions of one (route, client) key, oldest first
#[derive(Debug)]
struct Window {
    admitted: VecDeque<Instant>,
    /// Longest period among the route's limits
    horizon: Duration,
}

impl Windows {
    /// Drop keys with no admission left inside their own horizon
    fn sweep(&mut self, now: Instant) {
        self.by_key.retain(|_, window| {
            prune(&mut window.admitted, now, window.horizon);
            !window.admitted.is_empty()
        });
        self.last_sweep = Some(now);
    }

    fn sweep_due(&self, now: Instant) -> bool {
        self.last_sweep
            .map_or(true, |at| now.saturating_duration_since(at) >= SWEEP_INTERVAL)
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit or reject one request from `ip` on `route`
    pub async fn check(
        &self,
        route: &'static str,
        ip: IpAddr,
        limits: &[RateLimit],
    ) -> Result<(), Exceeded> {
        self.check_at(route, ip, limits, Instant::now()).await
    }

    pub(crate) async fn check_at(
        &self,
        route: &'static str,
        ip: IpAddr,
        limits: &[RateLimit],
        now: Instant,
    ) -> Result<(), Exceeded> {
        let Some(horizon) = limits.iter().map(|l| l.period.as_duration()).max() else {
            return Ok(());
        };

        let mut windows = self.windows.lock().await;
        if windows.sweep_due(now) {
            windows.sweep(now);
        }

        let window = windows
            .by_key
            .entry((route, ip))
            .or_insert_with(|| Window {
                admitted: VecDeque::new(),
                horizon,
            });
        window.horizon = window.horizon.max(horizon);
        prune(&mut window.admitted, now, horizon);

        for limit in limits {
            let period = limit.period.as_duration();
            let in_window = window
                .admitted
                .iter()
                .filter(|at| now.saturating_duration_since(**at) < period);
            let (count, oldest) = in_window.fold((0usize, None), |(n, first), at| {
                (n + 1, first.or(Some(*at)))
            });
            if count >= limit.count as usize {
                // The oldest admission in the window is the next to expire
                let age = oldest.map_or(Duration::ZERO, |at| now.saturating_duration_since(at));
                return Err(Exceeded {
                    limit: *limit,
                    retry_after: period.saturating_sub(age),
                });
            }
        }

        window.admitted.push_back(now);
        Ok(())
    }

    /// Sweep expired keys now instead of on the next due request
    pub async fn sweep(&self) {
        self.windows.lock().await.sweep(Instant::now());
    }

    /// Number of (route, client) keys currently tracked
    pub async fn tracked_keys(&self) -> usize {
        self.windows.lock().await.by_key.len()
    }
}

/// Drop admissions older than `horizon`; the log is in arrival order
fn prune(log: &mut VecDeque<Instant>, now: Instant, horizon: Duration) {
    while let Some(front) = log.front() {
        if now.saturating_duration_since(*front) >= horizon {
            log.pop_front();
        } else {
            break;
        }
    }
}

/// Middleware state for one route
#[derive(Clone)]
pub struct RouteLimit {
    pub route: &'static str,
    pub limits: Arc<[RateLimit]>,
    pub limiter: Arc<RateLimiter>,
    pub metrics: Arc<MetricsRegistry>,
}

/// Reject the request with 429 if the client is over any limit of the route
pub async fn enforce_rate_limit(
    State(route): State<RouteLimit>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let ip = addr.ip();
    match route.limiter.check(route.route, ip, &route.limits).await {
        Ok(()) => next.run(request).await,
        Err(exceeded) => {
            route.metrics.increment_rate_limited();
            tracing::warn!(
                route = route.route,
                client = %ip,
                limit = %exceeded.limit,
                "rate limit exceeded"
            );
            ApiError::RateLimited {
                limit: exceeded.limit,
                retry_after: exceeded.retry_after,
            }
            .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_limits() {
        assert_eq!(
            "10/hour".parse::<RateLimit>().unwrap(),
            RateLimit::new(10, Period::Hour)
        );
        assert_eq!(
            "200 per day".parse::<RateLimit>().unwrap(),
            RateLimit::new(200, Period::Day)
        );
        assert_eq!(
            "5 per Minutes".parse::<RateLimit>().unwrap(),
            RateLimit::new(5, Period::Minute)
        );
        assert!("ten/hour".parse::<RateLimit>().is_err());
        assert!("0/hour".parse::<RateLimit>().is_err());
        assert!("10/fortnight".parse::<RateLimit>().is_err());
        assert!("10 hour".parse::<RateLimit>().is_err());
    }

    #[test]
    fn test_display_and_serde() {
        let limit = RateLimit::new(50, Period::Hour);
        assert_eq!(limit.to_string(), "50 per hour");

        let json = serde_json::to_string(&vec![limit]).unwrap();
        assert_eq!(json, r#"["50 per hour"]"#);
        let back: Vec<RateLimit> = serde_json::from_str(r#"["50/hour"]"#).unwrap();
        assert_eq!(back, vec![limit]);
        assert!(serde_json::from_str::<RateLimit>(r#""nope""#).is_err());
    }

    #[tokio::test]
    async fn test_allows_up_to_count_then_rejects() {
        let limiter = RateLimiter::new();
        let limits = [RateLimit::new(3, Period::Hour)];
        let now = Instant::now();

        for _ in 0..3 {
            assert!(limiter
                .check_at("submit", ip("10.0.0.1"), &limits, now)
                .await
                .is_ok());
        }
        let err = limiter
            .check_at("submit", ip("10.0.0.1"), &limits, now)
            .await
            .unwrap_err();
        assert_eq!(err.limit, limits[0]);
        assert_eq!(err.retry_after, Duration::from_secs(3600));
    }

    #[tokio::test]
    async fn test_keys_are_per_route_and_client() {
        let limiter = RateLimiter::new();
        let limits = [RateLimit::new(1, Period::Hour)];
        let now = Instant::now();

        assert!(limiter.check_at("submit", ip("10.0.0.1"), &limits, now).await.is_ok());
        assert!(limiter.check_at("submit", ip("10.0.0.2"), &limits, now).await.is_ok());
        assert!(limiter.check_at("results", ip("10.0.0.1"), &limits, now).await.is_ok());
        assert!(limiter.check_at("submit", ip("10.0.0.1"), &limits, now).await.is_err());
        assert_eq!(limiter.tracked_keys().await, 3);
    }

    #[tokio::test]
    async fn test_window_rolls() {
        let limiter = RateLimiter::new();
        let limits = [RateLimit::new(2, Period::Minute)];
        let start = Instant::now();
        let client = ip("10.0.0.1");

        assert!(limiter.check_at("q", client, &limits, start).await.is_ok());
        let later = start + Duration::from_secs(30);
        assert!(limiter.check_at("q", client, &limits, later).await.is_ok());

        let err = limiter
            .check_at("q", client, &limits, start + Duration::from_secs(45))
            .await
            .unwrap_err();
        assert_eq!(err.retry_after, Duration::from_secs(15));

        // The first admission has left the window
        let after = start + Duration::from_secs(61);
        assert!(limiter.check_at("q", client, &limits, after).await.is_ok());
        assert!(limiter.check_at("q", client, &limits, after).await.is_err());
    }

    #[tokio::test]
    async fn test_every_limit_applies() {
        let limiter = RateLimiter::new();
        let limits = [
            RateLimit::new(5, Period::Day),
            RateLimit::new(2, Period::Minute),
        ];
        let start = Instant::now();
        let client = ip("10.0.0.9");

        for minute in 0..5u64 {
            let at = start + Duration::from_secs(minute * 120);
            assert!(limiter.check_at("r", client, &limits, at).await.is_ok());
        }
        let err = limiter
            .check_at("r", client, &limits, start + Duration::from_secs(3600))
            .await
            .unwrap_err();
        assert_eq!(err.limit.period, Period::Day);
    }

    #[tokio::test]
    async fn test_rejected_requests_are_not_recorded() {
        let limiter = RateLimiter::new();
        let limits = [RateLimit::new(1, Period::Second)];
        let start = Instant::now();
        let client = ip("::1");

        assert!(limiter.check_at("r", client, &limits, start).await.is_ok());
        for ms in [100, 200, 300] {
            let at = start + Duration::from_millis(ms);
            assert!(limiter.check_at("r", client, &limits, at).await.is_err());
        }
        let at = start + Duration::from_millis(1000);
        assert!(limiter.check_at("r", client, &limits, at).await.is_ok());
    }

    #[tokio::test]
    async fn test_expired_keys_swept_per_own_horizon() {
        let limiter = RateLimiter::new();
        let per_second = [RateLimit::new(5, Period::Second)];
        let per_day = [RateLimit::new(5, Period::Day)];
        let start = Instant::now();

        assert!(limiter
            .check_at("daily", ip("10.1.0.1"), &per_day, start)
            .await
            .is_ok());
        for n in 0..500u16 {
            let client = IpAddr::from([0x2001, 0xdb8, 0, 0, 0, 0, 0, n]);
            assert!(limiter.check_at("r", client, &per_second, start).await.is_ok());
        }
        assert_eq!(limiter.tracked_keys().await, 501);

        // Not yet due: expired keys stay until the next sweep
        let soon = start + Duration::from_secs(2);
        assert!(limiter
            .check_at("r", ip("10.9.9.9"), &per_second, soon)
            .await
            .is_ok());
        assert_eq!(limiter.tracked_keys().await, 502);

        let later = start + SWEEP_INTERVAL + Duration::from_secs(1);
        assert!(limiter
            .check_at("r", ip("10.9.9.10"), &per_second, later)
            .await
            .is_ok());
        // The daily key is still inside its window
        assert_eq!(limiter.tracked_keys().await, 2);
        assert!(limiter
            .check_at("daily", ip("10.1.0.1"), &[RateLimit::new(1, Period::Day)], later)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_no_limits_always_admits() {
        let limiter = RateLimiter::new();
        for _ in 0..100 {
            assert!(limiter.check("health", ip("10.0.0.1"), &[]).await.is_ok());
        }
        assert_eq!(limiter.tracked_keys().await, 0);
    }
}
