//! Per-client request budgets.
//!
//! A client is the TCP peer recorded by `ConnectInfo`. Proxy headers
//! (`X-Forwarded-For`, `X-Real-IP`) only identify clients when
//! `rate_limit.trust_proxy_headers` is set, since anyone can send them.
//!
//! Every (client, tier) pair owns a bucket holding up to `capacity`
//! requests that refills continuously, so a full bucket comes back after
//! one window of silence. The auth tier is small to keep password and OTP
//! guessing slow; the trip API tier is generous.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::error::ApiError;
use crate::config::RateLimitConfig;
use crate::AppState;

/// Bucket shared by requests whose peer address is unknown
const UNKNOWN_CLIENT: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateLimitTier {
    /// Authenticated trip and invite endpoints
    Api,
    /// Registration, login and password reset
    Auth,
}

/// How many requests a tier allows per window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierBudget {
    pub capacity: u32,
    pub window: Duration,
}

impl TierBudget {
    fn new(capacity: u32, window_seconds: u64) -> Self {
        Self {
            capacity: capacity.max(1),
            window: Duration::from_secs(window_seconds.max(1)),
        }
    }

    fn refill_per_second(&self) -> f64 {
        self.capacity as f64 / self.window.as_secs_f64()
    }
}

#[derive(Debug)]
struct Bucket {
    available: f64,
    updated: Instant,
}

/// Outcome of asking the limiter for one request
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    Allowed { limit: u32, remaining: u32 },
    Limited { limit: u32, retry_after: u64 },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed { .. })
    }
}

#[derive(Debug)]
pub struct RateLimiter {
    buckets: DashMap<(IpAddr, RateLimitTier), Bucket>,
    api: TierBudget,
    auth: TierBudget,
    enabled: bool,
    trust_proxy_headers: bool,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            buckets: DashMap::new(),
            api: TierBudget::new(config.api_requests_per_window, config.window_seconds),
            auth: TierBudget::new(config.auth_requests_per_window, config.window_seconds),
            enabled: config.enabled,
            trust_proxy_headers: config.trust_proxy_headers,
        }
    }

    pub fn budget(&self, tier: RateLimitTier) -> TierBudget {
        match tier {
            RateLimitTier::Api => self.api,
            RateLimitTier::Auth => self.auth,
        }
    }

    /// Spend one request from `client`'s bucket in `tier`
    pub fn admit(&self, client: IpAddr, tier: RateLimitTier) -> Admission {
        let budget = self.budget(tier);
        if !self.enabled {
            return Admission::Allowed {
                limit: budget.capacity,
                remaining: budget.capacity,
            };
        }

        let now = Instant::now();
        let capacity = budget.capacity as f64;
        let rate = budget.refill_per_second();

        let mut bucket = self.buckets.entry((client, tier)).or_insert(Bucket {
            available: capacity,
            updated: now,
        });
        let idle = now.duration_since(bucket.updated).as_secs_f64();
        bucket.available = (bucket.available + idle * rate).min(capacity);
        bucket.updated = now;

        if bucket.available >= 1.0 {
            bucket.available -= 1.0;
            Admission::Allowed {
                limit: budget.capacity,
                remaining: bucket.available.floor() as u32,
            }
        } else {
            let wait = (1.0 - bucket.available) / rate;
            Admission::Limited {
                limit: budget.capacity,
                retry_after: (wait.ceil() as u64).max(1),
            }
        }
    }

    /// Who sent `request`, as far as this limiter is willing to believe
    pub fn client_of(&self, request: &Request<Body>) -> IpAddr {
        client_ip(request, self.trust_proxy_headers).unwrap_or(UNKNOWN_CLIENT)
    }

    /// Forget buckets that have refilled completely
    pub fn sweep(&self) {
        let now = Instant::now();
        let (api, auth) = (self.api.window, self.auth.window);
        self.buckets.retain(|(_, tier), bucket| {
            let window = match tier {
                RateLimitTier::Api => api,
                RateLimitTier::Auth => auth,
            };
            now.duration_since(bucket.updated) < window
        });
    }

    pub fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }
}

/// Peer address, or the first proxy-reported address when trusted
pub fn client_ip(request: &Request<Body>, trust_proxy_headers: bool) -> Option<IpAddr> {
    if trust_proxy_headers {
        if let Some(ip) = forwarded_ip(request.headers()) {
            return Some(ip);
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}

fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    header("x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .and_then(|ip| ip.trim().parse().ok())
        .or_else(|| header("x-real-ip").and_then(|ip| ip.trim().parse().ok()))
}

pub async fn rate_limit_api(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    enforce(&state, request, next, RateLimitTier::Api).await
}

pub async fn rate_limit_auth(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    enforce(&state, request, next, RateLimitTier::Auth).await
}

async fn enforce(
    state: &AppState,
    request: Request<Body>,
    next: Next,
    tier: RateLimitTier,
) -> Response {
    let client = state.rate_limiter.client_of(&request);

    match state.rate_limiter.admit(client, tier) {
        Admission::Allowed { limit, remaining } => {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            headers.insert("X-RateLimit-Limit", HeaderValue::from(limit));
            headers.insert("X-RateLimit-Remaining", HeaderValue::from(remaining));
            response
        }
        Admission::Limited { limit, retry_after } => {
            tracing::warn!(client = %client, tier = ?tier, "Rate limit exceeded");
            let mut response = ApiError::rate_limited(format!(
                "Too many requests, retry in {} seconds",
                retry_after
            ))
            .into_response();
            let headers = response.headers_mut();
            headers.insert("Retry-After", HeaderValue::from(retry_after));
            headers.insert("X-RateLimit-Limit", HeaderValue::from(limit));
            headers.insert("X-RateLimit-Remaining", HeaderValue::from(0u32));
            response
        }
    }
}

/// Periodically drop refilled buckets
pub fn spawn_cleanup_task(rate_limiter: Arc<RateLimiter>, cleanup_interval_secs: u64) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(cleanup_interval_secs.max(1)));
        ticker.tick().await;
        loop {
            ticker.tick().await;
            rate_limiter.sweep();
            tracing::debug!(clients = rate_limiter.tracked_clients(), "Rate limiter swept");
        }
    });
}
