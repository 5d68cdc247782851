//! Token-bucket admission control.
//!
//! # Responsibilities
//! - [`TokenBucket`]: lazily refilled bucket with one `allow` operation
//! - [`ClientRateLimiter`]: one bucket per caller address, created on first sight
//! - [`GlobalRateLimit`] / [`ClientRateLimit`]: pipeline stages answering 429
//!
//! # Design Decisions
//! - The map lock covers lookup-or-insert only; each bucket has its own lock
//! - Denial never consumes or returns a token
//! - Idle client buckets are evicted by a periodic sweep (see [`ClientRateLimiter::evict_idle`])

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::Span;

use crate::http::pipeline::{Handler, Interceptor};
use crate::http::response::{message, ApiError, INTERNAL_MESSAGE};
use crate::lifecycle::Shutdown;
use crate::observability::metrics;

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
    last_seen: Instant,
}

/// A token bucket holding at most `capacity` tokens, refilled at `refill_rate` per second.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    refill_rate: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// A full bucket.
    pub fn new(refill_rate: f64, capacity: u32) -> Self {
        Self::new_at(refill_rate, capacity, Instant::now())
    }

    pub fn new_at(refill_rate: f64, capacity: u32, now: Instant) -> Self {
        let capacity = f64::from(capacity);
        Self {
            capacity,
            refill_rate,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: now,
                last_seen: now,
            }),
        }
    }

    /// Take one token if available.
    pub fn allow(&self) -> bool {
        self.allow_at(Instant::now())
    }

    /// Same as [`allow`](Self::allow) with an explicit clock reading.
    pub fn allow_at(&self, now: Instant) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        let elapsed = now.saturating_duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_rate).min(self.capacity);
        if now > state.last_refill {
            state.last_refill = now;
        }
        if now > state.last_seen {
            state.last_seen = now;
        }

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn idle_since(&self, now: Instant) -> Duration {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        now.saturating_duration_since(state.last_seen)
    }
}

/// Independent token buckets keyed by caller address.
#[derive(Debug)]
pub struct ClientRateLimiter {
    refill_rate: f64,
    capacity: u32,
    buckets: Mutex<HashMap<IpAddr, Arc<TokenBucket>>>,
}

impl ClientRateLimiter {
    pub fn new(refill_rate: f64, capacity: u32) -> Self {
        Self {
            refill_rate,
            capacity,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    pub fn allow(&self, client: IpAddr) -> bool {
        self.allow_at(client, Instant::now())
    }

    pub fn allow_at(&self, client: IpAddr, now: Instant) -> bool {
        let bucket = {
            let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
            let bucket = buckets.entry(client).or_insert_with(|| {
                Arc::new(TokenBucket::new_at(self.refill_rate, self.capacity, now))
            });
            Arc::clone(bucket)
        };
        bucket.allow_at(now)
    }

    /// Drop buckets not used for at least `idle`. Returns how many were removed.
    pub fn evict_idle(&self, idle: Duration, now: Instant) -> usize {
        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        let before = buckets.len();
        buckets.retain(|_, bucket| bucket.idle_since(now) < idle);
        before - buckets.len()
    }

    pub fn tracked_clients(&self) -> usize {
        self.buckets.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Run [`evict_idle`](Self::evict_idle) every `idle` until shutdown is triggered.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        idle: Duration,
        shutdown: &Shutdown,
        span: Span,
    ) -> tokio::task::JoinHandle<()> {
        let limiter = Arc::clone(self);
        let mut stop = shutdown.subscribe();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(idle);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = limiter.evict_idle(idle, Instant::now());
                        if removed > 0 {
                            tracing::debug!(
                                parent: &span,
                                removed,
                                remaining = limiter.tracked_clients(),
                                "evicted idle client buckets"
                            );
                        }
                    }
                    _ = stop.recv() => break,
                }
            }
        })
    }
}

/// Pipeline stage sharing one bucket across every caller.
pub struct GlobalRateLimit {
    bucket: TokenBucket,
    span: Span,
}

impl GlobalRateLimit {
    pub fn new(refill_rate: f64, capacity: u32, parent: &Span) -> Self {
        Self {
            bucket: TokenBucket::new(refill_rate, capacity),
            span: tracing::info_span!(parent: parent, "global_rate_limit"),
        }
    }
}

#[async_trait]
impl Interceptor for GlobalRateLimit {
    fn name(&self) -> &'static str {
        "global_rate_limit"
    }

    async fn intercept(&self, request: Request<Body>, next: Handler) -> Response {
        if self.bucket.allow() {
            return next.call(request).await;
        }
        tracing::warn!(
            parent: &self.span,
            path = %request.uri().path(),
            "global rate limit exceeded"
        );
        metrics::record_rate_limited("global");
        ApiError::RateLimited.into_response()
    }
}

/// Pipeline stage with an independent budget per caller address.
pub struct ClientRateLimit {
    limiter: Arc<ClientRateLimiter>,
    span: Span,
}

impl ClientRateLimit {
    pub fn new(limiter: Arc<ClientRateLimiter>, parent: &Span) -> Self {
        Self {
            limiter,
            span: tracing::info_span!(parent: parent, "client_rate_limit"),
        }
    }
}

#[async_trait]
impl Interceptor for ClientRateLimit {
    fn name(&self) -> &'static str {
        "client_rate_limit"
    }

    async fn intercept(&self, request: Request<Body>, next: Handler) -> Response {
        let connect_info = request.extensions().get::<ConnectInfo<SocketAddr>>().copied();
        let Some(ConnectInfo(addr)) = connect_info else {
            tracing::error!(parent: &self.span, "caller address missing from request");
            return message(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE);
        };

        let client = addr.ip();
        if self.limiter.allow(client) {
            return next.call(request).await;
        }
        tracing::warn!(parent: &self.span, client = %client, "client rate limit exceeded");
        metrics::record_rate_limited("client");
        ApiError::RateLimited.into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn burst_then_deny() {
        let start = Instant::now();
        let bucket = TokenBucket::new_at(2.0, 5, start);
        for _ in 0..5 {
            assert!(bucket.allow_at(start));
        }
        assert!(!bucket.allow_at(start));
        assert!(!bucket.allow_at(start));
    }

    #[test]
    fn refills_after_one_interval() {
        let start = Instant::now();
        let bucket = TokenBucket::new_at(4.0, 1, start);
        assert!(bucket.allow_at(start));
        assert!(!bucket.allow_at(start + Duration::from_millis(100)));
        assert!(bucket.allow_at(start + Duration::from_millis(250)));
        assert!(!bucket.allow_at(start + Duration::from_millis(250)));
    }

    #[test]
    fn refill_is_capped_at_capacity() {
        let start = Instant::now();
        let bucket = TokenBucket::new_at(100.0, 3, start);
        for _ in 0..3 {
            assert!(bucket.allow_at(start));
        }
        let later = start + Duration::from_secs(60);
        for _ in 0..3 {
            assert!(bucket.allow_at(later));
        }
        assert!(!bucket.allow_at(later));
    }

    #[test]
    fn clients_do_not_share_budget() {
        let start = Instant::now();
        let limiter = ClientRateLimiter::new(1.0, 2);
        let a = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        let b = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));

        assert!(limiter.allow_at(a, start));
        assert!(limiter.allow_at(a, start));
        assert!(!limiter.allow_at(a, start));

        assert!(limiter.allow_at(b, start));
        assert!(limiter.allow_at(b, start));
        assert_eq!(limiter.tracked_clients(), 2);
    }

    #[test]
    fn idle_buckets_are_evicted() {
        let start = Instant::now();
        let limiter = ClientRateLimiter::new(1.0, 2);
        let quiet = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        let busy = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));

        limiter.allow_at(quiet, start);
        limiter.allow_at(busy, start + Duration::from_secs(50));

        let removed = limiter.evict_idle(Duration::from_secs(30), start + Duration::from_secs(60));
        assert_eq!(removed, 1);
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn concurrent_callers_never_exceed_capacity() {
        let bucket = Arc::new(TokenBucket::new(0.0, 50));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let bucket = Arc::clone(&bucket);
                std::thread::spawn(move || (0..20).filter(|_| bucket.allow()).count())
            })
            .collect();
        let granted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(granted, 50);
    }
}
