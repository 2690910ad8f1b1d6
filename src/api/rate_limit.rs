use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use crate::config::RateLimitConfig;
use crate::error::{Error, Result};
use crate::observability::metrics::RATE_LIMITED;
use crate::types::{Clock, Timestamp};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Allowed { remaining: u32 },
    Denied { retry_after_seconds: u64 },
}

#[derive(Debug)]
struct TokenBucket {
    tokens: u32,
    last_refill: Timestamp,
    last_seen: Timestamp,
}

/// Per-caller token buckets.
///
/// A new caller starts one short of full, since its first request spends a
/// token. Refill happens in whole intervals: `refill_rate` tokens per elapsed
/// `refill_interval`, capped at `max_tokens`.
pub struct RateLimiter {
    buckets: DashMap<String, TokenBucket>,
    max_tokens: u32,
    refill_rate: u32,
    refill_interval: Duration,
    idle_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        RateLimiter {
            buckets: DashMap::new(),
            max_tokens: config.max_tokens,
            refill_rate: config.refill_rate,
            refill_interval: config.refill_interval(),
            idle_ttl: config.idle_ttl(),
            clock,
        }
    }

    pub fn check(&self, key: &str) -> Decision {
        let now = self.clock.now();

        let mut bucket = match self.buckets.entry(key.to_string()) {
            Entry::Vacant(vacant) => {
                let remaining = self.max_tokens.saturating_sub(1);
                vacant.insert(TokenBucket {
                    tokens: remaining,
                    last_refill: now,
                    last_seen: now,
                });
                return Decision::Allowed { remaining };
            }
            Entry::Occupied(occupied) => occupied.into_ref(),
        };

        self.refill(&mut bucket, now);
        bucket.last_seen = now;

        if bucket.tokens > 0 {
            bucket.tokens -= 1;
            Decision::Allowed { remaining: bucket.tokens }
        } else {
            Decision::Denied {
                retry_after_seconds: self.retry_after(&bucket, now),
            }
        }
    }

    pub fn allow(&self, key: &str) -> Result<()> {
        match self.check(key) {
            Decision::Allowed { .. } => Ok(()),
            Decision::Denied { retry_after_seconds } => Err(Error::RateLimited { retry_after_seconds }),
        }
    }

    fn refill(&self, bucket: &mut TokenBucket, now: Timestamp) {
        let interval_ms = self.refill_interval.as_millis().max(1) as u64;
        let elapsed_ms = now.saturating_since(bucket.last_refill).as_millis() as u64;
        let intervals = elapsed_ms / interval_ms;
        if intervals == 0 {
            return;
        }

        let added = intervals.saturating_mul(self.refill_rate as u64);
        bucket.tokens = (bucket.tokens as u64).saturating_add(added).min(self.max_tokens as u64) as u32;
        bucket.last_refill = bucket.last_refill + Duration::from_millis(intervals * interval_ms);
    }

    /// Whole seconds until the next refill boundary, at least 1.
    fn retry_after(&self, bucket: &TokenBucket, now: Timestamp) -> u64 {
        let next_refill = bucket.last_refill + self.refill_interval;
        let wait_ms = next_refill.saturating_since(now).as_millis() as u64;
        wait_ms.div_ceil(1_000).max(1)
    }

    /// Drops buckets idle for longer than the idle TTL.
    pub fn sweep_idle(&self) -> usize {
        let now = self.clock.now();
        let before = self.buckets.len();
        self.buckets
            .retain(|_, bucket| now.saturating_since(bucket.last_seen) <= self.idle_ttl);
        before.saturating_sub(self.buckets.len())
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub async fn run_sweeper(self: Arc<Self>, every: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = self.sweep_idle();
                    if removed > 0 {
                        tracing::debug!(removed, remaining = self.len(), "Swept idle rate-limit buckets");
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
    }
}

/// Caller key: first `X-Forwarded-For` hop, then `X-Real-IP`, then the peer address.
pub fn extract_client_ip(request: &Request) -> String {
    let header = |name: &str| {
        request
            .headers()
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.split(',').next().unwrap_or("").trim().to_string())
            .filter(|value| !value.is_empty())
    };

    header("x-forwarded-for")
        .or_else(|| header("x-real-ip"))
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let client = extract_client_ip(&request);

    match limiter.allow(&client) {
        Ok(()) => next.run(request).await,
        Err(e) => {
            RATE_LIMITED.inc();
            tracing::debug!(client = %client, path = %request.uri().path(), "Rate limited");
            e.into_response()
        }
    }
}
