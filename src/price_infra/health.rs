use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use serde::Serialize;
use crate::config::{FeedKind, HealthConfig};
use crate::error::Error;
use crate::types::{ExchangeId, Timestamp};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedStatus {
    Ok,
    Warning,
    Critical,
}

#[derive(Clone, Debug, Default)]
struct HealthState {
    consecutive_failures: u32,
    last_success: Option<Timestamp>,
    last_failure: Option<Timestamp>,
    last_error: Option<String>,
    last_ticker_count: usize,
    total_successes: u64,
    total_failures: u64,
    degraded: bool,
}

/// Per-feed failure tracker.
///
/// Observational only: a degraded feed keeps polling on its schedule and its
/// cached entries age out through the normal sweep.
pub struct FeedHealth {
    exchange: ExchangeId,
    kind: FeedKind,
    degraded_after: u32,
    state: Mutex<HealthState>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedHealthReport {
    pub exchange: ExchangeId,
    pub feed: FeedKind,
    pub status: FeedStatus,
    pub degraded: bool,
    pub consecutive_failures: u32,
    pub last_success: Option<Timestamp>,
    pub last_failure: Option<Timestamp>,
    pub last_error: Option<String>,
    pub tick_count: usize,
    pub total_successes: u64,
    pub total_failures: u64,
}

impl FeedHealth {
    pub fn new(exchange: ExchangeId, kind: FeedKind, degraded_after: u32) -> Self {
        FeedHealth {
            exchange,
            kind,
            degraded_after: degraded_after.max(1),
            state: Mutex::new(HealthState::default()),
        }
    }

    pub fn exchange(&self) -> ExchangeId {
        self.exchange
    }

    pub fn kind(&self) -> FeedKind {
        self.kind
    }

    fn state(&self) -> MutexGuard<'_, HealthState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn record_success(&self, now: Timestamp, ticker_count: usize) {
        let mut state = self.state();
        if state.degraded {
            tracing::info!(
                exchange = %self.exchange,
                feed = %self.kind,
                failures = state.consecutive_failures,
                "Feed recovered"
            );
        }

        state.consecutive_failures = 0;
        state.degraded = false;
        state.last_success = Some(now);
        state.last_ticker_count = ticker_count;
        state.total_successes += 1;
    }

    pub fn record_failure(&self, now: Timestamp, error: &Error) {
        let mut state = self.state();
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        state.last_failure = Some(now);
        state.last_error = Some(error.to_string());
        state.total_failures += 1;

        if !state.degraded && state.consecutive_failures >= self.degraded_after {
            state.degraded = true;
            tracing::error!(
                exchange = %self.exchange,
                feed = %self.kind,
                failures = state.consecutive_failures,
                error = %error,
                "Feed degraded, serving stale cache entries"
            );
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.state().degraded
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.state().consecutive_failures
    }

    pub fn report(&self, now: Timestamp, config: &HealthConfig) -> FeedHealthReport {
        let state = self.state().clone();

        let age = state.last_success.map(|at| now.saturating_since(at));
        let mut status = match age {
            None => FeedStatus::Critical,
            Some(age) if age > Duration::from_secs(config.critical_after_secs) => FeedStatus::Critical,
            Some(age) if age > Duration::from_secs(config.warning_after_secs) => FeedStatus::Warning,
            Some(_) => FeedStatus::Ok,
        };
        if state.degraded && status == FeedStatus::Ok {
            status = FeedStatus::Warning;
        }

        FeedHealthReport {
            exchange: self.exchange,
            feed: self.kind,
            status,
            degraded: state.degraded,
            consecutive_failures: state.consecutive_failures,
            last_success: state.last_success,
            last_failure: state.last_failure,
            last_error: state.last_error,
            tick_count: state.last_ticker_count,
            total_successes: state.total_successes,
            total_failures: state.total_failures,
        }
    }
}

/// Every feed's health tracker, in configuration order.
#[derive(Clone, Default)]
pub struct HealthRegistry {
    feeds: Vec<Arc<FeedHealth>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        HealthRegistry::default()
    }

    pub fn register(&mut self, exchange: ExchangeId, kind: FeedKind, degraded_after: u32) -> Arc<FeedHealth> {
        let health = Arc::new(FeedHealth::new(exchange, kind, degraded_after));
        self.feeds.push(health.clone());
        health
    }

    pub fn reports(&self, now: Timestamp, config: &HealthConfig) -> Vec<FeedHealthReport> {
        self.feeds.iter().map(|feed| feed.report(now, config)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn err() -> Error {
        Error::UpstreamStatus { exchange: ExchangeId::Upbit, status: 500 }
    }

    #[test]
    fn test_degrades_after_threshold_and_recovers() {
        let health = FeedHealth::new(ExchangeId::Upbit, FeedKind::Prices, 3);
        let now = Timestamp::from_millis(1_000);

        health.record_failure(now, &err());
        health.record_failure(now, &err());
        assert!(!health.is_degraded());
        health.record_failure(now, &err());
        assert!(health.is_degraded());

        health.record_success(now, 10);
        assert!(!health.is_degraded());
        assert_eq!(health.consecutive_failures(), 0);
    }

    #[test]
    fn test_status_by_last_success_age() {
        let config = HealthConfig::default();
        let health = FeedHealth::new(ExchangeId::Okx, FeedKind::Prices, 5);
        assert_eq!(health.report(Timestamp::from_millis(0), &config).status, FeedStatus::Critical);

        health.record_success(Timestamp::from_millis(0), 5);
        assert_eq!(health.report(Timestamp::from_millis(60_000), &config).status, FeedStatus::Ok);
        assert_eq!(health.report(Timestamp::from_millis(60_001), &config).status, FeedStatus::Warning);
        assert_eq!(health.report(Timestamp::from_millis(300_001), &config).status, FeedStatus::Critical);
    }

    #[test]
    fn test_recent_success_but_degraded_is_warning() {
        let config = HealthConfig::default();
        let health = FeedHealth::new(ExchangeId::Gate, FeedKind::Prices, 1);
        health.record_success(Timestamp::from_millis(0), 1);
        health.record_failure(Timestamp::from_millis(1_000), &err());

        let report = health.report(Timestamp::from_millis(2_000), &config);
        assert_eq!(report.status, FeedStatus::Warning);
        assert_eq!(report.total_failures, 1);
        assert!(report.last_error.unwrap().contains("500"));
    }
}
