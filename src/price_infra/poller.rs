use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::Instrument;
use crate::cache::{PriceCache, PutSummary};
use crate::error::{Error, Result};
use crate::observability::metrics::{POLL_FAILURE, POLL_LATENCY, POLL_SUCCESS, TICKERS_DROPPED};
use crate::price_infra::connectors::TickerSource;
use crate::price_infra::health::FeedHealth;
use crate::price_infra::normalizer::normalize;
use crate::types::Clock;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollReport {
    pub written: PutSummary,
    pub dropped: usize,
    pub skipped: usize,
}

/// Drives one feed: fetch, normalize, write, on a fixed interval.
///
/// A failed poll leaves the cache untouched and waits for the next tick.
pub struct ExchangePoller {
    source: Arc<dyn TickerSource>,
    cache: Arc<PriceCache>,
    health: Arc<FeedHealth>,
    clock: Arc<dyn Clock>,
    interval: Duration,
    timeout: Duration,
}

impl ExchangePoller {
    pub fn new(
        source: Arc<dyn TickerSource>,
        cache: Arc<PriceCache>,
        health: Arc<FeedHealth>,
        clock: Arc<dyn Clock>,
        interval: Duration,
        timeout: Duration,
    ) -> Self {
        ExchangePoller {
            source,
            cache,
            health,
            clock,
            interval,
            timeout,
        }
    }

    pub async fn poll_once(&self) -> Result<PollReport> {
        let exchange = self.source.exchange();
        let kind = self.source.kind();
        let requested_at = self.clock.now();
        let started = Instant::now();

        let fetched = match tokio::time::timeout(self.timeout, self.source.fetch()).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(exchange)),
        };
        POLL_LATENCY
            .with_label_values(&[exchange.as_str()])
            .observe(started.elapsed().as_secs_f64());

        let payload = match fetched {
            Ok(payload) => payload,
            Err(e) => {
                POLL_FAILURE
                    .with_label_values(&[exchange.as_str(), kind.as_str(), e.reason()])
                    .inc();
                self.health.record_failure(self.clock.now(), &e);
                tracing::warn!(error = %e, "Poll failed, keeping cached entries");
                return Err(e);
            }
        };

        let normalized = normalize(exchange, &payload, requested_at);
        if normalized.dropped > 0 {
            TICKERS_DROPPED
                .with_label_values(&[exchange.as_str()])
                .inc_by(normalized.dropped as u64);
        }

        let report = PollReport {
            written: self.cache.put_batch(normalized.tickers),
            dropped: normalized.dropped,
            skipped: normalized.skipped,
        };

        POLL_SUCCESS.with_label_values(&[exchange.as_str(), kind.as_str()]).inc();
        self.health.record_success(self.clock.now(), report.written.accepted());
        tracing::debug!(
            accepted = report.written.accepted(),
            stale = report.written.stale,
            dropped = report.dropped,
            "Poll complete"
        );

        Ok(report)
    }

    /// Polls until `shutdown` flips. An in-flight request is abandoned on
    /// shutdown; cache writes happen only after the fetch completes.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let exchange = self.source.exchange();
        let kind = self.source.kind();
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(exchange = %exchange, feed = %kind, interval_ms = self.interval.as_millis() as u64, "Poller started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => break,
            }

            let span = crate::observability::tracing::trace_poll(exchange, kind);
            tokio::select! {
                _ = self.poll_once().instrument(span) => {}
                _ = shutdown.changed() => break,
            }
        }

        tracing::info!(exchange = %exchange, feed = %kind, "Poller stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TtlClass;
    use crate::config::FeedKind;
    use crate::price_infra::connectors::MockTickerSource;
    use crate::price_infra::payload::RawPayload;
    use crate::types::{ExchangeId, ManualClock, Quote, TickerKey, Timestamp};

    fn payload(price: &str) -> RawPayload {
        let body = format!(r#"[{{"symbol":"BTCUSDT","price":"{}"}},{{"symbol":"ETHUSDT","price":"-1"}}]"#, price);
        RawPayload::parse(ExchangeId::Binance, FeedKind::Prices, body.as_bytes()).unwrap()
    }

    fn poller(source: MockTickerSource, clock: Arc<ManualClock>) -> (ExchangePoller, Arc<PriceCache>, Arc<FeedHealth>) {
        let cache = Arc::new(PriceCache::new("prices", TtlClass::Price, clock.clone()));
        let health = Arc::new(FeedHealth::new(ExchangeId::Binance, FeedKind::Prices, 2));
        let poller = ExchangePoller::new(
            Arc::new(source),
            cache.clone(),
            health.clone(),
            clock,
            Duration::from_secs(5),
            Duration::from_secs(1),
        );
        (poller, cache, health)
    }

    fn mock_source() -> MockTickerSource {
        let mut source = MockTickerSource::new();
        source.expect_exchange().return_const(ExchangeId::Binance);
        source.expect_kind().return_const(FeedKind::Prices);
        source
    }

    #[tokio::test]
    async fn test_success_writes_valid_tickers_with_request_time() {
        let clock = Arc::new(ManualClock::new(Timestamp::from_millis(42_000)));
        let mut source = mock_source();
        source.expect_fetch().times(1).returning(|| Ok(payload("72000")));

        let (poller, cache, health) = poller(source, clock);
        let report = poller.poll_once().await.unwrap();

        assert_eq!(report.written.inserted, 1);
        assert_eq!(report.dropped, 1);
        let btc = cache.get(&TickerKey::new(ExchangeId::Binance, "BTC", Quote::Usdt), Duration::from_secs(1)).unwrap();
        assert_eq!(btc.observed_at, Timestamp::from_millis(42_000));
        assert_eq!(health.consecutive_failures(), 0);
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_entries() {
        let clock = Arc::new(ManualClock::new(Timestamp::from_millis(0)));
        let mut source = mock_source();
        let mut seq = mockall::Sequence::new();
        source.expect_fetch().times(1).in_sequence(&mut seq).returning(|| Ok(payload("72000")));
        source
            .expect_fetch()
            .times(3)
            .in_sequence(&mut seq)
            .returning(|| Err(Error::UpstreamStatus { exchange: ExchangeId::Binance, status: 500 }));

        let (poller, cache, health) = poller(source, clock.clone());
        poller.poll_once().await.unwrap();

        for _ in 0..3 {
            clock.advance(Duration::from_secs(5));
            assert!(poller.poll_once().await.is_err());
        }

        assert!(health.is_degraded());
        let key = TickerKey::new(ExchangeId::Binance, "BTC", Quote::Usdt);
        assert_eq!(cache.get(&key, Duration::from_secs(60)).unwrap().price, 72_000.0);
    }

    #[tokio::test]
    async fn test_sustained_http_500_keeps_entries_until_dead_threshold() {
        use crate::cache::TtlPolicy;
        use crate::config::{CacheConfig, FeedConfig};
        use crate::price_infra::connectors::HttpTickerSource;
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"symbol": "BTCUSDT", "price": "72000"}
            ])))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let feed = FeedConfig::new(
            ExchangeId::Binance,
            FeedKind::Prices,
            &format!("{}/api/v3/ticker/price", server.uri()),
            5_000,
            1_000,
        );
        let clock = Arc::new(ManualClock::new(Timestamp::from_millis(0)));
        let cache = Arc::new(PriceCache::new("prices", TtlClass::Price, clock.clone()));
        let health = Arc::new(FeedHealth::new(ExchangeId::Binance, FeedKind::Prices, 5));
        let poller = ExchangePoller::new(
            Arc::new(HttpTickerSource::new(&feed).unwrap()),
            cache.clone(),
            health.clone(),
            clock.clone(),
            feed.interval(),
            feed.timeout(),
        );
        poller.poll_once().await.unwrap();

        // 20 failing intervals: well past TTL plus stale window.
        for _ in 0..20 {
            clock.advance(Duration::from_secs(5));
            let err = poller.poll_once().await.unwrap_err();
            assert!(matches!(err, Error::UpstreamStatus { status: 500, .. }));
        }

        let cache_config = CacheConfig::default();
        let policy = TtlPolicy::from_config(&cache_config);
        let dead_after = cache_config.dead_after();
        let key = TickerKey::new(ExchangeId::Binance, "BTC", Quote::Usdt);
        assert!(cache.get(&key, policy.max_serve_age(TtlClass::Price)).is_none());
        assert_eq!(cache.sweep(dead_after), 0);
        assert_eq!(cache.len(), 1);
        assert_eq!(health.consecutive_failures(), 20);

        clock.set(Timestamp::from_millis(dead_after.as_millis() as u64));
        assert_eq!(cache.sweep(dead_after), 0);
        assert_eq!(cache.len(), 1);

        clock.advance(Duration::from_millis(1));
        assert_eq!(cache.sweep(dead_after), 1);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_shutdown() {
        let clock = Arc::new(ManualClock::new(Timestamp::from_millis(0)));
        let mut source = mock_source();
        source.expect_fetch().returning(|| Ok(payload("72000")));

        let (poller, cache, _) = poller(source, clock);
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(Arc::new(poller).run(rx));

        tokio::time::sleep(Duration::from_secs(12)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();
        assert_eq!(cache.len(), 1);
    }
}
