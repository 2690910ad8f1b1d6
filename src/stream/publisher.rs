use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use axum::extract::ws::{Message, WebSocket};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use futures::{SinkExt, StreamExt};
use tokio::time::{interval, MissedTickBehavior};
use tokio_stream::wrappers::IntervalStream;
use crate::config::StreamConfig;
use crate::observability::metrics::{STREAM_CONNECTIONS, STREAM_PAYLOADS};
use crate::premium::PremiumCalculator;
use crate::stream::subscription::Subscription;
use crate::types::{Clock, ConnectionId, MarketSelector};

/// Open connection marker. Keeps the gauge honest however the stream ends.
struct ConnectionGuard {
    id: ConnectionId,
    transport: &'static str,
    sent: u64,
}

impl ConnectionGuard {
    fn open(id: ConnectionId, transport: &'static str) -> Self {
        STREAM_CONNECTIONS.inc();
        tracing::info!(connection_id = %id, transport, "Stream opened");
        ConnectionGuard { id, transport, sent: 0 }
    }

    fn record_sent(&mut self) {
        self.sent += 1;
        STREAM_PAYLOADS.with_label_values(&[self.transport]).inc();
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        STREAM_CONNECTIONS.dec();
        tracing::info!(connection_id = %self.id, transport = self.transport, sent = self.sent, "Stream closed");
    }
}

/// Pushes premium snapshots to streaming clients, one independent tick loop
/// per connection.
#[derive(Clone)]
pub struct StreamPublisher {
    calculator: Arc<PremiumCalculator>,
    clock: Arc<dyn Clock>,
    tick: Duration,
    keep_alive: Duration,
    write_timeout: Duration,
}

impl StreamPublisher {
    pub fn new(calculator: Arc<PremiumCalculator>, clock: Arc<dyn Clock>, config: &StreamConfig) -> Self {
        StreamPublisher {
            calculator,
            clock,
            tick: config.tick(),
            keep_alive: config.keep_alive(),
            write_timeout: config.write_timeout(),
        }
    }

    /// Serialized snapshots for one connection: one immediately, then one per
    /// tick on which the payload changed. Dropping the stream ends the loop.
    pub fn payloads(
        &self,
        id: ConnectionId,
        domestic: MarketSelector,
        foreign: MarketSelector,
        transport: &'static str,
    ) -> impl Stream<Item = String> + Send + use<> {
        let mut ticker = interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut subscription = Subscription::new(id, domestic, foreign);
        let mut guard = ConnectionGuard::open(id, transport);
        let calculator = self.calculator.clone();
        let clock = self.clock.clone();

        tokio_stream::StreamExt::filter_map(IntervalStream::new(ticker), move |_| {
            match subscription.next_payload(&calculator, clock.now()) {
                Ok(Some(payload)) => {
                    guard.record_sent();
                    Some(payload)
                }
                Ok(None) => None,
                Err(e) => {
                    tracing::warn!(connection_id = %subscription.id, error = %e, "Failed to serialize snapshot");
                    None
                }
            }
        })
    }

    pub fn sse(
        &self,
        domestic: MarketSelector,
        foreign: MarketSelector,
    ) -> Sse<impl Stream<Item = Result<Event, Infallible>> + Send + use<>> {
        let events = self
            .payloads(ConnectionId::new(), domestic, foreign, "sse")
            .map(|payload| Ok(Event::default().event("premium").data(payload)));

        Sse::new(events).keep_alive(KeepAlive::new().interval(self.keep_alive))
    }

    /// Runs until the peer goes away or a write fails or stalls past the write timeout.
    pub async fn serve_websocket(
        &self,
        socket: WebSocket,
        id: ConnectionId,
        domestic: MarketSelector,
        foreign: MarketSelector,
    ) {
        let (mut sender, mut receiver) = socket.split();
        let payloads = self.payloads(id, domestic, foreign, "ws");
        tokio::pin!(payloads);

        loop {
            tokio::select! {
                payload = payloads.next() => {
                    let Some(payload) = payload else { break };
                    let message = format!("{{\"type\":\"premium\",\"data\":{}}}", payload);

                    match tokio::time::timeout(self.write_timeout, sender.send(Message::Text(message))).await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => {
                            tracing::debug!(error = %e, "WebSocket write failed");
                            break;
                        }
                        Err(_) => {
                            tracing::warn!(timeout_ms = self.write_timeout.as_millis() as u64, "WebSocket write timed out");
                            break;
                        }
                    }
                }
                incoming = receiver.next() => match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::premium::calculator::testing::Fixture;
    use crate::reference::ReferenceDirectory;
    use crate::types::{ExchangeId, Quote};

    fn publisher(fixture: &Fixture) -> StreamPublisher {
        StreamPublisher::new(
            Arc::new(fixture.calculator(ReferenceDirectory::empty())),
            fixture.clock.clone(),
            &StreamConfig::default(),
        )
    }

    fn markets() -> (MarketSelector, MarketSelector) {
        (
            MarketSelector::new(ExchangeId::Upbit, Quote::Krw),
            MarketSelector::new(ExchangeId::Binance, Quote::Usdt),
        )
    }

    #[test]
    fn test_guard_counts_sent_payloads() {
        let mut guard = ConnectionGuard::open(ConnectionId::new(), "test");
        guard.record_sent();
        guard.record_sent();
        assert_eq!(guard.sent, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_payload_is_immediate_and_unchanged_ticks_are_silent() {
        let fixture = Fixture::new(Some(1_400.0));
        fixture.price(ExchangeId::Upbit, "BTC", Quote::Krw, 101_000_000.0);
        let (domestic, foreign) = markets();

        let payloads = publisher(&fixture).payloads(ConnectionId::new(), domestic, foreign, "test");
        tokio::pin!(payloads);

        let first = tokio::time::timeout(Duration::from_millis(1), payloads.next()).await;
        assert!(first.unwrap().is_some());

        let quiet = tokio::time::timeout(Duration::from_secs(2), payloads.next()).await;
        assert!(quiet.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_change_yields_exactly_one_more_payload() {
        let fixture = Fixture::new(Some(1_400.0));
        fixture.price(ExchangeId::Upbit, "BTC", Quote::Krw, 101_000_000.0);
        let (domestic, foreign) = markets();

        let payloads = publisher(&fixture).payloads(ConnectionId::new(), domestic, foreign, "test");
        tokio::pin!(payloads);
        assert!(payloads.next().await.is_some());

        fixture.clock.advance(Duration::from_millis(200));
        fixture.price(ExchangeId::Binance, "BTC", Quote::Usdt, 72_000.0);

        let second = tokio::time::timeout(Duration::from_secs(1), payloads.next()).await;
        assert!(second.unwrap().unwrap().contains("\"globalPrice\":72000.0"));

        let quiet = tokio::time::timeout(Duration::from_secs(2), payloads.next()).await;
        assert!(quiet.is_err());
    }
}
