use sha2::{Digest, Sha256};
use crate::error::Result;
use crate::observability::metrics::STREAM_SUPPRESSED;
use crate::premium::PremiumCalculator;
use crate::types::{ConnectionId, MarketSelector, Timestamp};

/// Per-connection diff state. Dropped with the connection.
#[derive(Debug)]
pub struct Subscription {
    pub id: ConnectionId,
    pub domestic: MarketSelector,
    pub foreign: MarketSelector,
    last_sent_hash: Option<[u8; 32]>,
    last_sent_at: Option<Timestamp>,
    sent: u64,
}

impl Subscription {
    pub fn new(id: ConnectionId, domestic: MarketSelector, foreign: MarketSelector) -> Self {
        Subscription {
            id,
            domestic,
            foreign,
            last_sent_hash: None,
            last_sent_at: None,
            sent: 0,
        }
    }

    pub fn last_sent_at(&self) -> Option<Timestamp> {
        self.last_sent_at
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// Records `payload` as sent unless it matches the previous one byte for byte.
    pub fn offer(&mut self, payload: &[u8], now: Timestamp) -> bool {
        let hash: [u8; 32] = Sha256::digest(payload).into();
        if self.last_sent_hash == Some(hash) {
            STREAM_SUPPRESSED.inc();
            return false;
        }

        self.last_sent_hash = Some(hash);
        self.last_sent_at = Some(now);
        self.sent += 1;
        true
    }

    /// Recomputes the snapshot and returns it serialized if it changed since the last send.
    pub fn next_payload(&mut self, calculator: &PremiumCalculator, now: Timestamp) -> Result<Option<String>> {
        let snapshot = calculator.snapshot(self.domestic, self.foreign);
        let payload = serde_json::to_string(&snapshot)?;
        Ok(self.offer(payload.as_bytes(), now).then_some(payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::premium::calculator::testing::Fixture;
    use crate::reference::ReferenceDirectory;
    use crate::types::{Clock, ExchangeId, Quote};

    fn subscription() -> Subscription {
        Subscription::new(
            ConnectionId::new(),
            MarketSelector::new(ExchangeId::Upbit, Quote::Krw),
            MarketSelector::new(ExchangeId::Binance, Quote::Usdt),
        )
    }

    #[test]
    fn test_identical_payloads_are_sent_once() {
        let mut sub = subscription();
        let now = Timestamp::from_millis(10);
        assert!(sub.offer(b"{\"a\":1}", now));
        assert!(!sub.offer(b"{\"a\":1}", now + std::time::Duration::from_millis(200)));
        assert!(sub.offer(b"{\"a\":2}", now));
        assert_eq!(sub.sent(), 2);
        assert_eq!(sub.last_sent_at(), Some(now));
    }

    #[test]
    fn test_next_payload_only_on_change() {
        let fixture = Fixture::new(Some(1_400.0));
        fixture.price(ExchangeId::Upbit, "BTC", Quote::Krw, 101_000_000.0);
        fixture.price(ExchangeId::Binance, "BTC", Quote::Usdt, 72_000.0);
        let calculator = fixture.calculator(ReferenceDirectory::empty());
        let mut sub = subscription();

        let first = sub.next_payload(&calculator, fixture.clock.now()).unwrap();
        assert!(first.unwrap().contains("\"domesticExchange\":\"UPBIT_KRW\""));
        assert!(sub.next_payload(&calculator, fixture.clock.now()).unwrap().is_none());

        fixture.clock.advance(std::time::Duration::from_millis(200));
        fixture.price(ExchangeId::Upbit, "BTC", Quote::Krw, 101_500_000.0);
        assert!(sub.next_payload(&calculator, fixture.clock.now()).unwrap().is_some());
        assert!(sub.next_payload(&calculator, fixture.clock.now()).unwrap().is_none());
        assert_eq!(sub.sent(), 2);
    }
}
