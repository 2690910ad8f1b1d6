use std::sync::Arc;
use std::time::Duration;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use crate::cache::FxCache;
use crate::config::FxConfig;
use crate::error::{Error, Result};
use crate::observability::metrics::{POLL_FAILURE, POLL_SUCCESS};
use crate::types::{Clock, Timestamp};
use crate::utils::parsing::{opt_f64, opt_u64};

/// CoinGecko `simple/price?ids=tether&vs_currencies=krw`.
#[derive(Debug, Deserialize)]
struct SimplePrice {
    tether: Option<TetherQuote>,
}

#[derive(Debug, Deserialize)]
struct TetherQuote {
    krw: Option<Value>,
    /// Seconds, present when `include_last_updated_at=true`.
    last_updated_at: Option<Value>,
}

/// Refreshes the USDT to KRW rate. A failed refresh keeps the previous rate.
pub struct FxPoller {
    client: Client,
    url: String,
    cache: Arc<FxCache>,
    clock: Arc<dyn Clock>,
    interval: Duration,
}

impl FxPoller {
    pub fn new(config: &FxConfig, cache: Arc<FxCache>, clock: Arc<dyn Clock>) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .pool_max_idle_per_host(1)
            .user_agent(crate::USER_AGENT)
            .build()
            .map_err(|e| Error::FxFetch(e.to_string()))?;

        Ok(FxPoller {
            client,
            url: config.url.clone(),
            cache,
            clock,
            interval: config.refresh_interval(),
        })
    }

    async fn fetch_rate(&self) -> Result<(f64, Option<Timestamp>)> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::FxFetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::FxFetch(format!("HTTP {}", response.status().as_u16())));
        }

        let body: SimplePrice = response
            .json()
            .await
            .map_err(|e| Error::FxFetch(format!("unexpected body: {}", e)))?;

        let quote = body
            .tether
            .ok_or_else(|| Error::FxFetch("missing tether quote".to_string()))?;
        let rate = opt_f64(&quote.krw)
            .filter(|rate| *rate > 0.0)
            .ok_or_else(|| Error::FxFetch("missing or non-positive krw rate".to_string()))?;
        let updated_at = opt_u64(&quote.last_updated_at).map(|secs| Timestamp::from_millis(secs * 1_000));

        Ok((rate, updated_at))
    }

    /// Fetches and stores the rate. `Ok(None)` means the upstream quote was
    /// older than the cached one and nothing was stored.
    pub async fn refresh_once(&self) -> Result<Option<f64>> {
        let requested_at = self.clock.now();
        match self.fetch_rate().await {
            Ok((rate, updated_at)) => {
                let observed_at = updated_at.unwrap_or(requested_at);
                if !self.cache.set(rate, observed_at) {
                    tracing::debug!(rate, observed_at = observed_at.as_millis(), "FX quote not newer than cached rate");
                    return Ok(None);
                }
                POLL_SUCCESS.with_label_values(&["FX", "fx"]).inc();
                tracing::info!(rate, "FX rate refreshed");
                Ok(Some(rate))
            }
            Err(e) => {
                POLL_FAILURE.with_label_values(&["FX", "fx", e.reason()]).inc();
                tracing::warn!(error = %e, "FX refresh failed, keeping previous rate");
                Err(e)
            }
        }
    }

    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => break,
            }

            tokio::select! {
                _ = self.refresh_once() => {}
                _ = shutdown.changed() => break,
            }
        }

        tracing::info!("FX poller stopped");
    }
}
