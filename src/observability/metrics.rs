use lazy_static::lazy_static;
use prometheus::{
    Encoder, Gauge, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};
use crate::error::Result;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // Poller metrics
    pub static ref POLL_SUCCESS: IntCounterVec = IntCounterVec::new(
        Opts::new("kimp_poll_success_total", "Successful upstream polls"),
        &["exchange", "feed"]
    ).unwrap();

    pub static ref POLL_FAILURE: IntCounterVec = IntCounterVec::new(
        Opts::new("kimp_poll_failure_total", "Failed upstream polls"),
        &["exchange", "feed", "reason"]
    ).unwrap();

    pub static ref POLL_LATENCY: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "kimp_poll_latency_seconds",
            "Upstream poll latency"
        ).buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["exchange"]
    ).unwrap();

    pub static ref TICKERS_DROPPED: IntCounterVec = IntCounterVec::new(
        Opts::new("kimp_tickers_dropped_total", "Upstream records dropped by the normalizer"),
        &["exchange"]
    ).unwrap();

    // Cache metrics
    pub static ref CACHE_STALE_WRITES: IntCounter = IntCounter::new(
        "kimp_cache_stale_writes_total",
        "Writes discarded because a newer observation was already cached"
    ).unwrap();

    pub static ref CACHE_ENTRIES: IntGaugeVec = IntGaugeVec::new(
        Opts::new("kimp_cache_entries", "Entries currently cached"),
        &["cache"]
    ).unwrap();

    pub static ref CACHE_SWEPT: IntCounter = IntCounter::new(
        "kimp_cache_swept_total",
        "Entries removed by the dead-entry sweep"
    ).unwrap();

    // Streaming metrics
    pub static ref STREAM_CONNECTIONS: IntGauge = IntGauge::new(
        "kimp_stream_connections",
        "Open streaming connections"
    ).unwrap();

    pub static ref STREAM_PAYLOADS: IntCounterVec = IntCounterVec::new(
        Opts::new("kimp_stream_payloads_total", "Snapshots transmitted to clients"),
        &["transport"]
    ).unwrap();

    pub static ref STREAM_SUPPRESSED: IntCounter = IntCounter::new(
        "kimp_stream_suppressed_total",
        "Ticks skipped because the snapshot had not changed"
    ).unwrap();

    // Rate limiting
    pub static ref RATE_LIMITED: IntCounter = IntCounter::new(
        "kimp_rate_limited_total",
        "Requests rejected by the rate limiter"
    ).unwrap();

    // FX
    pub static ref FX_RATE: Gauge = Gauge::new(
        "kimp_fx_rate",
        "Latest USDT to KRW rate"
    ).unwrap();
}

pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(POLL_SUCCESS.clone()))?;
    REGISTRY.register(Box::new(POLL_FAILURE.clone()))?;
    REGISTRY.register(Box::new(POLL_LATENCY.clone()))?;
    REGISTRY.register(Box::new(TICKERS_DROPPED.clone()))?;
    REGISTRY.register(Box::new(CACHE_STALE_WRITES.clone()))?;
    REGISTRY.register(Box::new(CACHE_ENTRIES.clone()))?;
    REGISTRY.register(Box::new(CACHE_SWEPT.clone()))?;
    REGISTRY.register(Box::new(STREAM_CONNECTIONS.clone()))?;
    REGISTRY.register(Box::new(STREAM_PAYLOADS.clone()))?;
    REGISTRY.register(Box::new(STREAM_SUPPRESSED.clone()))?;
    REGISTRY.register(Box::new(RATE_LIMITED.clone()))?;
    REGISTRY.register(Box::new(FX_RATE.clone()))?;
    Ok(())
}

/// Prometheus text exposition of everything in [`REGISTRY`].
pub fn render() -> Result<String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&REGISTRY.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| crate::error::Error::Metrics(e.to_string()))
}
