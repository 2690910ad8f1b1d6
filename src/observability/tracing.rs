use tracing::Span;
use tracing_subscriber::{fmt, EnvFilter};
use crate::config::{FeedKind, LoggingConfig};
use crate::error::{Error, Result};
use crate::types::{ConnectionId, ExchangeId, MarketSelector};

/// Installs the global subscriber. `RUST_LOG` wins over `logging.filter`.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .map_err(|e| Error::Config(format!("invalid log filter: {}", e)))?;

    let builder = fmt().with_env_filter(filter).with_target(true);
    let installed = if config.json {
        builder.json().flatten_event(true).try_init()
    } else {
        builder.try_init()
    };

    installed.map_err(|e| Error::Config(format!("tracing already initialised: {}", e)))
}

pub fn trace_poll(exchange: ExchangeId, feed: FeedKind) -> Span {
    tracing::info_span!(
        "poll",
        exchange = %exchange,
        feed = %feed,
    )
}

pub fn trace_stream(
    connection_id: ConnectionId,
    transport: &'static str,
    domestic: MarketSelector,
    foreign: MarketSelector,
) -> Span {
    tracing::info_span!(
        "stream",
        connection_id = %connection_id,
        transport,
        domestic = %domestic,
        foreign = %foreign,
    )
}
