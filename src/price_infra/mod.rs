pub mod connectors;
pub mod fx;
pub mod health;
pub mod normalizer;
pub mod payload;
pub mod poller;

pub use connectors::{HttpTickerSource, TickerSource};
pub use fx::FxPoller;
pub use health::{FeedHealth, FeedHealthReport, FeedStatus, HealthRegistry};
pub use normalizer::{normalize, Normalized};
pub use payload::RawPayload;
pub use poller::{ExchangePoller, PollReport};
