pub mod exchange;
pub mod ids;
pub mod ticker;
pub mod timestamp;

pub use exchange::{ExchangeId, MarketSelector, Quote};
pub use ids::ConnectionId;
pub use ticker::{Ticker, TickerKey};
pub use timestamp::{Clock, ManualClock, SystemClock, Timestamp};
