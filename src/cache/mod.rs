pub mod entry;
pub mod fx_cache;
pub mod price_cache;
pub mod sweeper;

pub use entry::{CacheEntry, TtlClass, TtlPolicy};
pub use fx_cache::{FxCache, FxQuote};
pub use price_cache::{PriceCache, PutOutcome, PutSummary};
pub use sweeper::CacheSweeper;
