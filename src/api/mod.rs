pub mod rate_limit;
pub mod rest;

pub use rate_limit::{Decision, RateLimiter};
pub use rest::{create_router, AppState};
