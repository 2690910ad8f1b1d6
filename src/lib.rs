pub mod types;
pub mod error;
pub mod utils;
pub mod config;
pub mod observability;
pub mod cache;
pub mod price_infra;
pub mod premium;
pub mod stream;
pub mod api;
pub mod reference;

pub use error::{Error, Result};

// Identifies this service to upstream exchange APIs.
pub const USER_AGENT: &str = concat!("kimp-engine/", env!("CARGO_PKG_VERSION"));
