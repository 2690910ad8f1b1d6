pub mod publisher;
pub mod subscription;

pub use publisher::StreamPublisher;
pub use subscription::Subscription;
