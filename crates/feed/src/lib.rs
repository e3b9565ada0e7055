mod broadcaster;
mod error;
mod store;
mod subscription;

pub use broadcaster::{FeedConfig, OutputBroadcaster};
pub use error::FeedError;
pub use subscription::TaskEventStream;
