//! Priority queue primitives backing the dispatch pipeline.

mod channel;
mod ordered;

pub use channel::{ChannelQueue, ChannelQueueConfig};
pub use ordered::OrderedQueue;
