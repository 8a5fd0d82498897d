//! Local fan-out of raw feed frames.
//!
//! - [`publisher`] - Loopback WebSocket server that republishes frames
//! - [`replica`] - Subscriber that rebuilds a quote table from the channel
//! - [`freshness`] - Staleness flag and monitor task
//! - [`envelope`] - Optional latency envelope on each frame

pub mod envelope;
pub mod freshness;
pub mod publisher;
pub mod replica;

pub use freshness::{FeedHealth, STALE_AFTER, is_fresh, spawn_freshness_monitor, timestamps_by_symbol};
pub use publisher::FanoutPublisher;
pub use replica::FeedReplica;
