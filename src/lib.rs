//! Streaming market-data client for a binary tick feed.
//!
//! Provides the binary frame codec, quote normalization, a lock-guarded
//! subscription manager, an auto-reconnecting WebSocket session, and a
//! local fan-out channel with a freshness-monitored replica table.

pub mod close;
pub mod codec;
pub mod config;
pub mod error;
pub mod fanout;
pub mod instruments;
pub mod models;
pub mod normalize;
pub mod quotes;
pub mod tls;
pub mod websocket;

pub use error::{Result, StreamError};
