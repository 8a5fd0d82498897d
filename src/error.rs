//! Crate-level error types.
//!
//! [`StreamError`] unifies every error source (configuration, WebSocket,
//! JSON, frame decoding, subscription validation) behind a single enum so
//! callers can match on the variant they care about while still using the
//! `?` operator for easy propagation.

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StreamError>;

/// Top-level error type returned by all public APIs.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// A configuration value was missing, inconsistent, or unparsable.
    #[error("configuration error: {0}")]
    Config(String),

    /// TLS setup failed (bad CA file, crypto provider).
    #[error("tls error: {0}")]
    Tls(String),

    /// A WebSocket operation (connect, send, receive) failed.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A binary frame was shorter than its declared mode requires.
    #[error("malformed frame: mode {mode} needs {required} bytes, got {actual}")]
    MalformedFrame {
        mode: u8,
        required: usize,
        actual: usize,
    },

    /// An epoch timestamp in a frame is outside the representable range.
    #[error("timestamp out of range: {0}")]
    InvalidTimestamp(i64),

    /// None of the requested tokens has a known exchange mapping.
    #[error("unknown tokens: {0:?}")]
    UnknownTokens(Vec<String>),

    /// The subscription mode does not accept the token's exchange type.
    #[error("invalid exchange type {exchange_type} for mode {mode}")]
    InvalidExchangeType { mode: u8, exchange_type: u8 },

    /// The subscription would push a mode past its token quota.
    #[error("quota exceeded: {requested} tokens requested, limit is {limit}")]
    QuotaExceeded { limit: usize, requested: usize },

    /// The feed session has shut down and no longer accepts requests.
    #[error("feed session closed")]
    SessionClosed,
}
