//! Async WebSocket client for the streaming tick feed.
//!
//! This module is organized by domain:
//! - [`subscription`] - Subscription request table and subscribe/unsubscribe operations
//! - [`session`] - Connection lifecycle, heartbeats and reconnection
//! - [`handler`] - Incoming frame processing

pub mod handler;
pub mod session;
pub mod subscription;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{Connector, MaybeTlsStream, WebSocketStream, connect_async_tls_with_config};
use tracing::{debug, info};
use tungstenite::Message;
use tungstenite::client::IntoClientRequest;
use tungstenite::http::HeaderValue;

use crate::config::FeedConfig;
use crate::models::StreamRequest;
use crate::{Result, StreamError, tls};

pub use handler::FrameSink;
pub use session::{FeedSession, SessionHandle, SessionState};
pub use subscription::{SubscriptionManager, SubscriptionOutcome};

/// Text frame sent as a heartbeat.
pub const HEARTBEAT_PING: &str = "ping";

/// Text frame the server answers a heartbeat with.
pub const HEARTBEAT_PONG: &str = "pong";

/// Write half of a feed WebSocket connection.
pub type WsWriter = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Read half of a feed WebSocket connection.
pub type WsReader = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Establishes a WebSocket connection to the configured feed URL.
///
/// Credentials, when configured, are sent as handshake headers. A
/// configured CA file replaces the default web roots.
///
/// # Errors
///
/// Returns a [`StreamError`] if a header value is invalid, the CA file
/// cannot be loaded, or the connection or TLS handshake fails.
pub async fn connect(config: &FeedConfig) -> Result<(WsWriter, WsReader)> {
    let mut request = config.websocket_url.as_str().into_client_request()?;

    if let Some(creds) = &config.credentials {
        let headers = request.headers_mut();
        headers.insert("Authorization", header_value(creds.auth_token.as_str())?);
        headers.insert("x-api-key", header_value(creds.api_key.as_str())?);
        headers.insert("x-client-code", header_value(&creds.client_code)?);
        headers.insert("x-feed-token", header_value(creds.feed_token.as_str())?);
    }

    let connector = match &config.ca_path {
        Some(path) => Some(Connector::Rustls(tls::build_tls_config(path)?)),
        None => {
            tls::install_crypto_provider();
            None
        }
    };

    let (ws_stream, _) = connect_async_tls_with_config(request, None, false, connector).await?;
    info!("WebSocket handshake completed");

    Ok(ws_stream.split())
}

/// Sends a heartbeat ping.
///
/// # Errors
///
/// Returns a [`StreamError`] if sending the message fails.
pub async fn ping(write: &mut WsWriter) -> Result<()> {
    write.send(Message::Text(HEARTBEAT_PING.into())).await?;
    debug!("Sent heartbeat");

    Ok(())
}

/// Serializes and sends a control-plane request.
///
/// # Errors
///
/// Returns a [`StreamError`] if serialization or sending fails.
pub async fn send_request(write: &mut WsWriter, request: &StreamRequest) -> Result<()> {
    let json = serde_json::to_string(request)?;
    debug!("Sending stream request: {}", json);
    write.send(Message::Text(json.into())).await?;

    Ok(())
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| StreamError::Config(format!("invalid header value: {e}")))
}
