//! Incoming frame processing.
//!
//! Binary frames carry ticks; text frames carry heartbeat replies and
//! server error responses. A bad frame is logged and dropped, never fatal
//! to the session.

use tracing::{Level, debug, enabled, warn};

use super::HEARTBEAT_PONG;
use crate::codec::decode_frame;
use crate::fanout::FanoutPublisher;
use crate::models::ErrorResponse;
use crate::normalize::normalize;
use crate::quotes::QuoteTable;

/// Where binary frames go.
#[derive(Debug, Clone)]
pub enum FrameSink {
    /// Republish the raw bytes on the local fan-out channel.
    Fanout(FanoutPublisher),
    /// Decode, normalize and upsert into an in-process table.
    Local(QuoteTable),
}

/// Handles one binary frame.
pub fn handle_binary(sink: &FrameSink, frame: &[u8]) {
    match sink {
        FrameSink::Fanout(publisher) => {
            let clients = publisher.publish(frame);
            debug!(len = frame.len(), clients, "Frame republished");
        }
        FrameSink::Local(quotes) => handle_local(quotes, frame),
    }
}

fn handle_local(quotes: &QuoteTable, frame: &[u8]) {
    let tick = match decode_frame(frame) {
        Ok(tick) => tick,
        Err(e) => {
            warn!(len = frame.len(), "Dropping frame: {e}");
            return;
        }
    };

    if enabled!(Level::DEBUG) {
        match serde_json::to_string(&tick) {
            Ok(json) => debug!(tick = %json, "Tick decoded"),
            Err(e) => debug!("Tick not serializable: {e}"),
        }
    }

    match normalize(tick) {
        Ok(record) => quotes.upsert(record),
        Err(e) => warn!("Dropping tick: {e}"),
    }
}

/// Handles one text frame.
pub fn handle_text(text: &str) {
    if text == HEARTBEAT_PONG {
        debug!("Received heartbeat reply");
        return;
    }

    match serde_json::from_str::<ErrorResponse>(text) {
        Ok(response) => warn!(
            correlation_id = ?response.correlation_id,
            code = response.error_code,
            message = response.error_message,
            "Server rejected request"
        ),
        Err(_) => debug!(text, "Unrecognized text frame"),
    }
}
