//! Binary frame codec for the tick feed.
//!
//! Frames are fixed-layout little-endian records whose first byte is the
//! subscription mode. The layout per mode is:
//!
//! | Mode | Length | Contents |
//! |---|---|---|
//! | LTP | 51 | header |
//! | QUOTE | 123 | header, session statistics |
//! | SNAP_QUOTE | 379 | header, statistics, OI, best-five ladder, circuit limits |
//! | DEPTH | 443 | mode, exchange, token, receive time, 20 buy and 20 sell levels |
//!
//! [`decode_frame`] never returns a partially populated record: the length
//! check happens before any field is read.

mod decode;
mod encode;

pub use decode::decode_frame;
pub use encode::encode_frame;

use crate::models::SubscriptionMode;

/// Length of the NUL-padded token field.
pub const TOKEN_FIELD_LEN: usize = 25;

/// Length of the common header; also the minimum for unknown mode bytes.
pub const HEADER_LEN: usize = 51;
pub const QUOTE_LEN: usize = 123;
pub const SNAP_QUOTE_LEN: usize = 379;
pub const DEPTH_LEN: usize = DEPTH_LADDER_OFFSET + 2 * DEPTH_LEVELS * DEPTH_LEVEL_LEN;

pub(crate) const BEST_FIVE_OFFSET: usize = 147;
pub(crate) const BEST_FIVE_PACKETS: usize = 10;
pub(crate) const BEST_FIVE_PACKET_LEN: usize = 20;
pub(crate) const CIRCUIT_OFFSET: usize = BEST_FIVE_OFFSET + BEST_FIVE_PACKETS * BEST_FIVE_PACKET_LEN;

pub(crate) const DEPTH_LADDER_OFFSET: usize = 43;
pub(crate) const DEPTH_LEVELS: usize = 20;
pub(crate) const DEPTH_LEVEL_LEN: usize = 10;

/// Minimum frame length for a mode byte.
pub fn required_len(mode_byte: u8) -> usize {
    match SubscriptionMode::from_u8(mode_byte) {
        Some(SubscriptionMode::Ltp) | None => HEADER_LEN,
        Some(SubscriptionMode::Quote) => QUOTE_LEN,
        Some(SubscriptionMode::SnapQuote) => SNAP_QUOTE_LEN,
        Some(SubscriptionMode::Depth) => DEPTH_LEN,
    }
}
