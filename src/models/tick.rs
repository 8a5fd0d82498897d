//! Decoded binary tick records.
//!
//! One [`DecodedTick`] is produced per inbound binary frame. Each variant
//! carries only the fields its subscription mode puts on the wire, so
//! consumers match on the variant instead of probing optional fields.
//! Prices are raw integers exactly as sent; see [`crate::normalize`] for
//! scaling.

use serde::Serialize;

use super::SubscriptionMode;

/// A decoded frame, tagged by the subscription mode byte it carried.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "subscription_mode_val")]
pub enum DecodedTick {
    #[serde(rename = "LTP")]
    Ltp(TickHeader),
    #[serde(rename = "QUOTE")]
    Quote(QuoteTick),
    #[serde(rename = "SNAP_QUOTE")]
    SnapQuote(SnapQuoteTick),
    #[serde(rename = "DEPTH")]
    Depth(DepthTick),
    /// Mode byte not recognised; only the common header could be read.
    #[serde(rename = "UNKNOWN")]
    Unrecognized(TickHeader),
}

/// Fields shared by every non-depth frame (bytes 0..51).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TickHeader {
    pub subscription_mode: u8,
    pub exchange_type: u8,
    pub token: String,
    pub sequence_number: i64,
    /// Epoch milliseconds.
    pub exchange_timestamp: i64,
    /// Fixed-point, two implied decimals.
    pub last_traded_price: i64,
}

/// Trading-session statistics carried by QUOTE and SNAP_QUOTE frames (bytes 51..123).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuoteFields {
    pub last_traded_quantity: i64,
    pub average_traded_price: i64,
    pub volume_trade_for_the_day: i64,
    pub total_buy_quantity: f64,
    pub total_sell_quantity: f64,
    pub open_price_of_the_day: i64,
    pub high_price_of_the_day: i64,
    pub low_price_of_the_day: i64,
    pub closed_price: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuoteTick {
    #[serde(flatten)]
    pub header: TickHeader,
    #[serde(flatten)]
    pub quote: QuoteFields,
}

/// A SNAP_QUOTE frame.
///
/// The feed labels its best-five ladder inversely to the packet flag:
/// packets flagged `0` are stored in `best_5_sell_data` and form the bid
/// side, the remaining packets are stored in `best_5_buy_data` and form the
/// ask side. [`SnapQuoteTick::bids`] and [`SnapQuoteTick::asks`] expose the
/// sides by meaning.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapQuoteTick {
    #[serde(flatten)]
    pub header: TickHeader,
    #[serde(flatten)]
    pub quote: QuoteFields,
    /// Epoch seconds.
    pub last_traded_timestamp: i64,
    pub open_interest: i64,
    pub open_interest_change_percentage: i64,
    pub best_5_buy_data: Vec<BestFiveLevel>,
    pub best_5_sell_data: Vec<BestFiveLevel>,
    pub upper_circuit_limit: i64,
    pub lower_circuit_limit: i64,
    #[serde(rename = "52_week_high_price")]
    pub week_52_high_price: i64,
    #[serde(rename = "52_week_low_price")]
    pub week_52_low_price: i64,
}

impl SnapQuoteTick {
    /// Bid side of the best-five ladder, best first.
    pub fn bids(&self) -> &[BestFiveLevel] {
        &self.best_5_sell_data
    }

    /// Ask side of the best-five ladder, best first.
    pub fn asks(&self) -> &[BestFiveLevel] {
        &self.best_5_buy_data
    }
}

/// One 20-byte packet of the best-five ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BestFiveLevel {
    /// `0` for one side of the book, anything else for the other.
    pub flag: u16,
    pub quantity: i64,
    pub price: i64,
    #[serde(rename = "no of orders")]
    pub orders: u16,
}

/// A DEPTH frame: header without sequence number or LTP, then 20 levels per side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepthTick {
    pub subscription_mode: u8,
    pub exchange_type: u8,
    pub token: String,
    /// Epoch milliseconds; occupies the slot other modes use for `exchange_timestamp`.
    pub packet_received_time: i64,
    pub depth_20_buy_data: Vec<DepthLevel>,
    pub depth_20_sell_data: Vec<DepthLevel>,
}

/// One 10-byte level of the 20-deep ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DepthLevel {
    pub quantity: i32,
    pub price: i32,
    pub num_of_orders: i16,
}

impl DecodedTick {
    pub fn token(&self) -> &str {
        match self {
            DecodedTick::Ltp(h) | DecodedTick::Unrecognized(h) => &h.token,
            DecodedTick::Quote(t) => &t.header.token,
            DecodedTick::SnapQuote(t) => &t.header.token,
            DecodedTick::Depth(t) => &t.token,
        }
    }

    pub fn exchange_type(&self) -> u8 {
        match self {
            DecodedTick::Ltp(h) | DecodedTick::Unrecognized(h) => h.exchange_type,
            DecodedTick::Quote(t) => t.header.exchange_type,
            DecodedTick::SnapQuote(t) => t.header.exchange_type,
            DecodedTick::Depth(t) => t.exchange_type,
        }
    }

    /// Subscription mode, or `None` for [`DecodedTick::Unrecognized`].
    pub fn mode(&self) -> Option<SubscriptionMode> {
        match self {
            DecodedTick::Ltp(_) => Some(SubscriptionMode::Ltp),
            DecodedTick::Quote(_) => Some(SubscriptionMode::Quote),
            DecodedTick::SnapQuote(_) => Some(SubscriptionMode::SnapQuote),
            DecodedTick::Depth(_) => Some(SubscriptionMode::Depth),
            DecodedTick::Unrecognized(_) => None,
        }
    }

    /// Exchange time of the frame in epoch milliseconds.
    pub fn exchange_timestamp(&self) -> i64 {
        match self {
            DecodedTick::Ltp(h) | DecodedTick::Unrecognized(h) => h.exchange_timestamp,
            DecodedTick::Quote(t) => t.header.exchange_timestamp,
            DecodedTick::SnapQuote(t) => t.header.exchange_timestamp,
            DecodedTick::Depth(t) => t.packet_received_time,
        }
    }

    /// Common header, absent for depth frames.
    pub fn header(&self) -> Option<&TickHeader> {
        match self {
            DecodedTick::Ltp(h) | DecodedTick::Unrecognized(h) => Some(h),
            DecodedTick::Quote(t) => Some(&t.header),
            DecodedTick::SnapQuote(t) => Some(&t.header),
            DecodedTick::Depth(_) => None,
        }
    }
}
