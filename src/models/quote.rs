//! Normalized quote records.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::Serialize;

use super::tick::DecodedTick;

/// Latest known market state for one token.
///
/// Timestamps are naive local time at UTC+05:30; the offset is dropped on
/// purpose so every consumer reads the same wall-clock value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuoteRecord {
    pub token: String,
    /// `None` for depth frames, which carry no LTP.
    pub ltp: Option<Decimal>,
    pub best_bid: Option<Decimal>,
    pub best_bid_qty: Option<i64>,
    pub best_ask: Option<Decimal>,
    pub best_ask_qty: Option<i64>,
    pub open_interest: Option<i64>,
    pub traded_volume: Option<i64>,
    pub timestamp: NaiveDateTime,
    pub last_traded_datetime: Option<NaiveDateTime>,
    /// The decoded frame this record was built from.
    pub tick: DecodedTick,
}
