//! Conversion of decoded ticks into [`QuoteRecord`]s.
//!
//! Price scales differ by mode:
//! - LTP, QUOTE and SNAP_QUOTE prices are fixed-point with two implied
//!   decimals (paise), so `250000` becomes `2500.00`.
//! - DEPTH ladder prices are kept at the integer scale the feed sends them
//!   in ([`DEPTH_PRICE_SCALE`]); no division is applied.
//!
//! Exchange timestamps are converted to UTC+05:30 and stored as naive
//! local datetimes. Dropping the offset is intentional: every consumer
//! compares against the same exchange wall clock.

use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use rust_decimal::Decimal;

use crate::models::quote::QuoteRecord;
use crate::models::tick::DecodedTick;
use crate::{Result, StreamError};

/// Decimal places implied by LTP, QUOTE and SNAP_QUOTE integer prices.
pub const PRICE_SCALE: u32 = 2;

/// Decimal places implied by DEPTH ladder prices.
pub const DEPTH_PRICE_SCALE: u32 = 0;

/// Offset of exchange local time from UTC, in seconds (+05:30).
pub const LOCAL_UTC_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

/// Builds the quote record for a decoded tick.
///
/// # Errors
///
/// Returns [`StreamError::InvalidTimestamp`] if a timestamp in the tick
/// cannot be represented as a datetime.
pub fn normalize(tick: DecodedTick) -> Result<QuoteRecord> {
    let exchange_ms = tick.exchange_timestamp();
    let timestamp =
        local_from_millis(exchange_ms).ok_or(StreamError::InvalidTimestamp(exchange_ms))?;

    let mut record = QuoteRecord {
        token: tick.token().to_string(),
        ltp: None,
        best_bid: None,
        best_bid_qty: None,
        best_ask: None,
        best_ask_qty: None,
        open_interest: None,
        traded_volume: None,
        timestamp,
        last_traded_datetime: None,
        tick,
    };

    match &record.tick {
        DecodedTick::Ltp(header) | DecodedTick::Unrecognized(header) => {
            record.ltp = Some(price(header.last_traded_price));
        }
        DecodedTick::Quote(quote) => {
            record.ltp = Some(price(quote.header.last_traded_price));
            record.traded_volume = Some(quote.quote.volume_trade_for_the_day);
        }
        DecodedTick::SnapQuote(snap) => {
            let secs = snap.last_traded_timestamp;
            let last_traded =
                local_from_secs(secs).ok_or(StreamError::InvalidTimestamp(secs))?;

            record.ltp = Some(price(snap.header.last_traded_price));
            record.traded_volume = Some(snap.quote.volume_trade_for_the_day);
            record.open_interest = Some(snap.open_interest);
            record.last_traded_datetime = Some(last_traded);
            if let Some(bid) = snap.bids().first() {
                record.best_bid = Some(price(bid.price));
                record.best_bid_qty = Some(bid.quantity);
            }
            if let Some(ask) = snap.asks().first() {
                record.best_ask = Some(price(ask.price));
                record.best_ask_qty = Some(ask.quantity);
            }
        }
        DecodedTick::Depth(depth) => {
            if let Some(bid) = depth.depth_20_buy_data.first() {
                record.best_bid = Some(Decimal::new(i64::from(bid.price), DEPTH_PRICE_SCALE));
                record.best_bid_qty = Some(i64::from(bid.quantity));
            }
            if let Some(ask) = depth.depth_20_sell_data.first() {
                record.best_ask = Some(Decimal::new(i64::from(ask.price), DEPTH_PRICE_SCALE));
                record.best_ask_qty = Some(i64::from(ask.quantity));
            }
        }
    }

    Ok(record)
}

/// Converts fixed-point paise into a decimal price.
pub fn price(raw: i64) -> Decimal {
    Decimal::new(raw, PRICE_SCALE)
}

/// Epoch milliseconds to naive exchange-local time.
pub fn local_from_millis(ms: i64) -> Option<NaiveDateTime> {
    localize(DateTime::from_timestamp_millis(ms)?)
}

/// Epoch seconds to naive exchange-local time.
pub fn local_from_secs(secs: i64) -> Option<NaiveDateTime> {
    localize(DateTime::from_timestamp(secs, 0)?)
}

/// Current naive exchange-local time.
pub fn local_now() -> NaiveDateTime {
    Utc::now().naive_utc() + TimeDelta::seconds(i64::from(LOCAL_UTC_OFFSET_SECS))
}

/// `None` when the shifted time falls past the end of `NaiveDateTime`.
fn localize(utc: DateTime<Utc>) -> Option<NaiveDateTime> {
    utc.naive_utc()
        .checked_add_signed(TimeDelta::seconds(i64::from(LOCAL_UTC_OFFSET_SECS)))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::models::tick::{DepthLevel, DepthTick, TickHeader};

    fn ltp_tick(price: i64, ms: i64) -> DecodedTick {
        DecodedTick::Ltp(TickHeader {
            subscription_mode: 1,
            exchange_type: 1,
            token: "99926000".to_string(),
            sequence_number: 1,
            exchange_timestamp: ms,
            last_traded_price: price,
        })
    }

    #[test]
    fn ltp_is_divided_by_one_hundred() {
        let record = normalize(ltp_tick(250_000, 0)).unwrap();
        assert_eq!(record.ltp, Some(dec!(2500.00)));
        assert!(record.best_bid.is_none());
        assert!(record.open_interest.is_none());
    }

    #[test]
    fn timestamp_is_shifted_to_local_and_naive() {
        // 2024-01-01T03:45:00Z is 09:15:00 at +05:30.
        let ms = 1_704_080_700_000;
        let record = normalize(ltp_tick(100, ms)).unwrap();
        let expected = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(9, 15, 0)
            .unwrap();
        assert_eq!(record.timestamp, expected);
    }

    #[test]
    fn depth_prices_keep_raw_scale() {
        let level = DepthLevel {
            quantity: 75,
            price: 2_345_600,
            num_of_orders: 3,
        };
        let tick = DecodedTick::Depth(DepthTick {
            subscription_mode: 4,
            exchange_type: 1,
            token: "2885".to_string(),
            packet_received_time: 1_704_080_700_000,
            depth_20_buy_data: vec![level],
            depth_20_sell_data: vec![],
        });
        let record = normalize(tick).unwrap();
        assert!(record.ltp.is_none());
        assert_eq!(record.best_bid, Some(dec!(2345600)));
        assert_eq!(record.best_bid_qty, Some(75));
        assert!(record.best_ask.is_none());
    }

    #[test]
    fn out_of_range_timestamp_is_rejected() {
        assert!(matches!(
            normalize(ltp_tick(1, i64::MAX)),
            Err(StreamError::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn timestamp_near_end_of_range_is_rejected() {
        let ms = NaiveDateTime::MAX.and_utc().timestamp_millis();
        assert!(matches!(
            normalize(ltp_tick(1, ms)),
            Err(StreamError::InvalidTimestamp(got)) if got == ms
        ));
    }
}
