//! Frame decoding.

use super::{
    BEST_FIVE_OFFSET, BEST_FIVE_PACKET_LEN, BEST_FIVE_PACKETS, CIRCUIT_OFFSET,
    DEPTH_LADDER_OFFSET, DEPTH_LEVEL_LEN, DEPTH_LEVELS, TOKEN_FIELD_LEN, required_len,
};
use crate::models::SubscriptionMode;
use crate::models::tick::{
    BestFiveLevel, DecodedTick, DepthLevel, DepthTick, QuoteFields, QuoteTick, SnapQuoteTick,
    TickHeader,
};
use crate::{Result, StreamError};

/// Decodes one binary frame into a [`DecodedTick`].
///
/// Unknown mode bytes decode to [`DecodedTick::Unrecognized`] carrying the
/// header, since the token and exchange are still useful for routing.
///
/// # Errors
///
/// Returns [`StreamError::MalformedFrame`] if the buffer is empty or shorter
/// than the length its mode byte requires.
pub fn decode_frame(frame: &[u8]) -> Result<DecodedTick> {
    let Some(&mode_byte) = frame.first() else {
        return Err(StreamError::MalformedFrame {
            mode: 0,
            required: 1,
            actual: 0,
        });
    };

    let required = required_len(mode_byte);
    if frame.len() < required {
        return Err(StreamError::MalformedFrame {
            mode: mode_byte,
            required,
            actual: frame.len(),
        });
    }

    let tick = match SubscriptionMode::from_u8(mode_byte) {
        Some(SubscriptionMode::Ltp) => DecodedTick::Ltp(header(frame)),
        Some(SubscriptionMode::Quote) => DecodedTick::Quote(QuoteTick {
            header: header(frame),
            quote: quote_fields(frame),
        }),
        Some(SubscriptionMode::SnapQuote) => DecodedTick::SnapQuote(snap_quote(frame)),
        Some(SubscriptionMode::Depth) => DecodedTick::Depth(depth(frame)),
        None => DecodedTick::Unrecognized(header(frame)),
    };

    Ok(tick)
}

/// Reads the token field, stopping at the first NUL byte.
pub(crate) fn parse_token(field: &[u8]) -> String {
    field
        .iter()
        .take_while(|&&b| b != 0)
        .map(|&b| char::from(b))
        .collect()
}

fn header(frame: &[u8]) -> TickHeader {
    TickHeader {
        subscription_mode: frame[0],
        exchange_type: frame[1],
        token: parse_token(&frame[2..2 + TOKEN_FIELD_LEN]),
        sequence_number: read_i64(frame, 27),
        exchange_timestamp: read_i64(frame, 35),
        last_traded_price: read_i64(frame, 43),
    }
}

fn quote_fields(frame: &[u8]) -> QuoteFields {
    QuoteFields {
        last_traded_quantity: read_i64(frame, 51),
        average_traded_price: read_i64(frame, 59),
        volume_trade_for_the_day: read_i64(frame, 67),
        total_buy_quantity: read_f64(frame, 75),
        total_sell_quantity: read_f64(frame, 83),
        open_price_of_the_day: read_i64(frame, 91),
        high_price_of_the_day: read_i64(frame, 99),
        low_price_of_the_day: read_i64(frame, 107),
        closed_price: read_i64(frame, 115),
    }
}

fn snap_quote(frame: &[u8]) -> SnapQuoteTick {
    let (flag_zero, flag_other) = best_five(&frame[BEST_FIVE_OFFSET..CIRCUIT_OFFSET]);

    SnapQuoteTick {
        header: header(frame),
        quote: quote_fields(frame),
        last_traded_timestamp: read_i64(frame, 123),
        open_interest: read_i64(frame, 131),
        open_interest_change_percentage: read_i64(frame, 139),
        // Labels are crossed relative to the packet flag; see `SnapQuoteTick`.
        best_5_buy_data: flag_other,
        best_5_sell_data: flag_zero,
        upper_circuit_limit: read_i64(frame, CIRCUIT_OFFSET),
        lower_circuit_limit: read_i64(frame, CIRCUIT_OFFSET + 8),
        week_52_high_price: read_i64(frame, CIRCUIT_OFFSET + 16),
        week_52_low_price: read_i64(frame, CIRCUIT_OFFSET + 24),
    }
}

/// Splits the ten best-five packets into (flag == 0, flag != 0), preserving order.
fn best_five(ladder: &[u8]) -> (Vec<BestFiveLevel>, Vec<BestFiveLevel>) {
    let mut flag_zero = Vec::with_capacity(BEST_FIVE_PACKETS / 2);
    let mut flag_other = Vec::with_capacity(BEST_FIVE_PACKETS / 2);

    for packet in ladder.chunks_exact(BEST_FIVE_PACKET_LEN) {
        let level = BestFiveLevel {
            flag: read_u16(packet, 0),
            quantity: read_i64(packet, 2),
            price: read_i64(packet, 10),
            orders: read_u16(packet, 18),
        };
        if level.flag == 0 {
            flag_zero.push(level);
        } else {
            flag_other.push(level);
        }
    }

    (flag_zero, flag_other)
}

fn depth(frame: &[u8]) -> DepthTick {
    let sell_offset = DEPTH_LADDER_OFFSET + DEPTH_LEVELS * DEPTH_LEVEL_LEN;

    DepthTick {
        subscription_mode: frame[0],
        exchange_type: frame[1],
        token: parse_token(&frame[2..2 + TOKEN_FIELD_LEN]),
        packet_received_time: read_i64(frame, 35),
        depth_20_buy_data: depth_levels(&frame[DEPTH_LADDER_OFFSET..sell_offset]),
        depth_20_sell_data: depth_levels(
            &frame[sell_offset..sell_offset + DEPTH_LEVELS * DEPTH_LEVEL_LEN],
        ),
    }
}

fn depth_levels(ladder: &[u8]) -> Vec<DepthLevel> {
    ladder
        .chunks_exact(DEPTH_LEVEL_LEN)
        .map(|level| DepthLevel {
            quantity: read_i32(level, 0),
            price: read_i32(level, 4),
            num_of_orders: read_i16(level, 8),
        })
        .collect()
}

fn bytes_at<const N: usize>(buf: &[u8], at: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&buf[at..at + N]);
    out
}

fn read_i64(buf: &[u8], at: usize) -> i64 {
    i64::from_le_bytes(bytes_at(buf, at))
}

fn read_f64(buf: &[u8], at: usize) -> f64 {
    f64::from_le_bytes(bytes_at(buf, at))
}

fn read_i32(buf: &[u8], at: usize) -> i32 {
    i32::from_le_bytes(bytes_at(buf, at))
}

fn read_i16(buf: &[u8], at: usize) -> i16 {
    i16::from_le_bytes(bytes_at(buf, at))
}

fn read_u16(buf: &[u8], at: usize) -> u16 {
    u16::from_le_bytes(bytes_at(buf, at))
}
