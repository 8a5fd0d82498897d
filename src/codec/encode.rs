//! Frame encoding, the inverse of [`decode_frame`](super::decode_frame).
//!
//! Used to replay captured ticks and to build synthetic frames for the
//! fan-out channel.

use super::{
    BEST_FIVE_OFFSET, BEST_FIVE_PACKET_LEN, BEST_FIVE_PACKETS, CIRCUIT_OFFSET, DEPTH_LADDER_OFFSET,
    DEPTH_LEN, DEPTH_LEVEL_LEN, DEPTH_LEVELS, HEADER_LEN, QUOTE_LEN, SNAP_QUOTE_LEN,
    TOKEN_FIELD_LEN,
};
use crate::models::tick::{BestFiveLevel, DecodedTick, DepthLevel, QuoteFields, TickHeader};

/// Encodes a tick into its fixed-length wire frame.
///
/// Tokens longer than 25 bytes are truncated. Ladders are written in
/// order and zero-padded to their fixed size; a best-five ladder only
/// round-trips when it holds exactly ten packets, since padding packets
/// decode with flag `0`.
pub fn encode_frame(tick: &DecodedTick) -> Vec<u8> {
    match tick {
        DecodedTick::Ltp(header) | DecodedTick::Unrecognized(header) => {
            let mut frame = vec![0u8; HEADER_LEN];
            put_header(&mut frame, header);
            frame
        }
        DecodedTick::Quote(tick) => {
            let mut frame = vec![0u8; QUOTE_LEN];
            put_header(&mut frame, &tick.header);
            put_quote_fields(&mut frame, &tick.quote);
            frame
        }
        DecodedTick::SnapQuote(tick) => {
            let mut frame = vec![0u8; SNAP_QUOTE_LEN];
            put_header(&mut frame, &tick.header);
            put_quote_fields(&mut frame, &tick.quote);
            put_i64(&mut frame, 123, tick.last_traded_timestamp);
            put_i64(&mut frame, 131, tick.open_interest);
            put_i64(&mut frame, 139, tick.open_interest_change_percentage);

            let packets = tick
                .best_5_sell_data
                .iter()
                .chain(tick.best_5_buy_data.iter())
                .take(BEST_FIVE_PACKETS);
            for (i, level) in packets.enumerate() {
                put_best_five(&mut frame, BEST_FIVE_OFFSET + i * BEST_FIVE_PACKET_LEN, level);
            }

            put_i64(&mut frame, CIRCUIT_OFFSET, tick.upper_circuit_limit);
            put_i64(&mut frame, CIRCUIT_OFFSET + 8, tick.lower_circuit_limit);
            put_i64(&mut frame, CIRCUIT_OFFSET + 16, tick.week_52_high_price);
            put_i64(&mut frame, CIRCUIT_OFFSET + 24, tick.week_52_low_price);
            frame
        }
        DecodedTick::Depth(tick) => {
            let mut frame = vec![0u8; DEPTH_LEN];
            frame[0] = tick.subscription_mode;
            frame[1] = tick.exchange_type;
            put_token(&mut frame, &tick.token);
            put_i64(&mut frame, 35, tick.packet_received_time);

            let sell_offset = DEPTH_LADDER_OFFSET + DEPTH_LEVELS * DEPTH_LEVEL_LEN;
            put_depth(&mut frame, DEPTH_LADDER_OFFSET, &tick.depth_20_buy_data);
            put_depth(&mut frame, sell_offset, &tick.depth_20_sell_data);
            frame
        }
    }
}

fn put_header(frame: &mut [u8], header: &TickHeader) {
    frame[0] = header.subscription_mode;
    frame[1] = header.exchange_type;
    put_token(frame, &header.token);
    put_i64(frame, 27, header.sequence_number);
    put_i64(frame, 35, header.exchange_timestamp);
    put_i64(frame, 43, header.last_traded_price);
}

fn put_token(frame: &mut [u8], token: &str) {
    let bytes = token.as_bytes();
    let len = bytes.len().min(TOKEN_FIELD_LEN);
    frame[2..2 + len].copy_from_slice(&bytes[..len]);
}

fn put_quote_fields(frame: &mut [u8], quote: &QuoteFields) {
    put_i64(frame, 51, quote.last_traded_quantity);
    put_i64(frame, 59, quote.average_traded_price);
    put_i64(frame, 67, quote.volume_trade_for_the_day);
    frame[75..83].copy_from_slice(&quote.total_buy_quantity.to_le_bytes());
    frame[83..91].copy_from_slice(&quote.total_sell_quantity.to_le_bytes());
    put_i64(frame, 91, quote.open_price_of_the_day);
    put_i64(frame, 99, quote.high_price_of_the_day);
    put_i64(frame, 107, quote.low_price_of_the_day);
    put_i64(frame, 115, quote.closed_price);
}

fn put_best_five(frame: &mut [u8], at: usize, level: &BestFiveLevel) {
    frame[at..at + 2].copy_from_slice(&level.flag.to_le_bytes());
    put_i64(frame, at + 2, level.quantity);
    put_i64(frame, at + 10, level.price);
    frame[at + 18..at + 20].copy_from_slice(&level.orders.to_le_bytes());
}

fn put_depth(frame: &mut [u8], start: usize, levels: &[DepthLevel]) {
    for (i, level) in levels.iter().take(DEPTH_LEVELS).enumerate() {
        let at = start + i * DEPTH_LEVEL_LEN;
        frame[at..at + 4].copy_from_slice(&level.quantity.to_le_bytes());
        frame[at + 4..at + 8].copy_from_slice(&level.price.to_le_bytes());
        frame[at + 8..at + 10].copy_from_slice(&level.num_of_orders.to_le_bytes());
    }
}

fn put_i64(frame: &mut [u8], at: usize, value: i64) {
    frame[at..at + 8].copy_from_slice(&value.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode_frame;

    #[test]
    fn ltp_header_round_trips() {
        let tick = DecodedTick::Ltp(TickHeader {
            subscription_mode: 1,
            exchange_type: 2,
            token: "43525".to_string(),
            sequence_number: 9_001,
            exchange_timestamp: 1_718_000_000_123,
            last_traded_price: -150,
        });
        let frame = encode_frame(&tick);
        assert_eq!(frame.len(), HEADER_LEN);
        assert_eq!(decode_frame(&frame).unwrap(), tick);
    }

    #[test]
    fn long_tokens_are_truncated_to_field() {
        let tick = DecodedTick::Ltp(TickHeader {
            subscription_mode: 1,
            exchange_type: 1,
            token: "1".repeat(40),
            sequence_number: 0,
            exchange_timestamp: 0,
            last_traded_price: 0,
        });
        let decoded = decode_frame(&encode_frame(&tick)).unwrap();
        assert_eq!(decoded.token().len(), TOKEN_FIELD_LEN);
    }
}
