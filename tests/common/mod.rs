//! Shared test utilities and constants.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use smartstream::instruments::InstrumentDirectory;
use smartstream::models::Exchange;
use smartstream::models::tick::{BestFiveLevel, DecodedTick, QuoteFields, SnapQuoteTick, TickHeader};
use smartstream::quotes::QuoteTable;
use smartstream::websocket::SubscriptionManager;
use tokio::sync::mpsc;

/// Live feed endpoint.
pub const FEED_WS_URL: &str = "wss://smartapisocket.angelone.in/smart-stream";

/// NIFTY index token.
pub const NIFTY: &str = "99926000";

/// 2024-01-01 09:15:00 at UTC+05:30, in epoch milliseconds.
pub const MARKET_OPEN_MS: i64 = 1_704_080_700_000;

pub fn header(mode: u8, token: &str, ltp: i64) -> TickHeader {
    TickHeader {
        subscription_mode: mode,
        exchange_type: 1,
        token: token.to_string(),
        sequence_number: 7,
        exchange_timestamp: MARKET_OPEN_MS,
        last_traded_price: ltp,
    }
}

pub fn quote_fields() -> QuoteFields {
    QuoteFields {
        last_traded_quantity: 50,
        average_traded_price: 249_500,
        volume_trade_for_the_day: 1_200_000,
        total_buy_quantity: 35_000.0,
        total_sell_quantity: 41_000.0,
        open_price_of_the_day: 248_000,
        high_price_of_the_day: 251_000,
        low_price_of_the_day: 247_500,
        closed_price: 247_900,
    }
}

/// A SNAP_QUOTE tick with a full ten-packet ladder: bids at 2499.95 down,
/// asks at 2500.05 up.
pub fn snap_quote(token: &str, ltp: i64) -> SnapQuoteTick {
    let bids = (0..5)
        .map(|i| BestFiveLevel {
            flag: 0,
            quantity: 100 + i,
            price: 249_995 - 5 * i,
            orders: 3,
        })
        .collect();
    let asks = (0..5)
        .map(|i| BestFiveLevel {
            flag: 1,
            quantity: 200 + i,
            price: 250_005 + 5 * i,
            orders: 4,
        })
        .collect();

    SnapQuoteTick {
        header: header(3, token, ltp),
        quote: quote_fields(),
        last_traded_timestamp: MARKET_OPEN_MS / 1000,
        open_interest: 0,
        open_interest_change_percentage: 0,
        best_5_buy_data: asks,
        best_5_sell_data: bids,
        upper_circuit_limit: 272_000,
        lower_circuit_limit: 223_000,
        week_52_high_price: 260_000,
        week_52_low_price: 180_000,
    }
}

pub fn snap_quote_tick(token: &str, ltp: i64) -> DecodedTick {
    DecodedTick::SnapQuote(snap_quote(token, ltp))
}

pub fn tokens(list: &[&str]) -> Vec<String> {
    list.iter().map(|t| t.to_string()).collect()
}

/// Tokens `"1"..=n` as strings.
pub fn numbered(n: usize) -> Vec<String> {
    (1..=n).map(|i| i.to_string()).collect()
}

/// Index instruments plus NSE tokens `1..=60`, BSE token `500325` and
/// NFO token `35001`.
pub fn directory() -> Arc<InstrumentDirectory> {
    let mut directory = InstrumentDirectory::with_indices();
    for token in numbered(60) {
        directory.insert(&token, Exchange::Nse, &format!("EQ{token}"));
    }
    directory.insert("500325", Exchange::Bse, "RELIANCE");
    directory.insert("35001", Exchange::Nfo, "NIFTY24JANFUT");
    Arc::new(directory)
}

/// A manager with no settle delay, its quote table and request receiver.
pub fn manager() -> (
    SubscriptionManager,
    QuoteTable,
    mpsc::UnboundedReceiver<smartstream::models::StreamRequest>,
) {
    let quotes = QuoteTable::new();
    let (manager, rx) = SubscriptionManager::new("test", directory(), quotes.clone(), Duration::ZERO);
    (manager, quotes, rx)
}

/// Polls `condition` every 20ms, panicking after five seconds.
pub async fn eventually(condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("condition not reached within 5s");
}
