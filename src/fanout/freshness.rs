//! Freshness flag for a quote table.
//!
//! The flag answers "is the data still usable", which is a different
//! question from "is the socket connected". A monitor task recomputes it
//! once per [`CHECK_INTERVAL`] from the newest record timestamp.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::NaiveDateTime;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::close::CloseSignal;
use crate::instruments::InstrumentDirectory;
use crate::normalize::local_now;
use crate::quotes::QuoteTable;

/// Age past which the newest record no longer counts as fresh.
pub const STALE_AFTER: Duration = Duration::from_secs(5);

pub const CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Shared freshness flag. Starts out not fresh.
#[derive(Debug, Clone, Default)]
pub struct FeedHealth {
    fresh: Arc<AtomicBool>,
}

impl FeedHealth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_fresh(&self) -> bool {
        self.fresh.load(Ordering::Relaxed)
    }

    pub fn set_fresh(&self, fresh: bool) {
        self.fresh.store(fresh, Ordering::Relaxed);
    }
}

/// `true` if the newest record in `table` is at most `threshold` older
/// than `now`. An empty table is never fresh.
///
/// Records stamped ahead of `now` count as fresh.
pub fn is_fresh(table: &QuoteTable, now: NaiveDateTime, threshold: Duration) -> bool {
    let Some(latest) = table.latest_timestamp() else {
        return false;
    };
    match (now - latest).to_std() {
        Ok(age) => age <= threshold,
        Err(_) => true,
    }
}

/// Spawns the monitor that recomputes `health` from `table` every
/// [`CHECK_INTERVAL`] until `close` fires.
///
/// The flag is left false when the monitor exits.
pub fn spawn_freshness_monitor(
    table: QuoteTable,
    health: FeedHealth,
    close: CloseSignal,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CHECK_INTERVAL);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let fresh = is_fresh(&table, local_now(), STALE_AFTER);
                    if fresh != health.is_fresh() {
                        if fresh {
                            info!("Feed is fresh");
                        } else {
                            warn!(latest = ?table.latest_timestamp(), "Feed is stale");
                        }
                    }
                    health.set_fresh(fresh);
                }
                () = close.closed() => break,
            }
        }
        health.set_fresh(false);
        debug!("Freshness monitor stopped");
    })
}

/// Record timestamps keyed by symbol, oldest first.
///
/// Tokens with no known symbol are reported under the token itself.
pub fn timestamps_by_symbol(
    table: &QuoteTable,
    directory: &InstrumentDirectory,
) -> Vec<(String, NaiveDateTime)> {
    table
        .timestamps()
        .into_iter()
        .map(|(token, stamp)| {
            let symbol = directory
                .symbol_of(&token)
                .map(str::to_string)
                .unwrap_or(token);
            (symbol, stamp)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::HEADER_LEN;

    fn ltp_frame(token: &str, ms: i64) -> Vec<u8> {
        let mut frame = vec![0u8; HEADER_LEN];
        frame[0] = 1;
        frame[1] = 1;
        frame[2..2 + token.len()].copy_from_slice(token.as_bytes());
        frame[35..43].copy_from_slice(&ms.to_le_bytes());
        frame
    }

    fn table_with(token: &str, ms: i64) -> (QuoteTable, NaiveDateTime) {
        let table = QuoteTable::new();
        table.ingest(&ltp_frame(token, ms)).unwrap();
        let stamp = table.latest_timestamp().unwrap();
        (table, stamp)
    }

    #[test]
    fn empty_table_is_stale() {
        assert!(!is_fresh(&QuoteTable::new(), local_now(), STALE_AFTER));
    }

    #[test]
    fn six_seconds_old_is_stale() {
        let (table, stamp) = table_with("99926000", 1_704_080_700_000);
        let now = stamp + chrono::Duration::seconds(6);
        assert!(!is_fresh(&table, now, STALE_AFTER));
    }

    #[test]
    fn two_seconds_old_is_fresh() {
        let (table, stamp) = table_with("99926000", 1_704_080_700_000);
        let now = stamp + chrono::Duration::seconds(2);
        assert!(is_fresh(&table, now, STALE_AFTER));
    }

    #[test]
    fn future_stamp_is_fresh() {
        let (table, stamp) = table_with("99926000", 1_704_080_700_000);
        assert!(is_fresh(&table, stamp - chrono::Duration::seconds(3), STALE_AFTER));
    }

    #[test]
    fn symbols_replace_known_tokens() {
        let table = QuoteTable::new();
        table.ingest(&ltp_frame("99926000", 2_000)).unwrap();
        table.ingest(&ltp_frame("1594", 1_000)).unwrap();
        let directory = InstrumentDirectory::with_indices();

        let names: Vec<_> = timestamps_by_symbol(&table, &directory)
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec!["1594", "NIFTY"]);
    }

    #[tokio::test]
    async fn monitor_clears_flag_on_close() {
        let table = QuoteTable::new();
        table.ingest(&ltp_frame("99926000", 0)).unwrap();
        let health = FeedHealth::new();
        health.set_fresh(true);
        let close = CloseSignal::new();

        let monitor = spawn_freshness_monitor(table, health.clone(), close.clone());
        close.close();
        monitor.await.unwrap();
        assert!(!health.is_fresh());
    }
}
