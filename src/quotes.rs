//! Shared table of the latest [`QuoteRecord`] per token.
//!
//! Backed by a sharded concurrent map, so readers on other tasks never
//! block the feed loop. Cloning a [`QuoteTable`] yields another handle to
//! the same table.

use std::sync::Arc;

use chrono::NaiveDateTime;
use dashmap::DashMap;

use crate::Result;
use crate::codec::decode_frame;
use crate::models::quote::QuoteRecord;
use crate::normalize::normalize;

#[derive(Debug, Clone, Default)]
pub struct QuoteTable {
    records: Arc<DashMap<String, QuoteRecord>>,
}

impl QuoteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites the record for its token.
    pub fn upsert(&self, record: QuoteRecord) {
        self.records.insert(record.token.clone(), record);
    }

    /// Decodes and normalizes one binary frame, then upserts the record.
    ///
    /// Returns the token that was written.
    ///
    /// # Errors
    ///
    /// Returns the decode or normalization error; the table is untouched.
    pub fn ingest(&self, frame: &[u8]) -> Result<String> {
        let record = normalize(decode_frame(frame)?)?;
        let token = record.token.clone();
        self.upsert(record);
        Ok(token)
    }

    /// Returns a copy of the record for `token`.
    pub fn get(&self, token: &str) -> Option<QuoteRecord> {
        self.records.get(token).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, token: &str) -> Option<QuoteRecord> {
        self.records.remove(token).map(|(_, record)| record)
    }

    pub fn contains(&self, token: &str) -> bool {
        self.records.contains_key(token)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&self) {
        self.records.clear();
    }

    /// Most recent exchange timestamp across all records.
    pub fn latest_timestamp(&self) -> Option<NaiveDateTime> {
        self.records.iter().map(|entry| entry.timestamp).max()
    }

    /// `(token, timestamp)` for every record, oldest first.
    pub fn timestamps(&self) -> Vec<(String, NaiveDateTime)> {
        let mut stamps: Vec<_> = self
            .records
            .iter()
            .map(|entry| (entry.key().clone(), entry.timestamp))
            .collect();
        stamps.sort_by(|a, b| a.1.cmp(&b.1));
        stamps
    }

    /// Copies every record out of the table.
    pub fn snapshot(&self) -> Vec<QuoteRecord> {
        self.records.iter().map(|entry| entry.value().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StreamError;

    fn record(token: &str, ms: i64) -> QuoteRecord {
        let mut frame = vec![0u8; 51];
        frame[0] = 1;
        frame[1] = 1;
        frame[2..2 + token.len()].copy_from_slice(token.as_bytes());
        frame[35..43].copy_from_slice(&ms.to_le_bytes());
        normalize(decode_frame(&frame).unwrap()).unwrap()
    }

    #[test]
    fn upsert_overwrites_in_place() {
        let table = QuoteTable::new();
        table.upsert(record("2885", 1_000));
        table.upsert(record("2885", 2_000));
        assert_eq!(table.len(), 1);
        assert_eq!(
            table.get("2885").unwrap().tick.exchange_timestamp(),
            2_000
        );
    }

    #[test]
    fn latest_timestamp_is_the_max() {
        let table = QuoteTable::new();
        assert!(table.latest_timestamp().is_none());
        table.upsert(record("a", 5_000));
        table.upsert(record("b", 9_000));
        table.upsert(record("c", 1_000));
        assert_eq!(table.latest_timestamp(), Some(record("b", 9_000).timestamp));
        let order: Vec<_> = table.timestamps().into_iter().map(|(t, _)| t).collect();
        assert_eq!(order, vec!["c", "a", "b"]);
    }

    #[test]
    fn ingest_rejects_short_frames() {
        let table = QuoteTable::new();
        let result = table.ingest(&[1u8; 10]);
        assert!(matches!(result, Err(StreamError::MalformedFrame { .. })));
        assert!(table.is_empty());
    }

    #[test]
    fn ingest_rejects_timestamps_past_the_local_range() {
        let ms = NaiveDateTime::MAX.and_utc().timestamp_millis();
        let mut frame = vec![0u8; 51];
        frame[0] = 1;
        frame[1] = 1;
        frame[2..10].copy_from_slice(b"99926000");
        frame[35..43].copy_from_slice(&ms.to_le_bytes());

        let table = QuoteTable::new();
        let result = table.ingest(&frame);
        assert!(matches!(result, Err(StreamError::InvalidTimestamp(_))));
        assert!(table.is_empty());
    }

    #[test]
    fn clones_share_storage() {
        let table = QuoteTable::new();
        let reader = table.clone();
        table.upsert(record("1594", 0));
        assert!(reader.contains("1594"));
        assert!(reader.remove("1594").is_some());
        assert!(table.is_empty());
    }
}
