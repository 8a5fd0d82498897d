//! Latency envelope prepended to fanned-out frames.
//!
//! Layout, big-endian: `u64` message id followed by the `f64` send time in
//! seconds since the Unix epoch.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::{Result, StreamError};

pub const ENVELOPE_LEN: usize = 16;

/// Prepends the envelope for `id`, stamped with the current time.
pub fn stamp(id: u64, frame: &[u8]) -> Vec<u8> {
    stamp_at(id, now_secs(), frame)
}

/// Prepends an envelope carrying an explicit send time.
pub fn stamp_at(id: u64, sent_at: f64, frame: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(ENVELOPE_LEN + frame.len());
    out.extend_from_slice(&id.to_be_bytes());
    out.extend_from_slice(&sent_at.to_be_bytes());
    out.extend_from_slice(frame);
    out
}

/// Splits an enveloped message into `(id, sent_at, frame)`.
///
/// # Errors
///
/// Returns [`StreamError::MalformedFrame`] if the message is shorter than
/// the envelope.
pub fn unstamp(message: &[u8]) -> Result<(u64, f64, &[u8])> {
    let (id, rest) = message
        .split_first_chunk::<8>()
        .ok_or_else(|| too_short(message))?;
    let (sent_at, frame) = rest
        .split_first_chunk::<8>()
        .ok_or_else(|| too_short(message))?;
    Ok((u64::from_be_bytes(*id), f64::from_be_bytes(*sent_at), frame))
}

/// Seconds since the Unix epoch as a float.
pub fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

/// Seconds elapsed since `sent_at`.
pub fn delay(sent_at: f64) -> f64 {
    now_secs() - sent_at
}

fn too_short(message: &[u8]) -> StreamError {
    StreamError::MalformedFrame {
        mode: 0,
        required: ENVELOPE_LEN,
        actual: message.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_is_big_endian() {
        let out = stamp_at(1, 2.5, b"xy");
        assert_eq!(&out[..8], &[0, 0, 0, 0, 0, 0, 0, 1]);
        assert_eq!(&out[8..16], &2.5f64.to_be_bytes());
        assert_eq!(&out[16..], b"xy");
    }

    #[test]
    fn unstamp_splits_the_frame() {
        let out = stamp(42, &[1, 2, 3]);
        let (id, sent_at, frame) = unstamp(&out).unwrap();
        assert_eq!(id, 42);
        assert!(delay(sent_at) >= 0.0);
        assert_eq!(frame, &[1, 2, 3]);
    }

    #[test]
    fn short_message_is_rejected() {
        let err = unstamp(&[0u8; 15]).unwrap_err();
        assert!(matches!(
            err,
            StreamError::MalformedFrame { required: 16, actual: 15, .. }
        ));
    }
}
