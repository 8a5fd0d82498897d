//! Read-only instrument directory.
//!
//! Maps feed tokens to their exchange segment and trading symbol. The
//! subscription manager uses it to group tokens by `exchangeType`; the
//! monitoring helpers use it to label tokens with symbols.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::Result;
use crate::models::Exchange;

/// Index tokens subscribed at LTP on every connection open.
pub const INDEX_TOKENS: [&str; 6] = [
    "99926000", "99926009", "99926037", "99926074", "99919000", "99919012",
];

/// Token, exchange and symbol of the built-in index instruments.
const INDEX_INSTRUMENTS: [(&str, Exchange, &str); 6] = [
    ("99926000", Exchange::Nse, "NIFTY"),
    ("99926009", Exchange::Nse, "BANKNIFTY"),
    ("99926037", Exchange::Nse, "FINNIFTY"),
    ("99926074", Exchange::Nse, "MIDCPNIFTY"),
    ("99919000", Exchange::Bse, "SENSEX"),
    ("99919012", Exchange::Bse, "BANKEX"),
];

/// One instrument known to the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instrument {
    pub exchange: Exchange,
    pub symbol: String,
}

/// A row of an instrument master file.
#[derive(Debug, Deserialize)]
struct MasterRow {
    token: String,
    symbol: String,
    exch_seg: String,
}

#[derive(Debug, Clone, Default)]
pub struct InstrumentDirectory {
    by_token: HashMap<String, Instrument>,
}

impl InstrumentDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a directory holding the built-in index instruments.
    pub fn with_indices() -> Self {
        let mut directory = Self::new();
        for (token, exchange, symbol) in INDEX_INSTRUMENTS {
            directory.insert(token, exchange, symbol);
        }
        directory
    }

    /// Loads an instrument master JSON array on top of the index instruments.
    ///
    /// Rows with an unrecognised `exch_seg` are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Io`](crate::StreamError::Io) if the file cannot
    /// be read, or [`StreamError::Json`](crate::StreamError::Json) if it is
    /// not an array of instrument rows.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let rows: Vec<MasterRow> = serde_json::from_str(&content)?;

        let mut directory = Self::with_indices();
        let mut skipped = 0usize;
        for row in rows {
            match Exchange::from_segment(&row.exch_seg) {
                Some(exchange) => directory.insert(&row.token, exchange, &row.symbol),
                None => skipped += 1,
            }
        }

        info!(
            path = %path.display(),
            instruments = directory.len(),
            skipped,
            "Loaded instrument master"
        );
        Ok(directory)
    }

    pub fn insert(&mut self, token: &str, exchange: Exchange, symbol: &str) {
        self.by_token.insert(
            token.to_string(),
            Instrument {
                exchange,
                symbol: symbol.to_string(),
            },
        );
    }

    pub fn exchange_of(&self, token: &str) -> Option<Exchange> {
        self.by_token.get(token).map(|i| i.exchange)
    }

    pub fn symbol_of(&self, token: &str) -> Option<&str> {
        self.by_token.get(token).map(|i| i.symbol.as_str())
    }

    pub fn len(&self) -> usize {
        self.by_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_token.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn indices_are_preloaded() {
        let directory = InstrumentDirectory::with_indices();
        assert_eq!(directory.len(), INDEX_TOKENS.len());
        for token in INDEX_TOKENS {
            assert!(directory.exchange_of(token).is_some(), "{token}");
        }
        assert_eq!(directory.exchange_of("99919000"), Some(Exchange::Bse));
        assert_eq!(directory.symbol_of("99926009"), Some("BANKNIFTY"));
    }

    #[test]
    fn load_skips_unknown_segments() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"token": "2885", "symbol": "RELIANCE-EQ", "exch_seg": "NSE", "name": "RELIANCE"}},
                {{"token": "43525", "symbol": "NIFTY24JUNFUT", "exch_seg": "NFO"}},
                {{"token": "1", "symbol": "ODD", "exch_seg": "XYZ"}}
            ]"#
        )
        .unwrap();

        let directory = InstrumentDirectory::load(file.path()).unwrap();
        assert_eq!(directory.exchange_of("2885"), Some(Exchange::Nse));
        assert_eq!(directory.exchange_of("43525"), Some(Exchange::Nfo));
        assert!(directory.exchange_of("1").is_none());
        assert_eq!(directory.len(), INDEX_TOKENS.len() + 2);
    }

    #[test]
    fn load_rejects_non_array() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{}}").unwrap();
        assert!(matches!(
            InstrumentDirectory::load(file.path()),
            Err(crate::StreamError::Json(_))
        ));
    }
}
