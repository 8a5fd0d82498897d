//! Shared models for the streaming feed protocol.
//!
//! Contains subscription modes, exchange codes, the JSON control-plane
//! requests, and server error responses. Binary tick records live in
//! [`tick`], normalized quotes in [`quote`].

pub mod quote;
pub mod tick;

use serde::{Deserialize, Serialize};

/// Subscription modes offered by the feed.
///
/// The mode decides which fields a binary frame carries and how long it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SubscriptionMode {
    Ltp,
    Quote,
    SnapQuote,
    /// 20-level order book; only accepted for [`Exchange::Nse`] tokens.
    Depth,
}

/// Mode the feed binary subscribes command-line tokens at.
pub const DEFAULT_SUBSCRIBE_MODE: SubscriptionMode = SubscriptionMode::SnapQuote;

impl SubscriptionMode {
    /// All modes in wire-code order.
    pub const ALL: [SubscriptionMode; 4] = [
        SubscriptionMode::Ltp,
        SubscriptionMode::Quote,
        SubscriptionMode::SnapQuote,
        SubscriptionMode::Depth,
    ];

    /// Returns the wire code sent in `params.mode` and found at frame offset 0.
    pub fn as_u8(self) -> u8 {
        match self {
            SubscriptionMode::Ltp => 1,
            SubscriptionMode::Quote => 2,
            SubscriptionMode::SnapQuote => 3,
            SubscriptionMode::Depth => 4,
        }
    }

    pub fn from_u8(code: u8) -> Option<Self> {
        match code {
            1 => Some(SubscriptionMode::Ltp),
            2 => Some(SubscriptionMode::Quote),
            3 => Some(SubscriptionMode::SnapQuote),
            4 => Some(SubscriptionMode::Depth),
            _ => None,
        }
    }

    /// Human-readable label used in logs.
    pub fn label(self) -> &'static str {
        match self {
            SubscriptionMode::Ltp => "LTP",
            SubscriptionMode::Quote => "QUOTE",
            SubscriptionMode::SnapQuote => "SNAP_QUOTE",
            SubscriptionMode::Depth => "DEPTH",
        }
    }
}

/// Exchange segments and their fixed wire codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Exchange {
    Nse,
    Nfo,
    Bse,
    Bfo,
    Mcx,
    Ncdex,
    Cds,
}

impl Exchange {
    /// Returns the `exchangeType` code used on the wire.
    pub fn as_u8(self) -> u8 {
        match self {
            Exchange::Nse => 1,
            Exchange::Nfo => 2,
            Exchange::Bse => 3,
            Exchange::Bfo => 4,
            Exchange::Mcx => 5,
            Exchange::Ncdex => 7,
            Exchange::Cds => 13,
        }
    }

    pub fn from_u8(code: u8) -> Option<Self> {
        match code {
            1 => Some(Exchange::Nse),
            2 => Some(Exchange::Nfo),
            3 => Some(Exchange::Bse),
            4 => Some(Exchange::Bfo),
            5 => Some(Exchange::Mcx),
            7 => Some(Exchange::Ncdex),
            13 => Some(Exchange::Cds),
            _ => None,
        }
    }

    /// Parses a segment name as it appears in instrument master files.
    pub fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "NSE" => Some(Exchange::Nse),
            "NFO" => Some(Exchange::Nfo),
            "BSE" => Some(Exchange::Bse),
            "BFO" => Some(Exchange::Bfo),
            "MCX" => Some(Exchange::Mcx),
            "NCDEX" => Some(Exchange::Ncdex),
            "CDS" => Some(Exchange::Cds),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Exchange::Nse => "NSE",
            Exchange::Nfo => "NFO",
            Exchange::Bse => "BSE",
            Exchange::Bfo => "BFO",
            Exchange::Mcx => "MCX",
            Exchange::Ncdex => "NCDEX",
            Exchange::Cds => "CDS",
        }
    }
}

/// Control-plane action carried in [`StreamRequest::action`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Unsubscribe,
    Subscribe,
}

impl Action {
    pub fn as_u8(self) -> u8 {
        match self {
            Action::Unsubscribe => 0,
            Action::Subscribe => 1,
        }
    }
}

/// A subscribe or unsubscribe request sent as a JSON text frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamRequest {
    #[serde(rename = "correlationID")]
    pub correlation_id: String,
    pub action: u8,
    pub params: StreamParams,
}

/// Mode and grouped token list of a [`StreamRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamParams {
    pub mode: u8,
    #[serde(rename = "tokenList")]
    pub token_list: Vec<TokenGroup>,
}

/// Tokens that share one exchange segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenGroup {
    #[serde(rename = "exchangeType")]
    pub exchange_type: u8,
    pub tokens: Vec<String>,
}

impl StreamRequest {
    /// Builds a request for `action` at `mode` over the given token groups.
    pub fn new(
        correlation_id: &str,
        action: Action,
        mode: SubscriptionMode,
        token_list: Vec<TokenGroup>,
    ) -> Self {
        Self {
            correlation_id: correlation_id.to_string(),
            action: action.as_u8(),
            params: StreamParams {
                mode: mode.as_u8(),
                token_list,
            },
        }
    }

    /// Total number of tokens across all groups.
    pub fn token_count(&self) -> usize {
        self.params.token_list.iter().map(|g| g.tokens.len()).sum()
    }
}

/// Error response the server sends as a text frame when it rejects a request.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    #[serde(rename = "correlationID", default)]
    pub correlation_id: Option<String>,
    #[serde(rename = "errorCode")]
    pub error_code: String,
    #[serde(rename = "errorMessage")]
    pub error_message: String,
}
