//! Subscription request table and subscribe/unsubscribe operations.
//!
//! [`SubscriptionManager`] is the only mutation surface for the request
//! table. Requests are validated, queued for the session to write, and
//! recorded under a single async mutex, so concurrent calls serialize and
//! the session never replays a half-applied change after a reconnect.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard, mpsc};
use tracing::{debug, info, warn};

use crate::instruments::{INDEX_TOKENS, InstrumentDirectory};
use crate::models::{Action, Exchange, StreamRequest, SubscriptionMode, TokenGroup};
use crate::quotes::QuoteTable;
use crate::{Result, StreamError};

/// Maximum number of distinct tokens subscribed at DEPTH.
pub const DEPTH_QUOTA: usize = 50;

/// The only exchange accepted for DEPTH subscriptions.
pub const DEPTH_EXCHANGE: Exchange = Exchange::Nse;

/// Tokens currently subscribed, keyed by mode then exchange.
///
/// A token may appear under several modes at once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestTable {
    by_mode: BTreeMap<SubscriptionMode, BTreeMap<Exchange, BTreeSet<String>>>,
}

impl RequestTable {
    /// Adds tokens under `(mode, exchange)`; existing entries are kept.
    pub fn insert(&mut self, mode: SubscriptionMode, exchange: Exchange, tokens: &[String]) {
        self.by_mode
            .entry(mode)
            .or_default()
            .entry(exchange)
            .or_default()
            .extend(tokens.iter().cloned());
    }

    /// Removes tokens from `(mode, exchange)`, dropping empty groups.
    pub fn remove(&mut self, mode: SubscriptionMode, exchange: Exchange, tokens: &[String]) {
        let Some(groups) = self.by_mode.get_mut(&mode) else {
            return;
        };
        if let Some(set) = groups.get_mut(&exchange) {
            for token in tokens {
                set.remove(token);
            }
            if set.is_empty() {
                groups.remove(&exchange);
            }
        }
        if groups.is_empty() {
            self.by_mode.remove(&mode);
        }
    }

    pub fn contains(&self, mode: SubscriptionMode, token: &str) -> bool {
        self.by_mode
            .get(&mode)
            .is_some_and(|groups| groups.values().any(|set| set.contains(token)))
    }

    /// Distinct tokens subscribed at `mode`, across exchanges.
    pub fn tokens(&self, mode: SubscriptionMode) -> BTreeSet<String> {
        self.by_mode
            .get(&mode)
            .map(|groups| groups.values().flatten().cloned().collect())
            .unwrap_or_default()
    }

    pub fn count(&self, mode: SubscriptionMode) -> usize {
        self.tokens(mode).len()
    }

    /// Wire groups for `mode`, one per exchange.
    pub fn groups(&self, mode: SubscriptionMode) -> Vec<TokenGroup> {
        self.by_mode
            .get(&mode)
            .map(|groups| {
                groups
                    .iter()
                    .map(|(exchange, set)| TokenGroup {
                        exchange_type: exchange.as_u8(),
                        tokens: set.iter().cloned().collect(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Modes that currently hold at least one token.
    pub fn modes(&self) -> Vec<SubscriptionMode> {
        self.by_mode.keys().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.by_mode.is_empty()
    }

    pub fn clear(&mut self) {
        self.by_mode.clear();
    }
}

/// Result of a subscribe or unsubscribe call that reached the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionOutcome {
    /// Tokens included in the request.
    pub sent: usize,
    /// Tokens left out because no exchange mapping is known.
    pub skipped: Vec<String>,
}

/// Validates and records subscriptions, queuing wire requests for the session.
///
/// Cloning yields another handle to the same manager.
#[derive(Debug, Clone)]
pub struct SubscriptionManager {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    correlation_id: String,
    directory: Arc<InstrumentDirectory>,
    quotes: QuoteTable,
    outbound: mpsc::UnboundedSender<StreamRequest>,
    table: Mutex<RequestTable>,
    processing: AtomicBool,
    settle_delay: Duration,
}

/// Sets the processing flag for as long as it lives.
struct ProcessingGuard<'a>(&'a AtomicBool);

impl<'a> ProcessingGuard<'a> {
    fn new(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Tokens grouped by exchange, plus those with no known exchange.
type Grouped = (BTreeMap<Exchange, Vec<String>>, Vec<String>);

impl SubscriptionManager {
    /// Creates a manager and the receiver its wire requests are queued on.
    ///
    /// The receiver belongs to the session that owns the connection.
    pub fn new(
        correlation_id: &str,
        directory: Arc<InstrumentDirectory>,
        quotes: QuoteTable,
        settle_delay: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<StreamRequest>) {
        let (outbound, rx) = mpsc::unbounded_channel();
        let manager = Self {
            inner: Arc::new(Inner {
                correlation_id: correlation_id.to_string(),
                directory,
                quotes,
                outbound,
                table: Mutex::new(RequestTable::default()),
                processing: AtomicBool::new(false),
                settle_delay,
            }),
        };
        (manager, rx)
    }

    /// Subscribes `tokens` at `mode`.
    ///
    /// Tokens with no known exchange are skipped and reported in the
    /// outcome. On success the request is queued for the wire, merged into
    /// the request table, and the call then waits out the settle delay.
    ///
    /// # Errors
    ///
    /// - [`StreamError::UnknownTokens`] if no token resolves to an exchange.
    /// - [`StreamError::InvalidExchangeType`] if `mode` is DEPTH and a token
    ///   is not on [`DEPTH_EXCHANGE`].
    /// - [`StreamError::QuotaExceeded`] if `mode` is DEPTH and the distinct
    ///   token count would exceed [`DEPTH_QUOTA`].
    /// - [`StreamError::SessionClosed`] if the session is gone.
    ///
    /// Validation errors abort the whole call; nothing is sent or recorded.
    pub async fn subscribe(
        &self,
        tokens: &[String],
        mode: SubscriptionMode,
    ) -> Result<SubscriptionOutcome> {
        let (grouped, skipped) = self.group_tokens(tokens);
        if grouped.is_empty() {
            return nothing_to_send(skipped);
        }

        let mut table = self.inner.table.lock().await;
        let _processing = ProcessingGuard::new(&self.inner.processing);

        if mode == SubscriptionMode::Depth {
            validate_depth(&table, &grouped)?;
        }

        let request = StreamRequest::new(
            &self.inner.correlation_id,
            Action::Subscribe,
            mode,
            to_groups(&grouped),
        );
        let sent = request.token_count();
        self.inner
            .outbound
            .send(request)
            .map_err(|_| StreamError::SessionClosed)?;

        for (exchange, group) in &grouped {
            table.insert(mode, *exchange, group);
        }
        info!(
            mode = mode.label(),
            tokens = sent,
            skipped = skipped.len(),
            "Subscribed"
        );
        debug!(?table, "Request table after subscribe");

        tokio::time::sleep(self.inner.settle_delay).await;
        Ok(SubscriptionOutcome { sent, skipped })
    }

    /// Unsubscribes `tokens` at `mode` and evicts their quote records.
    ///
    /// Only the `mode` entries are removed; the same token subscribed under
    /// another mode stays subscribed.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::UnknownTokens`] if no token resolves to an
    /// exchange, or [`StreamError::SessionClosed`] if the session is gone.
    pub async fn unsubscribe(
        &self,
        tokens: &[String],
        mode: SubscriptionMode,
    ) -> Result<SubscriptionOutcome> {
        let (grouped, skipped) = self.group_tokens(tokens);
        if grouped.is_empty() {
            return nothing_to_send(skipped);
        }

        let mut table = self.inner.table.lock().await;
        let _processing = ProcessingGuard::new(&self.inner.processing);

        let request = StreamRequest::new(
            &self.inner.correlation_id,
            Action::Unsubscribe,
            mode,
            to_groups(&grouped),
        );
        let sent = request.token_count();
        self.inner
            .outbound
            .send(request)
            .map_err(|_| StreamError::SessionClosed)?;

        for (exchange, group) in &grouped {
            table.remove(mode, *exchange, group);
        }
        info!(mode = mode.label(), tokens = sent, "Unsubscribed");

        tokio::time::sleep(self.inner.settle_delay).await;

        for token in grouped.values().flatten() {
            self.inner.quotes.remove(token);
        }
        Ok(SubscriptionOutcome { sent, skipped })
    }

    /// Unsubscribes every recorded token in every mode, clears the request
    /// table and evicts all quote records.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::SessionClosed`] if the session is gone.
    pub async fn unsubscribe_all(&self) -> Result<usize> {
        let mut table = self.inner.table.lock().await;
        let _processing = ProcessingGuard::new(&self.inner.processing);

        let mut sent = 0;
        for mode in table.modes() {
            let request = StreamRequest::new(
                &self.inner.correlation_id,
                Action::Unsubscribe,
                mode,
                table.groups(mode),
            );
            sent += request.token_count();
            self.inner
                .outbound
                .send(request)
                .map_err(|_| StreamError::SessionClosed)?;
        }
        table.clear();
        info!(tokens = sent, "Unsubscribed from all");

        tokio::time::sleep(self.inner.settle_delay).await;
        self.inner.quotes.clear();
        Ok(sent)
    }

    /// Subscribes the built-in index tokens at LTP.
    ///
    /// # Errors
    ///
    /// Same as [`subscribe`](Self::subscribe).
    pub async fn subscribe_indices(&self) -> Result<SubscriptionOutcome> {
        let tokens: Vec<String> = INDEX_TOKENS.iter().map(|t| t.to_string()).collect();
        self.subscribe(&tokens, SubscriptionMode::Ltp).await
    }

    /// Tokens currently recorded at `mode`.
    pub async fn subscribed(&self, mode: SubscriptionMode) -> BTreeSet<String> {
        self.inner.table.lock().await.tokens(mode)
    }

    /// Copy of the whole request table.
    pub async fn table(&self) -> RequestTable {
        self.inner.table.lock().await.clone()
    }

    /// Number of quote records currently held.
    pub fn current_usage(&self) -> usize {
        self.inner.quotes.len()
    }

    /// `true` while a subscribe or unsubscribe holds the table lock.
    ///
    /// Advisory only; lets readers skip work instead of waiting on the lock.
    pub fn is_processing(&self) -> bool {
        self.inner.processing.load(Ordering::SeqCst)
    }

    /// Locks the request table for a reconnect replay.
    pub(crate) async fn lock_table(&self) -> MutexGuard<'_, RequestTable> {
        self.inner.table.lock().await
    }

    pub(crate) fn correlation_id(&self) -> &str {
        &self.inner.correlation_id
    }

    fn group_tokens(&self, tokens: &[String]) -> Grouped {
        let mut grouped: BTreeMap<Exchange, Vec<String>> = BTreeMap::new();
        let mut skipped = Vec::new();

        for token in tokens {
            match self.inner.directory.exchange_of(token) {
                Some(exchange) => {
                    let group = grouped.entry(exchange).or_default();
                    if !group.contains(token) {
                        group.push(token.clone());
                    }
                }
                None => skipped.push(token.clone()),
            }
        }

        if !skipped.is_empty() {
            warn!(?skipped, "Skipping tokens with no known exchange");
        }
        (grouped, skipped)
    }
}

/// Builds one subscribe request per mode recorded in `table`.
pub(crate) fn replay_requests(table: &RequestTable, correlation_id: &str) -> Vec<StreamRequest> {
    table
        .modes()
        .into_iter()
        .map(|mode| StreamRequest::new(correlation_id, Action::Subscribe, mode, table.groups(mode)))
        .collect()
}

fn validate_depth(table: &RequestTable, grouped: &BTreeMap<Exchange, Vec<String>>) -> Result<()> {
    for exchange in grouped.keys() {
        if *exchange != DEPTH_EXCHANGE {
            warn!(
                exchange = exchange.as_str(),
                "DEPTH subscriptions are only accepted for NSE"
            );
            return Err(StreamError::InvalidExchangeType {
                mode: SubscriptionMode::Depth.as_u8(),
                exchange_type: exchange.as_u8(),
            });
        }
    }

    let mut combined = table.tokens(SubscriptionMode::Depth);
    combined.extend(grouped.values().flatten().cloned());
    if combined.len() > DEPTH_QUOTA {
        warn!(
            requested = combined.len(),
            limit = DEPTH_QUOTA,
            "DEPTH quota exceeded"
        );
        return Err(StreamError::QuotaExceeded {
            limit: DEPTH_QUOTA,
            requested: combined.len(),
        });
    }

    Ok(())
}

/// Empty input is a no-op; input where nothing resolved is an error.
fn nothing_to_send(skipped: Vec<String>) -> Result<SubscriptionOutcome> {
    if skipped.is_empty() {
        Ok(SubscriptionOutcome::default())
    } else {
        Err(StreamError::UnknownTokens(skipped))
    }
}

fn to_groups(grouped: &BTreeMap<Exchange, Vec<String>>) -> Vec<TokenGroup> {
    grouped
        .iter()
        .map(|(exchange, tokens)| TokenGroup {
            exchange_type: exchange.as_u8(),
            tokens: tokens.clone(),
        })
        .collect()
}
