//! Feed connection lifecycle.
//!
//! [`FeedSession`] owns the connection and is the only writer to the wire.
//! It reconnects with exponential backoff, replays the request table after
//! every reconnect, sends heartbeats, and hands each binary frame to its
//! [`FrameSink`].

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use tungstenite::Message;

use super::handler::{FrameSink, handle_binary, handle_text};
use super::subscription::{SubscriptionManager, replay_requests};
use super::{WsReader, WsWriter, connect, ping, send_request};
use crate::close::CloseSignal;
use crate::config::FeedConfig;
use crate::fanout::FanoutPublisher;
use crate::instruments::InstrumentDirectory;
use crate::models::StreamRequest;
use crate::quotes::QuoteTable;
use crate::{Result, StreamError};

/// Initial backoff duration between reconnection attempts.
pub const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Maximum backoff duration between reconnection attempts.
pub const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Connection state published by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Why the reader loop exited.
enum DisconnectReason {
    /// The connection was lost, errored, or missed a heartbeat.
    ConnectionError,
    /// The session was closed on purpose.
    Shutdown,
}

pub struct FeedSession {
    config: FeedConfig,
    manager: SubscriptionManager,
    outbound: mpsc::UnboundedReceiver<StreamRequest>,
    sink: FrameSink,
    state: watch::Sender<SessionState>,
    close: CloseSignal,
}

/// Observer and closer for a running [`FeedSession`].
#[derive(Debug, Clone)]
pub struct SessionHandle {
    state: watch::Receiver<SessionState>,
    close: CloseSignal,
}

impl SessionHandle {
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Waits until the session reaches `target`.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::SessionClosed`] if the session is dropped
    /// first.
    pub async fn wait_for(&self, target: SessionState) -> Result<()> {
        let mut state = self.state.clone();
        let reached = state.wait_for(|s| *s == target).await.is_ok();
        if reached {
            Ok(())
        } else {
            Err(StreamError::SessionClosed)
        }
    }

    /// Closes the session on purpose; no reconnect follows.
    pub fn close(&self) {
        self.close.close();
    }

    pub fn is_closed(&self) -> bool {
        self.close.is_closed()
    }

    /// The signal the session stops on, for tasks that should stop with it.
    pub fn close_signal(&self) -> CloseSignal {
        self.close.clone()
    }
}

impl FeedSession {
    /// Creates a session that decodes frames into `quotes`.
    ///
    /// Returns the session, its subscription manager and a handle. Nothing
    /// connects until [`run`](Self::run) is awaited; subscriptions made
    /// before that are sent once the connection opens.
    pub fn new(
        config: FeedConfig,
        directory: Arc<InstrumentDirectory>,
        quotes: QuoteTable,
    ) -> (Self, SubscriptionManager, SessionHandle) {
        let (manager, outbound) = SubscriptionManager::new(
            &config.correlation_id,
            directory,
            quotes.clone(),
            config.settle_delay,
        );
        let (state, state_rx) = watch::channel(SessionState::Disconnected);
        let close = CloseSignal::new();

        let handle = SessionHandle {
            state: state_rx,
            close: close.clone(),
        };
        let session = Self {
            config,
            manager: manager.clone(),
            outbound,
            sink: FrameSink::Local(quotes),
            state,
            close,
        };
        (session, manager, handle)
    }

    /// Republishes frames on `publisher` instead of decoding them here.
    #[must_use]
    pub fn with_fanout(mut self, publisher: FanoutPublisher) -> Self {
        self.sink = FrameSink::Fanout(publisher);
        self
    }

    /// Runs the session until it is closed.
    ///
    /// Connects, replays the request table, subscribes the index tokens,
    /// and reads frames. On any drop it backs off and reconnects.
    pub async fn run(mut self) {
        let mut backoff = INITIAL_BACKOFF;

        while !self.close.is_closed() {
            self.set_state(SessionState::Connecting);
            info!(url = %self.config.websocket_url, "Connecting to feed");

            let (mut write, read) = match connect(&self.config).await {
                Ok(pair) => pair,
                Err(e) => {
                    error!("Connection failed: {e}");
                    self.set_state(SessionState::Disconnected);
                    if self.pause(backoff).await {
                        break;
                    }
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                    continue;
                }
            };

            if let Err(e) = self.resubscribe_all(&mut write).await {
                warn!("Resubscribe failed: {e}");
                self.set_state(SessionState::Disconnected);
                if self.pause(backoff).await {
                    break;
                }
                backoff = (backoff * 2).min(MAX_BACKOFF);
                continue;
            }

            self.set_state(SessionState::Connected);
            info!("Feed connected");
            backoff = INITIAL_BACKOFF;
            self.spawn_index_subscription();

            let reason = self.read_loop(&mut write, read).await;
            self.set_state(SessionState::Disconnected);

            match reason {
                DisconnectReason::ConnectionError => {
                    info!(
                        backoff_secs = backoff.as_secs(),
                        "Connection lost, backing off"
                    );
                    if self.pause(backoff).await {
                        break;
                    }
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
                DisconnectReason::Shutdown => break,
            }
        }

        self.set_state(SessionState::Disconnected);
        info!("Feed session stopped");
    }

    /// Sends a subscribe request for every group in the request table.
    ///
    /// Requests queued while disconnected are discarded; the table already
    /// reflects them.
    async fn resubscribe_all(&mut self, write: &mut WsWriter) -> Result<()> {
        let requests = {
            let table = self.manager.lock_table().await;
            let mut discarded = 0;
            while self.outbound.try_recv().is_ok() {
                discarded += 1;
            }
            if discarded > 0 {
                debug!(discarded, "Discarded requests queued while disconnected");
            }
            replay_requests(&table, self.manager.correlation_id())
        };

        for request in &requests {
            send_request(write, request).await?;
        }
        if !requests.is_empty() {
            info!(requests = requests.len(), "Resubscribed");
        }
        Ok(())
    }

    fn spawn_index_subscription(&self) {
        let manager = self.manager.clone();
        tokio::spawn(async move {
            if let Err(e) = manager.subscribe_indices().await {
                warn!("Index subscription failed: {e}");
            }
        });
    }

    /// Reads frames until disconnection or shutdown.
    ///
    /// A heartbeat period with no inbound frame at all counts as a dropped
    /// connection.
    async fn read_loop(&mut self, write: &mut WsWriter, mut read: WsReader) -> DisconnectReason {
        let period = self.config.heartbeat_interval;
        let mut heartbeat = tokio::time::interval_at(Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut seen_since_ping = true;

        loop {
            tokio::select! {
                msg = read.next() => match msg {
                    Some(Ok(Message::Binary(data))) => {
                        seen_since_ping = true;
                        handle_binary(&self.sink, &data);
                    }
                    Some(Ok(Message::Text(text))) => {
                        seen_since_ping = true;
                        handle_text(text.as_str());
                    }
                    Some(Ok(Message::Close(frame))) => {
                        warn!(?frame, "Server closed the connection");
                        return DisconnectReason::ConnectionError;
                    }
                    Some(Ok(_)) => seen_since_ping = true,
                    Some(Err(e)) => {
                        warn!("WebSocket error: {e}");
                        return DisconnectReason::ConnectionError;
                    }
                    None => {
                        warn!("WebSocket stream ended");
                        return DisconnectReason::ConnectionError;
                    }
                },

                request = self.outbound.recv() => match request {
                    Some(request) => {
                        if let Err(e) = send_request(write, &request).await {
                            warn!("Failed to send request: {e}");
                            return DisconnectReason::ConnectionError;
                        }
                    }
                    None => return DisconnectReason::Shutdown,
                },

                _ = heartbeat.tick() => {
                    if !seen_since_ping {
                        warn!("No frames within heartbeat interval");
                        return DisconnectReason::ConnectionError;
                    }
                    seen_since_ping = false;
                    if let Err(e) = ping(write).await {
                        warn!("Heartbeat failed: {e}");
                        return DisconnectReason::ConnectionError;
                    }
                }

                () = self.close.closed() => {
                    if let Err(e) = write.send(Message::Close(None)).await {
                        debug!("Close frame not sent: {e}");
                    }
                    info!("Feed session closing");
                    return DisconnectReason::Shutdown;
                }
            }
        }
    }

    /// Sleeps for `backoff`; returns `true` if closed meanwhile.
    async fn pause(&self, backoff: Duration) -> bool {
        info!(backoff_secs = backoff.as_secs(), "Backing off before retry");
        tokio::select! {
            () = tokio::time::sleep(backoff) => self.close.is_closed(),
            () = self.close.closed() => true,
        }
    }

    fn set_state(&self, state: SessionState) {
        self.state.send_replace(state);
    }
}
