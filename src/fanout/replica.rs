//! Out-of-process replica of the quote table fed by the fan-out channel.
//!
//! [`FeedReplica::run`] connects to the local publisher, decodes every
//! frame into its own [`QuoteTable`] and keeps a [`FeedHealth`] flag
//! current. It is the only writer of that table.

use std::time::Duration;

use futures_util::StreamExt;
use tokio_tungstenite::connect_async;
use tracing::{debug, info, trace, warn};
use tungstenite::Message;

use super::envelope;
use super::freshness::{FeedHealth, spawn_freshness_monitor};
use crate::close::CloseSignal;
use crate::quotes::QuoteTable;
use crate::websocket::session::{INITIAL_BACKOFF, MAX_BACKOFF};

/// Why the replica read loop exited.
enum StreamEnd {
    Dropped,
    Closed,
}

#[derive(Debug, Clone)]
pub struct FeedReplica {
    port: u16,
    stamped: bool,
    quotes: QuoteTable,
    health: FeedHealth,
    close: CloseSignal,
}

impl FeedReplica {
    /// Creates a replica for the publisher on `127.0.0.1:port`.
    ///
    /// `stamped` must match the publisher's envelope setting.
    pub fn new(port: u16, stamped: bool) -> Self {
        Self {
            port,
            stamped,
            quotes: QuoteTable::new(),
            health: FeedHealth::new(),
            close: CloseSignal::new(),
        }
    }

    /// Handle to the replica's quote table.
    pub fn quotes(&self) -> QuoteTable {
        self.quotes.clone()
    }

    /// Handle to the replica's freshness flag.
    pub fn health(&self) -> FeedHealth {
        self.health.clone()
    }

    /// Signal that stops [`run`](Self::run) and the freshness monitor.
    pub fn close_signal(&self) -> CloseSignal {
        self.close.clone()
    }

    /// Receives frames until the close signal fires, reconnecting with
    /// backoff whenever the publisher goes away.
    pub async fn run(self) {
        let monitor =
            spawn_freshness_monitor(self.quotes.clone(), self.health.clone(), self.close.clone());
        let url = format!("ws://127.0.0.1:{}", self.port);
        let mut backoff = INITIAL_BACKOFF;

        while !self.close.is_closed() {
            info!(%url, "Connecting to fan-out channel");
            match connect_async(url.as_str()).await {
                Ok((ws, _)) => {
                    backoff = INITIAL_BACKOFF;
                    info!("Fan-out channel connected");
                    let (_write, read) = ws.split();
                    if let StreamEnd::Closed = self.read_loop(read).await {
                        break;
                    }
                    warn!("Fan-out channel dropped");
                }
                Err(e) => warn!("Fan-out connect failed: {e}"),
            }

            if self.pause(backoff).await {
                break;
            }
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }

        self.close.close();
        if let Err(e) = monitor.await {
            warn!("Freshness monitor failed: {e}");
        }
        self.health.set_fresh(false);
        info!("Replica stopped");
    }

    async fn read_loop<S>(&self, mut read: S) -> StreamEnd
    where
        S: futures_util::Stream<Item = tungstenite::Result<Message>> + Unpin,
    {
        loop {
            tokio::select! {
                msg = read.next() => match msg {
                    Some(Ok(Message::Binary(data))) => self.ingest(&data),
                    Some(Ok(Message::Close(_))) | None => return StreamEnd::Dropped,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("Fan-out read failed: {e}");
                        return StreamEnd::Dropped;
                    }
                },
                () = self.close.closed() => return StreamEnd::Closed,
            }
        }
    }

    fn ingest(&self, message: &[u8]) {
        let frame = if self.stamped {
            match envelope::unstamp(message) {
                Ok((id, sent_at, frame)) => {
                    trace!(id, delay_secs = envelope::delay(sent_at), "Frame received");
                    frame
                }
                Err(e) => {
                    warn!("Dropping frame: {e}");
                    return;
                }
            }
        } else {
            message
        };

        match self.quotes.ingest(frame) {
            Ok(token) => debug!(%token, "Replica updated"),
            Err(e) => warn!("Dropping frame: {e}"),
        }
    }

    /// Sleeps for `backoff`; returns `true` if closed meanwhile.
    async fn pause(&self, backoff: Duration) -> bool {
        debug!(backoff_secs = backoff.as_secs(), "Backing off before retry");
        tokio::select! {
            () = tokio::time::sleep(backoff) => self.close.is_closed(),
            () = self.close.closed() => true,
        }
    }
}
