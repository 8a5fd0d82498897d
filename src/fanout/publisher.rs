//! Loopback WebSocket server that republishes raw feed frames.
//!
//! Every connected client receives each published frame as one binary
//! message. Frames go through a bounded broadcast channel, so a client that
//! falls behind loses the oldest frames instead of stalling the feed.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use tungstenite::Message;

use super::envelope;
use crate::Result;
use crate::close::CloseSignal;

/// Frames buffered per client before the oldest are dropped.
pub const CHANNEL_CAPACITY: usize = 4096;

/// Publishing handle for the fan-out channel.
///
/// Cloning yields another handle to the same channel.
#[derive(Debug, Clone)]
pub struct FanoutPublisher {
    tx: broadcast::Sender<Vec<u8>>,
    stamped: bool,
    next_id: Arc<AtomicU64>,
    local_addr: SocketAddr,
}

impl FanoutPublisher {
    /// Binds `127.0.0.1:port` and starts accepting clients.
    ///
    /// Port 0 picks a free port; see [`local_addr`](Self::local_addr). The
    /// accept loop and all client tasks stop once `close` fires.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Io`](crate::StreamError::Io) if the port
    /// cannot be bound.
    pub async fn bind(port: u16, stamped: bool, close: CloseSignal) -> Result<Self> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, port)).await?;
        let local_addr = listener.local_addr()?;
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);

        tokio::spawn(accept_loop(listener, tx.clone(), close));
        info!(%local_addr, stamped, "Fan-out channel listening");

        Ok(Self {
            tx,
            stamped,
            next_id: Arc::new(AtomicU64::new(1)),
            local_addr,
        })
    }

    /// Queues `frame` for every connected client without waiting.
    ///
    /// Returns the number of clients the frame was queued for.
    pub fn publish(&self, frame: &[u8]) -> usize {
        let message = if self.stamped {
            envelope::stamp(self.next_id.fetch_add(1, Ordering::Relaxed), frame)
        } else {
            frame.to_vec()
        };
        self.tx.send(message).unwrap_or(0)
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_stamped(&self) -> bool {
        self.stamped
    }

    /// Number of clients currently attached.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

async fn accept_loop(listener: TcpListener, tx: broadcast::Sender<Vec<u8>>, close: CloseSignal) {
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let rx = tx.subscribe();
                    tokio::spawn(serve_client(stream, peer, rx, close.clone()));
                }
                Err(e) => warn!("Fan-out accept failed: {e}"),
            },
            () = close.closed() => {
                info!("Fan-out channel closed");
                return;
            }
        }
    }
}

async fn serve_client(
    stream: TcpStream,
    peer: SocketAddr,
    mut rx: broadcast::Receiver<Vec<u8>>,
    close: CloseSignal,
) {
    let ws = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!(%peer, "Fan-out handshake failed: {e}");
            return;
        }
    };
    info!(%peer, "Fan-out client connected");
    let (mut write, mut read) = ws.split();

    loop {
        tokio::select! {
            frame = rx.recv() => match frame {
                Ok(frame) => {
                    if let Err(e) = write.send(Message::Binary(frame.into())).await {
                        debug!(%peer, "Fan-out send failed: {e}");
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(%peer, skipped, "Fan-out client lagging, frames dropped");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = read.next() => match incoming {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
            () = close.closed() => {
                let _ = write.send(Message::Close(None)).await;
                break;
            }
        }
    }

    info!(%peer, "Fan-out client disconnected");
}
