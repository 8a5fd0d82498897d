//! Intentional-close signal shared by long-running loops.
//!
//! Closing is distinct from a dropped connection: once closed, reconnect
//! loops and monitors exit instead of retrying.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

#[derive(Debug, Clone, Default)]
pub struct CloseSignal {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    closed: AtomicBool,
    notify: Notify,
}

impl CloseSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the signal closed and wakes every waiter.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Resolves once [`close`](Self::close) has been called.
    pub async fn closed(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_closed() {
                return;
            }
            notified.await;
        }
    }
}
