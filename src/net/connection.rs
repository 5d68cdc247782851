//! In-flight request tracking.
//!
//! # Responsibilities
//! - Count requests currently inside the pipeline
//! - Generate unique request sequence numbers for tracing
//! - Let shutdown wait until the count drops to zero

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

/// Tracks active requests for graceful shutdown.
///
/// A watch channel carries the current count so waiters wake on every change
/// instead of polling.
#[derive(Debug, Clone)]
pub struct RequestTracker {
    sequence: Arc<AtomicU64>,
    active_tx: Arc<watch::Sender<u64>>,
    active_rx: watch::Receiver<u64>,
}

impl RequestTracker {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(0);
        Self {
            sequence: Arc::new(AtomicU64::new(1)),
            active_tx: Arc::new(tx),
            active_rx: rx,
        }
    }

    /// Record a new in-flight request. Returns a guard that decrements on drop.
    pub fn track(&self) -> RequestGuard {
        self.active_tx.send_modify(|count| *count += 1);
        RequestGuard {
            active_tx: Arc::clone(&self.active_tx),
            seq: self.sequence.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn active_count(&self) -> u64 {
        *self.active_rx.borrow()
    }

    /// Wait until no request is in flight, or `deadline` elapses.
    ///
    /// Returns the number of requests still open (0 on success).
    pub async fn wait_idle(&self, deadline: Duration) -> u64 {
        let mut rx = self.active_rx.clone();
        let idle = tokio::time::timeout(deadline, rx.wait_for(|count| *count == 0))
            .await
            .is_ok();
        if idle {
            0
        } else {
            self.active_count()
        }
    }
}

impl Default for RequestTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard that tracks a request's lifetime.
#[derive(Debug)]
pub struct RequestGuard {
    active_tx: Arc<watch::Sender<u64>>,
    seq: u64,
}

impl RequestGuard {
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        self.active_tx.send_modify(|count| *count = count.saturating_sub(1));
        tracing::trace!(request_seq = self.seq, "request finished");
    }
}
