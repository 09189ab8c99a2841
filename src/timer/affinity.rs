//! Owner-thread affinity
//!
//! All store mutations are meant to happen on the thread that drives the
//! tick. Calls arriving from any other thread are not run in place: they
//! are queued here and replayed by the owner at its next opportunity.

use std::thread::{self, ThreadId};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::manager::TimerManager;

/// An operation waiting to run on the owner thread.
pub type DeferredOp = Box<dyn FnOnce(&TimerManager) + Send>;

/// Tracks the owner thread and queues work forwarded to it.
pub struct OwnerContext {
    owner: Mutex<ThreadId>,
    tx: mpsc::UnboundedSender<DeferredOp>,
    rx: Mutex<mpsc::UnboundedReceiver<DeferredOp>>,
}

impl OwnerContext {
    /// Binds the context to the calling thread.
    #[must_use]
    pub fn for_current_thread() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            owner: Mutex::new(thread::current().id()),
            tx,
            rx: Mutex::new(rx),
        }
    }

    /// Whether the calling thread is the owner.
    #[must_use]
    pub fn is_owner(&self) -> bool {
        *self.owner.lock() == thread::current().id()
    }

    /// Makes the calling thread the owner.
    pub fn claim(&self) {
        *self.owner.lock() = thread::current().id();
    }

    /// Queues `op` for the owner thread.
    pub fn forward(&self, operation: &'static str, op: DeferredOp) {
        warn!(
            operation,
            "timer API called off the owner thread; deferring to the owner"
        );
        crate::observability::metrics::record_deferred_call(operation);
        // The receiver lives as long as `self`, so the send cannot fail.
        let _ = self.tx.send(op);
    }

    /// Runs every operation queued so far.
    ///
    /// Operations forwarded while draining wait for the next drain.
    pub fn drain(&self, manager: &TimerManager) -> usize {
        let pending: Vec<DeferredOp> = {
            let mut rx = self.rx.lock();
            std::iter::from_fn(|| rx.try_recv().ok()).collect()
        };

        let count = pending.len();
        for op in pending {
            op(manager);
        }
        if count > 0 {
            debug!(count, "ran deferred timer operations");
        }
        count
    }

    /// Drops queued operations without running them.
    pub fn discard(&self) -> usize {
        let mut rx = self.rx.lock();
        std::iter::from_fn(|| rx.try_recv().ok()).count()
    }
}

impl std::fmt::Debug for OwnerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OwnerContext")
            .field("owner", &*self.owner.lock())
            .finish_non_exhaustive()
    }
}
