//! Reorganization events and their one-shot subscriber.
//!
//! Handlers are dispatched on a runtime worker, never inline on the
//! notifying task: during catch-up sync the organizer commits
//! reorganizations far faster than subscribers parse them, and inline
//! delivery would build that backlog into the organize path.

use hematite_types::Block;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Notification delivered to reorganization subscribers.
#[derive(Clone, Debug)]
pub enum ReorganizeEvent {
    /// A fork displaced a confirmed segment.
    Reorganized {
        /// Height of the fork point.
        fork_height: u64,
        /// Newly confirmed blocks in fork order.
        incoming: Vec<Arc<Block>>,
        /// Displaced blocks, ascending by height; the last element is
        /// the old top.
        outgoing: Vec<Arc<Block>>,
    },
    /// The organizer shut down before another reorganization.
    Stopped,
}

/// A one-shot reorganization handler. Re-subscribe to keep listening.
pub type ReorganizeHandler = Box<dyn FnOnce(ReorganizeEvent) + Send + 'static>;

/// Multicast channel with one-shot delivery: every notification drains
/// the handler list.
pub struct ReorganizeSubscriber {
    handlers: Mutex<Vec<ReorganizeHandler>>,
    stopped: AtomicBool,
}

impl ReorganizeSubscriber {
    /// A stopped subscriber; `start` before use.
    pub fn new() -> Self {
        Self {
            handlers: Mutex::new(Vec::new()),
            stopped: AtomicBool::new(true),
        }
    }

    pub fn start(&self) {
        self.stopped.store(false, Ordering::SeqCst);
    }

    /// Register a handler. When already stopped it is immediately
    /// dispatched with the stopped event. Must be called within a
    /// runtime.
    pub fn subscribe(&self, handler: ReorganizeHandler) {
        if self.stopped.load(Ordering::SeqCst) {
            dispatch(handler, ReorganizeEvent::Stopped);
            return;
        }
        self.handlers.lock().push(handler);
    }

    /// Deliver `event` to every pending handler and clear the list.
    pub fn notify(&self, event: ReorganizeEvent) {
        let drained: Vec<ReorganizeHandler> = std::mem::take(&mut *self.handlers.lock());
        for handler in drained {
            dispatch(handler, event.clone());
        }
    }

    /// Stop accepting handlers and drain the pending ones with a
    /// synthetic stopped event.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.notify(ReorganizeEvent::Stopped);
    }
}

impl Default for ReorganizeSubscriber {
    fn default() -> Self {
        Self::new()
    }
}

fn dispatch(handler: ReorganizeHandler, event: ReorganizeEvent) {
    tokio::spawn(async move { handler(event) });
}
