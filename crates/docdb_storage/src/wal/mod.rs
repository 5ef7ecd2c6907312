//! Change-data-capture over the substrate's write-ahead log.
//!
//! The [`WalTailer`] background task reads committed log batches in
//! sequence order, decodes them, and dispatches [`WalEvent`]s through the
//! [`WalFeed`] to subscribers. Keyspace create/drop events are emitted by
//! the store itself at the moment it mutates the keyspace set.
//!
//! Events for index keyspaces are suppressed: index maintenance is
//! internal churn that subscribers can always re-derive from document
//! events.

mod batch;
mod tailer;

pub(crate) use tailer::WalTailer;

use parking_lot::RwLock;
use std::fmt;
use std::sync::mpsc::{self, Receiver, Sender};

/// The kind of a WAL event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalOp {
    /// A key was written in a document keyspace.
    Put,
    /// A key was deleted from a document keyspace.
    Delete,
    /// A keyspace was created.
    CreateKeyspace,
    /// A keyspace was dropped.
    DropKeyspace,
}

impl WalOp {
    /// Wire token for this operation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            WalOp::Put => "PUT",
            WalOp::Delete => "DELETE",
            WalOp::CreateKeyspace => "CREATE_CF",
            WalOp::DropKeyspace => "DROP_CF",
        }
    }
}

impl fmt::Display for WalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single change event observed on the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalEvent {
    /// The kind of change.
    pub op: WalOp,
    /// Keyspace the change applies to.
    pub keyspace: String,
    /// The affected key (document id), or the keyspace id for
    /// create/drop events.
    pub key: String,
    /// JSON rendering of the document body for puts; empty otherwise.
    pub value: String,
}

/// Distributes WAL events to subscribers.
///
/// Subscribers receive events over a channel in emission order.
/// Disconnected subscribers are pruned on the next emit.
pub struct WalFeed {
    subscribers: RwLock<Vec<Sender<WalEvent>>>,
}

impl WalFeed {
    /// Creates an empty feed.
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Subscribes to the feed.
    ///
    /// Returns a receiver that observes all events emitted after this
    /// call. The receiver should be drained regularly; the channel is
    /// unbounded.
    pub fn subscribe(&self) -> Receiver<WalEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push(tx);
        rx
    }

    /// Emits an event to every live subscriber.
    pub fn emit(&self, event: WalEvent) {
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

impl Default for WalFeed {
    fn default() -> Self {
        Self::new()
    }
}
