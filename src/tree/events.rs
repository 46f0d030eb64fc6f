//! Node events and disposable subscriptions.
//!
//! Each subscriber gets its own unbounded queue, so a slow reader never
//! loses events. A [`Subscription`] can be polled from the event loop and
//! disposed explicitly; dropping it has the same effect, and the emitter
//! forgets closed queues on its next send.

use crate::tree::status::Status;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::mpsc;

/// Kind of a child entry as reported in add/remove events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// A directory, possibly reached through a symlink.
    Directory,
    /// A regular file, possibly reached through a symlink.
    File,
}

/// Snapshot of a child at the time an event was emitted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntrySummary {
    /// Key of the child in its parent.
    pub name: String,
    /// Path of the child. For a squashed directory, the deepest folded path.
    pub path: PathBuf,
    /// Directory or file.
    pub kind: EntryKind,
    /// Position in the parent's sorted listing.
    pub index: usize,
}

/// Everything a node can tell its observers.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeEvent {
    /// The node was torn down. Emitted once per node.
    Destroyed {
        /// Path the node had when it was destroyed.
        path: PathBuf,
    },
    /// The status overlay moved to a new value.
    StatusChanged {
        /// The new status.
        status: Status,
    },
    /// New children in display order.
    EntriesAdded {
        /// Summaries of the added children.
        entries: Vec<EntrySummary>,
    },
    /// Destroyed children keyed by name.
    EntriesRemoved {
        /// Summaries of the removed children.
        entries: HashMap<String, EntrySummary>,
    },
    /// The node was collapsed.
    Collapsed,
    /// The node was expanded.
    Expanded,
}

/// Discriminant of [`NodeEvent`], used to filter subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum NodeEventKind {
    Destroyed,
    StatusChanged,
    EntriesAdded,
    EntriesRemoved,
    Collapsed,
    Expanded,
}

impl NodeEvent {
    /// The discriminant of this event.
    pub fn kind(&self) -> NodeEventKind {
        match self {
            NodeEvent::Destroyed { .. } => NodeEventKind::Destroyed,
            NodeEvent::StatusChanged { .. } => NodeEventKind::StatusChanged,
            NodeEvent::EntriesAdded { .. } => NodeEventKind::EntriesAdded,
            NodeEvent::EntriesRemoved { .. } => NodeEventKind::EntriesRemoved,
            NodeEvent::Collapsed => NodeEventKind::Collapsed,
            NodeEvent::Expanded => NodeEventKind::Expanded,
        }
    }
}

#[derive(Debug)]
struct Subscriber {
    filter: Option<NodeEventKind>,
    sender: mpsc::UnboundedSender<NodeEvent>,
}

/// Sending half owned by a node. Holds nothing until someone subscribes.
#[derive(Debug, Default)]
pub struct EventEmitter {
    subscribers: RefCell<Vec<Subscriber>>,
}

impl EventEmitter {
    /// An emitter with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish to current subscribers. Having none is not an error.
    pub fn emit(&self, event: NodeEvent) {
        let kind = event.kind();
        self.subscribers.borrow_mut().retain(|subscriber| {
            if subscriber.sender.is_closed() {
                return false;
            }
            if subscriber.filter.map_or(true, |wanted| wanted == kind) {
                let _ = subscriber.sender.send(event.clone());
            }
            true
        });
    }

    /// Open a subscription, optionally limited to one event kind.
    pub fn subscribe(&self, filter: Option<NodeEventKind>) -> Subscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.subscribers
            .borrow_mut()
            .push(Subscriber { filter, sender });
        Subscription {
            receiver: Some(receiver),
        }
    }

    /// Number of subscriptions that are still open.
    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.subscribers.borrow_mut();
        subscribers.retain(|subscriber| !subscriber.sender.is_closed());
        subscribers.len()
    }
}

/// Disposable handle on a node's event stream.
#[derive(Debug)]
pub struct Subscription {
    receiver: Option<mpsc::UnboundedReceiver<NodeEvent>>,
}

impl Subscription {
    /// Next queued event, or `None` when nothing is pending, the node is
    /// gone, or the handle was disposed.
    pub fn try_next(&mut self) -> Option<NodeEvent> {
        self.receiver.as_mut()?.try_recv().ok()
    }

    /// Wait for the next event. Resolves to `None` once the node has been
    /// dropped and the queue is drained.
    pub async fn next(&mut self) -> Option<NodeEvent> {
        self.receiver.as_mut()?.recv().await
    }

    /// All queued events.
    pub fn drain(&mut self) -> Vec<NodeEvent> {
        std::iter::from_fn(|| self.try_next()).collect()
    }

    /// Stop receiving. Idempotent.
    pub fn dispose(&mut self) {
        self.receiver = None;
    }

    /// Whether [`Subscription::dispose`] has been called.
    pub fn is_disposed(&self) -> bool {
        self.receiver.is_none()
    }
}
