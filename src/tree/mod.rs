//! The project tree: directory nodes, reconciliation, watching and status.

/// Shared per-tree context and inbox messages.
pub mod context;
/// The directory node aggregate.
pub mod directory;
/// Children of a directory and the entry factory.
pub mod entry;
/// Node events and subscriptions.
pub mod events;
/// Expansion state and its persisted form.
pub mod expansion;
/// Filesystem abstraction.
pub mod fs;
/// The tree and its builder.
pub mod model;
/// Path containment and case folding.
pub mod paths;
/// Listing, sorting and reconciliation.
pub mod reconcile;
/// Single-child directory squashing.
pub mod squash;
/// Version-control status overlay.
pub mod status;
/// Change notifications.
pub mod watcher;

pub use context::{NodeAddress, NodeId, TreeMessage, TreeSender};
pub use directory::DirectoryNode;
pub use entry::{Entry, FileEntry};
pub use events::{EntryKind, EntrySummary, NodeEvent, NodeEventKind, Subscription};
pub use expansion::{ExpansionState, StateError};
pub use fs::{FileStats, FileSystem, LocalFileSystem, StatKind};
pub use model::{FileTree, FileTreeBuilder};
pub use reconcile::{natural_cmp, ListedEntry};
pub use status::{Repository, RepositoryEvent, Status, StatusBits};
pub use watcher::{NotifyWatchService, WatchEventKind, WatchHandle, WatchService, WatcherError};
