//! Project Tree
//!
//! A live, lazily expanded view of a project directory: directory nodes that
//! list their children on demand, keep them in natural sort order, follow
//! filesystem changes through per-directory watches, carry a version-control
//! status overlay and remember which folders were open across sessions.
//!
//! ## Flow
//!
//! ```text
//! Filesystem change
//!        ↓
//! WatchService callback (watcher thread)
//!        ↓
//! TreeMessage posted to the tree's inbox
//!        ↓
//! FileTree::process_pending() / next_batch() [owner's thread]
//!        ↓
//! DirectoryNode::reload() → reconcile against the fresh listing
//!        ↓
//! NodeEvent queued per subscriber
//! ```
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use project_tree::prelude::*;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let mut tree = FileTree::builder("/path/to/project")
//!         .config(TreeConfig::default().squash_directory_names(true))
//!         .build();
//!
//!     let mut events = tree.root().subscribe();
//!     loop {
//!         tree.next_batch().await;
//!         for event in events.drain() {
//!             println!("{event:?}");
//!         }
//!     }
//! }
//! ```
//!
//! ## Module Structure
//!
//! - [`config`]: Tree options and their JSON loader
//! - [`ignore`]: Glob matcher for hidden names
//! - [`tree`]: Nodes, reconciliation, watching, status and persistence
//!   - [`tree::model`]: The [`tree::FileTree`] and its builder
//!   - [`tree::directory`]: Directory node lifecycle
//!   - [`tree::reconcile`]: Listing, sorting and diffing children

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

/// Tree options and their JSON loader.
pub mod config;
/// Matching of hidden names.
pub mod ignore;
/// Directory nodes and the tree that owns them.
pub mod tree;

#[cfg(test)]
mod test_utils;

/// Re-exports for convenience.
pub mod prelude {
    pub use crate::config::{ConfigError, TreeConfig};
    pub use crate::ignore::{IgnoreMatcher, IgnoredNames};
    pub use crate::tree::{
        DirectoryNode, Entry, EntryKind, ExpansionState, FileEntry, FileSystem, FileTree,
        FileTreeBuilder, LocalFileSystem, NodeEvent, NodeEventKind, NotifyWatchService,
        Repository, RepositoryEvent, Status, StatusBits, Subscription, TreeMessage,
        WatchEventKind, WatchService, WatcherError,
    };
}
