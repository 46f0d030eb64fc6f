//! State shared by every node of one tree.

use crate::config::TreeConfig;
use crate::ignore::IgnoreMatcher;
use crate::tree::fs::{Completion, FileSystem};
use crate::tree::reconcile::ListedEntry;
use crate::tree::status::{Repository, RepositoryEvent};
use crate::tree::watcher::{WatchEventKind, WatchService};
use std::cell::Cell;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Identifier unique among the nodes of one tree, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

/// Where an inbox message should be delivered.
///
/// The path routes the message down the tree; the id makes sure it is
/// applied only to the node that asked for it and not to a later node that
/// happens to live at the same path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeAddress {
    /// Identity of the addressed node.
    pub id: NodeId,
    /// Path of the node when the message was created; used for routing.
    pub path: PathBuf,
}

/// Everything that reaches the tree from outside the event loop.
#[derive(Debug)]
pub enum TreeMessage {
    /// A watcher notification for a directory node.
    Watch {
        /// Node the watch belongs to.
        target: NodeAddress,
        /// What happened.
        kind: WatchEventKind,
    },
    /// A directory listing finished on a worker.
    Listing {
        /// Node that asked for the listing.
        target: NodeAddress,
        /// The stat'ed rows.
        entries: Vec<ListedEntry>,
    },
    /// A real-path lookup finished on a worker.
    RealPath {
        /// Node that asked for the lookup.
        target: NodeAddress,
        /// The resolved path or the lookup error.
        result: io::Result<PathBuf>,
    },
    /// A status change reported by the repository.
    Repository(RepositoryEvent),
}

/// Sending half of a tree's inbox. Safe to use from any thread.
pub type TreeSender = mpsc::UnboundedSender<TreeMessage>;

pub(crate) struct TreeContext {
    /// Options snapshot taken at build time.
    pub config: TreeConfig,
    /// Filesystem used for listing, stat and real-path resolution.
    pub fs: Arc<dyn FileSystem>,
    /// Source of change notifications.
    pub watcher: Rc<dyn WatchService>,
    /// Version-control collaborator, if any.
    pub repository: Option<Rc<dyn Repository>>,
    /// Matcher for `ignored_names`.
    pub ignored_names: Rc<dyn IgnoreMatcher>,
    /// Sending half of the tree's inbox.
    pub mailbox: TreeSender,
    next_id: Cell<u64>,
}

impl TreeContext {
    /// Bundle the collaborators of one tree.
    pub fn new(
        config: TreeConfig,
        fs: Arc<dyn FileSystem>,
        watcher: Rc<dyn WatchService>,
        repository: Option<Rc<dyn Repository>>,
        ignored_names: Rc<dyn IgnoreMatcher>,
        mailbox: TreeSender,
    ) -> Self {
        Self {
            config,
            fs,
            watcher,
            repository,
            ignored_names,
            mailbox,
            next_id: Cell::new(0),
        }
    }

    /// Allocate the next node id.
    pub fn next_id(&self) -> NodeId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        NodeId(id)
    }

    /// Whether paths are case-folded before comparison.
    pub fn case_insensitive(&self) -> bool {
        self.config.is_case_insensitive()
    }

    /// Whether reconciliation should hide `path`.
    pub fn is_path_ignored(&self, path: &Path) -> bool {
        if self.config.hide_vcs_ignored_files {
            if let Some(repo) = &self.repository {
                if repo.is_path_ignored(path) {
                    return true;
                }
            }
        }
        self.config.hide_ignored_names && self.ignored_names.matches(path)
    }

    /// Run `job` against the filesystem, inline or on a worker.
    ///
    /// In async mode the result is wrapped by `deliver` and posted to the
    /// inbox; the caller gets `Completion::Pending`.
    pub fn run_fs<T, J, D>(&self, job: J, deliver: D) -> Completion<T>
    where
        T: Send + 'static,
        J: FnOnce(&dyn FileSystem) -> T + Send + 'static,
        D: FnOnce(T) -> TreeMessage + Send + 'static,
    {
        if self.config.use_sync_fs {
            return Completion::Ready(job(self.fs.as_ref()));
        }

        let fs = Arc::clone(&self.fs);
        let mailbox = self.mailbox.clone();
        let work = move || {
            let out = job(fs.as_ref());
            if mailbox.send(deliver(out)).is_err() {
                tracing::trace!("Tree dropped before filesystem result arrived");
            }
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(work);
            }
            Err(_) => {
                std::thread::spawn(work);
            }
        }
        Completion::Pending
    }
}
