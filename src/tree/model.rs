//! The tree as a whole: root node, shared context and the inbox.
//!
//! Watch callbacks and background filesystem jobs never touch nodes
//! directly. They post a [`TreeMessage`] to the inbox and the owner of the
//! [`FileTree`] applies them in batches via [`FileTree::process_pending`] or
//! [`FileTree::next_batch`], which keeps every node mutation on one thread.

use crate::config::TreeConfig;
use crate::ignore::{IgnoreMatcher, IgnoredNames};
use crate::tree::context::{NodeId, TreeContext, TreeMessage, TreeSender};
use crate::tree::directory::{DirectoryNode, NodeOptions};
use crate::tree::expansion::ExpansionState;
use crate::tree::fs::{FileSystem, LocalFileSystem};
use crate::tree::status::{Repository, RepositoryEvent};
use crate::tree::watcher::{NotifyWatchService, WatchEventKind, WatchService};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use tokio::sync::mpsc;

/// A live, watched view of one project directory.
pub struct FileTree {
    root: DirectoryNode,
    ctx: Rc<TreeContext>,
    inbox: mpsc::UnboundedReceiver<TreeMessage>,
}

impl FileTree {
    /// Start building a tree rooted at `root_path`.
    pub fn builder(root_path: impl Into<PathBuf>) -> FileTreeBuilder {
        FileTreeBuilder::new(root_path)
    }

    /// The root directory node.
    pub fn root(&self) -> &DirectoryNode {
        &self.root
    }

    /// The mutable root directory node.
    pub fn root_mut(&mut self) -> &mut DirectoryNode {
        &mut self.root
    }

    /// The options this tree was built with.
    pub fn config(&self) -> &TreeConfig {
        &self.ctx.config
    }

    /// A sender for feeding messages into this tree from other threads,
    /// e.g. a repository backend publishing [`RepositoryEvent`]s.
    pub fn sender(&self) -> TreeSender {
        self.ctx.mailbox.clone()
    }

    /// Live directory node at `path`.
    pub fn find(&self, path: &Path) -> Option<&DirectoryNode> {
        self.root.find(path)
    }

    /// Mutable live directory node at `path`.
    pub fn find_mut(&mut self, path: &Path) -> Option<&mut DirectoryNode> {
        self.root.find_path_mut(path)
    }

    /// Apply a repository notification to the whole tree right away.
    pub fn handle_repository_event(&mut self, event: RepositoryEvent) {
        self.root.handle_repository_event(&event);
    }

    /// Snapshot of the expansion state for persistence.
    pub fn serialize_expansion_state(&self) -> ExpansionState {
        self.root.serialize_expansion_state()
    }

    /// Tear down the whole tree: every watch is closed and every node
    /// emits its destroyed event once.
    pub fn destroy(&mut self) {
        self.root.destroy();
    }

    /// Apply everything already waiting in the inbox without blocking.
    ///
    /// Returns the number of messages applied after coalescing.
    pub fn process_pending(&mut self) -> usize {
        let mut batch = Vec::new();
        while let Ok(message) = self.inbox.try_recv() {
            batch.push(message);
        }
        self.apply_batch(batch)
    }

    /// Wait for at least one message, then apply it together with anything
    /// else already queued.
    pub async fn next_batch(&mut self) -> usize {
        // The context keeps a sender alive, so the inbox never closes while
        // the tree exists.
        let Some(first) = self.inbox.recv().await else {
            return 0;
        };
        let mut batch = vec![first];
        while let Ok(message) = self.inbox.try_recv() {
            batch.push(message);
        }
        self.apply_batch(batch)
    }

    fn apply_batch(&mut self, batch: Vec<TreeMessage>) -> usize {
        if batch.is_empty() {
            return 0;
        }
        let received = batch.len();
        let batch = coalesce_messages(batch);
        tracing::debug!("Applying {} of {} queued messages", batch.len(), received);

        let applied = batch.len();
        for message in batch {
            self.dispatch(message);
        }
        applied
    }

    fn dispatch(&mut self, message: TreeMessage) {
        match message {
            TreeMessage::Watch { target, kind } => match self.root.find_mut(&target) {
                Some(node) => node.handle_watch_event(kind),
                None => tracing::trace!("No node for {:?} at {}", kind, target.path.display()),
            },
            TreeMessage::Listing { target, entries } => match self.root.find_mut(&target) {
                Some(node) => node.apply_listing(entries),
                None => tracing::debug!("Dropping listing for {}", target.path.display()),
            },
            TreeMessage::RealPath { target, result } => match self.root.find_mut(&target) {
                Some(node) => node.apply_real_path(result),
                None => tracing::debug!("Dropping real path for {}", target.path.display()),
            },
            TreeMessage::Repository(event) => self.root.handle_repository_event(&event),
        }
    }
}

/// Collapse redundant watch notifications within one batch.
///
/// A deletion makes every change notification for the same node moot, and
/// repeated notifications of the same kind collapse into the first one.
/// Everything else keeps its order.
pub(crate) fn coalesce_messages(messages: Vec<TreeMessage>) -> Vec<TreeMessage> {
    let deleted: HashSet<NodeId> = messages
        .iter()
        .filter_map(|message| match message {
            TreeMessage::Watch {
                target,
                kind: WatchEventKind::Deleted,
            } => Some(target.id),
            _ => None,
        })
        .collect();

    let mut seen = HashSet::new();
    messages
        .into_iter()
        .filter(|message| match message {
            TreeMessage::Watch { target, kind } => {
                if *kind == WatchEventKind::Changed && deleted.contains(&target.id) {
                    return false;
                }
                seen.insert((target.id, *kind))
            }
            _ => true,
        })
        .collect()
}

/// Builder for [`FileTree`].
///
/// Every collaborator has a production default: the local filesystem, a
/// notify-backed watch service and a glob matcher over
/// [`TreeConfig::ignored_names`]. No repository means no status overlay.
pub struct FileTreeBuilder {
    root_path: PathBuf,
    config: TreeConfig,
    fs: Option<Arc<dyn FileSystem>>,
    watcher: Option<Rc<dyn WatchService>>,
    repository: Option<Rc<dyn Repository>>,
    ignore: Option<Rc<dyn IgnoreMatcher>>,
    expansion: ExpansionState,
}

impl FileTreeBuilder {
    /// A builder with default collaborators and configuration.
    pub fn new(root_path: impl Into<PathBuf>) -> Self {
        Self {
            root_path: root_path.into(),
            config: TreeConfig::default(),
            fs: None,
            watcher: None,
            repository: None,
            ignore: None,
            expansion: ExpansionState::default(),
        }
    }

    /// Use `config` instead of [`TreeConfig::default`].
    pub fn config(mut self, config: TreeConfig) -> Self {
        self.config = config;
        self
    }

    /// Use another filesystem implementation.
    pub fn file_system(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = Some(fs);
        self
    }

    /// Use another source of change notifications.
    pub fn watch_service(mut self, watcher: Rc<dyn WatchService>) -> Self {
        self.watcher = Some(watcher);
        self
    }

    /// Attach a version-control repository for the status overlay.
    pub fn repository(mut self, repository: Rc<dyn Repository>) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Replace the matcher built from `ignored_names`.
    pub fn ignore_matcher(mut self, matcher: Rc<dyn IgnoreMatcher>) -> Self {
        self.ignore = Some(matcher);
        self
    }

    /// Expansion state saved by a previous session.
    pub fn expansion_state(mut self, state: ExpansionState) -> Self {
        self.expansion = state;
        self
    }

    /// Build the tree. The root is expanded, listed and watched before this
    /// returns (the listing is deferred to the inbox in async mode).
    pub fn build(self) -> FileTree {
        let fs = self.fs.unwrap_or_else(|| Arc::new(LocalFileSystem));
        let watcher = self
            .watcher
            .unwrap_or_else(|| Rc::new(NotifyWatchService::new(self.config.poll_interval_ms)));
        let ignore = self
            .ignore
            .unwrap_or_else(|| Rc::new(IgnoredNames::new(&self.config.ignored_names)));

        let stats = fs.stat(&self.root_path).ok();
        let symlink = fs
            .lstat(&self.root_path)
            .map(|stats| stats.is_symlink())
            .unwrap_or(false);
        let name = self
            .root_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.root_path.display().to_string());

        let (mailbox, inbox) = mpsc::unbounded_channel();
        let ctx = Rc::new(TreeContext::new(
            self.config,
            fs,
            watcher,
            self.repository,
            ignore,
            mailbox,
        ));

        tracing::debug!("Opening tree at {}", self.root_path.display());
        let root = DirectoryNode::new(
            Rc::clone(&ctx),
            NodeOptions {
                name,
                path: self.root_path,
                symlink,
                is_root: true,
                expansion: self.expansion,
                stats,
            },
        );

        FileTree { root, ctx, inbox }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::RecordingWatchService;
    use crate::tree::context::NodeAddress;
    use crate::tree::events::{NodeEvent, NodeEventKind};
    use std::fs;
    use std::time::Duration;
    use tempfile::tempdir;

    fn address(id: u64, path: &str) -> NodeAddress {
        NodeAddress {
            id: NodeId(id),
            path: PathBuf::from(path),
        }
    }

    fn watch(id: u64, kind: WatchEventKind) -> TreeMessage {
        TreeMessage::Watch {
            target: address(id, "/p"),
            kind,
        }
    }

    #[test]
    fn test_coalesce_messages() {
        let batch = vec![
            watch(1, WatchEventKind::Changed),
            watch(1, WatchEventKind::Changed),
            watch(2, WatchEventKind::Changed),
            TreeMessage::Repository(RepositoryEvent::StatusesChanged),
            watch(2, WatchEventKind::Deleted),
            watch(2, WatchEventKind::Changed),
        ];

        let kept: Vec<_> = coalesce_messages(batch)
            .into_iter()
            .map(|message| match message {
                TreeMessage::Watch { target, kind } => format!("{}:{:?}", target.id.0, kind),
                TreeMessage::Repository(_) => "repo".to_string(),
                other => panic!("unexpected {other:?}"),
            })
            .collect();

        assert_eq!(kept, vec!["1:Changed", "repo", "2:Deleted"]);
    }

    #[test]
    fn test_change_notification_adds_new_file() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("a.txt"), "").unwrap();
        fs::write(temp.path().join("b.txt"), "").unwrap();
        let watcher = RecordingWatchService::new();
        let mut tree = FileTree::builder(temp.path())
            .watch_service(watcher.clone())
            .build();
        let mut events = tree.root().subscribe();

        fs::write(temp.path().join("c.txt"), "").unwrap();
        watcher.fire(temp.path(), WatchEventKind::Changed);
        watcher.fire(temp.path(), WatchEventKind::Changed);

        assert_eq!(tree.process_pending(), 1);
        let events = events.drain();
        assert_eq!(events.len(), 1);
        match &events[0] {
            NodeEvent::EntriesAdded { entries } => {
                assert_eq!(entries.len(), 1);
                assert_eq!(entries[0].name, "c.txt");
                assert_eq!(entries[0].index, 2);
            }
            other => panic!("expected EntriesAdded, got {other:?}"),
        }
        assert_eq!(tree.root().child_names(), vec!["a.txt", "b.txt", "c.txt"]);
    }

    #[test]
    fn test_delete_notification_destroys_child() {
        let temp = tempdir().unwrap();
        fs::create_dir(temp.path().join("sub")).unwrap();
        let sub_path = temp.path().join("sub");
        let watcher = RecordingWatchService::new();
        let mut tree = FileTree::builder(temp.path())
            .watch_service(watcher.clone())
            .build();
        tree.find_mut(&sub_path).unwrap().expand();
        let mut destroyed = tree.find(&sub_path).unwrap().on_did_destroy();
        let mut removed = tree.root().on_did_remove_entries();

        fs::remove_dir(&sub_path).unwrap();
        watcher.fire(&sub_path, WatchEventKind::Changed);
        watcher.fire(&sub_path, WatchEventKind::Deleted);
        tree.process_pending();

        assert_eq!(destroyed.drain().len(), 1);
        assert!(tree.root().children().next().is_none());
        assert!(!watcher.is_watching(&sub_path));

        watcher.fire(temp.path(), WatchEventKind::Changed);
        tree.process_pending();
        match removed.try_next() {
            Some(NodeEvent::EntriesRemoved { entries }) => assert!(entries.contains_key("sub")),
            other => panic!("expected EntriesRemoved, got {other:?}"),
        }
    }

    #[test]
    fn test_restores_saved_expansion_state() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("a").join("b")).unwrap();
        fs::create_dir(temp.path().join("c")).unwrap();
        let saved = ExpansionState::from_json(
            r#"{"isExpanded":true,"entries":{"a":{"isExpanded":true,"entries":{}}}}"#,
        )
        .unwrap();
        let watcher = RecordingWatchService::new();

        let tree = FileTree::builder(temp.path())
            .watch_service(watcher.clone())
            .expansion_state(saved)
            .build();

        assert!(tree.root().directory("a").unwrap().is_expanded());
        assert!(!tree.root().directory("c").unwrap().is_expanded());
        assert!(watcher.is_watching(&temp.path().join("a")));
        assert_eq!(
            tree.serialize_expansion_state()
                .expanded_descendants()
                .into_iter()
                .collect::<Vec<_>>(),
            vec!["a".to_string()]
        );
    }

    #[test]
    fn test_repository_events_through_inbox() {
        let temp = tempdir().unwrap();
        let watcher = RecordingWatchService::new();
        let mut tree = FileTree::builder(temp.path())
            .watch_service(watcher.clone())
            .build();

        tree.sender()
            .send(TreeMessage::Repository(RepositoryEvent::StatusesChanged))
            .unwrap();

        assert_eq!(tree.process_pending(), 1);
        assert_eq!(tree.process_pending(), 0);
    }

    #[tokio::test]
    async fn test_async_listing_arrives_through_inbox() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("a.txt"), "").unwrap();
        let watcher = RecordingWatchService::new();
        let mut tree = FileTree::builder(temp.path())
            .config(TreeConfig::default().use_sync_fs(false))
            .watch_service(watcher.clone())
            .build();
        let mut added = tree.root().on_did_add_entries();
        assert_eq!(tree.root().children().count(), 0);

        tokio::time::timeout(Duration::from_secs(5), async {
            while tree.root().children().count() == 0 {
                tree.next_batch().await;
            }
        })
        .await
        .unwrap();

        assert_eq!(tree.root().child_names(), vec!["a.txt"]);
        assert_eq!(added.try_next().map(|e| e.kind()), Some(NodeEventKind::EntriesAdded));
    }

    #[tokio::test]
    async fn test_late_results_for_destroyed_node_are_discarded() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("a.txt"), "").unwrap();
        let watcher = RecordingWatchService::new();
        let mut tree = FileTree::builder(temp.path())
            .config(TreeConfig::default().use_sync_fs(false))
            .watch_service(watcher.clone())
            .build();
        let mut events = tree.root().subscribe();

        tree.destroy();

        // One listing and one real-path lookup were in flight.
        let mut delivered = 0;
        tokio::time::timeout(Duration::from_secs(5), async {
            while delivered < 2 {
                delivered += tree.next_batch().await;
            }
        })
        .await
        .unwrap();

        let kinds: Vec<_> = events.drain().iter().map(NodeEvent::kind).collect();
        assert_eq!(kinds, vec![NodeEventKind::Destroyed]);
        assert_eq!(tree.root().children().count(), 0);
    }

    #[tokio::test]
    async fn test_listing_after_collapse_is_discarded() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("a").join("inner")).unwrap();
        let saved = ExpansionState::from_json(
            r#"{"isExpanded":true,"entries":{"a":{"isExpanded":true}}}"#,
        )
        .unwrap();
        let watcher = RecordingWatchService::new();
        let mut tree = FileTree::builder(temp.path())
            .config(TreeConfig::default().use_sync_fs(false))
            .watch_service(watcher.clone())
            .expansion_state(saved)
            .build();

        tree.root_mut().collapse();

        let mut delivered = 0;
        tokio::time::timeout(Duration::from_secs(5), async {
            while delivered < 2 {
                delivered += tree.next_batch().await;
            }
        })
        .await
        .unwrap();

        assert!(!tree.root().is_expanded());
        assert_eq!(tree.root().children().count(), 0);
        assert!(!watcher.is_watching(&temp.path().join("a")));
        assert_eq!(watcher.live_count(), 0);

        tree.root_mut().expand();
        tokio::time::timeout(Duration::from_secs(5), async {
            while tree.root().children().count() == 0 {
                tree.next_batch().await;
            }
        })
        .await
        .unwrap();
        assert!(tree.root().directory("a").unwrap().is_expanded());
    }
}
