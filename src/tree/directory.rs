//! The directory node: one in-memory mirror of one directory on disk.
//!
//! A node exclusively owns its children. Destruction is explicit and
//! depth-first: children are destroyed before the node announces its own
//! destruction, and a destroyed node never comes back.

use crate::tree::context::{NodeAddress, NodeId, TreeContext, TreeMessage};
use crate::tree::entry::Entry;
use crate::tree::events::{EventEmitter, NodeEvent, NodeEventKind, Subscription};
use crate::tree::expansion::ExpansionState;
use crate::tree::fs::{Completion, FileStats};
use crate::tree::paths::PathIdentity;
use crate::tree::squash::{squash_directory_path, SquashedName};
use crate::tree::status::{
    aggregate_statuses, resolve_status, RepositoryEvent, Status, StatusFacts,
};
use crate::tree::watcher::{WatchCallback, WatchEventKind, WatchHandle};
use hashlink::LinkedHashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Construction parameters for a [`DirectoryNode`].
pub struct NodeOptions {
    /// Key in the parent and first segment of a squashed label.
    pub name: String,
    /// Path on disk. Squashing may move it deeper.
    pub path: PathBuf,
    /// Whether the entry was reached through a symlink.
    pub symlink: bool,
    /// Roots are always expanded and never squashed.
    pub is_root: bool,
    /// Saved expansion state restored into this node.
    pub expansion: ExpansionState,
    /// Stats from the listing that produced this node.
    pub stats: Option<FileStats>,
}

/// A directory mirrored in memory: its live children, watch, status and
/// expansion state.
pub struct DirectoryNode {
    id: NodeId,
    name: String,
    identity: PathIdentity,
    symlink: bool,
    is_root: bool,
    submodule: bool,
    squashed: Option<SquashedName>,
    stats: Option<FileStats>,
    status: Status,
    destroyed: bool,
    index: usize,
    pub(super) children: LinkedHashMap<String, Entry>,
    pub(super) expansion: ExpansionState,
    watch: Option<Box<dyn WatchHandle>>,
    repo_subscribed: bool,
    pub(super) emitter: EventEmitter,
    pub(super) ctx: Rc<TreeContext>,
}

impl DirectoryNode {
    pub(crate) fn new(ctx: Rc<TreeContext>, options: NodeOptions) -> Self {
        let NodeOptions {
            name,
            mut path,
            symlink,
            is_root,
            mut expansion,
            stats,
        } = options;

        let mut squashed = None;
        if !is_root && ctx.config.squash_directory_names {
            let (deepest, label) = squash_directory_path(ctx.fs.as_ref(), &name, &path);
            path = deepest;
            squashed = label;
        }

        if is_root {
            expansion.is_expanded = true;
        }

        let submodule = ctx
            .repository
            .as_ref()
            .is_some_and(|repo| repo.is_submodule(&path));

        let mut node = Self {
            id: ctx.next_id(),
            name,
            identity: PathIdentity::new(path, ctx.case_insensitive()),
            symlink,
            is_root,
            submodule,
            squashed,
            stats,
            status: Status::None,
            destroyed: false,
            index: 0,
            children: LinkedHashMap::new(),
            expansion,
            watch: None,
            repo_subscribed: ctx.repository.is_some(),
            emitter: EventEmitter::new(),
            ctx,
        };

        node.update_status();
        node.load_real_path();
        if node.expansion.is_expanded {
            node.expand();
        }
        node
    }

    /// Identifier unique within the tree.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Address used to route inbox messages back to this node.
    pub fn address(&self) -> NodeAddress {
        NodeAddress {
            id: self.id,
            path: self.path().to_path_buf(),
        }
    }

    /// Key of this node in its parent. Unaffected by squashing.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Label to render: the squashed chain if any, else the name.
    pub fn display_name(&self) -> String {
        self.squashed
            .as_ref()
            .map_or_else(|| self.name.clone(), SquashedName::display)
    }

    /// The two-part label when this node is squashed.
    pub fn squashed_name(&self) -> Option<&SquashedName> {
        self.squashed.as_ref()
    }

    /// Logical path of the node.
    pub fn path(&self) -> &Path {
        self.identity.path()
    }

    /// Resolved path; equal to [`DirectoryNode::path`] unless a link was
    /// resolved to somewhere else.
    pub fn real_path(&self) -> &Path {
        self.identity.real_path()
    }

    /// Whether the node was reached through a symlink.
    pub fn is_symlink(&self) -> bool {
        self.symlink
    }

    /// Whether this node is the root of its tree.
    pub fn is_root(&self) -> bool {
        self.is_root
    }

    /// Whether the repository reports this directory as a submodule.
    pub fn is_submodule(&self) -> bool {
        self.submodule
    }

    /// Stats from the last listing of the parent, if any.
    pub fn stats(&self) -> Option<&FileStats> {
        self.stats.as_ref()
    }

    /// Current status overlay.
    pub fn status(&self) -> Status {
        self.status
    }

    /// Whether [`DirectoryNode::destroy`] has run.
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Whether the node is expanded.
    pub fn is_expanded(&self) -> bool {
        self.expansion.is_expanded
    }

    /// Whether a watch subscription is open.
    pub fn is_watching(&self) -> bool {
        self.watch.is_some()
    }

    /// Position in the parent's sorted listing.
    pub fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn set_index(&mut self, index: usize) {
        self.index = index;
    }

    pub(crate) fn set_stats(&mut self, stats: FileStats) {
        self.stats = Some(stats);
    }

    /// Record whether the entry is now reached through a link; a change
    /// means the real path has to be resolved again.
    pub(crate) fn set_symlink(&mut self, symlink: bool) {
        if self.symlink != symlink {
            self.symlink = symlink;
            self.load_real_path();
        }
    }

    /// Live children in display order.
    pub fn children(&self) -> impl Iterator<Item = &Entry> {
        self.children.values().filter(|entry| !entry.is_destroyed())
    }

    /// Names of the live children in display order.
    pub fn child_names(&self) -> Vec<String> {
        self.children().map(|entry| entry.name().to_string()).collect()
    }

    /// Live child called `name`.
    pub fn child(&self, name: &str) -> Option<&Entry> {
        self.children.get(name).filter(|entry| !entry.is_destroyed())
    }

    /// Live directory child called `name`.
    pub fn directory(&self, name: &str) -> Option<&DirectoryNode> {
        self.child(name).and_then(Entry::as_directory)
    }

    /// Mutable live directory child called `name`.
    pub fn directory_mut(&mut self, name: &str) -> Option<&mut DirectoryNode> {
        self.children
            .get_mut(name)
            .filter(|entry| !entry.is_destroyed())
            .and_then(Entry::as_directory_mut)
    }

    /// Expansion state as last stored, without walking live children.
    pub fn expansion_state(&self) -> &ExpansionState {
        &self.expansion
    }

    /// Subscribe to every event of this node.
    pub fn subscribe(&self) -> Subscription {
        self.emitter.subscribe(None)
    }

    /// Subscribe to [`NodeEvent::Destroyed`].
    pub fn on_did_destroy(&self) -> Subscription {
        self.emitter.subscribe(Some(NodeEventKind::Destroyed))
    }

    /// Subscribe to [`NodeEvent::StatusChanged`].
    pub fn on_did_status_change(&self) -> Subscription {
        self.emitter.subscribe(Some(NodeEventKind::StatusChanged))
    }

    /// Subscribe to [`NodeEvent::EntriesAdded`].
    pub fn on_did_add_entries(&self) -> Subscription {
        self.emitter.subscribe(Some(NodeEventKind::EntriesAdded))
    }

    /// Subscribe to [`NodeEvent::EntriesRemoved`].
    pub fn on_did_remove_entries(&self) -> Subscription {
        self.emitter.subscribe(Some(NodeEventKind::EntriesRemoved))
    }

    /// Subscribe to [`NodeEvent::Collapsed`].
    pub fn on_did_collapse(&self) -> Subscription {
        self.emitter.subscribe(Some(NodeEventKind::Collapsed))
    }

    /// Subscribe to [`NodeEvent::Expanded`].
    pub fn on_did_expand(&self) -> Subscription {
        self.emitter.subscribe(Some(NodeEventKind::Expanded))
    }

    /// Whether `path` lies strictly below this node, by logical or real path.
    pub fn contains(&self, path: &Path) -> bool {
        self.identity.contains(path)
    }

    /// Whether `path` names this node, by logical or real path.
    pub fn is_path_equal(&self, path: &Path) -> bool {
        self.identity.is_path_equal(path)
    }

    /// Mark expanded, reconcile the children, start watching.
    pub fn expand(&mut self) {
        if self.destroyed {
            return;
        }
        self.expansion.is_expanded = true;
        self.reload();
        self.watch();
        self.emitter.emit(NodeEvent::Expanded);
    }

    /// Snapshot the live subtree into the expansion state, then drop it.
    pub fn collapse(&mut self) {
        if self.destroyed {
            return;
        }
        self.expansion.is_expanded = false;
        self.expansion = self.serialize_expansion_state();
        self.unwatch();
        self.emitter.emit(NodeEvent::Collapsed);
    }

    /// Current expansion state including live descendants.
    ///
    /// Saved entries for names that are not live (never listed, or ignored)
    /// are carried over unchanged.
    pub fn serialize_expansion_state(&self) -> ExpansionState {
        let mut entries = self.expansion.entries.clone();
        for dir in self.children().filter_map(Entry::as_directory) {
            entries.insert(dir.name.clone(), dir.serialize_expansion_state());
        }
        ExpansionState {
            is_expanded: self.expansion.is_expanded,
            entries,
        }
    }

    /// Start watching. A no-op when already watching; failures leave the
    /// node unwatched.
    pub fn watch(&mut self) {
        if self.watch.is_some() || self.destroyed {
            return;
        }

        let mailbox = self.ctx.mailbox.clone();
        let target = self.address();
        let callback: WatchCallback = Box::new(move |kind| {
            let _ = mailbox.send(TreeMessage::Watch {
                target: target.clone(),
                kind,
            });
        });

        let registration = self.ctx.watcher.watch(self.path(), callback);
        match registration {
            Ok(handle) => self.watch = Some(handle),
            Err(e) => tracing::debug!("Not watching {}: {}", self.path().display(), e),
        }
    }

    /// Close the subscription and destroy every child. The node itself
    /// survives and can be expanded again.
    pub fn unwatch(&mut self) {
        if let Some(mut handle) = self.watch.take() {
            handle.close();
        }
        for (_, mut child) in std::mem::take(&mut self.children) {
            child.destroy();
        }
    }

    /// Destroy the subtree rooted here. Idempotent.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        self.unwatch();
        self.repo_subscribed = false;
        tracing::trace!("Destroyed {}", self.path().display());
        self.emitter.emit(NodeEvent::Destroyed {
            path: self.path().to_path_buf(),
        });
    }

    pub(crate) fn handle_watch_event(&mut self, kind: WatchEventKind) {
        if self.destroyed || self.watch.is_none() {
            tracing::trace!("Ignoring {:?} for unwatched {}", kind, self.path().display());
            return;
        }
        match kind {
            WatchEventKind::Changed => self.reload(),
            WatchEventKind::Deleted => self.destroy(),
        }
    }

    /// Recompute the status overlay, emitting only on a transition.
    pub fn update_status(&mut self) {
        if self.destroyed {
            return;
        }
        let Some(repo) = self.ctx.repository.clone() else {
            return;
        };

        let path = self.identity.path();
        let bits = if self.is_root && repo.is_project_at_root() {
            aggregate_statuses(repo.as_ref())
        } else {
            repo.directory_status(path)
        };
        let status = resolve_status(StatusFacts {
            vcs_ignored: repo.is_path_ignored(path),
            name_ignored: self.ctx.ignored_names.matches(path),
            modified: repo.is_status_modified(bits),
            added: repo.is_status_new(bits),
        });

        if status != self.status {
            self.status = status;
            self.emitter.emit(NodeEvent::StatusChanged { status });
        }
    }

    /// Route a repository notification to this node and its descendants.
    pub fn handle_repository_event(&mut self, event: &RepositoryEvent) {
        if self.destroyed || !self.repo_subscribed {
            return;
        }

        let relevant = match event {
            RepositoryEvent::StatusChanged { path } => {
                self.contains(path) || self.is_path_equal(path)
            }
            RepositoryEvent::StatusesChanged => true,
        };
        if relevant {
            self.update_status();
        }

        for dir in self.children.values_mut().filter_map(Entry::as_directory_mut) {
            dir.handle_repository_event(event);
        }
    }

    fn load_real_path(&mut self) {
        let path = self.path().to_path_buf();
        let target = self.address();
        let completion = self.ctx.run_fs(
            move |fs| fs.realpath(&path),
            move |result| TreeMessage::RealPath { target, result },
        );
        if let Completion::Ready(result) = completion {
            self.apply_real_path(result);
        }
    }

    pub(crate) fn apply_real_path(&mut self, result: io::Result<PathBuf>) {
        if self.destroyed {
            tracing::debug!("Discarding real path for destroyed {}", self.path().display());
            return;
        }
        match result {
            Ok(real) if real != self.real_path() => {
                self.identity.set_real_path(real);
                self.update_status();
            }
            Ok(_) => {}
            Err(e) => tracing::debug!("Keeping logical path {}: {}", self.path().display(), e),
        }
    }

    /// Find the node a message is addressed to.
    pub(crate) fn find_mut(&mut self, target: &NodeAddress) -> Option<&mut DirectoryNode> {
        if self.id == target.id {
            return Some(self);
        }
        self.children
            .values_mut()
            .filter_map(Entry::as_directory_mut)
            .filter(|dir| target.path.starts_with(dir.path()))
            .find_map(|dir| dir.find_mut(target))
    }

    /// Live directory node at `path` in this subtree.
    pub fn find(&self, path: &Path) -> Option<&DirectoryNode> {
        if self.path() == path {
            return Some(self);
        }
        self.children()
            .filter_map(Entry::as_directory)
            .filter(|dir| path.starts_with(dir.path()))
            .find_map(|dir| dir.find(path))
    }

    /// Mutable live directory node at `path` in this subtree.
    pub fn find_path_mut(&mut self, path: &Path) -> Option<&mut DirectoryNode> {
        if self.path() == path {
            return Some(self);
        }
        self.children
            .values_mut()
            .filter(|entry| !entry.is_destroyed())
            .filter_map(Entry::as_directory_mut)
            .filter(|dir| path.starts_with(dir.path()))
            .find_map(|dir| dir.find_path_mut(path))
    }
}

impl fmt::Debug for DirectoryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryNode")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("path", &self.identity.path())
            .field("real_path", &self.identity.real_path())
            .field("status", &self.status)
            .field("destroyed", &self.destroyed)
            .field("expanded", &self.expansion.is_expanded)
            .field("watching", &self.watch.is_some())
            .field("children", &self.children.len())
            .finish()
    }
}

impl Drop for DirectoryNode {
    fn drop(&mut self) {
        if let Some(mut handle) = self.watch.take() {
            handle.close();
        }
    }
}
