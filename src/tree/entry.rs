//! Children of a directory node and the factory that builds them.

use crate::tree::context::TreeContext;
use crate::tree::directory::{DirectoryNode, NodeOptions};
use crate::tree::events::{EntryKind, EntrySummary};
use crate::tree::expansion::ExpansionState;
use crate::tree::fs::FileStats;
use crate::tree::reconcile::ListedEntry;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Leaf file: a stat-carrying record with no children.
#[derive(Debug, Clone)]
pub struct FileEntry {
    /// Name in the parent directory.
    pub name: String,
    /// Path on disk.
    pub path: PathBuf,
    /// Whether the file is reached through a symlink.
    pub symlink: bool,
    /// Stats of the file (through the link, for symlinks).
    pub stats: FileStats,
    index: usize,
    destroyed: bool,
}

impl FileEntry {
    /// A live file entry at position 0.
    pub fn new(name: String, path: PathBuf, symlink: bool, stats: FileStats) -> Self {
        Self {
            name,
            path,
            symlink,
            stats,
            index: 0,
            destroyed: false,
        }
    }

    /// Position in the parent's sorted listing.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Whether the entry has been removed from its parent.
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Mark the entry removed. Idempotent.
    pub fn destroy(&mut self) {
        self.destroyed = true;
    }
}

/// A child of a [`DirectoryNode`].
#[derive(Debug)]
pub enum Entry {
    /// A live directory node.
    Directory(DirectoryNode),
    /// A file leaf.
    File(FileEntry),
}

impl Entry {
    /// Key of the child in its parent.
    pub fn name(&self) -> &str {
        match self {
            Entry::Directory(dir) => dir.name(),
            Entry::File(file) => &file.name,
        }
    }

    /// Path of the child.
    pub fn path(&self) -> &Path {
        match self {
            Entry::Directory(dir) => dir.path(),
            Entry::File(file) => &file.path,
        }
    }

    /// Directory or file.
    pub fn kind(&self) -> EntryKind {
        match self {
            Entry::Directory(_) => EntryKind::Directory,
            Entry::File(_) => EntryKind::File,
        }
    }

    /// Position in the parent's sorted listing.
    pub fn index(&self) -> usize {
        match self {
            Entry::Directory(dir) => dir.index(),
            Entry::File(file) => file.index,
        }
    }

    pub(crate) fn set_index(&mut self, index: usize) {
        match self {
            Entry::Directory(dir) => dir.set_index(index),
            Entry::File(file) => file.index = index,
        }
    }

    pub(crate) fn refresh(&mut self, stats: FileStats, symlink: bool) {
        match self {
            Entry::Directory(dir) => {
                dir.set_stats(stats);
                dir.set_symlink(symlink);
            }
            Entry::File(file) => {
                file.stats = stats;
                file.symlink = symlink;
            }
        }
    }

    /// Whether the child has been destroyed.
    pub fn is_destroyed(&self) -> bool {
        match self {
            Entry::Directory(dir) => dir.is_destroyed(),
            Entry::File(file) => file.destroyed,
        }
    }

    /// Destroy the child; directories cascade. Idempotent.
    pub fn destroy(&mut self) {
        match self {
            Entry::Directory(dir) => dir.destroy(),
            Entry::File(file) => file.destroy(),
        }
    }

    /// The directory node, if this is a directory.
    pub fn as_directory(&self) -> Option<&DirectoryNode> {
        match self {
            Entry::Directory(dir) => Some(dir),
            Entry::File(_) => None,
        }
    }

    /// The mutable directory node, if this is a directory.
    pub fn as_directory_mut(&mut self) -> Option<&mut DirectoryNode> {
        match self {
            Entry::Directory(dir) => Some(dir),
            Entry::File(_) => None,
        }
    }

    /// The file entry, if this is a file.
    pub fn as_file(&self) -> Option<&FileEntry> {
        match self {
            Entry::File(file) => Some(file),
            Entry::Directory(_) => None,
        }
    }

    /// Snapshot used in add/remove events.
    pub fn summary(&self) -> EntrySummary {
        EntrySummary {
            name: self.name().to_string(),
            path: self.path().to_path_buf(),
            kind: self.kind(),
            index: self.index(),
        }
    }
}

/// Build a child from one listing row.
///
/// A directory child takes its saved expansion state, if any, out of
/// `saved`; restoring an expanded state makes the child expand itself.
pub(crate) fn create_entry(
    ctx: &Rc<TreeContext>,
    saved: &mut ExpansionState,
    listed: ListedEntry,
    index: usize,
) -> Entry {
    let mut entry = match listed.kind {
        EntryKind::Directory => {
            let expansion = saved.entries.remove(&listed.name).unwrap_or_default();
            Entry::Directory(DirectoryNode::new(
                Rc::clone(ctx),
                NodeOptions {
                    name: listed.name,
                    path: listed.path,
                    symlink: listed.symlink,
                    is_root: false,
                    expansion,
                    stats: Some(listed.stats),
                },
            ))
        }
        EntryKind::File => Entry::File(FileEntry::new(
            listed.name,
            listed.path,
            listed.symlink,
            listed.stats,
        )),
    };
    entry.set_index(index);
    entry
}
