//! Filesystem access used by nodes: listing, stat and real-path resolution.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// What an lstat or stat call reported the path to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum StatKind {
    Directory,
    File,
    Symlink,
    /// Sockets, devices, fifos.
    Other,
}

/// Metadata cached on every entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStats {
    /// What the entry is.
    pub kind: StatKind,
    /// Size in bytes (0 for directories on most platforms).
    pub size: u64,
    /// Last modification time, when the platform reports it.
    pub modified: Option<SystemTime>,
    /// Last access time, when the platform reports it.
    pub accessed: Option<SystemTime>,
    /// Creation time, when the platform reports it.
    pub created: Option<SystemTime>,
    /// Whether the entry is read-only.
    pub readonly: bool,
}

impl FileStats {
    /// Copy the fields out of std metadata.
    pub fn from_metadata(metadata: &fs::Metadata) -> Self {
        let file_type = metadata.file_type();
        let kind = if file_type.is_symlink() {
            StatKind::Symlink
        } else if file_type.is_dir() {
            StatKind::Directory
        } else if file_type.is_file() {
            StatKind::File
        } else {
            StatKind::Other
        };

        Self {
            kind,
            size: metadata.len(),
            modified: metadata.modified().ok(),
            accessed: metadata.accessed().ok(),
            created: metadata.created().ok(),
            readonly: metadata.permissions().readonly(),
        }
    }

    /// Placeholder for entries created without a stat (roots, tests).
    pub fn empty(kind: StatKind) -> Self {
        Self {
            kind,
            size: 0,
            modified: None,
            accessed: None,
            created: None,
            readonly: false,
        }
    }

    /// Whether this describes a directory.
    pub fn is_dir(&self) -> bool {
        self.kind == StatKind::Directory
    }

    /// Whether this describes a regular file.
    pub fn is_file(&self) -> bool {
        self.kind == StatKind::File
    }

    /// Whether this describes a symlink (only from `lstat`).
    pub fn is_symlink(&self) -> bool {
        self.kind == StatKind::Symlink
    }
}

/// Listing service. Implementations must be shareable with worker threads.
pub trait FileSystem: Send + Sync {
    /// Names of the entries of `path`, in no particular order.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<String>>;
    /// Stat without following a final symlink.
    fn lstat(&self, path: &Path) -> io::Result<FileStats>;
    /// Stat following symlinks.
    fn stat(&self, path: &Path) -> io::Result<FileStats>;
    /// Canonical path with every link resolved.
    fn realpath(&self, path: &Path) -> io::Result<PathBuf>;
}

/// [`FileSystem`] backed by `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

impl FileSystem for LocalFileSystem {
    fn read_dir(&self, path: &Path) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(raw) => tracing::debug!(
                    "Skipping non UTF-8 entry {:?} in {}",
                    raw,
                    path.display()
                ),
            }
        }
        Ok(names)
    }

    fn lstat(&self, path: &Path) -> io::Result<FileStats> {
        fs::symlink_metadata(path).map(|m| FileStats::from_metadata(&m))
    }

    fn stat(&self, path: &Path) -> io::Result<FileStats> {
        fs::metadata(path).map(|m| FileStats::from_metadata(&m))
    }

    fn realpath(&self, path: &Path) -> io::Result<PathBuf> {
        fs::canonicalize(path)
    }
}

/// Result of a filesystem request that may finish later.
///
/// `Pending` means the value will arrive in the tree's inbox, addressed to
/// the node that asked for it.
#[derive(Debug)]
pub enum Completion<T> {
    /// Finished inline.
    Ready(T),
    /// Running on a worker.
    Pending,
}
