//! Version-control status overlay.
//!
//! The repository backend speaks in opaque [`StatusBits`]; nodes only ever see
//! the enumerated [`Status`] produced by [`resolve_status`].

use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::path::{Path, PathBuf};

/// Display status of a directory node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Status {
    /// Nothing to report.
    #[default]
    None,
    /// Ignored by the repository.
    Ignored,
    /// Matches a local ignored-name pattern.
    IgnoredName,
    /// Contains modified paths.
    Modified,
    /// Contains new paths and nothing modified.
    Added,
}

impl Status {
    /// Class name used by renderers, `None` for an unmarked node.
    pub fn as_str(&self) -> Option<&'static str> {
        match self {
            Status::None => None,
            Status::Ignored => Some("ignored"),
            Status::IgnoredName => Some("ignored-name"),
            Status::Modified => Some("modified"),
            Status::Added => Some("added"),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str().unwrap_or("none"))
    }
}

/// Backend-defined status bitmask. Only the [`Repository`] interprets it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct StatusBits(pub u32);

impl BitOr for StatusBits {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        StatusBits(self.0 | rhs.0)
    }
}

impl BitOrAssign for StatusBits {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Version-control collaborator consulted by the status overlay and the
/// entry factory.
pub trait Repository {
    /// Whether `path` is the working directory of a submodule.
    fn is_submodule(&self, path: &Path) -> bool;
    /// Whether `path` is ignored by the repository.
    fn is_path_ignored(&self, path: &Path) -> bool;
    /// Whether the project root is the repository's working directory.
    fn is_project_at_root(&self) -> bool;
    /// Combined status of everything below `path`.
    fn directory_status(&self, path: &Path) -> StatusBits;
    /// Whether `bits` include a modification.
    fn is_status_modified(&self, bits: StatusBits) -> bool;
    /// Whether `bits` include a new path.
    fn is_status_new(&self, bits: StatusBits) -> bool;
    /// Status of every tracked path, used to aggregate the root's status.
    fn tracked_statuses(&self) -> Vec<StatusBits>;
}

/// Notifications published by the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositoryEvent {
    /// The status of one path changed.
    StatusChanged {
        /// The path whose status changed.
        path: PathBuf,
    },
    /// Statuses were refreshed in bulk.
    StatusesChanged,
}

/// Everything the precedence rule needs to know about one path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusFacts {
    /// The repository ignores the path.
    pub vcs_ignored: bool,
    /// The path matches an ignored-name pattern.
    pub name_ignored: bool,
    /// The path has modifications.
    pub modified: bool,
    /// The path is new.
    pub added: bool,
}

/// `Ignored > IgnoredName > Modified > Added > None`.
pub fn resolve_status(facts: StatusFacts) -> Status {
    if facts.vcs_ignored {
        Status::Ignored
    } else if facts.name_ignored {
        Status::IgnoredName
    } else if facts.modified {
        Status::Modified
    } else if facts.added {
        Status::Added
    } else {
        Status::None
    }
}

/// Union of every tracked path's bits.
pub fn aggregate_statuses(repo: &dyn Repository) -> StatusBits {
    repo.tracked_statuses()
        .into_iter()
        .fold(StatusBits::default(), |acc, bits| acc | bits)
}
