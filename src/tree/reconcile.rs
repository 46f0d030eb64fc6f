//! Reconciliation: relist a directory and diff it against the known children.
//!
//! Unchanged names keep their node instance and only get a new position.
//! Vanished names are destroyed and forgotten, including their saved
//! expansion state. Running a pass twice over an unchanged directory emits
//! nothing the second time.

use crate::tree::context::TreeMessage;
use crate::tree::directory::DirectoryNode;
use crate::tree::entry::create_entry;
use crate::tree::events::{EntryKind, NodeEvent};
use crate::tree::fs::{Completion, FileStats, FileSystem};
use hashlink::LinkedHashMap;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::iter::Peekable;
use std::path::{Path, PathBuf};
use std::str::Chars;

/// One classified row of a directory listing.
#[derive(Debug, Clone)]
pub struct ListedEntry {
    /// File name within the listed directory.
    pub name: String,
    /// Full path of the entry.
    pub path: PathBuf,
    /// Directory or file, after following links.
    pub kind: EntryKind,
    /// Whether the entry itself is a symlink.
    pub symlink: bool,
    /// Stats of the entry, through the link for symlinks.
    pub stats: FileStats,
}

/// List `dir` and classify every entry as directory or file.
///
/// A listing failure yields an empty listing. Entries whose lstat fails are
/// skipped; symlinks are stat'ed through the link and dropped if that fails.
/// Anything that is neither a directory nor a file is dropped too.
pub fn list_directory(fs: &dyn FileSystem, dir: &Path) -> Vec<ListedEntry> {
    let names = match fs.read_dir(dir) {
        Ok(names) => names,
        Err(e) => {
            tracing::debug!("Treating {} as empty: {}", dir.display(), e);
            return Vec::new();
        }
    };

    names
        .into_iter()
        .filter(|name| name != "." && name != "..")
        .filter_map(|name| {
            let path = dir.join(&name);
            let mut stats = match fs.lstat(&path) {
                Ok(stats) => stats,
                Err(e) => {
                    tracing::trace!("Skipping {}: {}", path.display(), e);
                    return None;
                }
            };

            let symlink = stats.is_symlink();
            if symlink {
                stats = match fs.stat(&path) {
                    Ok(stats) => stats,
                    Err(e) => {
                        tracing::trace!("Skipping dangling link {}: {}", path.display(), e);
                        return None;
                    }
                };
            }

            let kind = if stats.is_dir() {
                EntryKind::Directory
            } else if stats.is_file() {
                EntryKind::File
            } else {
                return None;
            };

            Some(ListedEntry {
                name,
                path,
                kind,
                symlink,
                stats,
            })
        })
        .collect()
}

/// Case-insensitive ordering that compares runs of digits by value.
///
/// `"2.txt" < "10.txt"` and `"a" == "A"` up to the final tie-break, which
/// falls back to plain string order so the result is total.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();

    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let l = take_digits(&mut left);
                let r = take_digits(&mut right);
                let ord = compare_digit_runs(&l, &r);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(x), Some(y)) => {
                let ord = x.to_lowercase().cmp(y.to_lowercase());
                if ord != Ordering::Equal {
                    return ord;
                }
                left.next();
                right.next();
            }
        }
    }
}

fn take_digits(chars: &mut Peekable<Chars<'_>>) -> String {
    let mut run = String::new();
    while let Some(c) = chars.next_if(char::is_ascii_digit) {
        run.push(c);
    }
    run
}

fn compare_digit_runs(l: &str, r: &str) -> Ordering {
    let lt = l.trim_start_matches('0');
    let rt = r.trim_start_matches('0');
    lt.len()
        .cmp(&rt.len())
        .then_with(|| lt.cmp(rt))
        .then_with(|| l.len().cmp(&r.len()))
}

/// Sort in display order, optionally grouping directories first.
pub fn sort_entries(entries: &mut [ListedEntry], folders_first: bool) {
    entries.sort_by(|a, b| {
        let group = if folders_first {
            folder_rank(a.kind).cmp(&folder_rank(b.kind))
        } else {
            Ordering::Equal
        };
        group.then_with(|| natural_cmp(&a.name, &b.name))
    });
}

fn folder_rank(kind: EntryKind) -> u8 {
    match kind {
        EntryKind::Directory => 0,
        EntryKind::File => 1,
    }
}

impl DirectoryNode {
    /// Relist this directory and reconcile the children.
    ///
    /// In async mode the listing is applied later, when the tree processes
    /// its inbox.
    pub fn reload(&mut self) {
        if self.is_destroyed() || !self.is_expanded() {
            return;
        }

        let dir = self.path().to_path_buf();
        let target = self.address();
        let completion = self.ctx.run_fs(
            move |fs| list_directory(fs, &dir),
            move |entries| TreeMessage::Listing { target, entries },
        );

        match completion {
            Completion::Ready(entries) => self.apply_listing(entries),
            Completion::Pending => {
                tracing::trace!("Listing of {} deferred", self.path().display())
            }
        }
    }

    pub(crate) fn apply_listing(&mut self, mut listed: Vec<ListedEntry>) {
        if self.is_destroyed() {
            tracing::debug!("Discarding listing for destroyed {}", self.path().display());
            return;
        }
        if !self.is_expanded() {
            tracing::debug!("Discarding listing for collapsed {}", self.path().display());
            return;
        }

        listed.retain(|entry| !self.ctx.is_path_ignored(&entry.path));
        sort_entries(&mut listed, self.ctx.config.sort_folders_before_files);

        let mut previous = std::mem::take(&mut self.children);
        let mut current = LinkedHashMap::with_capacity(listed.len());
        let mut added = Vec::new();
        let mut removed = HashMap::new();

        for (index, row) in listed.into_iter().enumerate() {
            if let Some(mut existing) = previous.remove(&row.name) {
                if !existing.is_destroyed() && existing.kind() == row.kind {
                    existing.set_index(index);
                    existing.refresh(row.stats, row.symlink);
                    current.insert(row.name, existing);
                    continue;
                }
                // Deleted in place or replaced by the other kind.
                existing.destroy();
                self.expansion.entries.remove(&row.name);
                removed.insert(row.name.clone(), existing.summary());
            }

            let entry = create_entry(&self.ctx, &mut self.expansion, row, index);
            added.push(entry.summary());
            current.insert(entry.name().to_string(), entry);
        }

        for (name, mut stale) in previous {
            stale.destroy();
            self.expansion.entries.remove(&name);
            removed.insert(name, stale.summary());
        }

        self.children = current;

        if !removed.is_empty() {
            tracing::debug!("{}: {} entries removed", self.path().display(), removed.len());
            self.emitter.emit(NodeEvent::EntriesRemoved { entries: removed });
        }
        if !added.is_empty() {
            tracing::debug!("{}: {} entries added", self.path().display(), added.len());
            self.emitter.emit(NodeEvent::EntriesAdded { entries: added });
        }
    }
}
