//! In-memory collaborators for unit tests.

use crate::tree::fs::{FileStats, FileSystem, LocalFileSystem};
use crate::tree::status::{Repository, StatusBits};
use crate::tree::watcher::{WatchCallback, WatchEventKind, WatchHandle, WatchService, WatcherError};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

pub const MODIFIED: StatusBits = StatusBits(1 << 1);
pub const NEW: StatusBits = StatusBits(1 << 7);

struct Registration {
    path: PathBuf,
    callback: Rc<WatchCallback>,
    live: bool,
}

/// Watch service that records registrations and lets tests fire events.
#[derive(Default)]
pub struct RecordingWatchService {
    registrations: Rc<RefCell<Vec<Registration>>>,
    fail: bool,
}

impl RecordingWatchService {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// A service whose every registration fails.
    pub fn failing() -> Rc<Self> {
        Rc::new(Self {
            fail: true,
            ..Self::default()
        })
    }

    /// Deliver `kind` to every live registration on `path`.
    pub fn fire(&self, path: &Path, kind: WatchEventKind) {
        let callbacks: Vec<_> = self
            .registrations
            .borrow()
            .iter()
            .filter(|r| r.live && r.path == path)
            .map(|r| Rc::clone(&r.callback))
            .collect();
        for callback in callbacks {
            (*callback)(kind);
        }
    }

    pub fn is_watching(&self, path: &Path) -> bool {
        self.registrations
            .borrow()
            .iter()
            .any(|r| r.live && r.path == path)
    }

    pub fn opened_count(&self) -> usize {
        self.registrations.borrow().len()
    }

    pub fn live_count(&self) -> usize {
        self.registrations.borrow().iter().filter(|r| r.live).count()
    }
}

impl WatchService for RecordingWatchService {
    fn watch(
        &self,
        path: &Path,
        callback: WatchCallback,
    ) -> Result<Box<dyn WatchHandle>, WatcherError> {
        if self.fail {
            return Err(WatcherError::WatchPath {
                path: path.to_path_buf(),
                source: notify::Error::generic("watching disabled"),
            });
        }

        let mut registrations = self.registrations.borrow_mut();
        registrations.push(Registration {
            path: path.to_path_buf(),
            callback: Rc::new(callback),
            live: true,
        });
        Ok(Box::new(RecordingHandle {
            registrations: Rc::clone(&self.registrations),
            slot: registrations.len() - 1,
        }))
    }
}

struct RecordingHandle {
    registrations: Rc<RefCell<Vec<Registration>>>,
    slot: usize,
}

impl WatchHandle for RecordingHandle {
    fn close(&mut self) {
        if let Some(registration) = self.registrations.borrow_mut().get_mut(self.slot) {
            registration.live = false;
        }
    }
}

impl Drop for RecordingHandle {
    fn drop(&mut self) {
        self.close();
    }
}

/// Repository backed by plain maps.
#[derive(Default)]
pub struct MemoryRepository {
    statuses: RefCell<BTreeMap<PathBuf, StatusBits>>,
    ignored: RefCell<Vec<PathBuf>>,
    submodules: RefCell<Vec<PathBuf>>,
    project_at_root: bool,
    directory_queries: Cell<usize>,
}

impl MemoryRepository {
    /// A repository whose working directory is the project root.
    pub fn at_root() -> Self {
        Self {
            project_at_root: true,
            ..Self::default()
        }
    }

    pub fn set_status(&self, path: &Path, bits: StatusBits) {
        self.statuses.borrow_mut().insert(path.to_path_buf(), bits);
    }

    /// Ignore `path` and everything below it.
    pub fn ignore(&self, path: &Path) {
        self.ignored.borrow_mut().push(path.to_path_buf());
    }

    pub fn mark_submodule(&self, path: &Path) {
        self.submodules.borrow_mut().push(path.to_path_buf());
    }

    /// How often `directory_status` has been asked.
    pub fn directory_queries(&self) -> usize {
        self.directory_queries.get()
    }
}

impl Repository for MemoryRepository {
    fn is_submodule(&self, path: &Path) -> bool {
        self.submodules.borrow().iter().any(|p| p == path)
    }

    fn is_path_ignored(&self, path: &Path) -> bool {
        self.ignored.borrow().iter().any(|p| path.starts_with(p))
    }

    fn is_project_at_root(&self) -> bool {
        self.project_at_root
    }

    fn directory_status(&self, path: &Path) -> StatusBits {
        self.directory_queries.set(self.directory_queries.get() + 1);
        self.statuses
            .borrow()
            .iter()
            .filter(|(p, _)| p.starts_with(path))
            .fold(StatusBits::default(), |acc, (_, bits)| acc | *bits)
    }

    fn is_status_modified(&self, bits: StatusBits) -> bool {
        bits.0 & MODIFIED.0 != 0
    }

    fn is_status_new(&self, bits: StatusBits) -> bool {
        bits.0 & NEW.0 != 0
    }

    fn tracked_statuses(&self) -> Vec<StatusBits> {
        self.statuses.borrow().values().copied().collect()
    }
}

/// Local filesystem with injectable failures.
#[derive(Default)]
pub struct FlakyFileSystem {
    broken_lstat: Vec<PathBuf>,
    broken_realpath: Vec<PathBuf>,
    fail_listing: bool,
}

impl FlakyFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn break_lstat(mut self, path: &Path) -> Self {
        self.broken_lstat.push(path.to_path_buf());
        self
    }

    pub fn break_realpath(mut self, path: &Path) -> Self {
        self.broken_realpath.push(path.to_path_buf());
        self
    }

    pub fn fail_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }
}

impl FileSystem for FlakyFileSystem {
    fn read_dir(&self, path: &Path) -> io::Result<Vec<String>> {
        if self.fail_listing {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "listing refused"));
        }
        LocalFileSystem.read_dir(path)
    }

    fn lstat(&self, path: &Path) -> io::Result<FileStats> {
        if self.broken_lstat.iter().any(|p| p == path) {
            return Err(io::Error::new(io::ErrorKind::Other, "lstat refused"));
        }
        LocalFileSystem.lstat(path)
    }

    fn stat(&self, path: &Path) -> io::Result<FileStats> {
        LocalFileSystem.stat(path)
    }

    fn realpath(&self, path: &Path) -> io::Result<PathBuf> {
        if self.broken_realpath.iter().any(|p| p == path) {
            return Err(io::Error::new(io::ErrorKind::NotFound, "realpath refused"));
        }
        LocalFileSystem.realpath(path)
    }
}
