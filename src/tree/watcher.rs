//! Per-directory change notifications with native/polling fallback.
//!
//! Nodes hold at most one [`WatchHandle`] each. The production service opens
//! a non-recursive watcher per directory: a child directory gets its own
//! subscription when it is expanded, so recursion would only duplicate
//! events.

use notify::{Config, Event, EventKind, PollWatcher, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while registering a watch.
#[derive(Error, Debug)]
pub enum WatcherError {
    /// Neither the native nor the polling backend could be created.
    #[error("Failed to create watcher: {0}")]
    WatcherCreation(#[from] notify::Error),

    /// The backend refused the path.
    #[error("Failed to watch path {path}: {source}")]
    WatchPath {
        /// The directory that could not be watched.
        path: PathBuf,
        /// The backend error.
        source: notify::Error,
    },
}

/// Coarse notification delivered to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchEventKind {
    /// Something inside the directory changed; relist it.
    Changed,
    /// The directory itself is gone.
    Deleted,
}

/// Callback invoked from the watcher's thread.
pub type WatchCallback = Box<dyn Fn(WatchEventKind) + Send + Sync>;

/// Live registration returned by [`WatchService::watch`].
pub trait WatchHandle {
    /// Stop delivering notifications. Idempotent.
    fn close(&mut self);
}

/// Source of change notifications.
pub trait WatchService {
    /// Watch `path` non-recursively, calling `callback` for every change.
    fn watch(&self, path: &Path, callback: WatchCallback)
        -> Result<Box<dyn WatchHandle>, WatcherError>;
}

/// Map a raw notify event onto a node notification.
///
/// Access events are dropped. Removal of the watched directory itself is a
/// deletion; everything else means the listing may have changed.
pub fn classify(event: &Event, watched: &Path) -> Option<WatchEventKind> {
    match event.kind {
        EventKind::Access(_) => None,
        EventKind::Remove(_) if event.paths.iter().any(|p| p == watched) => {
            Some(WatchEventKind::Deleted)
        }
        _ => Some(WatchEventKind::Changed),
    }
}

/// [`WatchService`] backed by `notify`.
///
/// Tries the platform's native watcher first and falls back to polling for
/// paths where native watching is unavailable (NFS, WSL, network drives).
#[derive(Debug, Clone)]
pub struct NotifyWatchService {
    poll_interval: Duration,
    force_polling: bool,
}

impl NotifyWatchService {
    /// A service whose polling fallback checks every `poll_interval_ms`.
    pub fn new(poll_interval_ms: u64) -> Self {
        Self {
            poll_interval: Duration::from_millis(poll_interval_ms),
            force_polling: false,
        }
    }

    /// Skip the native watcher entirely.
    pub fn polling_only(mut self) -> Self {
        self.force_polling = true;
        self
    }

    fn watch_native(
        &self,
        path: &Path,
        handler: impl Fn(notify::Result<Event>) + Send + 'static,
    ) -> Result<NotifyHandle, WatcherError> {
        let config = Config::default().with_compare_contents(false);
        let mut watcher = RecommendedWatcher::new(handler, config)?;
        watcher
            .watch(path, RecursiveMode::NonRecursive)
            .map_err(|source| WatcherError::WatchPath {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(NotifyHandle::Native(Some(watcher)))
    }

    fn watch_polling(
        &self,
        path: &Path,
        handler: impl Fn(notify::Result<Event>) + Send + 'static,
    ) -> Result<NotifyHandle, WatcherError> {
        let config = Config::default()
            .with_poll_interval(self.poll_interval)
            .with_compare_contents(false);
        let mut watcher = PollWatcher::new(handler, config)?;
        watcher
            .watch(path, RecursiveMode::NonRecursive)
            .map_err(|source| WatcherError::WatchPath {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(NotifyHandle::Polling(Some(watcher)))
    }
}

impl Default for NotifyWatchService {
    fn default() -> Self {
        Self::new(1000)
    }
}

fn event_handler(
    watched: PathBuf,
    callback: std::sync::Arc<WatchCallback>,
) -> impl Fn(notify::Result<Event>) + Send + 'static {
    move |res: notify::Result<Event>| match res {
        Ok(event) => {
            if let Some(kind) = classify(&event, &watched) {
                (*callback)(kind);
            }
        }
        Err(e) => tracing::debug!("Watcher error for {}: {}", watched.display(), e),
    }
}

impl WatchService for NotifyWatchService {
    fn watch(
        &self,
        path: &Path,
        callback: WatchCallback,
    ) -> Result<Box<dyn WatchHandle>, WatcherError> {
        let callback = std::sync::Arc::new(callback);

        if !self.force_polling {
            match self.watch_native(path, event_handler(path.to_path_buf(), callback.clone())) {
                Ok(handle) => {
                    tracing::debug!("Using native watcher for {}", path.display());
                    return Ok(Box::new(handle));
                }
                Err(e) => {
                    tracing::warn!(
                        "Native watcher failed for {}: {}, falling back to polling",
                        path.display(),
                        e
                    );
                }
            }
        }

        tracing::debug!("Using poll watcher for {}", path.display());
        let handle = self.watch_polling(path, event_handler(path.to_path_buf(), callback))?;
        Ok(Box::new(handle))
    }
}

/// Owns the notify watcher; closing drops it, which stops delivery.
enum NotifyHandle {
    Native(Option<RecommendedWatcher>),
    Polling(Option<PollWatcher>),
}

impl WatchHandle for NotifyHandle {
    fn close(&mut self) {
        match self {
            NotifyHandle::Native(watcher) => drop(watcher.take()),
            NotifyHandle::Polling(watcher) => drop(watcher.take()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, RemoveKind};

    fn event(kind: EventKind, path: &str) -> Event {
        Event::new(kind).add_path(PathBuf::from(path))
    }

    #[test]
    fn test_classify_removal_of_watched_dir() {
        let watched = Path::new("/proj/src");
        let removed = event(EventKind::Remove(RemoveKind::Folder), "/proj/src");

        assert_eq!(classify(&removed, watched), Some(WatchEventKind::Deleted));
    }

    #[test]
    fn test_classify_child_removal_is_change() {
        let watched = Path::new("/proj/src");
        let removed = event(EventKind::Remove(RemoveKind::File), "/proj/src/a.rs");

        assert_eq!(classify(&removed, watched), Some(WatchEventKind::Changed));
    }

    #[test]
    fn test_classify_create_and_access() {
        let watched = Path::new("/proj");

        assert_eq!(
            classify(&event(EventKind::Create(CreateKind::File), "/proj/c.txt"), watched),
            Some(WatchEventKind::Changed)
        );
        assert_eq!(
            classify(&event(EventKind::Access(AccessKind::Any), "/proj/c.txt"), watched),
            None
        );
    }
}
