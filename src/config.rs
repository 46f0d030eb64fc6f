//! Immutable configuration snapshot shared by every node of a tree.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while loading a [`TreeConfig`] from disk.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Failed to read config file {path}: {source}")]
    Read {
        /// The config file.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The file is not a valid config document.
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        /// The config file.
        path: PathBuf,
        /// The underlying JSON error.
        source: serde_json::Error,
    },
}

/// Read-only flags consulted by nodes during construction and reconciliation.
///
/// A tree takes one snapshot at build time; changing configuration means
/// building a new tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TreeConfig {
    /// Fold chains of single-child directories into one display node.
    pub squash_directory_names: bool,
    /// Hide entries the repository reports as ignored.
    pub hide_vcs_ignored_files: bool,
    /// Hide entries matching `ignored_names`.
    pub hide_ignored_names: bool,
    /// Group directories before files when sorting.
    pub sort_folders_before_files: bool,
    /// Glob patterns for the local ignore-name matcher.
    pub ignored_names: Vec<String>,
    /// Run listing and real-path resolution inline instead of on a worker.
    pub use_sync_fs: bool,
    /// Force case-insensitive path comparison. `None` follows the host platform.
    pub case_insensitive: Option<bool>,
    /// Interval for the polling fallback watcher.
    pub poll_interval_ms: u64,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            squash_directory_names: false,
            hide_vcs_ignored_files: false,
            hide_ignored_names: false,
            sort_folders_before_files: true,
            ignored_names: vec![
                ".git".to_string(),
                ".hg".to_string(),
                ".svn".to_string(),
                ".DS_Store".to_string(),
                "Thumbs.db".to_string(),
            ],
            use_sync_fs: true,
            case_insensitive: None,
            poll_interval_ms: 1000,
        }
    }
}

impl TreeConfig {
    /// Load a configuration from a JSON file. Missing keys take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Enable or disable name squashing.
    pub fn squash_directory_names(mut self, enabled: bool) -> Self {
        self.squash_directory_names = enabled;
        self
    }

    /// Hide entries the repository reports as ignored.
    pub fn hide_vcs_ignored_files(mut self, enabled: bool) -> Self {
        self.hide_vcs_ignored_files = enabled;
        self
    }

    /// Hide entries matching `ignored_names`.
    pub fn hide_ignored_names(mut self, enabled: bool) -> Self {
        self.hide_ignored_names = enabled;
        self
    }

    /// Group directories before files.
    pub fn sort_folders_before_files(mut self, enabled: bool) -> Self {
        self.sort_folders_before_files = enabled;
        self
    }

    /// Replace the ignored-name glob patterns.
    pub fn ignored_names(mut self, patterns: Vec<String>) -> Self {
        self.ignored_names = patterns;
        self
    }

    /// Choose inline (`true`) or worker-thread filesystem access.
    pub fn use_sync_fs(mut self, enabled: bool) -> Self {
        self.use_sync_fs = enabled;
        self
    }

    /// Override case folding; `None` follows the host platform.
    pub fn case_insensitive(mut self, value: Option<bool>) -> Self {
        self.case_insensitive = value;
        self
    }

    /// Interval for the polling fallback watcher, in milliseconds.
    pub fn poll_interval_ms(mut self, interval: u64) -> Self {
        self.poll_interval_ms = interval;
        self
    }

    /// Whether paths should be case-folded before comparison.
    pub fn is_case_insensitive(&self) -> bool {
        self.case_insensitive
            .unwrap_or(cfg!(any(target_os = "macos", target_os = "windows")))
    }
}
