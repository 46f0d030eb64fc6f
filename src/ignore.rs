//! Local ignore-name matching.

use glob::{MatchOptions, Pattern};
use std::path::Path;

/// Decides whether a path is hidden by local name patterns.
pub trait IgnoreMatcher {
    /// Returns true if `path` matches any configured pattern.
    fn matches(&self, path: &Path) -> bool;
}

/// Glob-based matcher over a list of ignored names.
///
/// Patterns without a separator are tested against the final path
/// component; anything else is tested against the whole path. Leading dots
/// are matched like any other character.
#[derive(Debug, Clone, Default)]
pub struct IgnoredNames {
    patterns: Vec<Pattern>,
}

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

impl IgnoredNames {
    /// Compile `names`. Invalid patterns are logged and skipped.
    pub fn new<S: AsRef<str>>(names: &[S]) -> Self {
        let patterns = names
            .iter()
            .filter_map(|name| match Pattern::new(name.as_ref()) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    tracing::warn!("Skipping invalid ignore pattern {:?}: {}", name.as_ref(), e);
                    None
                }
            })
            .collect();

        Self { patterns }
    }

    /// Number of usable patterns.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// True when no pattern compiled.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl IgnoreMatcher for IgnoredNames {
    fn matches(&self, path: &Path) -> bool {
        let file_name = path.file_name().map(|n| n.to_string_lossy());

        self.patterns.iter().any(|pattern| {
            let has_separator = pattern.as_str().contains('/')
                || pattern.as_str().contains(std::path::MAIN_SEPARATOR);
            if has_separator {
                pattern.matches_path_with(path, MATCH_OPTIONS)
            } else {
                file_name
                    .as_deref()
                    .is_some_and(|name| pattern.matches_with(name, MATCH_OPTIONS))
            }
        })
    }
}
