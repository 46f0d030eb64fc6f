//! Containment and equality tests over node paths.

use std::borrow::Cow;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};

/// True iff `candidate` lies strictly below `prefix`.
///
/// The character after the prefix must be a separator, so `/foo` is not a
/// prefix of `/foobar`. A prefix that already ends in a separator (the
/// filesystem root) only needs to be followed by something.
pub fn is_path_prefix_of(prefix: &str, candidate: &str) -> bool {
    if !candidate.starts_with(prefix) || candidate.len() <= prefix.len() {
        return false;
    }
    if prefix.ends_with(MAIN_SEPARATOR) {
        return true;
    }
    candidate[prefix.len()..].starts_with(MAIN_SEPARATOR)
}

/// Rewrite foreign separators to the host separator.
pub fn normalize_separators(path: &str) -> Cow<'_, str> {
    if MAIN_SEPARATOR != '/' && path.contains('/') {
        Cow::Owned(path.replace('/', &MAIN_SEPARATOR.to_string()))
    } else {
        Cow::Borrowed(path)
    }
}

/// Logical and resolved location of a node, plus case-folded variants.
///
/// The folded strings exist only on case-insensitive filesystems and are
/// rebuilt whenever their source changes.
#[derive(Debug, Clone)]
pub struct PathIdentity {
    path: PathBuf,
    real_path: PathBuf,
    case_insensitive: bool,
    folded_path: Option<String>,
    folded_real_path: Option<String>,
}

impl PathIdentity {
    /// Identity whose real path equals the logical path.
    pub fn new(path: PathBuf, case_insensitive: bool) -> Self {
        let folded_path = case_insensitive.then(|| fold(&path));
        Self {
            real_path: path.clone(),
            folded_real_path: folded_path.clone(),
            path,
            case_insensitive,
            folded_path,
        }
    }

    /// Logical path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolved path; the logical path until a different one is set.
    pub fn real_path(&self) -> &Path {
        &self.real_path
    }

    /// Record a resolved target, keeping the folded copy in sync.
    pub fn set_real_path(&mut self, real_path: PathBuf) {
        if self.case_insensitive {
            self.folded_real_path = Some(fold(&real_path));
        }
        self.real_path = real_path;
    }

    /// Whether `candidate` lies below the logical or the real path.
    pub fn contains(&self, candidate: &Path) -> bool {
        let candidate = candidate.to_string_lossy();
        let candidate = normalize_separators(&candidate);
        let candidate = if self.case_insensitive {
            Cow::Owned(candidate.to_lowercase())
        } else {
            candidate
        };

        let (own, real) = self.comparable();
        if is_path_prefix_of(&own, &candidate) {
            return true;
        }
        self.real_path != self.path && is_path_prefix_of(&real, &candidate)
    }

    /// Whether `candidate` names this node by either path.
    pub fn is_path_equal(&self, candidate: &Path) -> bool {
        self.path == candidate || self.real_path == candidate
    }

    fn comparable(&self) -> (Cow<'_, str>, Cow<'_, str>) {
        match (&self.folded_path, &self.folded_real_path) {
            (Some(path), Some(real)) => (Cow::Borrowed(path.as_str()), Cow::Borrowed(real.as_str())),
            _ => (self.path.to_string_lossy(), self.real_path.to_string_lossy()),
        }
    }
}

fn fold(path: &Path) -> String {
    normalize_separators(&path.to_string_lossy()).to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_requires_separator() {
        assert!(is_path_prefix_of("/proj/foo", "/proj/foo/x"));
        assert!(!is_path_prefix_of("/proj/foo", "/proj/foobar"));
        assert!(!is_path_prefix_of("/proj/foo", "/proj/foo"));
        assert!(!is_path_prefix_of("/proj/foobar", "/proj/foo/x"));
    }

    #[cfg(unix)]
    #[test]
    fn test_prefix_of_filesystem_root() {
        assert!(is_path_prefix_of("/", "/etc"));
        assert!(!is_path_prefix_of("/", "/"));
    }

    #[test]
    fn test_contains_boundary() {
        let foo = PathIdentity::new(PathBuf::from("/proj/foo"), false);
        let foobar = PathIdentity::new(PathBuf::from("/proj/foobar"), false);

        assert!(foo.contains(Path::new("/proj/foo/x")));
        assert!(!foobar.contains(Path::new("/proj/foo/x")));
    }

    #[test]
    fn test_contains_through_real_path() {
        let mut identity = PathIdentity::new(PathBuf::from("/proj/link"), false);
        assert!(!identity.contains(Path::new("/data/target/file")));

        identity.set_real_path(PathBuf::from("/data/target"));

        assert!(identity.contains(Path::new("/data/target/file")));
        assert!(identity.contains(Path::new("/proj/link/file")));
        assert!(identity.is_path_equal(Path::new("/data/target")));
    }

    #[test]
    fn test_case_insensitive_contains() {
        let mut identity = PathIdentity::new(PathBuf::from("/Proj/Foo"), true);
        assert!(identity.contains(Path::new("/proj/foo/X.txt")));

        identity.set_real_path(PathBuf::from("/Data/Real"));
        assert!(identity.contains(Path::new("/DATA/real/y")));

        let sensitive = PathIdentity::new(PathBuf::from("/Proj/Foo"), false);
        assert!(!sensitive.contains(Path::new("/proj/foo/X.txt")));
    }
}
