//! Folding chains of single-child directories into one display node.

use crate::tree::fs::FileSystem;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};

/// Two-part label of a squashed node: `prefix` holds every folded segment
/// but the last, followed by a separator; `leaf` is the deepest segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SquashedName {
    /// Folded segments ending in a separator, e.g. `a/b/`.
    pub prefix: String,
    /// Deepest segment, e.g. `c`.
    pub leaf: String,
}

impl SquashedName {
    /// The full label, prefix followed by leaf.
    pub fn display(&self) -> String {
        format!("{}{}", self.prefix, self.leaf)
    }
}

/// Walk down from `path` while each directory holds exactly one entry and
/// that entry is a directory.
///
/// Returns the deepest directory reached and, if at least one level was
/// folded, the label to show for it.
pub fn squash_directory_path(
    fs: &dyn FileSystem,
    name: &str,
    path: &Path,
) -> (PathBuf, Option<SquashedName>) {
    let mut segments = vec![name.to_string()];
    let mut current = path.to_path_buf();

    loop {
        let names = match fs.read_dir(&current) {
            Ok(names) => names,
            Err(_) => break,
        };
        let [only] = names.as_slice() else {
            break;
        };
        let next = current.join(only);
        match fs.stat(&next) {
            Ok(stats) if stats.is_dir() => {}
            _ => break,
        }
        segments.push(only.clone());
        current = next;
    }

    if segments.len() < 2 {
        return (current, None);
    }

    let leaf = segments.pop().unwrap_or_default();
    let mut prefix = segments.join(&MAIN_SEPARATOR.to_string());
    prefix.push(MAIN_SEPARATOR);
    (current, Some(SquashedName { prefix, leaf }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::fs::LocalFileSystem;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_squashes_single_child_chain() {
        let temp = tempdir().unwrap();
        let a = temp.path().join("a");
        fs::create_dir_all(a.join("b").join("c")).unwrap();
        fs::write(a.join("b").join("c").join("one.txt"), "").unwrap();
        fs::write(a.join("b").join("c").join("two.txt"), "").unwrap();

        let (path, label) = squash_directory_path(&LocalFileSystem, "a", &a);

        assert_eq!(path, a.join("b").join("c"));
        let label = label.unwrap();
        assert_eq!(label.prefix, format!("a{MAIN_SEPARATOR}b{MAIN_SEPARATOR}"));
        assert_eq!(label.leaf, "c");
    }

    #[test]
    fn test_stops_at_single_file() {
        let temp = tempdir().unwrap();
        let a = temp.path().join("a");
        fs::create_dir(&a).unwrap();
        fs::write(a.join("only.txt"), "").unwrap();

        let (path, label) = squash_directory_path(&LocalFileSystem, "a", &a);

        assert_eq!(path, a);
        assert!(label.is_none());
    }

    #[test]
    fn test_stops_at_empty_or_missing() {
        let temp = tempdir().unwrap();
        let a = temp.path().join("a");
        fs::create_dir_all(a.join("empty")).unwrap();

        let (path, label) = squash_directory_path(&LocalFileSystem, "a", &a);
        assert_eq!(path, a.join("empty"));
        assert_eq!(label.unwrap().display(), format!("a{MAIN_SEPARATOR}empty"));

        let missing = temp.path().join("missing");
        let (path, label) = squash_directory_path(&LocalFileSystem, "missing", &missing);
        assert_eq!(path, missing);
        assert!(label.is_none());
    }
}
