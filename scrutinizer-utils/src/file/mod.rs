//! File system helpers used to build a project's file set.

use std::fs;
use std::path::{Component, Path, PathBuf};

/// Normalize a path lexically, resolving `.` and `..` without touching the disk
pub fn normalize_path(path: &Path) -> PathBuf {
    path_clean::clean(path)
}

/// Express `path` relative to `root` using `/` separators.
///
/// Paths outside `root` are returned normalized but otherwise unchanged.
pub fn relative_path(root: &Path, path: &Path) -> String {
    let normalized = normalize_path(path);
    let relative = normalized
        .strip_prefix(normalize_path(root))
        .unwrap_or(&normalized);

    relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Collect every regular file below `root`, skipping the default excluded directories.
///
/// The result is sorted so repeated runs over an unchanged tree see the same order.
pub fn walk_project_files(root: &Path) -> crate::Result<Vec<PathBuf>> {
    let excluded = crate::default_excluded_dirs();
    let mut files = Vec::new();

    let walker = walkdir::WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            // Never prune the root itself, even when it is named like an excluded dir
            entry.depth() == 0
                || !(entry.file_type().is_dir()
                    && excluded.contains(entry.file_name().to_str().unwrap_or("")))
        });

    for entry in walker {
        let entry = entry.map_err(|e| crate::UtilError::PathOperation(e.to_string()))?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }

    files.sort();
    Ok(files)
}

/// Read a text file, replacing invalid UTF-8 rather than failing
pub fn read_text_file(path: &Path) -> crate::Result<String> {
    let bytes = fs::read(path)?;
    match String::from_utf8(bytes) {
        Ok(content) => Ok(content),
        Err(e) => Ok(String::from_utf8_lossy(e.as_bytes()).into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::tempdir;

    #[test]
    fn test_normalize_path() {
        let path = Path::new("/a/b/../c/./d");
        let normalized = normalize_path(path);
        assert_eq!(normalized, PathBuf::from("/a/c/d"));
    }

    #[test]
    fn test_relative_path() {
        let root = Path::new("/project");
        assert_eq!(relative_path(root, Path::new("/project/src/lib.rs")), "src/lib.rs");
        assert_eq!(relative_path(root, Path::new("/project/./src/../README")), "README");
    }

    proptest! {
        #[test]
        fn prop_relative_path_joins_segments(segments in prop::collection::vec("[a-z][a-z0-9_]{0,8}", 1..6)) {
            let root = Path::new("/project");
            let path = segments.iter().fold(root.to_path_buf(), |acc, s| acc.join(s));

            prop_assert_eq!(relative_path(root, &path), segments.join("/"));
        }
    }

    #[test]
    fn test_walk_project_files_skips_excluded_dirs() -> crate::Result<()> {
        let temp_dir = tempdir()?;
        let root = temp_dir.path();

        fs::create_dir_all(root.join("src"))?;
        fs::create_dir_all(root.join(".git"))?;
        fs::create_dir_all(root.join("node_modules/pkg"))?;
        fs::write(root.join("src/main.rs"), "fn main() {}")?;
        fs::write(root.join("README.md"), "docs")?;
        fs::write(root.join(".git/HEAD"), "ref")?;
        fs::write(root.join("node_modules/pkg/index.js"), "")?;

        let files = walk_project_files(root)?;
        let relative: Vec<String> = files.iter().map(|f| relative_path(root, f)).collect();

        assert_eq!(relative, vec!["README.md", "src/main.rs"]);
        Ok(())
    }

    #[test]
    fn test_read_text_file_lossy() -> crate::Result<()> {
        let temp_dir = tempdir()?;
        let path = temp_dir.path().join("binary.txt");
        fs::write(&path, [b'o', b'k', 0xff, b'\n'])?;

        let content = read_text_file(&path)?;
        assert!(content.starts_with("ok"));
        assert!(content.ends_with('\n'));
        Ok(())
    }
}
