//! Archive path normalization and hashing

use std::path::{Component, Path, PathBuf};

use cake_crypto::fnv1a64_path;

use crate::error::{CakeError, CakeResult};

/// Forward slashes, no leading or trailing separator
pub fn normalize(path: &str) -> String {
    path.replace('\\', "/").trim_matches('/').to_string()
}

/// Normalize a builder input path, rejecting empty, `.` and `..` components
pub fn validate(path: &str) -> CakeResult<String> {
    let normalized = normalize(path);
    let bad = normalized.is_empty()
        || normalized
            .split('/')
            .any(|part| part.is_empty() || part == "." || part == "..");
    if bad {
        return Err(CakeError::InvalidPath(path.to_string()));
    }
    Ok(normalized)
}

/// Lookup hash of an archive path; the root directory hashes to 0
pub fn hash(path: &str) -> u64 {
    let normalized = normalize(path);
    if normalized.is_empty() {
        0
    } else {
        fnv1a64_path(&normalized)
    }
}

/// Split `a/b/c.txt` into (`a/b`, `c.txt`)
pub fn split_parent(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(pos) => (&path[..pos], &path[pos + 1..]),
        None => ("", path),
    }
}

/// Join an archive path under `root`, refusing anything that escapes it
pub fn safe_join(root: &Path, archive_path: &str) -> Option<PathBuf> {
    let relative = Path::new(archive_path);
    if relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
    {
        Some(root.join(relative))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("\\data\\a.txt"), "data/a.txt");
        assert_eq!(normalize("dir/"), "dir");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_validate() {
        assert_eq!(validate("a\\b.txt").ok().as_deref(), Some("a/b.txt"));
        assert!(validate("").is_err());
        assert!(validate("a//b").is_err());
        assert!(validate("a/../b").is_err());
        assert!(validate("./b").is_err());
    }

    #[test]
    fn test_hash() {
        assert_eq!(hash(""), 0);
        assert_eq!(hash("/"), 0);
        assert_eq!(hash("Data\\File.txt"), fnv1a64_path("data/file.txt"));
    }

    #[test]
    fn test_split_parent() {
        assert_eq!(split_parent("a/b/c.txt"), ("a/b", "c.txt"));
        assert_eq!(split_parent("c.txt"), ("", "c.txt"));
    }

    #[test]
    fn test_safe_join() {
        let root = Path::new("out");
        assert_eq!(safe_join(root, "a/b.txt"), Some(root.join("a/b.txt")));
        assert_eq!(safe_join(root, "../evil"), None);
        assert_eq!(safe_join(root, "/etc/passwd"), None);
    }
}
