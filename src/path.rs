//! Path-splitting helpers shared by every [`crate::AcidFs`] operation.

/// Split a `/`-separated path into its components, dropping empty segments
/// (so `"/a//b/"`, `"a/b"`, and `"/a/b/"` all split to `["a", "b"]`).
#[must_use]
pub fn split(path: &str) -> Vec<Vec<u8>> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(|s| s.as_bytes().to_vec())
        .collect()
}

/// Whether `path` was written with a leading `/`.
#[must_use]
pub fn is_absolute(path: &str) -> bool {
    path.starts_with('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_drops_empty_segments() {
        assert_eq!(split("/a//b/"), vec![b"a".to_vec(), b"b".to_vec()]);
        assert_eq!(split("a/b"), vec![b"a".to_vec(), b"b".to_vec()]);
    }

    #[test]
    fn split_root_is_empty() {
        assert!(split("/").is_empty());
        assert!(split("").is_empty());
    }

    #[test]
    fn absolute_detection() {
        assert!(is_absolute("/a/b"));
        assert!(!is_absolute("a/b"));
    }
}
