//! Path string normalization.
//!
//! Canonical paths use `/` separators regardless of platform or backend;
//! each adapter maps them onto its own addressing (map key, disk path,
//! repo path, Drive ID) afterwards.

/// Collapse separators and re-dress the path.
///
/// Empty segments produced by doubled, leading or trailing slashes are
/// dropped, the remainder is rejoined with single slashes, then exactly one
/// leading and/or trailing slash is re-added per the flags. An empty input
/// stays empty no matter the flags.
///
/// # Examples
///
/// ```
/// use warren_storage::path::normalize;
///
/// assert_eq!(normalize("a//b/", true, true), "/a/b/");
/// assert_eq!(normalize("/a/b.txt", true, false), "/a/b.txt");
/// assert_eq!(normalize("", true, true), "");
/// ```
pub fn normalize(path: &str, leading: bool, trailing: bool) -> String {
    if path.is_empty() {
        return String::new();
    }
    let mut joined = path.split('/').filter(|segment| !segment.is_empty()).collect::<Vec<_>>().join("/");
    if leading {
        joined.insert(0, '/');
    }
    if trailing && !joined.ends_with('/') {
        joined.push('/');
    }
    joined
}

/// Split a path at its last separator into `(parent, leaf)`.
///
/// Without any separator the parent is empty and the leaf is the whole
/// input.
pub fn split(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(at) => (&path[..at], &path[at + 1..]),
        None => ("", path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collapses_repeated_slashes() {
        assert_eq!(normalize("a//b///c", false, false), "a/b/c");
        assert_eq!(normalize("//a/b//", false, false), "a/b");
    }

    #[test]
    fn test_normalize_redresses_per_flags() {
        assert_eq!(normalize("a/b", true, false), "/a/b");
        assert_eq!(normalize("a/b", false, true), "a/b/");
        assert_eq!(normalize("/a/b/", true, true), "/a/b/");
        assert_eq!(normalize("/a/b/", false, false), "a/b");
    }

    #[test]
    fn test_normalize_empty_input_stays_empty() {
        assert_eq!(normalize("", false, false), "");
        assert_eq!(normalize("", true, true), "");
    }

    #[test]
    fn test_normalize_root() {
        assert_eq!(normalize("/", true, true), "/");
        assert_eq!(normalize("///", true, true), "/");
        assert_eq!(normalize("/", false, false), "");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize("a//b/c/", true, true);
        assert_eq!(normalize(&once, true, true), once);
    }

    #[test]
    fn test_split_at_last_separator() {
        assert_eq!(split("/a/b/c.txt"), ("/a/b", "c.txt"));
        assert_eq!(split("/a"), ("", "a"));
        assert_eq!(split("a/b"), ("a", "b"));
    }

    #[test]
    fn test_split_without_separator() {
        assert_eq!(split("file.txt"), ("", "file.txt"));
        assert_eq!(split(""), ("", ""));
    }
}
