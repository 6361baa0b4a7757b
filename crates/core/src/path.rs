//! Mounted-path decomposition.
//!
//! Paths arriving from the bridge and the CLI are rooted at the mount point
//! and use `/` separators. Names never contain separators themselves, so a
//! path decomposes into a flat component list.

/// Split an absolute mounted path into its components.
///
/// Relative inputs decompose to an empty list, which resolves to the root
/// folder downstream; empty components from doubled separators are dropped.
pub fn components(path: &str) -> Vec<String> {
    if !path.starts_with('/') {
        return Vec::new();
    }
    path.split('/')
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

/// The text after the last `/`, or the whole input when there is none.
pub fn file_name(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Split into the parent path and the leaf name.
///
/// `"/a/b/c"` becomes `("/a/b", "c")`; a top-level entry yields an empty
/// parent.
pub fn split_parent(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(idx) => (&path[..idx], &path[idx + 1..]),
        None => ("", path),
    }
}

/// Split at the first occurrence of `sep`, returning the head and the rest.
pub fn split_once_at(input: &str, sep: char) -> (&str, &str) {
    match input.split_once(sep) {
        Some((head, rest)) => (head, rest),
        None => (input, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_absolute_path() {
        assert_eq!(components("/a/b/c"), vec!["a", "b", "c"]);
        assert_eq!(components("/"), Vec::<String>::new());
        assert_eq!(components("//a//b/"), vec!["a", "b"]);
    }

    #[test]
    fn relative_path_has_no_components() {
        assert_eq!(components("a/b"), Vec::<String>::new());
    }

    #[test]
    fn file_name_is_last_component() {
        assert_eq!(file_name("/a/b/c.txt"), "c.txt");
        assert_eq!(file_name("plain"), "plain");
        assert_eq!(file_name("/trailing/"), "");
    }

    #[test]
    fn split_parent_peels_leaf() {
        assert_eq!(split_parent("/a/b/c"), ("/a/b", "c"));
        assert_eq!(split_parent("/top"), ("", "top"));
        assert_eq!(split_parent("bare"), ("", "bare"));
    }

    #[test]
    fn split_once_keeps_rest_intact() {
        assert_eq!(split_once_at("BR_RENAME /a,/b", ' '), ("BR_RENAME", "/a,/b"));
        assert_eq!(split_once_at("OP_STATS", ' '), ("OP_STATS", ""));
        assert_eq!(split_once_at("12,/a/b,c", ','), ("12", "/a/b,c"));
    }
}
