//! Path rules shared by the distribution (origin path, error page path)
//! and the upload (object key prefix).

pub fn trim_slashes(s: &str) -> &str {
    s.trim_start_matches('/')
}

/// `"//a/b"` -> `"/a/b"`, `"a/b"` -> `"/a/b"`
pub fn as_path(path: &str) -> String {
    format!("/{}", trim_slashes(path))
}

/// the content prefix is put in front of the trimmed sub path as is,
/// no separator is inserted between the two.
pub fn prefixed_path(prefix: Option<&str>, path: &str) -> String {
    let prefix = prefix.map(trim_slashes).unwrap_or_default();
    format!("/{}{}", prefix, trim_slashes(path))
}

/// cloudfront rejects origin paths that end in a slash.
/// `None` when there is no prefix at all.
pub fn origin_path(prefix: Option<&str>) -> Option<String> {
    let trimmed = trim_slashes(prefix?).trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    Some(as_path(trimmed))
}

/// key prefix for uploaded objects. `None` means the bucket root.
pub fn key_prefix(prefix: Option<&str>) -> Option<String> {
    let trimmed = trim_slashes(prefix?);
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_string())
}
