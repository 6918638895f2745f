//! Remote path helpers
//!
//! Remote paths are POSIX strings regardless of the local platform, so they
//! are handled as `&str` rather than `std::path::Path`.

use sitesync_core::{Error, Result};

/// Resolve `path` against a site's target root
///
/// Absolute paths are used as given; relative paths are joined to the root.
/// The result is normalized (`.` segments, repeated and trailing slashes
/// removed). `..` is rejected rather than resolved.
pub fn resolve(root: &str, path: &str) -> Result<String> {
    let combined = if path.starts_with('/') {
        path.to_string()
    } else if path.is_empty() || path == "." {
        root.to_string()
    } else {
        join(root, path)
    };
    normalize(&combined)
}

/// Normalize an absolute remote path
pub fn normalize(path: &str) -> Result<String> {
    let mut parts = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                return Err(Error::invalid_input(format!(
                    "Parent references are not allowed in remote paths: {path}"
                )));
            }
            other => parts.push(other),
        }
    }

    if parts.is_empty() {
        Ok("/".to_string())
    } else {
        Ok(format!("/{}", parts.join("/")))
    }
}

/// Join a child name onto a directory path
pub fn join(parent: &str, name: &str) -> String {
    let name = name.trim_start_matches('/');
    if parent.is_empty() || parent == "/" {
        format!("/{name}")
    } else {
        format!("{}/{}", parent.trim_end_matches('/'), name)
    }
}

/// Last segment of a path; `/` for the root
pub fn file_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rsplit_once('/') {
        Some((_, name)) if !name.is_empty() => name,
        _ if trimmed.is_empty() => "/",
        _ => trimmed,
    }
}

/// Parent directory of a normalized absolute path
pub fn parent(path: &str) -> Option<&str> {
    if path == "/" {
        return None;
    }
    match path.trim_end_matches('/').rsplit_once('/') {
        Some(("", _)) => Some("/"),
        Some((parent, _)) => Some(parent),
        None => None,
    }
}

/// Every prefix of a normalized absolute path, root-most first
///
/// `/a/b/c` yields `/a`, `/a/b`, `/a/b/c`.
pub fn ancestors_inclusive(path: &str) -> Vec<String> {
    let mut current = String::new();
    let mut out = Vec::new();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        current.push('/');
        current.push_str(segment);
        out.push(current.clone());
    }
    out
}
