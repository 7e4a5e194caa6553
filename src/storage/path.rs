//! Path normalisation for storage requests.
//!
//! Incoming paths are split on `/` and rebuilt from their non-empty
//! segments. Segments that could step outside a root are refused; the disk
//! backend additionally refuses symbolic links.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("invalid path segment '{0}'")]
    Traversal(String),

    #[error("invalid character in path segment '{0}'")]
    InvalidCharacter(String),
}

pub fn normalize(path: &str) -> Result<String, PathError> {
    let mut segments = Vec::new();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        if segment == "." || segment == ".." {
            return Err(PathError::Traversal(segment.to_string()));
        }
        if segment.contains('\\') || segment.chars().any(char::is_control) {
            return Err(PathError::InvalidCharacter(segment.escape_debug().to_string()));
        }
        segments.push(segment);
    }
    Ok(segments.join("/"))
}

/// Splits a normalised path into its root prefix and the remainder.
pub fn split_root(path: &str) -> (&str, &str) {
    match path.split_once('/') {
        Some((prefix, rest)) => (prefix, rest),
        None => (path, ""),
    }
}

/// Joins a folder path and a child name.
pub fn join(folder: &str, name: &str) -> String {
    if folder.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", folder, name)
    }
}

/// Last segment of a normalised path.
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
