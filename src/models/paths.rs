//! Resource path resolution.
//!
//! The file-import step hands back pointers already prefixed with the
//! resources folder name (`resources/<uuid>.pdf`), while callers hold the
//! resources directory itself. Every join between the two goes through
//! [`resolve_resource_path`] so the folder name never appears twice.

use std::path::Path;

/// Name of the managed folder under the root directory
pub const RESOURCES_DIRNAME: &str = "resources";

fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

/// Strips leading separators, then a single leading `resources/` (or
/// `resources\`), then any separators left behind.
pub fn clean_relative_path(relative_path: &str) -> &str {
    let trimmed = relative_path.trim().trim_start_matches(is_separator);
    let stripped = trimmed
        .strip_prefix(RESOURCES_DIRNAME)
        .filter(|rest| rest.starts_with(is_separator))
        .unwrap_or(trimmed);
    stripped.trim_start_matches(is_separator)
}

/// Absolute location of a resource file.
///
/// Without a relative pointer the caller's already-absolute `fallback` is
/// returned untouched.
pub fn resolve_resource_path(
    resources_dir: &str,
    relative_path: Option<&str>,
    fallback: Option<&str>,
) -> Option<String> {
    match relative_path.filter(|p| !p.trim().is_empty()) {
        Some(relative) => {
            let dir = resources_dir.trim_end_matches(is_separator);
            Some(format!("{}/{}", dir, clean_relative_path(relative)))
        }
        None => fallback
            .filter(|p| !p.trim().is_empty())
            .map(str::to_string),
    }
}

/// Canonical stored form of a pointer: `resources/<name>` with forward slashes.
/// Pointers escaping the folder through `..` are refused.
pub fn normalize_relative_path(relative_path: &str) -> Option<String> {
    let cleaned = clean_relative_path(relative_path).replace('\\', "/");
    if cleaned.is_empty() || cleaned.split('/').any(|segment| segment == "..") {
        return None;
    }
    Some(format!("{}/{}", RESOURCES_DIRNAME, cleaned))
}

/// Managed pointer for an absolute path lying inside `resources_dir`.
/// Paths elsewhere, or equal to the directory itself, give `None`.
pub fn managed_pointer_for(resources_dir: &Path, absolute: &str) -> Option<String> {
    let dir = resources_dir.to_string_lossy().replace('\\', "/");
    let dir = dir.trim_end_matches('/');
    let path = absolute.trim().replace('\\', "/");
    let rest = path.strip_prefix(dir)?.strip_prefix('/')?.trim_start_matches('/');
    if rest.is_empty() || rest.split('/').any(|segment| segment == "..") {
        return None;
    }
    Some(format!("{}/{}", RESOURCES_DIRNAME, rest))
}

/// Unix absolute, UNC, or drive-letter path
pub fn is_absolute_path(value: &str) -> bool {
    let bytes = value.as_bytes();
    value.starts_with(is_separator)
        || (bytes.len() >= 3
            && bytes[0].is_ascii_alphabetic()
            && bytes[1] == b':'
            && is_separator(bytes[2] as char))
}
