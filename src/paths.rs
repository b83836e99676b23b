//! Path handling for source files named by coverage reports.
//!
//! Reports name files either absolutely or relative to the project root. The
//! stored name is computed lexically (no filesystem access): absolute paths
//! are made relative to the base directory, relative paths are cleaned of
//! `.`/`..` segments.

use std::path::{Component, Path, PathBuf, MAIN_SEPARATOR};

/// Rewrite both `/` and `\` to the host separator.
pub fn normalize_separators(raw: &str) -> String {
    let foreign = if MAIN_SEPARATOR == '/' { '\\' } else { '/' };
    raw.replace(foreign, &MAIN_SEPARATOR.to_string())
}

/// Resolve `.` and `..` segments without touching the filesystem.
///
/// `..` at the root of an absolute path is dropped; leading `..` in a
/// relative path is kept.
pub fn clean(path: &Path) -> PathBuf {
    let mut parts: Vec<Component> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }
    if parts.is_empty() {
        return PathBuf::from(".");
    }
    parts.iter().collect()
}

/// Express `path` relative to `base`. Both are cleaned first.
///
/// Falls back to the cleaned `path` when the two share no root (e.g.
/// different drive letters).
pub fn relative_to(path: &Path, base: &Path) -> PathBuf {
    let path = clean(path);
    let base = clean(base);

    let path_parts: Vec<Component> = path.components().collect();
    let base_parts: Vec<Component> = base.components().collect();

    if path_parts.first() != base_parts.first() {
        return path;
    }

    let common = path_parts
        .iter()
        .zip(base_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut rel = PathBuf::new();
    for _ in common..base_parts.len() {
        rel.push("..");
    }
    for part in &path_parts[common..] {
        rel.push(part.as_os_str());
    }
    if rel.as_os_str().is_empty() {
        rel.push(".");
    }
    rel
}

/// Where to read a report entry from, given the base directory.
pub fn resolve(raw: &str, base: &Path) -> PathBuf {
    let path = PathBuf::from(normalize_separators(raw));
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

/// The name recorded for a report entry: absolute paths become relative to
/// `base`, relative paths are cleaned but stay relative.
pub fn stored_name(raw: &str, base: &Path) -> String {
    let path = PathBuf::from(normalize_separators(raw));
    let stored = if path.is_absolute() {
        relative_to(&path, base)
    } else {
        clean(&path)
    };
    stored.to_string_lossy().into_owned()
}
