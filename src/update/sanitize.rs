//! Archive entry path validation.

use crate::error::{Error, Result};
use std::path::{Component, Path, PathBuf};

/// Resolve `entry_path` under `dest_dir`, refusing anything that escapes it.
///
/// The check runs on the lexically cleaned join, so `foo/../../etc` is
/// caught just like `../etc`. Nothing is created on disk.
///
/// # Errors
///
/// Returns [`Error::UnsafePath`] if `entry_path` is absolute or resolves
/// outside `dest_dir`, or an I/O error if `dest_dir` cannot be made absolute.
pub fn sanitize_path(dest_dir: &Path, entry_path: &str) -> Result<PathBuf> {
    let unsafe_path = || Error::UnsafePath {
        path: entry_path.to_string(),
    };

    let entry = Path::new(entry_path);
    if entry.has_root()
        || entry
            .components()
            .any(|c| matches!(c, Component::Prefix(_) | Component::RootDir))
    {
        return Err(unsafe_path());
    }

    let base = clean(&std::path::absolute(dest_dir)?);
    let target = clean(&base.join(entry));

    // Path::starts_with compares whole components, so /dest never matches
    // /destination.
    if target.starts_with(&base) {
        Ok(target)
    } else {
        Err(unsafe_path())
    }
}

/// Lexically resolve `.` and `..` without touching the filesystem.
fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                // `..` at the root stays at the root.
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}
