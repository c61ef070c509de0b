use std::path::{Path, PathBuf};

use crate::config::CONFIG_FILE;
use crate::filter::{DEFAULT_IGNORE_FILE, IgnorePredicate};

/// A debounced change after classification. Every variant triggers a full re-scan; the
/// distinction only shows up in logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// A path under the root was created or modified.
    Changed(PathBuf),
    /// A path under the root no longer exists.
    Removed(PathBuf),
    /// `flatscan.toml` or `.flatscanignore` changed; settings are reloaded on the re-scan.
    ConfigChanged(PathBuf),
}

impl WatchEvent {
    pub fn path(&self) -> &Path {
        match self {
            WatchEvent::Changed(p) | WatchEvent::Removed(p) | WatchEvent::ConfigChanged(p) => p,
        }
    }
}

/// Classify a raw event path, or `None` when it must not trigger a re-scan: outside the
/// root, the root itself, one of the scan's own output files, or ignored.
pub fn classify_event(
    path: &Path,
    root: &Path,
    predicate: &dyn IgnorePredicate,
    outputs: &[PathBuf],
) -> Option<WatchEvent> {
    if outputs.iter().any(|o| o == path) {
        return None;
    }
    let relative = path.strip_prefix(root).ok()?;
    if relative.as_os_str().is_empty() {
        return None;
    }

    if relative == Path::new(CONFIG_FILE) || relative == Path::new(DEFAULT_IGNORE_FILE) {
        return Some(WatchEvent::ConfigChanged(path.to_path_buf()));
    }
    if predicate.matches(relative, path.is_dir()) {
        return None;
    }

    if path.exists() {
        Some(WatchEvent::Changed(path.to_path_buf()))
    } else {
        Some(WatchEvent::Removed(path.to_path_buf()))
    }
}
