use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::config::SymlinkPolicy;
use crate::error::{Diagnostic, DiagnosticKind};
use crate::filter::IgnorePredicate;

/// One filesystem entry that survived the ignore predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    /// Full path (the scan root joined with `relative`).
    pub path: PathBuf,
    /// Path relative to the scan root; empty for the root itself.
    pub relative: PathBuf,
    /// 0 for the root, 1 for its children, and so on.
    pub depth: usize,
    pub is_dir: bool,
    /// Byte length for files, `None` for directories.
    pub size: Option<u64>,
}

/// An item produced by [`Walker::walk`]: either an entry or a skipped subtree.
#[derive(Debug)]
pub enum WalkItem {
    Entry(WalkEntry),
    Skipped(Diagnostic),
}

/// Deterministic pre-order directory traversal.
///
/// At every level entries are sorted by file name in byte order before recursion, so the
/// sequence is independent of the order the OS lists a directory. Ignored directories are
/// pruned before they are opened.
pub struct Walker {
    root: PathBuf,
    predicate: Arc<dyn IgnorePredicate>,
    symlinks: SymlinkPolicy,
    excluded: Arc<Vec<PathBuf>>,
}

impl Walker {
    pub fn new(root: &Path, predicate: Arc<dyn IgnorePredicate>, symlinks: SymlinkPolicy) -> Self {
        Self {
            root: root.to_path_buf(),
            predicate,
            symlinks,
            excluded: Arc::new(Vec::new()),
        }
    }

    /// Never yield these exact paths (e.g. the scan's own output files).
    pub fn with_excluded_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.excluded = Arc::new(paths);
        self
    }

    /// Start a fresh traversal. Each call restarts from the root.
    pub fn walk(&self) -> WalkIter {
        let root = self.root.clone();
        let predicate = Arc::clone(&self.predicate);
        let excluded = Arc::clone(&self.excluded);
        let skip_links = self.symlinks == SymlinkPolicy::Skip;
        let links = LinkTargets::new(&self.root);

        let inner = ignore::WalkBuilder::new(&self.root)
            .standard_filters(false)
            .follow_links(!skip_links)
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(move |entry| {
                if entry.depth() == 0 {
                    return true;
                }
                if entry.path_is_symlink() && (skip_links || !links.admit(entry.path())) {
                    return false;
                }
                if excluded.iter().any(|p| p == entry.path()) {
                    return false;
                }
                let relative = entry.path().strip_prefix(&root).unwrap_or(entry.path());
                let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
                !predicate.matches(relative, is_dir)
            })
            .build();

        WalkIter {
            inner,
            root: self.root.clone(),
        }
    }
}

/// Followed link targets of one traversal.
///
/// A link whose target lies under the root is dropped: the target is walked under its own
/// path. A link to an outside target is followed the first time that target is reached.
/// A link to one of its own ancestors passes through so the walk reports the loop.
struct LinkTargets {
    root: PathBuf,
    seen: Mutex<HashSet<PathBuf>>,
}

impl LinkTargets {
    fn new(root: &Path) -> Self {
        Self {
            root: root.canonicalize().unwrap_or_else(|_| root.to_path_buf()),
            seen: Mutex::new(HashSet::new()),
        }
    }

    fn admit(&self, link: &Path) -> bool {
        // Dangling links pass through and surface as walk errors.
        let Ok(target) = link.canonicalize() else {
            return true;
        };
        let parent = link.parent().and_then(|p| p.canonicalize().ok());
        if parent.is_some_and(|p| p.starts_with(&target)) {
            return true;
        }
        if target.starts_with(&self.root) {
            debug!(link = %link.display(), "link target is walked under its own path");
            return false;
        }
        let first = self
            .seen
            .lock()
            .map(|mut seen| seen.insert(target))
            .unwrap_or(false);
        if !first {
            debug!(link = %link.display(), "link target already walked");
        }
        first
    }
}

/// Lazy iterator over one traversal.
pub struct WalkIter {
    inner: ignore::Walk,
    root: PathBuf,
}

impl Iterator for WalkIter {
    type Item = WalkItem;

    fn next(&mut self) -> Option<WalkItem> {
        loop {
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(err) => return Some(WalkItem::Skipped(diagnostic_for(&err, &self.root))),
            };

            let Some(file_type) = entry.file_type() else {
                continue;
            };
            let is_dir = file_type.is_dir();
            if !is_dir && !file_type.is_file() {
                // Sockets, fifos and unfollowed links carry no content worth a node.
                debug!(path = %entry.path().display(), "skipping non-regular entry");
                continue;
            }

            let size = if is_dir {
                None
            } else {
                match entry.metadata() {
                    Ok(meta) => Some(meta.len()),
                    Err(err) => {
                        return Some(WalkItem::Skipped(Diagnostic::new(
                            entry.path(),
                            DiagnosticKind::Metadata,
                            err.to_string(),
                        )));
                    }
                }
            };

            let relative = entry
                .path()
                .strip_prefix(&self.root)
                .map(Path::to_path_buf)
                .unwrap_or_default();

            return Some(WalkItem::Entry(WalkEntry {
                path: entry.path().to_path_buf(),
                relative,
                depth: entry.depth(),
                is_dir,
                size,
            }));
        }
    }
}

/// Translate a walk error into a diagnostic, keeping the most specific path available.
fn diagnostic_for(err: &ignore::Error, root: &Path) -> Diagnostic {
    let kind = if is_loop(err) {
        DiagnosticKind::SymlinkLoop
    } else {
        DiagnosticKind::Unreadable
    };
    let path = error_path(err).unwrap_or_else(|| root.to_path_buf());
    Diagnostic::new(path, kind, err.to_string())
}

fn is_loop(err: &ignore::Error) -> bool {
    match err {
        ignore::Error::Loop { .. } => true,
        ignore::Error::WithPath { err, .. }
        | ignore::Error::WithDepth { err, .. }
        | ignore::Error::WithLineNumber { err, .. } => is_loop(err),
        _ => false,
    }
}

fn error_path(err: &ignore::Error) -> Option<PathBuf> {
    match err {
        ignore::Error::Loop { child, .. } => Some(child.clone()),
        ignore::Error::WithPath { path, .. } => Some(path.clone()),
        ignore::Error::WithDepth { err, .. } | ignore::Error::WithLineNumber { err, .. } => {
            error_path(err)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::IgnoreFilter;
    use std::fs;
    use tempfile::TempDir;

    fn tmp() -> TempDir {
        tempfile::tempdir().expect("tempdir")
    }

    fn walker(root: &Path, patterns: &[&str], symlinks: SymlinkPolicy) -> Walker {
        let filter = IgnoreFilter::from_patterns(root, patterns.iter().copied()).unwrap();
        Walker::new(root, Arc::new(filter), symlinks)
    }

    fn relative_paths(walker: &Walker) -> Vec<String> {
        walker
            .walk()
            .filter_map(|item| match item {
                WalkItem::Entry(e) => Some(e.relative.to_string_lossy().replace('\\', "/")),
                WalkItem::Skipped(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_walk_is_sorted_preorder() {
        let dir = tmp();
        fs::create_dir_all(dir.path().join("b/inner")).unwrap();
        fs::write(dir.path().join("b/inner/z.txt"), "z").unwrap();
        fs::write(dir.path().join("b/a.txt"), "a").unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        fs::write(dir.path().join("C.txt"), "c").unwrap();

        let paths = relative_paths(&walker(dir.path(), &[], SymlinkPolicy::Follow));
        assert_eq!(
            paths,
            vec!["", "C.txt", "a.txt", "b", "b/a.txt", "b/inner", "b/inner/z.txt"],
            "byte order puts uppercase first; parents precede children"
        );
    }

    #[test]
    fn test_walk_is_restartable() {
        let dir = tmp();
        fs::write(dir.path().join("one.txt"), "1").unwrap();
        let w = walker(dir.path(), &[], SymlinkPolicy::Follow);
        assert_eq!(relative_paths(&w), relative_paths(&w));
    }

    #[test]
    fn test_ignored_directory_is_pruned() {
        let dir = tmp();
        fs::create_dir_all(dir.path().join(".git/objects")).unwrap();
        fs::write(dir.path().join(".git/objects/blob"), "x").unwrap();
        fs::write(dir.path().join("keep.txt"), "k").unwrap();

        let paths = relative_paths(&walker(dir.path(), &[".git/"], SymlinkPolicy::Follow));
        assert_eq!(paths, vec!["", "keep.txt"]);
    }

    #[test]
    fn test_sizes_and_depths() {
        let dir = tmp();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/data.bin"), vec![0u8; 128]).unwrap();

        let entries: Vec<WalkEntry> = walker(dir.path(), &[], SymlinkPolicy::Follow)
            .walk()
            .filter_map(|item| match item {
                WalkItem::Entry(e) => Some(e),
                WalkItem::Skipped(_) => None,
            })
            .collect();

        assert_eq!(entries.len(), 3);
        assert_eq!((entries[0].depth, entries[0].is_dir, entries[0].size), (0, true, None));
        assert_eq!((entries[1].depth, entries[1].is_dir, entries[1].size), (1, true, None));
        assert_eq!(
            (entries[2].depth, entries[2].is_dir, entries[2].size),
            (2, false, Some(128))
        );
    }

    #[test]
    fn test_excluded_paths_are_not_yielded() {
        let dir = tmp();
        fs::write(dir.path().join("graph.json"), "{}").unwrap();
        fs::write(dir.path().join("data.txt"), "d").unwrap();
        let w = walker(dir.path(), &[], SymlinkPolicy::Follow)
            .with_excluded_paths(vec![dir.path().join("graph.json")]);
        assert_eq!(relative_paths(&w), vec!["", "data.txt"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_cycle_terminates_with_diagnostic() {
        let dir = tmp();
        fs::create_dir(dir.path().join("a")).unwrap();
        fs::write(dir.path().join("a/file.txt"), "f").unwrap();
        std::os::unix::fs::symlink(dir.path().join("a"), dir.path().join("a/back")).unwrap();

        let items: Vec<WalkItem> = walker(dir.path(), &[], SymlinkPolicy::Follow).walk().collect();
        let loops = items
            .iter()
            .filter(|i| matches!(i, WalkItem::Skipped(d) if d.kind == DiagnosticKind::SymlinkLoop))
            .count();
        assert_eq!(loops, 1, "the cycle is reported exactly once");

        let entries = items.iter().filter(|i| matches!(i, WalkItem::Entry(_))).count();
        assert_eq!(entries, 3, "root, a, a/file.txt; the looping link is skipped");
    }

    #[cfg(unix)]
    #[test]
    fn test_skip_policy_ignores_links() {
        let dir = tmp();
        fs::write(dir.path().join("real.txt"), "r").unwrap();
        std::os::unix::fs::symlink(dir.path().join("real.txt"), dir.path().join("link.txt"))
            .unwrap();

        let paths = relative_paths(&walker(dir.path(), &[], SymlinkPolicy::Skip));
        assert_eq!(paths, vec!["", "real.txt"]);

        let followed = relative_paths(&walker(dir.path(), &[], SymlinkPolicy::Follow));
        assert_eq!(followed, vec!["", "real.txt"], "an in-root target is walked once");
    }

    #[cfg(unix)]
    #[test]
    fn test_outside_target_is_followed_once() {
        let dir = tmp();
        let outside = tmp();
        fs::create_dir(outside.path().join("shared")).unwrap();
        fs::write(outside.path().join("shared/x.txt"), "x").unwrap();
        for link in ["first", "second"] {
            std::os::unix::fs::symlink(outside.path().join("shared"), dir.path().join(link))
                .unwrap();
        }

        let w = walker(dir.path(), &[], SymlinkPolicy::Follow);
        assert_eq!(relative_paths(&w), vec!["", "first", "first/x.txt"]);
        assert_eq!(relative_paths(&w), vec!["", "first", "first/x.txt"], "each walk starts fresh");
    }
}
