use tracing::debug;

use crate::graph::node::{NodeAttrs, NodeId, NodeKind};
use crate::walker::{WalkItem, Walker};

use super::ScanSession;

/// Emit one node per walked entry and a `contains` edge from its directory.
///
/// Parents are tracked on a stack indexed by depth: entries arrive in pre-order, so the
/// parent of an entry at depth `d` is always `stack[d - 1]`.
pub fn build(session: &mut ScanSession, walker: &Walker) {
    let mut stack: Vec<NodeId> = Vec::new();

    for item in walker.walk() {
        let entry = match item {
            WalkItem::Entry(entry) => entry,
            WalkItem::Skipped(diagnostic) => {
                session.record(diagnostic);
                continue;
            }
        };

        if entry.depth > stack.len() {
            debug!(path = %entry.path.display(), "parent directory was not emitted");
            continue;
        }
        stack.truncate(entry.depth);

        let name = if entry.depth == 0 {
            root_name(session)
        } else {
            entry
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        };
        let kind = if entry.is_dir {
            NodeKind::Directory
        } else {
            NodeKind::File
        };

        let id = session.emit_node(
            stack.last().copied(),
            kind,
            name,
            NodeAttrs::Entry { size: entry.size },
        );
        if entry.is_dir {
            stack.push(id);
        }
    }
}

fn root_name(session: &ScanSession) -> String {
    let root = session.root();
    root.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| root.display().to_string())
}

#[cfg(test)]
mod tests {
    use crate::error::DiagnosticKind;
    use crate::graph::edge::Relation;
    use crate::graph::schema::ScanMode;
    use crate::scan::{ScanOptions, scan};
    use std::fs;

    #[test]
    fn test_single_file_scenario() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().join("data");
        fs::create_dir(&root).unwrap();
        fs::write(root.join("example.txt"), vec![b'x'; 128]).unwrap();

        let scan = scan(&root, &ScanOptions::new(ScanMode::Filesystem)).unwrap();
        let nodes: Vec<_> = scan
            .nodes()
            .iter()
            .map(|n| (n.id, n.parent_id, n.kind.as_str(), n.name.as_str(), n.size()))
            .collect();
        assert_eq!(
            nodes,
            vec![
                (0, None, "directory", "data", None),
                (1, Some(0), "file", "example.txt", Some(128)),
            ]
        );
        let edges: Vec<_> = scan
            .edges()
            .iter()
            .map(|e| (e.id, e.source, e.target, e.relation))
            .collect();
        assert_eq!(edges, vec![(0, 0, 1, Relation::Contains)]);
        assert!(scan.diagnostics().is_empty());
    }

    #[test]
    fn test_nested_tree_parents() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("a/b")).unwrap();
        fs::write(dir.path().join("a/b/deep.txt"), "d").unwrap();
        fs::write(dir.path().join("a/top.txt"), "t").unwrap();
        fs::write(dir.path().join("z.txt"), "z").unwrap();

        let scan = scan(dir.path(), &ScanOptions::new(ScanMode::Filesystem)).unwrap();
        let got: Vec<_> = scan
            .nodes()
            .iter()
            .skip(1)
            .map(|n| (n.name.as_str(), n.parent_id))
            .collect();
        assert_eq!(
            got,
            vec![
                ("a", Some(0)),
                ("b", Some(1)),
                ("deep.txt", Some(2)),
                ("top.txt", Some(1)),
                ("z.txt", Some(0)),
            ]
        );
        assert_eq!(scan.check_invariants(), Ok(()));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_loop_becomes_diagnostic() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir(dir.path().join("loop")).unwrap();
        std::os::unix::fs::symlink(dir.path(), dir.path().join("loop/up")).unwrap();

        let scan = scan(dir.path(), &ScanOptions::new(ScanMode::Filesystem)).unwrap();
        assert_eq!(scan.nodes().len(), 2, "root and loop/ only");
        assert_eq!(scan.diagnostics().len(), 1);
        assert_eq!(scan.diagnostics()[0].kind, DiagnosticKind::SymlinkLoop);
        assert_eq!(scan.check_invariants(), Ok(()));
    }
}
