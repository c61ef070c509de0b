//! Structural properties every scan must satisfy, checked through the library API on a
//! multi-directory fixture in both modes.
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use flatscan::export::model::ExportFormat;
use flatscan::export::write_scan;
use flatscan::graph::Scan;
use flatscan::graph::edge::Relation;
use flatscan::graph::node::NodeKind;
use flatscan::graph::schema::ScanMode;
use flatscan::scan::{ScanOptions, scan};

// ---------------------------------------------------------------------------
// Fixture
// ---------------------------------------------------------------------------

fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

fn fixture() -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path();
    write(root, "README.md", "# demo\n");
    write(root, "a.py", "def helper():\n    return 1\n");
    write(root, "b.py", "import a\n\ndef use():\n    return a.helper()\n");
    write(
        root,
        "mod.py",
        "class A:\n    def m(self):\n        return undefined_name()\n",
    );
    write(
        root,
        "pkg/__init__.py",
        "from .util import tool\n",
    );
    write(
        root,
        "pkg/util.py",
        "import os\n\ndef tool(path):\n    return os.path.join(path, 'x')\n",
    );
    write(root, "pkg/data/blob.bin", "\x00\x01");
    write(root, "build/out.txt", "artifact");
    write(root, "__pycache__/a.cpython-312.pyc", "junk");
    dir
}

fn both_modes(root: &Path) -> Vec<Scan> {
    [ScanMode::Filesystem, ScanMode::Ast]
        .into_iter()
        .map(|mode| scan(root, &ScanOptions::new(mode)).unwrap())
        .collect()
}

fn by_qualified_name(scan: &Scan, qualified: &str) -> u32 {
    scan.nodes()
        .iter()
        .find(|n| n.qualified_name() == Some(qualified))
        .map(|n| n.id)
        .unwrap_or_else(|| panic!("no node {qualified}"))
}

fn semantic(scan: &Scan, relation: Relation) -> Vec<(u32, u32)> {
    scan.edges()
        .iter()
        .filter(|e| e.relation == relation)
        .map(|e| (e.source, e.target))
        .collect()
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

#[test]
fn test_node_ids_are_dense() {
    let dir = fixture();
    for scan in both_modes(dir.path()) {
        let ids: Vec<u32> = scan.nodes().iter().map(|n| n.id).collect();
        let expected: Vec<u32> = (0..scan.nodes().len() as u32).collect();
        assert_eq!(ids, expected, "{} scan", scan.mode());
    }
}

#[test]
fn test_edges_reference_existing_nodes() {
    let dir = fixture();
    for scan in both_modes(dir.path()) {
        let n = scan.nodes().len() as u32;
        for edge in scan.edges() {
            assert!(edge.source < n && edge.target < n, "{edge:?} in {} scan", scan.mode());
        }
    }
}

#[test]
fn test_every_non_root_has_one_parent() {
    let dir = fixture();
    for scan in both_modes(dir.path()) {
        let mut incoming = vec![0usize; scan.nodes().len()];
        for edge in scan.edges().iter().filter(|e| e.relation == Relation::Contains) {
            incoming[edge.target as usize] += 1;
        }
        for node in scan.nodes() {
            let is_root = match scan.mode() {
                ScanMode::Filesystem => node.id == 0,
                ScanMode::Ast => node.kind == NodeKind::Module,
            };
            let expected = usize::from(!is_root);
            assert_eq!(incoming[node.id as usize], expected, "node {node:?}");
        }
        assert_eq!(scan.check_invariants(), Ok(()));
    }
}

#[test]
fn test_scans_are_byte_identical() {
    let dir = fixture();
    for mode in [ScanMode::Filesystem, ScanMode::Ast] {
        for format in [ExportFormat::Csv, ExportFormat::Json] {
            let mut first = Vec::new();
            let mut second = Vec::new();
            let a = scan(dir.path(), &ScanOptions::new(mode)).unwrap();
            let b = scan(dir.path(), &ScanOptions::new(mode)).unwrap();
            write_scan(&a, format, &mut first).unwrap();
            write_scan(&b, format, &mut second).unwrap();
            assert_eq!(first, second, "{mode} {format:?}");
        }
    }
}

#[test]
fn test_ignored_paths_leave_no_trace() {
    let dir = fixture();
    fs::write(dir.path().join(".flatscanignore"), "build/\npkg/data/\n").unwrap();
    let scan = scan(dir.path(), &ScanOptions::new(ScanMode::Filesystem)).unwrap();

    let names: HashSet<&str> = scan.nodes().iter().map(|n| n.name.as_str()).collect();
    for ignored in ["build", "out.txt", "data", "blob.bin"] {
        assert!(!names.contains(ignored), "{ignored} should be ignored: {names:?}");
    }
    // An explicit root ignore file replaces the built-in set.
    assert!(names.contains("__pycache__"));
    assert!(names.contains("util.py"));
    assert_eq!(scan.check_invariants(), Ok(()));
}

#[test]
fn test_builtin_patterns_apply_without_ignore_file() {
    let dir = fixture();
    let scan = scan(dir.path(), &ScanOptions::new(ScanMode::Filesystem)).unwrap();
    let names: HashSet<&str> = scan.nodes().iter().map(|n| n.name.as_str()).collect();
    assert!(!names.contains("__pycache__"));
    assert!(names.contains("build"), "build/ is not a built-in pattern");
}

#[cfg(unix)]
#[test]
fn test_symlink_cycle_terminates() {
    let dir = fixture();
    std::os::unix::fs::symlink(dir.path().join("pkg"), dir.path().join("pkg/self")).unwrap();
    let scan = scan(dir.path(), &ScanOptions::new(ScanMode::Filesystem)).unwrap();
    assert!(
        scan.diagnostics()
            .iter()
            .any(|d| d.kind == flatscan::error::DiagnosticKind::SymlinkLoop),
        "{:?}",
        scan.diagnostics()
    );
    assert_eq!(scan.check_invariants(), Ok(()));
}

#[test]
fn test_import_edge_between_modules() {
    let dir = fixture();
    let scan = scan(dir.path(), &ScanOptions::new(ScanMode::Ast)).unwrap();
    let a = by_qualified_name(&scan, "a");
    let b = by_qualified_name(&scan, "b");
    assert!(semantic(&scan, Relation::Imports).contains(&(b, a)));

    let use_fn = by_qualified_name(&scan, "b.use");
    let helper = by_qualified_name(&scan, "a.helper");
    assert!(semantic(&scan, Relation::Calls).contains(&(use_fn, helper)));
}

#[test]
fn test_undefined_call_has_no_edge() {
    let dir = fixture();
    let scan = scan(dir.path(), &ScanOptions::new(ScanMode::Ast)).unwrap();
    let m = by_qualified_name(&scan, "mod.A.m");
    assert!(
        semantic(&scan, Relation::Calls).iter().all(|&(source, _)| source != m),
        "undefined_name() must not produce an edge"
    );
    assert!(scan.diagnostics().is_empty(), "{:?}", scan.diagnostics());
}

#[test]
fn test_method_qualified_name_and_containment() {
    let dir = fixture();
    let scan = scan(dir.path(), &ScanOptions::new(ScanMode::Ast)).unwrap();
    let module = by_qualified_name(&scan, "mod");
    let class = by_qualified_name(&scan, "mod.A");
    let method = by_qualified_name(&scan, "mod.A.m");

    assert_eq!(scan.node(method).unwrap().kind, NodeKind::Method);
    let contains = semantic(&scan, Relation::Contains);
    assert!(contains.contains(&(module, class)));
    assert!(contains.contains(&(class, method)));
}

#[test]
fn test_package_reexport_resolves() {
    let dir = fixture();
    let scan = scan(dir.path(), &ScanOptions::new(ScanMode::Ast)).unwrap();
    let pkg = by_qualified_name(&scan, "pkg");
    let tool = by_qualified_name(&scan, "pkg.util.tool");
    assert!(semantic(&scan, Relation::Imports).contains(&(pkg, tool)));
}

#[test]
fn test_deeply_nested_expression_scans() {
    let dir = tempfile::tempdir().expect("tempdir");
    let chain = vec!["1"; 5000].join(" + ");
    write(dir.path(), "deep.py", &format!("X = {chain}\n\ndef f():\n    pass\n"));

    let scan = scan(dir.path(), &ScanOptions::new(ScanMode::Ast)).unwrap();
    assert!(scan.diagnostics().is_empty(), "{:?}", scan.diagnostics());
    let f = by_qualified_name(&scan, "deep.f");
    assert_eq!(scan.node(f).unwrap().kind, NodeKind::Function);
}

#[test]
fn test_independent_scans_do_not_interfere() {
    let dir = fixture();
    let other = tempfile::tempdir().expect("tempdir");
    write(other.path(), "only.py", "x = 1\n");

    let first = scan(dir.path(), &ScanOptions::new(ScanMode::Ast)).unwrap();
    let second = scan(other.path(), &ScanOptions::new(ScanMode::Ast)).unwrap();
    assert_eq!(second.nodes().len(), 1);
    assert_eq!(second.nodes()[0].id, 0);
    assert!(first.nodes().len() > 1);
}
