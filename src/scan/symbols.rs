use std::path::PathBuf;

use rayon::prelude::*;
use tracing::debug;

use crate::config::ScanConfig;
use crate::error::{Diagnostic, DiagnosticKind};
use crate::graph::node::{NodeAttrs, NodeId, SymbolAttrs};
use crate::parser::symbols::{ModuleInfo, RawSymbol};
use crate::parser::{module_info, parse_module};
use crate::resolver::table::SymbolTable;
use crate::resolver::{ExtractedFile, resolve_relations};
use crate::walker::{WalkItem, Walker};

use super::ScanSession;

struct SourceFile {
    path: PathBuf,
    module: ModuleInfo,
}

/// AST mode: parse every source file, emit its symbols, then resolve relations.
///
/// Parsing runs in parallel; emission is sequential in walk order so ids do not depend on
/// which worker finishes first. Resolution starts only after every file is registered.
pub fn build(session: &mut ScanSession, walker: &Walker, config: &ScanConfig) {
    // ---------------------------------------------------------------------------
    // Pass 1: collect source files in walk order
    // ---------------------------------------------------------------------------
    let mut sources = Vec::new();
    for item in walker.walk() {
        match item {
            WalkItem::Entry(entry) => {
                if entry.is_dir || !config.is_source_file(&entry.relative) {
                    continue;
                }
                match module_info(&entry.relative) {
                    Some(module) => sources.push(SourceFile {
                        path: entry.path,
                        module,
                    }),
                    None => session.record(Diagnostic::new(
                        &entry.path,
                        DiagnosticKind::Decode,
                        "path is not valid UTF-8",
                    )),
                }
            }
            WalkItem::Skipped(diagnostic) => session.record(diagnostic),
        }
    }
    debug!(files = sources.len(), "source files collected");

    // ---------------------------------------------------------------------------
    // Pass 2: read and extract in parallel
    // ---------------------------------------------------------------------------
    let anonymous = config.anonymous;
    let parsed: Vec<Result<Vec<RawSymbol>, Diagnostic>> = sources
        .par_iter()
        .map(|source| {
            let bytes = std::fs::read(&source.path).map_err(|e| {
                Diagnostic::new(&source.path, DiagnosticKind::Unreadable, e.to_string())
            })?;
            parse_module(&source.path, &bytes, &source.module, anonymous)
        })
        .collect();

    // ---------------------------------------------------------------------------
    // Pass 3: emit nodes and register symbols, sequentially
    // ---------------------------------------------------------------------------
    let mut table = SymbolTable::new(config.ambiguity);
    let mut files = Vec::with_capacity(parsed.len());
    for (source, result) in sources.iter().zip(parsed) {
        let records = match result {
            Ok(records) => records,
            Err(diagnostic) => {
                session.record(diagnostic);
                continue;
            }
        };
        let ids = emit_file(session, &mut table, &source.module, &records);
        files.push(ExtractedFile { records, ids });
    }

    // ---------------------------------------------------------------------------
    // Pass 4: resolve against the complete table
    // ---------------------------------------------------------------------------
    let (edges, stats) = resolve_relations(&files, &table);
    debug!(
        symbols = table.len(),
        resolved = stats.resolved,
        unresolved = stats.unresolved,
        "ast relations"
    );
    session.extend_relations(edges);
}

fn emit_file(
    session: &mut ScanSession,
    table: &mut SymbolTable,
    module: &ModuleInfo,
    records: &[RawSymbol],
) -> Vec<NodeId> {
    let mut ids: Vec<NodeId> = Vec::with_capacity(records.len());
    for record in records {
        let parent = record.parent.and_then(|p| ids.get(p).copied());
        let id = session.emit_node(
            parent,
            record.kind,
            record.name.clone(),
            NodeAttrs::Symbol(SymbolAttrs {
                qualified_name: record.qualified_name.clone(),
                module_path: module.module_path.clone(),
                lineno: record.lineno,
                end_lineno: record.end_lineno,
                signature: record.signature.clone(),
                doc: record.doc.clone(),
            }),
        );
        if let Some(qualified_name) = &record.qualified_name {
            table.define(qualified_name, id, record.kind);
        }
        ids.push(id);
    }

    if let Some(top) = records.first() {
        table.add_module_aliases(&module.qualified_name, &top.bindings);
    }
    ids
}

#[cfg(test)]
mod tests {
    use crate::error::DiagnosticKind;
    use crate::graph::edge::Relation;
    use crate::graph::node::NodeKind;
    use crate::graph::schema::ScanMode;
    use crate::scan::{ScanOptions, scan};
    use std::fs;

    fn ast_scan(files: &[(&str, &str)]) -> crate::graph::Scan {
        let dir = tempfile::tempdir().expect("tempdir");
        for (path, source) in files {
            let full = dir.path().join(path);
            if let Some(parent) = full.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(full, source).unwrap();
        }
        scan(dir.path(), &ScanOptions::new(ScanMode::Ast)).unwrap()
    }

    fn named(scan: &crate::graph::Scan, qualified: &str) -> u32 {
        scan.nodes()
            .iter()
            .find(|n| n.qualified_name() == Some(qualified))
            .map(|n| n.id)
            .unwrap_or_else(|| panic!("no node {qualified}"))
    }

    #[test]
    fn test_method_node_and_qualified_name() {
        let scan = ast_scan(&[("mod.py", "class A:\n    def m(self):\n        pass\n")]);
        let kinds: Vec<_> = scan
            .nodes()
            .iter()
            .map(|n| (n.kind, n.qualified_name().unwrap_or("")))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (NodeKind::Module, "mod"),
                (NodeKind::Class, "mod.A"),
                (NodeKind::Method, "mod.A.m"),
            ]
        );
        let method = &scan.nodes()[2];
        assert_eq!(method.parent_id, Some(1));
        assert_eq!(method.symbol().unwrap().module_path, "mod.py");
        assert_eq!(scan.check_invariants(), Ok(()));
    }

    #[test]
    fn test_import_edge_between_modules() {
        let scan = ast_scan(&[("a.py", "VALUE = 1\n"), ("b.py", "import a\n")]);
        let a = named(&scan, "a");
        let b = named(&scan, "b");
        assert!(
            scan.edges()
                .iter()
                .any(|e| e.relation == Relation::Imports && e.source == b && e.target == a)
        );
    }

    #[test]
    fn test_broken_file_is_skipped_with_diagnostic() {
        let scan = ast_scan(&[
            ("good.py", "def ok():\n    pass\n"),
            ("bad.py", "def broken(:\n"),
        ]);
        assert_eq!(scan.diagnostics().len(), 1);
        assert_eq!(scan.diagnostics()[0].kind, DiagnosticKind::Parse);
        assert!(scan.nodes().iter().all(|n| n.symbol().unwrap().module_path != "bad.py"));
        assert_eq!(scan.nodes().len(), 2);
    }

    #[test]
    fn test_non_source_files_are_ignored() {
        let scan = ast_scan(&[("notes.txt", "hello"), ("pkg/__init__.py", "")]);
        assert_eq!(scan.nodes().len(), 1);
        assert_eq!(scan.nodes()[0].qualified_name(), Some("pkg"));
        assert_eq!(scan.nodes()[0].name, "pkg");
    }
}
