use std::collections::HashMap;
use std::path::Path;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::ScanError;
use crate::graph::index::ScanIndex;
use crate::graph::node::{Node, NodeId, NodeKind};
use crate::graph::schema::ScanMode;
use crate::scan::{Prepared, ScanOptions, prepare, scan};
use crate::walker::WalkItem;

/// Bytes inspected for a NUL when deciding whether a file is binary.
const BINARY_SNIFF_LEN: usize = 8000;

/// Where a hit sits relative to its symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HitKind {
    /// The first line of a class or function.
    Definition,
    /// Any other line inside a symbol.
    Usage,
    /// A line no symbol encloses, e.g. in a non-Python file.
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub line: u32,
    pub kind: HitKind,
    /// The matching line without its line terminator.
    pub text: String,
}

/// The symbol a group of hits belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolRef {
    pub id: NodeId,
    pub kind: NodeKind,
    pub name: String,
    pub qualified_name: Option<String>,
    pub lineno: u32,
    pub end_lineno: u32,
}

/// All hits of one symbol, or all symbol-less hits of one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchGroup {
    /// File path relative to the root, `/`-separated.
    pub path: String,
    pub symbol: Option<SymbolRef>,
    pub hits: Vec<SearchHit>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum GroupKey {
    Symbol(NodeId),
    File(String),
}

/// Search every non-ignored file under `root` for `pattern`.
///
/// The root is scanned in AST mode first; a matching line in a Python module is
/// attributed to the smallest symbol enclosing it, any other matching line to its file.
/// Groups come out in order of their first hit (files in walk order, lines ascending).
/// Binary files and files that can no longer be read are skipped.
///
/// # Errors
/// Fatal only: the same conditions that make [`scan`] fail.
pub fn search(
    root: &Path,
    options: &ScanOptions,
    pattern: &Regex,
) -> Result<Vec<SearchGroup>, ScanError> {
    let mut options = options.clone();
    options.mode = ScanMode::Ast;
    let symbols = scan(root, &options)?;
    let index = ScanIndex::new(&symbols);
    let Prepared { walker, .. } = prepare(root, &options)?;

    let mut groups: Vec<SearchGroup> = Vec::new();
    let mut slot: HashMap<GroupKey, usize> = HashMap::new();

    for item in walker.walk() {
        let entry = match item {
            WalkItem::Entry(entry) if !entry.is_dir => entry,
            WalkItem::Entry(_) => continue,
            WalkItem::Skipped(diagnostic) => {
                debug!("search skipped: {diagnostic}");
                continue;
            }
        };
        let path = entry.relative.to_string_lossy().replace('\\', "/");
        let bytes = match std::fs::read(&entry.path) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(path = %entry.path.display(), "search skipped file: {err}");
                continue;
            }
        };
        if bytes.iter().take(BINARY_SNIFF_LEN).any(|&b| b == 0) {
            debug!(path = %path, "search skipped binary file");
            continue;
        }
        let source = String::from_utf8_lossy(&bytes);

        for (offset, text) in source.lines().enumerate() {
            if !pattern.is_match(text) {
                continue;
            }
            let line = offset as u32 + 1;
            let enclosing = index
                .find_symbol_at(&path, line)
                .and_then(symbol_ref);

            let (key, kind) = match &enclosing {
                Some(symbol) if line == symbol.lineno && symbol.kind != NodeKind::Module => {
                    (GroupKey::Symbol(symbol.id), HitKind::Definition)
                }
                Some(symbol) => (GroupKey::Symbol(symbol.id), HitKind::Usage),
                None => (GroupKey::File(path.clone()), HitKind::Text),
            };
            let group = *slot.entry(key).or_insert_with(|| {
                groups.push(SearchGroup {
                    path: path.clone(),
                    symbol: enclosing,
                    hits: Vec::new(),
                });
                groups.len() - 1
            });
            groups[group].hits.push(SearchHit {
                line,
                kind,
                text: text.to_owned(),
            });
        }
    }

    debug!(
        groups = groups.len(),
        hits = groups.iter().map(|g| g.hits.len()).sum::<usize>(),
        "search finished"
    );
    Ok(groups)
}

fn symbol_ref(node: &Node) -> Option<SymbolRef> {
    let attrs = node.symbol()?;
    Some(SymbolRef {
        id: node.id,
        kind: node.kind,
        name: node.name.clone(),
        qualified_name: attrs.qualified_name.clone(),
        lineno: attrs.lineno,
        end_lineno: attrs.end_lineno,
    })
}

/// One header line per group followed by its indented hits.
pub fn render_compact(results: &[SearchGroup]) -> String {
    let mut out = String::new();
    for group in results {
        match &group.symbol {
            Some(symbol) => {
                let label = symbol.qualified_name.as_deref().unwrap_or(&symbol.name);
                out.push_str(&format!(
                    "{label} {} {}:{}-{}\n",
                    symbol.kind, group.path, symbol.lineno, symbol.end_lineno
                ));
            }
            None => out.push_str(&format!("{} (no symbol)\n", group.path)),
        }
        for hit in &group.hits {
            let tag = match hit.kind {
                HitKind::Definition => "def",
                HitKind::Usage => "use",
                HitKind::Text => "txt",
            };
            out.push_str(&format!("  {}:{tag} {}\n", hit.line, hit.text.trim()));
        }
    }
    let total: usize = results.iter().map(|g| g.hits.len()).sum();
    out.push_str(&format!("{total} matches in {} groups\n", results.len()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const SOURCE: &str = "\
import os

class Store:
    def save(self, item):
        return self.write(item)

    def write(self, item):
        pass

def save_all(store):
    store.save(1)
";

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("store.py"), SOURCE).unwrap();
        dir
    }

    fn run(root: &Path, pattern: &str) -> Vec<SearchGroup> {
        search(
            root,
            &ScanOptions::new(ScanMode::Filesystem),
            &Regex::new(pattern).unwrap(),
        )
        .unwrap()
    }

    fn summary(results: &[SearchGroup]) -> Vec<(String, Option<&str>, Vec<(u32, HitKind)>)> {
        results
            .iter()
            .map(|g| {
                (
                    g.path.clone(),
                    g.symbol.as_ref().and_then(|s| s.qualified_name.as_deref()),
                    g.hits.iter().map(|h| (h.line, h.kind)).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn test_hits_grouped_by_enclosing_symbol() {
        let dir = fixture();
        let results = run(dir.path(), r"\bsave");
        assert_eq!(
            summary(&results),
            vec![
                (
                    "store.py".to_owned(),
                    Some("store.Store.save"),
                    vec![(4, HitKind::Definition)]
                ),
                (
                    "store.py".to_owned(),
                    Some("store.save_all"),
                    vec![(10, HitKind::Definition), (11, HitKind::Usage)]
                ),
            ]
        );
    }

    #[test]
    fn test_module_level_hit_is_usage() {
        let dir = fixture();
        let results = run(dir.path(), "import os");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].symbol.as_ref().map(|s| s.kind), Some(NodeKind::Module));
        assert_eq!(results[0].hits[0].kind, HitKind::Usage);
    }

    #[test]
    fn test_non_python_files_are_searched() {
        let dir = fixture();
        fs::write(dir.path().join("notes.txt"), "nothing\nsave the world\n").unwrap();
        fs::write(dir.path().join("config.toml"), "save = true\n").unwrap();
        fs::write(dir.path().join("blob.bin"), b"save\0\x01").unwrap();
        fs::create_dir(dir.path().join("__pycache__")).unwrap();
        fs::write(dir.path().join("__pycache__/stale.txt"), "save\n").unwrap();

        let results = run(dir.path(), r"^save");
        assert_eq!(
            summary(&results),
            vec![
                ("config.toml".to_owned(), None, vec![(1, HitKind::Text)]),
                ("notes.txt".to_owned(), None, vec![(2, HitKind::Text)]),
            ],
            "binary and ignored files are skipped"
        );
        assert!(results.iter().all(|g| g.symbol.is_none()));

        let json = serde_json::to_value(&results).unwrap();
        assert_eq!(json[0]["symbol"], serde_json::Value::Null);
        assert_eq!(json[0]["hits"][0]["kind"], "text");
    }

    #[test]
    fn test_compact_rendering() {
        let dir = fixture();
        fs::write(dir.path().join("notes.txt"), "call self.write first\n").unwrap();
        let results = run(dir.path(), "self.write");
        let text = render_compact(&results);
        assert_eq!(
            text,
            "notes.txt (no symbol)\n  1:txt call self.write first\n\
             store.Store.save method store.py:4-5\n  5:use return self.write(item)\n\
             2 matches in 2 groups\n"
        );
    }
}
