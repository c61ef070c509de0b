pub mod relationships;
pub mod signature;
pub mod symbols;

use std::cell::RefCell;
use std::path::Path;

use tree_sitter::{Node, Parser, Tree};

use crate::config::AnonymousPolicy;
use crate::error::{Diagnostic, DiagnosticKind};

use symbols::{ModuleInfo, RawSymbol, extract_symbols};

// Thread-local Parser instances: one per rayon worker thread, no lock contention.
thread_local! {
    static PARSER_PY: RefCell<Parser> = RefCell::new({
        let mut p = Parser::new();
        p.set_language(&tree_sitter_python::LANGUAGE.into())
            .expect("tree-sitter-python grammar is ABI compatible");
        p
    });
}

pub(crate) fn node_text<'a>(node: Node<'_>, source: &'a [u8]) -> &'a str {
    node.utf8_text(source).unwrap_or("")
}

pub(crate) fn named_children(node: Node) -> Vec<Node> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

/// Parse Python source with this thread's parser. `None` only if tree-sitter gives up
/// entirely; syntax errors still produce a tree (see [`first_error_line`]).
pub fn parse_tree(source: &[u8]) -> Option<Tree> {
    PARSER_PY.with(|p| p.borrow_mut().parse(source, None))
}

/// 1-based line of the first `ERROR` or `MISSING` node in pre-order.
pub fn first_error_line(tree: &Tree) -> Option<u32> {
    let mut cursor = tree.walk();
    loop {
        let node = cursor.node();
        if node.is_error() || node.is_missing() {
            return Some(node.start_position().row as u32 + 1);
        }
        // Only descend into subtrees that contain an error.
        if node.has_error() && cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return None;
            }
        }
    }
}

/// Module identity of a source file, from its path relative to the scan root.
///
/// `a/b/c.py` is `a.b.c`; `a/b/__init__.py` is the package `a.b`. A root-level
/// `__init__.py` keeps the name `__init__`.
pub fn module_info(relative: &Path) -> Option<ModuleInfo> {
    let module_path = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<Vec<_>>>()?
        .join("/");

    let stem = relative.file_stem()?.to_str()?;
    let mut parts: Vec<&str> = relative
        .parent()
        .map(|p| p.components().filter_map(|c| c.as_os_str().to_str()).collect())
        .unwrap_or_default();

    let is_package = stem == "__init__" && !parts.is_empty();
    if !is_package {
        parts.push(stem);
    }

    Some(ModuleInfo {
        module_path,
        qualified_name: parts.join("."),
        is_package,
    })
}

/// Decode, parse, and extract one file. A failure is returned as the diagnostic to record;
/// the file then contributes no nodes.
pub fn parse_module(
    path: &Path,
    bytes: &[u8],
    module: &ModuleInfo,
    anonymous: AnonymousPolicy,
) -> Result<Vec<RawSymbol>, Diagnostic> {
    if let Err(err) = std::str::from_utf8(bytes) {
        return Err(Diagnostic::new(path, DiagnosticKind::Decode, err.to_string()));
    }

    let tree = parse_tree(bytes)
        .ok_or_else(|| Diagnostic::new(path, DiagnosticKind::Parse, "parser produced no tree"))?;
    if let Some(line) = first_error_line(&tree) {
        return Err(Diagnostic::new(
            path,
            DiagnosticKind::Parse,
            format!("syntax error at line {line}"),
        ));
    }

    // The tree is dropped here; only the records travel on to resolution.
    Ok(extract_symbols(&tree, bytes, module, anonymous))
}
