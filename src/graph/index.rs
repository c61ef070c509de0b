use std::collections::HashMap;
use std::path::Path;

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};

use super::Scan;
use super::edge::{Edge, EdgeId};
use super::node::{Node, NodeId};

/// Read-side index over a frozen scan: adjacency plus name and span lookups.
///
/// Graph node index `i` is node id `i`, so translating between the two is free.
pub struct ScanIndex<'a> {
    scan: &'a Scan,
    graph: DiGraph<NodeId, EdgeId>,
    by_qualified_name: HashMap<&'a str, Vec<NodeId>>,
    by_name: HashMap<&'a str, Vec<NodeId>>,
    /// module_path -> symbols defined in that file, as `(lineno, end_lineno, id)`.
    spans: HashMap<&'a str, Vec<(u32, u32, NodeId)>>,
}

impl<'a> ScanIndex<'a> {
    pub fn new(scan: &'a Scan) -> Self {
        let mut graph = DiGraph::with_capacity(scan.nodes().len(), scan.edges().len());
        let mut by_qualified_name: HashMap<&str, Vec<NodeId>> = HashMap::new();
        let mut by_name: HashMap<&str, Vec<NodeId>> = HashMap::new();
        let mut spans: HashMap<&str, Vec<(u32, u32, NodeId)>> = HashMap::new();

        for node in scan.nodes() {
            graph.add_node(node.id);
            by_name.entry(node.name.as_str()).or_default().push(node.id);
            if let Some(attrs) = node.symbol() {
                if let Some(qname) = attrs.qualified_name.as_deref() {
                    by_qualified_name.entry(qname).or_default().push(node.id);
                }
                spans
                    .entry(attrs.module_path.as_str())
                    .or_default()
                    .push((attrs.lineno, attrs.end_lineno, node.id));
            }
        }

        for edge in scan.edges() {
            graph.add_edge(
                NodeIndex::new(edge.source as usize),
                NodeIndex::new(edge.target as usize),
                edge.id,
            );
        }

        Self {
            scan,
            graph,
            by_qualified_name,
            by_name,
            spans,
        }
    }

    /// Edges leaving `id`, in edge-id order.
    pub fn outgoing(&self, id: NodeId) -> Vec<&'a Edge> {
        self.adjacent(id, Direction::Outgoing)
    }

    /// Edges arriving at `id`, in edge-id order.
    pub fn incoming(&self, id: NodeId) -> Vec<&'a Edge> {
        self.adjacent(id, Direction::Incoming)
    }

    fn adjacent(&self, id: NodeId, direction: Direction) -> Vec<&'a Edge> {
        if id as usize >= self.graph.node_count() {
            return Vec::new();
        }
        let edges = self.scan.edges();
        let mut found: Vec<&Edge> = self
            .graph
            .edges_directed(NodeIndex::new(id as usize), direction)
            .filter_map(|e| edges.get(*e.weight() as usize))
            .collect();
        found.sort_by_key(|e| e.id);
        found
    }

    /// Nodes whose qualified name is exactly `qname` (more than one when ambiguous).
    pub fn by_qualified_name(&self, qname: &str) -> Vec<&'a Node> {
        self.lookup(&self.by_qualified_name, qname)
    }

    /// Nodes whose local name is `name`, in id order.
    pub fn by_name(&self, name: &str) -> Vec<&'a Node> {
        self.lookup(&self.by_name, name)
    }

    fn lookup(&self, map: &HashMap<&'a str, Vec<NodeId>>, key: &str) -> Vec<&'a Node> {
        map.get(key)
            .map(|ids| ids.iter().filter_map(|&id| self.scan.node(id)).collect())
            .unwrap_or_default()
    }

    /// The smallest symbol in `module_path` whose line span contains `line`.
    /// Equal spans resolve to the lower id, so the outer of two one-line symbols wins.
    pub fn find_symbol_at(&self, module_path: &str, line: u32) -> Option<&'a Node> {
        let candidates = self.spans.get(module_path)?;
        candidates
            .iter()
            .filter(|(start, end, _)| *start <= line && line <= *end)
            .min_by_key(|(start, end, id)| (end - start, *id))
            .and_then(|&(_, _, id)| self.scan.node(id))
    }

    /// The source text of a symbol node, read from `root/module_path`, lines
    /// `lineno..=end_lineno` (clamped to the file length).
    ///
    /// Returns `None` for non-symbol nodes, missing or unreadable files, and spans that
    /// start past the end of the file. Invalid UTF-8 is replaced, not rejected.
    pub fn extract_source(&self, root: &Path, id: NodeId) -> Option<String> {
        let attrs = self.scan.node(id)?.symbol()?;
        if attrs.lineno == 0 || attrs.end_lineno < attrs.lineno {
            return None;
        }
        let bytes = std::fs::read(root.join(&attrs.module_path)).ok()?;
        let text = String::from_utf8_lossy(&bytes);

        let start = attrs.lineno as usize - 1;
        let lines: Vec<&str> = text.split_inclusive('\n').collect();
        if start >= lines.len() {
            return None;
        }
        let end = (attrs.end_lineno as usize).min(lines.len());
        Some(lines[start..end].concat())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Diagnostic;
    use crate::graph::edge::Relation;
    use crate::graph::node::{NodeAttrs, NodeKind, SymbolAttrs};
    use crate::graph::schema::ScanMode;

    fn symbol(
        id: NodeId,
        parent: Option<NodeId>,
        kind: NodeKind,
        qname: &str,
        span: (u32, u32),
    ) -> Node {
        Node {
            id,
            parent_id: parent,
            kind,
            name: qname.rsplit('.').next().unwrap_or(qname).into(),
            attrs: NodeAttrs::Symbol(SymbolAttrs {
                qualified_name: Some(qname.into()),
                module_path: "mod.py".into(),
                lineno: span.0,
                end_lineno: span.1,
                signature: None,
                doc: None,
            }),
        }
    }

    fn fixture(root: &Path) -> Scan {
        let nodes = vec![
            symbol(0, None, NodeKind::Module, "mod", (1, 6)),
            symbol(1, Some(0), NodeKind::Class, "mod.A", (1, 4)),
            symbol(2, Some(1), NodeKind::Method, "mod.A.m", (2, 4)),
            symbol(3, Some(0), NodeKind::Function, "mod.f", (6, 6)),
        ];
        let edge = |id, source, target, relation| Edge {
            id,
            source,
            target,
            relation,
        };
        let edges = vec![
            edge(0, 0, 1, Relation::Contains),
            edge(1, 1, 2, Relation::Contains),
            edge(2, 0, 3, Relation::Contains),
            edge(3, 2, 3, Relation::Calls),
            edge(4, 3, 1, Relation::References),
        ];
        Scan::from_parts(root.to_path_buf(), ScanMode::Ast, nodes, edges, Vec::<Diagnostic>::new())
    }

    #[test]
    fn test_adjacency_in_edge_order() {
        let scan = fixture(Path::new("/unused"));
        let index = ScanIndex::new(&scan);

        let out: Vec<u32> = index.outgoing(0).iter().map(|e| e.id).collect();
        assert_eq!(out, vec![0, 2]);
        let into_f: Vec<u32> = index.incoming(3).iter().map(|e| e.id).collect();
        assert_eq!(into_f, vec![2, 3]);
        assert!(index.outgoing(99).is_empty());
    }

    #[test]
    fn test_name_lookups() {
        let scan = fixture(Path::new("/unused"));
        let index = ScanIndex::new(&scan);
        assert_eq!(index.by_qualified_name("mod.A.m")[0].id, 2);
        assert_eq!(index.by_name("f")[0].id, 3);
        assert!(index.by_qualified_name("mod.B").is_empty());
    }

    #[test]
    fn test_find_symbol_at_picks_smallest_span() {
        let scan = fixture(Path::new("/unused"));
        let index = ScanIndex::new(&scan);
        assert_eq!(index.find_symbol_at("mod.py", 3).map(|n| n.id), Some(2));
        assert_eq!(index.find_symbol_at("mod.py", 1).map(|n| n.id), Some(1));
        assert_eq!(index.find_symbol_at("mod.py", 5).map(|n| n.id), Some(0));
        assert_eq!(index.find_symbol_at("mod.py", 6).map(|n| n.id), Some(3));
        assert!(index.find_symbol_at("other.py", 1).is_none());
    }

    #[test]
    fn test_extract_source_reads_line_range() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join("mod.py"),
            "class A:\n    def m(self):\n        x = 1\n        return x\n\ndef f(): pass\n",
        )
        .unwrap();
        let scan = fixture(dir.path());
        let index = ScanIndex::new(&scan);

        let method = index.extract_source(dir.path(), 2).unwrap();
        assert_eq!(method, "    def m(self):\n        x = 1\n        return x\n");
        assert_eq!(index.extract_source(dir.path(), 3).unwrap(), "def f(): pass\n");
    }
}
