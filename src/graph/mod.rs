pub mod assemble;
pub mod edge;
pub mod index;
pub mod node;
pub mod schema;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::Diagnostic;

use edge::{Edge, Relation};
use node::{Node, NodeId, NodeKind};
use schema::{ScanMode, Schema};

/// A frozen scan: ordered nodes, ordered edges, the root they were read from, and the
/// schema of the mode that produced them.
///
/// A `Scan` is only ever built whole (by the assembler or by a loader) and is read-only
/// afterwards; it can be exported any number of times.
#[derive(Debug, Clone)]
pub struct Scan {
    root: PathBuf,
    mode: ScanMode,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    diagnostics: Vec<Diagnostic>,
}

impl Scan {
    pub(crate) fn from_parts(
        root: PathBuf,
        mode: ScanMode,
        nodes: Vec<Node>,
        edges: Vec<Edge>,
        diagnostics: Vec<Diagnostic>,
    ) -> Self {
        Self {
            root,
            mode,
            nodes,
            edges,
            diagnostics,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn mode(&self) -> ScanMode {
        self.mode
    }

    pub fn schema(&self) -> &'static Schema {
        self.mode.schema()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Recoverable problems met during the scan, in the order they occurred.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id as usize)
    }

    /// Number of nodes of each kind, sorted by kind.
    pub fn node_counts(&self) -> Vec<(NodeKind, usize)> {
        let mut counts: HashMap<NodeKind, usize> = HashMap::new();
        for node in &self.nodes {
            *counts.entry(node.kind).or_default() += 1;
        }
        let mut counts: Vec<_> = counts.into_iter().collect();
        counts.sort();
        counts
    }

    /// Number of edges of each relation, in assembly order.
    pub fn edge_counts(&self) -> Vec<(Relation, usize)> {
        let mut counts: HashMap<Relation, usize> = HashMap::new();
        for edge in &self.edges {
            *counts.entry(edge.relation).or_default() += 1;
        }
        let mut counts: Vec<_> = counts.into_iter().collect();
        counts.sort();
        counts
    }

    /// Verify the structural invariants of a scan.
    ///
    /// - node ids are exactly `0..n` in list order; edge ids are exactly `0..m`
    /// - every `parent_id` and every edge endpoint names an existing node
    /// - every node that is not a containment root has exactly one incoming `contains` edge,
    ///   and that edge agrees with its `parent_id`; roots have none
    /// - containment roots are the single node 0 (filesystem) or the modules (AST)
    /// - `contains` edges precede all semantic edges, which are sorted by
    ///   `(relation, source, target)` without duplicates
    ///
    /// Returns a description of the first violation found.
    pub fn check_invariants(&self) -> Result<(), String> {
        let n = self.nodes.len();

        for (pos, node) in self.nodes.iter().enumerate() {
            if node.id as usize != pos {
                return Err(format!("node at position {pos} has id {}", node.id));
            }
            if node.kind.is_symbol() != (self.mode == ScanMode::Ast) {
                return Err(format!(
                    "node {} has kind {} in a {} scan",
                    node.id, node.kind, self.mode
                ));
            }
            let should_be_root = match self.mode {
                ScanMode::Filesystem => pos == 0,
                ScanMode::Ast => node.kind == NodeKind::Module,
            };
            match node.parent_id {
                None if should_be_root => {}
                None => return Err(format!("node {} has no parent", node.id)),
                Some(_) if should_be_root => {
                    return Err(format!("root node {} has a parent", node.id));
                }
                Some(parent) if parent >= node.id => {
                    return Err(format!(
                        "node {} references parent {parent} emitted after it",
                        node.id
                    ));
                }
                Some(_) => {}
            }
        }

        let mut incoming_contains = vec![0usize; n];
        let mut seen_semantic = false;
        let mut last_semantic: Option<(Relation, NodeId, NodeId)> = None;

        for (pos, edge) in self.edges.iter().enumerate() {
            if edge.id as usize != pos {
                return Err(format!("edge at position {pos} has id {}", edge.id));
            }
            if edge.source as usize >= n || edge.target as usize >= n {
                return Err(format!(
                    "edge {} references a missing node ({} -> {})",
                    edge.id, edge.source, edge.target
                ));
            }

            if edge.relation == Relation::Contains {
                if seen_semantic {
                    return Err(format!("contains edge {} follows a semantic edge", edge.id));
                }
                let target = &self.nodes[edge.target as usize];
                if target.parent_id != Some(edge.source) {
                    return Err(format!(
                        "contains edge {} disagrees with parent_id of node {}",
                        edge.id, edge.target
                    ));
                }
                incoming_contains[edge.target as usize] += 1;
            } else {
                seen_semantic = true;
                let key = (edge.relation, edge.source, edge.target);
                if let Some(prev) = last_semantic
                    && prev >= key
                {
                    return Err(format!("semantic edge {} is out of order or repeated", edge.id));
                }
                last_semantic = Some(key);
            }
        }

        for node in &self.nodes {
            let expected = usize::from(node.parent_id.is_some());
            let got = incoming_contains[node.id as usize];
            if got != expected {
                return Err(format!(
                    "node {} has {got} incoming contains edges, expected {expected}",
                    node.id
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edge::Edge;
    use node::NodeAttrs;

    fn entry(id: NodeId, parent: Option<NodeId>, kind: NodeKind, name: &str) -> Node {
        Node {
            id,
            parent_id: parent,
            kind,
            name: name.into(),
            attrs: NodeAttrs::Entry { size: None },
        }
    }

    fn edge(id: u32, source: NodeId, target: NodeId, relation: Relation) -> Edge {
        Edge {
            id,
            source,
            target,
            relation,
        }
    }

    fn fs_scan(nodes: Vec<Node>, edges: Vec<Edge>) -> Scan {
        Scan::from_parts("/data".into(), ScanMode::Filesystem, nodes, edges, Vec::new())
    }

    #[test]
    fn test_valid_scan_passes() {
        let scan = fs_scan(
            vec![
                entry(0, None, NodeKind::Directory, "data"),
                entry(1, Some(0), NodeKind::File, "example.txt"),
            ],
            vec![edge(0, 0, 1, Relation::Contains)],
        );
        assert_eq!(scan.check_invariants(), Ok(()));
        assert_eq!(
            scan.node_counts(),
            vec![(NodeKind::Directory, 1), (NodeKind::File, 1)]
        );
    }

    #[test]
    fn test_missing_contains_edge_is_reported() {
        let scan = fs_scan(
            vec![
                entry(0, None, NodeKind::Directory, "data"),
                entry(1, Some(0), NodeKind::File, "example.txt"),
            ],
            Vec::new(),
        );
        let err = scan.check_invariants().unwrap_err();
        assert!(err.contains("incoming contains"), "got: {err}");
    }

    #[test]
    fn test_dangling_edge_is_reported() {
        let scan = fs_scan(
            vec![entry(0, None, NodeKind::Directory, "data")],
            vec![edge(0, 0, 7, Relation::Contains)],
        );
        assert!(scan.check_invariants().unwrap_err().contains("missing node"));
    }

    #[test]
    fn test_id_gap_is_reported() {
        let scan = fs_scan(
            vec![
                entry(0, None, NodeKind::Directory, "data"),
                entry(2, Some(0), NodeKind::File, "x"),
            ],
            vec![edge(0, 0, 2, Relation::Contains)],
        );
        assert!(scan.check_invariants().unwrap_err().contains("position 1"));
    }
}
