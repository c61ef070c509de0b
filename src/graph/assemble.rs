use std::collections::BTreeSet;
use std::path::PathBuf;

use tracing::debug;

use crate::error::Diagnostic;
use crate::ids::IdAllocator;

use super::Scan;
use super::edge::{Edge, Relation};
use super::node::{Node, NodeId};
use super::schema::ScanMode;

/// Semantic edges keyed by `(relation, source, target)`; iteration order is assembly order.
pub type SemanticEdges = BTreeSet<(Relation, NodeId, NodeId)>;

/// Everything a scan session accumulated, ready to be frozen.
pub struct Parts {
    pub root: PathBuf,
    pub mode: ScanMode,
    pub nodes: Vec<Node>,
    /// `(parent, child)` pairs recorded when each child node was emitted.
    pub contains: Vec<(NodeId, NodeId)>,
    pub semantic: SemanticEdges,
    pub diagnostics: Vec<Diagnostic>,
}

/// Merge containment and semantic edges, assign edge ids, and freeze the scan.
///
/// Edge order: all `contains` edges by child id (node emission order), then the semantic
/// edges grouped as `imports, calls, inherits, references`, each sorted by source then
/// target. Identical semantic edges were already collapsed by the set.
pub fn assemble(parts: Parts) -> Scan {
    let Parts {
        root,
        mode,
        nodes,
        mut contains,
        semantic,
        diagnostics,
    } = parts;

    contains.sort_by_key(|&(_, child)| child);

    let mut ids = IdAllocator::new();
    let mut edges = Vec::with_capacity(contains.len() + semantic.len());

    for (source, target) in contains {
        edges.push(Edge {
            id: ids.next_id(),
            source,
            target,
            relation: Relation::Contains,
        });
    }
    for (relation, source, target) in semantic {
        debug_assert!(relation.is_semantic());
        edges.push(Edge {
            id: ids.next_id(),
            source,
            target,
            relation,
        });
    }

    debug!(
        nodes = nodes.len(),
        edges = ids.issued(),
        diagnostics = diagnostics.len(),
        "scan assembled"
    );
    Scan::from_parts(root, mode, nodes, edges, diagnostics)
}
