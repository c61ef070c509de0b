pub mod table;

use tracing::debug;

use crate::graph::assemble::SemanticEdges;
use crate::graph::edge::Relation;
use crate::graph::node::{NodeId, NodeKind};
use crate::parser::relationships::RefKind;
use crate::parser::symbols::RawSymbol;

use table::{ScopeFrame, SymbolTable};

/// The records of one file together with the node ids they were emitted as
/// (`ids[i]` is the node of `records[i]`).
pub struct ExtractedFile {
    pub records: Vec<RawSymbol>,
    pub ids: Vec<NodeId>,
}

/// Counts collected during resolution.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResolveStats {
    pub resolved: usize,
    pub unresolved: usize,
}

/// Second pass: resolve every queued reference against the complete table.
///
/// Must only run once every file has been extracted and registered; a table missing later
/// files would turn forward references into spurious misses. Unresolved references are
/// dropped; identical edges collapse.
pub fn resolve_relations(files: &[ExtractedFile], table: &SymbolTable) -> (SemanticEdges, ResolveStats) {
    let mut edges = SemanticEdges::new();
    let mut stats = ResolveStats::default();

    for file in files {
        for (index, record) in file.records.iter().enumerate() {
            if record.references.is_empty() {
                continue;
            }
            let chain = scope_chain(&file.records, index);

            for reference in &record.references {
                let Some(&source) = file.ids.get(reference.from) else {
                    continue;
                };
                let resolved = match &reference.kind {
                    RefKind::Import { candidates } => candidates
                        .iter()
                        .find_map(|c| table.resolve(c))
                        .filter(|&(target, _)| target != source)
                        .map(|(target, _)| (Relation::Imports, target)),
                    RefKind::Call(name) => table
                        .lookup(&chain, name)
                        .and_then(|q| table.resolve(&q))
                        .filter(|&(_, kind)| kind != NodeKind::Module)
                        .map(|(target, _)| (Relation::Calls, target)),
                    RefKind::Inherit(name) => table
                        .lookup(&chain, name)
                        .and_then(|q| table.resolve(&q))
                        .filter(|&(_, kind)| kind == NodeKind::Class)
                        .map(|(target, _)| (Relation::Inherits, target)),
                    RefKind::Read(name) => table
                        .lookup(&chain, name)
                        .and_then(|q| table.resolve_read(&q))
                        .map(|(target, _)| (Relation::References, target)),
                };

                match resolved {
                    Some((relation, target)) => {
                        stats.resolved += 1;
                        edges.insert((relation, source, target));
                    }
                    None => stats.unresolved += 1,
                }
            }
        }
    }

    debug!(
        resolved = stats.resolved,
        unresolved = stats.unresolved,
        edges = edges.len(),
        "relations resolved"
    );
    (edges, stats)
}

/// Scopes visible from `records[start]`, innermost first. Class bodies other than the
/// innermost scope are skipped: methods do not see class-level names unqualified.
fn scope_chain(records: &[RawSymbol], start: usize) -> Vec<ScopeFrame<'_>> {
    let mut chain = Vec::new();
    let mut next = Some(start);
    while let Some(index) = next {
        let Some(record) = records.get(index) else {
            break;
        };
        if index == start || record.kind != NodeKind::Class {
            let receiver_of = record
                .receiver
                .as_ref()
                .and(record.parent)
                .and_then(|p| records.get(p))
                .and_then(|class| class.qualified_name.as_deref());
            chain.push(ScopeFrame {
                prefix: record.qualified_name.as_deref(),
                bindings: &record.bindings,
                receiver: record.receiver.as_deref(),
                receiver_of,
            });
        }
        next = record.parent;
    }
    chain
}
