pub mod filesystem;
pub mod symbols;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::ScanConfig;
use crate::error::{Diagnostic, ScanError};
use crate::filter::IgnoreFilter;
use crate::graph::Scan;
use crate::graph::assemble::{Parts, SemanticEdges, assemble};
use crate::graph::edge::Relation;
use crate::graph::node::{Node, NodeAttrs, NodeId, NodeKind};
use crate::graph::schema::ScanMode;
use crate::ids::IdAllocator;
use crate::walker::Walker;

/// Inputs of one scan besides the root.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub mode: ScanMode,
    /// Explicit ignore file; overrides `<root>/.flatscanignore` and the built-in patterns.
    pub ignore_file: Option<PathBuf>,
    /// Configuration to use instead of `<root>/flatscan.toml`.
    pub config: Option<ScanConfig>,
    /// Paths never to include (typically this scan's own output files).
    pub exclude_paths: Vec<PathBuf>,
}

impl ScanOptions {
    pub fn new(mode: ScanMode) -> Self {
        Self {
            mode,
            ignore_file: None,
            config: None,
            exclude_paths: Vec::new(),
        }
    }
}

/// Mutable state of a scan in progress. Owns the node id allocator; nothing else mints
/// node ids.
pub struct ScanSession {
    root: PathBuf,
    mode: ScanMode,
    ids: IdAllocator,
    nodes: Vec<Node>,
    contains: Vec<(NodeId, NodeId)>,
    semantic: SemanticEdges,
    diagnostics: Vec<Diagnostic>,
}

impl ScanSession {
    pub fn new(root: PathBuf, mode: ScanMode) -> Self {
        Self {
            root,
            mode,
            ids: IdAllocator::new(),
            nodes: Vec::new(),
            contains: Vec::new(),
            semantic: SemanticEdges::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Allocate the next id and emit a node, plus its `contains` edge when it has a parent.
    /// The parent must already have been emitted.
    pub fn emit_node(
        &mut self,
        parent: Option<NodeId>,
        kind: NodeKind,
        name: String,
        attrs: NodeAttrs,
    ) -> NodeId {
        let id = self.ids.next_id();
        debug_assert!(parent.is_none_or(|p| p < id), "parent emitted after child");
        self.nodes.push(Node {
            id,
            parent_id: parent,
            kind,
            name,
            attrs,
        });
        if let Some(parent) = parent {
            self.contains.push((parent, id));
        }
        id
    }

    /// Queue a semantic edge between two emitted nodes.
    pub fn emit_relation(&mut self, relation: Relation, source: NodeId, target: NodeId) {
        let emitted = self.ids.issued() as NodeId;
        if relation.is_semantic() && source < emitted && target < emitted {
            self.semantic.insert((relation, source, target));
        }
    }

    pub fn extend_relations(&mut self, edges: SemanticEdges) {
        for (relation, source, target) in edges {
            self.emit_relation(relation, source, target);
        }
    }

    /// Record a recoverable problem; the scan goes on.
    pub fn record(&mut self, diagnostic: Diagnostic) {
        warn!("{diagnostic}");
        self.diagnostics.push(diagnostic);
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Assemble edges and freeze the scan.
    pub fn freeze(self) -> Scan {
        assemble(Parts {
            root: self.root,
            mode: self.mode,
            nodes: self.nodes,
            contains: self.contains,
            semantic: self.semantic,
            diagnostics: self.diagnostics,
        })
    }
}

/// A validated root with the configuration and walker every traversal of it shares.
pub struct Prepared {
    pub root: PathBuf,
    pub config: ScanConfig,
    pub walker: Walker,
}

/// Validate and canonicalize `root`, load its configuration, and compile its ignore rules.
///
/// # Errors
/// The root is missing or not a directory, the explicit ignore file cannot be read, or
/// the ignore rules cannot be compiled.
pub fn prepare(root: &Path, options: &ScanOptions) -> Result<Prepared, ScanError> {
    if !root.exists() {
        return Err(ScanError::RootNotFound(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Err(ScanError::NotADirectory(root.to_path_buf()));
    }
    let root = root
        .canonicalize()
        .map_err(|_| ScanError::RootNotFound(root.to_path_buf()))?;

    let config = options
        .config
        .clone()
        .unwrap_or_else(|| ScanConfig::load(&root));
    let filter = IgnoreFilter::load(
        &root,
        options.ignore_file.as_deref(),
        config.exclude_patterns(),
    )?;
    let excluded = options.exclude_paths.iter().map(|p| absolute(p)).collect();
    let walker =
        Walker::new(&root, Arc::new(filter), config.symlinks).with_excluded_paths(excluded);
    Ok(Prepared {
        root,
        config,
        walker,
    })
}

/// Run one complete scan of `root`.
///
/// # Errors
/// Fatal only: anything [`prepare`] rejects. Everything else becomes a diagnostic on the
/// returned scan.
pub fn scan(root: &Path, options: &ScanOptions) -> Result<Scan, ScanError> {
    let Prepared {
        root,
        config,
        walker,
    } = prepare(root, options)?;

    info!(root = %root.display(), mode = %options.mode, "scan started");
    let mut session = ScanSession::new(root, options.mode);
    match options.mode {
        ScanMode::Filesystem => filesystem::build(&mut session, &walker),
        ScanMode::Ast => symbols::build(&mut session, &walker, &config),
    }

    let scan = session.freeze();
    info!(
        nodes = scan.nodes().len(),
        edges = scan.edges().len(),
        diagnostics = scan.diagnostics().len(),
        "scan finished"
    );
    Ok(scan)
}

/// Absolute form of a path whose file may not exist yet: the parent is canonicalized,
/// the file name kept.
pub fn absolute(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(_) => path.to_path_buf(),
        }
    };
    match (joined.parent(), joined.file_name()) {
        (Some(parent), Some(name)) => parent
            .canonicalize()
            .map(|p| p.join(name))
            .unwrap_or(joined.clone()),
        _ => joined,
    }
}
