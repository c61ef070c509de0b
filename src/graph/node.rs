use std::fmt;
use std::str::FromStr;

/// Identifier of a node: its zero-based position in emission order.
pub type NodeId = u32;

/// The closed set of node kinds. Filesystem scans only produce `Directory` and `File`;
/// AST scans only produce the four symbol kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Directory,
    File,
    /// A source file, named by its dotted module path.
    Module,
    Class,
    /// A `def` (or synthetic lambda) whose enclosing scope is not a class body.
    Function,
    /// A `def` directly inside a class body.
    Method,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Directory => "directory",
            NodeKind::File => "file",
            NodeKind::Module => "module",
            NodeKind::Class => "class",
            NodeKind::Function => "function",
            NodeKind::Method => "method",
        }
    }

    /// True for the AST kinds.
    pub fn is_symbol(&self) -> bool {
        !matches!(self, NodeKind::Directory | NodeKind::File)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "directory" => Ok(NodeKind::Directory),
            "file" => Ok(NodeKind::File),
            "module" => Ok(NodeKind::Module),
            "class" => Ok(NodeKind::Class),
            "function" => Ok(NodeKind::Function),
            "method" => Ok(NodeKind::Method),
            other => Err(format!("unknown node kind {other:?}")),
        }
    }
}

/// Attributes of a symbol node (module, class, function, method).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SymbolAttrs {
    /// Dotted path from the module root; `None` for anonymous constructs.
    pub qualified_name: Option<String>,
    /// Source file path relative to the scan root, `/`-separated.
    pub module_path: String,
    /// 1-based first line.
    pub lineno: u32,
    /// 1-based last line (inclusive).
    pub end_lineno: u32,
    pub signature: Option<String>,
    pub doc: Option<String>,
}

/// Mode-specific attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeAttrs {
    /// Filesystem entry: byte length for files, `None` for directories.
    Entry { size: Option<u64> },
    Symbol(SymbolAttrs),
}

/// A single graph vertex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: NodeId,
    /// Containment parent; `None` for containment roots.
    pub parent_id: Option<NodeId>,
    pub kind: NodeKind,
    /// Local (unqualified) name.
    pub name: String,
    pub attrs: NodeAttrs,
}

impl Node {
    pub fn symbol(&self) -> Option<&SymbolAttrs> {
        match &self.attrs {
            NodeAttrs::Symbol(attrs) => Some(attrs),
            NodeAttrs::Entry { .. } => None,
        }
    }

    pub fn qualified_name(&self) -> Option<&str> {
        self.symbol().and_then(|s| s.qualified_name.as_deref())
    }

    pub fn size(&self) -> Option<u64> {
        match self.attrs {
            NodeAttrs::Entry { size } => size,
            NodeAttrs::Symbol(_) => None,
        }
    }
}
