use std::fmt;

use serde::Serialize;

/// Which kind of structure a scan flattens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    /// Directory tree: `directory`/`file` nodes and `contains` edges.
    Filesystem,
    /// Python source structure: symbol nodes and all five relations.
    Ast,
}

impl ScanMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanMode::Filesystem => "filesystem",
            ScanMode::Ast => "ast",
        }
    }

    pub fn schema(&self) -> &'static Schema {
        match self {
            ScanMode::Filesystem => &FILESYSTEM_SCHEMA,
            ScanMode::Ast => &AST_SCHEMA,
        }
    }
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One exported column with its human description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Column {
    pub name: &'static str,
    pub description: &'static str,
}

const fn col(name: &'static str, description: &'static str) -> Column {
    Column { name, description }
}

/// Version-stamped description of the node and edge tables of one scan mode.
#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct Schema {
    pub version: &'static str,
    pub nodes: &'static [Column],
    pub edges: &'static [Column],
}

impl Schema {
    pub fn node_columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.nodes.iter().map(|c| c.name)
    }

    pub fn edge_columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.edges.iter().map(|c| c.name)
    }
}

const EDGE_COLUMNS: &[Column] = &[
    col("id", "Unique integer edge id, assigned after all nodes exist"),
    col("source", "Node id the edge starts from"),
    col("target", "Node id the edge points to"),
    col(
        "relation",
        "Edge type: contains | imports | calls | inherits | references",
    ),
];

pub static FILESYSTEM_SCHEMA: Schema = Schema {
    version: "flatscan/filesystem@1",
    nodes: &[
        col("id", "Unique integer node id in traversal order"),
        col("parent_id", "Id of the containing directory, empty for the root"),
        col("kind", "Entry kind: directory | file"),
        col("name", "Entry name (basename)"),
        col("size", "File size in bytes, empty for directories"),
    ],
    edges: EDGE_COLUMNS,
};

pub static AST_SCHEMA: Schema = Schema {
    version: "flatscan/ast@1",
    nodes: &[
        col("id", "Unique integer node id in traversal order"),
        col("parent_id", "Id of the enclosing symbol, empty for modules"),
        col("kind", "Symbol kind: module | class | function | method"),
        col("name", "Symbol name"),
        col(
            "qualified_name",
            "Dotted path from the module through enclosing scopes, empty for anonymous symbols",
        ),
        col("module_path", "Module file path relative to the scan root"),
        col("lineno", "Starting line number (1-based)"),
        col("end_lineno", "Ending line number (1-based, inclusive)"),
        col("signature", "Function or class signature (best-effort)"),
        col("doc", "First line of the docstring, if any"),
    ],
    edges: EDGE_COLUMNS,
};
