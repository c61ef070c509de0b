use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::graph::edge::Edge;
use crate::graph::node::{Node, NodeAttrs};
use crate::graph::schema::ScanMode;

/// Serialization format of an exported scan.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum, serde::Serialize, serde::Deserialize)]
pub enum ExportFormat {
    /// Two comma-separated tables with the schema as leading comment lines (default).
    Csv,
    /// One JSON document holding root, schema, nodes and edges.
    Json,
}

impl Default for ExportFormat {
    fn default() -> Self {
        ExportFormat::Csv
    }
}

/// Where an export goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportTarget {
    /// Files derived from a base path (`BASE_nodes.csv` + `BASE_edges.csv`, or `BASE.json`).
    Files(PathBuf),
    Stdout,
}

/// Parameters controlling one export.
#[derive(Debug, Clone)]
pub struct ExportParams {
    pub format: ExportFormat,
    pub target: ExportTarget,
}

impl ExportParams {
    /// The files this export writes; empty for stdout.
    pub fn output_paths(&self) -> Vec<PathBuf> {
        match &self.target {
            ExportTarget::Files(base) => output_paths(base, self.format),
            ExportTarget::Stdout => Vec::new(),
        }
    }
}

/// Files written for `base` in `format`.
pub fn output_paths(base: &Path, format: ExportFormat) -> Vec<PathBuf> {
    match format {
        ExportFormat::Csv => vec![suffixed(base, "_nodes.csv"), suffixed(base, "_edges.csv")],
        ExportFormat::Json => vec![suffixed(base, ".json")],
    }
}

fn suffixed(base: &Path, suffix: &str) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// What was written by one export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportResult {
    /// Files created (empty when writing to stdout).
    pub paths: Vec<PathBuf>,
    pub node_count: usize,
    pub edge_count: usize,
}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

fn opt<T: Into<Value>>(value: Option<T>) -> Value {
    value.map_or(Value::Null, Into::into)
}

/// One node as a row, in the column order of the mode's schema.
pub fn node_row(mode: ScanMode, node: &Node) -> Vec<Value> {
    let mut row = vec![
        Value::from(node.id),
        opt(node.parent_id),
        Value::from(node.kind.as_str()),
        Value::from(node.name.as_str()),
    ];
    match (mode, &node.attrs) {
        (ScanMode::Filesystem, NodeAttrs::Entry { size }) => row.push(opt(*size)),
        (ScanMode::Ast, NodeAttrs::Symbol(attrs)) => row.extend([
            opt(attrs.qualified_name.as_deref()),
            Value::from(attrs.module_path.as_str()),
            Value::from(attrs.lineno),
            Value::from(attrs.end_lineno),
            opt(attrs.signature.as_deref()),
            opt(attrs.doc.as_deref()),
        ]),
        // A scan never mixes attribute kinds; pad so the row still matches the header.
        (mode, _) => row.resize(mode.schema().nodes.len(), Value::Null),
    }
    row
}

pub fn edge_row(edge: &Edge) -> Vec<Value> {
    vec![
        Value::from(edge.id),
        Value::from(edge.source),
        Value::from(edge.target),
        Value::from(edge.relation.as_str()),
    ]
}

/// Text of a cell in a delimited table; null is the empty string.
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
