use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde_json::Value;

use crate::error::LoadError;
use crate::graph::Scan;
use crate::graph::edge::{Edge, Relation};
use crate::graph::node::{Node, NodeAttrs, SymbolAttrs};
use crate::graph::schema::ScanMode;

use super::delimited::COMMENT_PREFIX;
use super::document::{RawColumn, RawDocument};

/// Rows of one table keyed by header name. `None` is a null (or empty) cell.
struct Table {
    path: PathBuf,
    columns: HashMap<String, usize>,
    rows: Vec<Vec<Option<String>>>,
}

impl Table {
    fn new(path: &Path, header: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        let columns = header
            .into_iter()
            .enumerate()
            .map(|(i, name)| (name, i))
            .collect();
        Self {
            path: path.to_path_buf(),
            columns,
            rows,
        }
    }

    fn has(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    fn require(&self, columns: &[&str]) -> Result<(), LoadError> {
        match columns.iter().find(|c| !self.has(c)) {
            Some(missing) => Err(self.format_error(format!("missing column {missing:?}"))),
            None => Ok(()),
        }
    }

    fn cell<'r>(&self, row: &'r [Option<String>], column: &str) -> Option<&'r str> {
        let index = *self.columns.get(column)?;
        row.get(index)?.as_deref()
    }

    fn parse<T: FromStr>(
        &self,
        row: &[Option<String>],
        line: usize,
        column: &str,
    ) -> Result<Option<T>, LoadError> {
        match self.cell(row, column) {
            None => Ok(None),
            Some(text) => text.parse().map(Some).map_err(|_| {
                self.format_error(format!("row {line}: bad {column} value {text:?}"))
            }),
        }
    }

    fn parse_required<T: FromStr>(
        &self,
        row: &[Option<String>],
        line: usize,
        column: &str,
    ) -> Result<T, LoadError> {
        self.parse(row, line, column)?
            .ok_or_else(|| self.format_error(format!("row {line}: empty {column}")))
    }

    fn format_error(&self, message: String) -> LoadError {
        LoadError::Format {
            path: self.path.clone(),
            message,
        }
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Load a scan from a `.json` document, or from a node table plus optional edge table.
pub fn load(graph: &Path, edges: Option<&Path>) -> Result<Scan, LoadError> {
    let is_json = graph
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    if is_json {
        load_json(graph)
    } else {
        load_csv(graph, edges)
    }
}

/// Load a structured export.
pub fn load_json(path: &Path) -> Result<Scan, LoadError> {
    let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let document: RawDocument = serde_json::from_slice(&bytes).map_err(|source| LoadError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    let mode = match document.mode.as_str() {
        "filesystem" => ScanMode::Filesystem,
        "ast" => ScanMode::Ast,
        other => {
            return Err(LoadError::Format {
                path: path.to_path_buf(),
                message: format!("unknown mode {other:?}"),
            });
        }
    };
    if document.schema.version != mode.schema().version {
        return Err(LoadError::Format {
            path: path.to_path_buf(),
            message: format!("unsupported schema {:?}", document.schema.version),
        });
    }

    let header = |columns: Vec<RawColumn>| columns.into_iter().map(|c| c.name).collect();
    let cells = |rows: Vec<Vec<Value>>| -> Vec<Vec<Option<String>>> {
        rows.into_iter()
            .map(|row| row.iter().map(json_cell).collect())
            .collect()
    };
    let nodes = Table::new(path, header(document.schema.nodes), cells(document.nodes));
    let edges = Table::new(path, header(document.schema.edges), cells(document.edges));

    build(path, document.root, mode, &nodes, &edges)
}

/// Load a delimited export. The tables carry no root, so the directory holding the node
/// table stands in for it. Without an edge table the scan has no edges and is not
/// validated; that is enough for node lookups.
pub fn load_csv(nodes_path: &Path, edges_path: Option<&Path>) -> Result<Scan, LoadError> {
    let nodes = read_csv(nodes_path)?;
    let mode = if nodes.has("qualified_name") {
        ScanMode::Ast
    } else {
        ScanMode::Filesystem
    };
    let edges = match edges_path {
        Some(path) => read_csv(path)?,
        None => Table::new(nodes_path, Vec::new(), Vec::new()),
    };

    let root = nodes_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let scan = build_unchecked(root, mode, &nodes, &edges)?;
    if edges_path.is_some() {
        check(nodes_path, &scan)?;
    }
    Ok(scan)
}

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

fn json_cell(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn read_csv(path: &Path) -> Result<Table, LoadError> {
    let csv_error = |source| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = csv::ReaderBuilder::new()
        .comment(Some(COMMENT_PREFIX as u8))
        .from_reader(file);

    let header: Vec<String> = reader
        .headers()
        .map_err(csv_error)?
        .iter()
        .map(str::to_owned)
        .collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_error)?;
        rows.push(
            record
                .iter()
                .map(|cell| (!cell.is_empty()).then(|| cell.to_owned()))
                .collect(),
        );
    }
    Ok(Table::new(path, header, rows))
}

fn build(
    path: &Path,
    root: PathBuf,
    mode: ScanMode,
    nodes: &Table,
    edges: &Table,
) -> Result<Scan, LoadError> {
    let scan = build_unchecked(root, mode, nodes, edges)?;
    check(path, &scan)?;
    Ok(scan)
}

fn check(path: &Path, scan: &Scan) -> Result<(), LoadError> {
    scan.check_invariants()
        .map_err(|message| LoadError::Inconsistent {
            path: path.to_path_buf(),
            message,
        })
}

fn build_unchecked(
    root: PathBuf,
    mode: ScanMode,
    nodes: &Table,
    edges: &Table,
) -> Result<Scan, LoadError> {
    nodes.require(&["id", "parent_id", "kind", "name"])?;
    if mode == ScanMode::Ast {
        nodes.require(&["qualified_name", "module_path", "lineno", "end_lineno"])?;
    }

    let mut parsed_nodes = Vec::with_capacity(nodes.rows.len());
    for (line, row) in nodes.rows.iter().enumerate() {
        let attrs = match mode {
            ScanMode::Filesystem => NodeAttrs::Entry {
                size: nodes.parse(row, line, "size")?,
            },
            ScanMode::Ast => NodeAttrs::Symbol(SymbolAttrs {
                qualified_name: nodes.cell(row, "qualified_name").map(str::to_owned),
                module_path: nodes.cell(row, "module_path").unwrap_or_default().to_owned(),
                lineno: nodes.parse_required(row, line, "lineno")?,
                end_lineno: nodes.parse_required(row, line, "end_lineno")?,
                signature: nodes.cell(row, "signature").map(str::to_owned),
                doc: nodes.cell(row, "doc").map(str::to_owned),
            }),
        };
        parsed_nodes.push(Node {
            id: nodes.parse_required(row, line, "id")?,
            parent_id: nodes.parse(row, line, "parent_id")?,
            kind: nodes.parse_required(row, line, "kind")?,
            name: nodes.cell(row, "name").unwrap_or_default().to_owned(),
            attrs,
        });
    }

    if !edges.rows.is_empty() {
        edges.require(&["id", "source", "target", "relation"])?;
    }
    let mut parsed_edges = Vec::with_capacity(edges.rows.len());
    for (line, row) in edges.rows.iter().enumerate() {
        parsed_edges.push(Edge {
            id: edges.parse_required(row, line, "id")?,
            source: edges.parse_required(row, line, "source")?,
            target: edges.parse_required(row, line, "target")?,
            relation: edges.parse_required::<Relation>(row, line, "relation")?,
        });
    }

    Ok(Scan::from_parts(root, mode, parsed_nodes, parsed_edges, Vec::new()))
}
