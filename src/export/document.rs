use std::io::Write;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::graph::Scan;
use crate::graph::schema::{ScanMode, Schema};

use super::model::{edge_row, node_row};

/// The structured export: one document per scan.
#[derive(Debug, Serialize)]
struct Document<'a> {
    root: String,
    mode: ScanMode,
    schema: &'a Schema,
    nodes: Vec<Vec<Value>>,
    edges: Vec<Vec<Value>>,
}

/// Owned counterpart of the document, as read back by the loader.
#[derive(Debug, Deserialize)]
pub(crate) struct RawDocument {
    pub root: PathBuf,
    pub mode: String,
    pub schema: RawSchema,
    pub nodes: Vec<Vec<Value>>,
    pub edges: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawSchema {
    pub version: String,
    pub nodes: Vec<RawColumn>,
    pub edges: Vec<RawColumn>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawColumn {
    pub name: String,
}

/// Write `scan` as a pretty-printed JSON document.
pub fn write_document<W: Write>(scan: &Scan, mut out: W) -> serde_json::Result<()> {
    let document = Document {
        root: scan.root().display().to_string(),
        mode: scan.mode(),
        schema: scan.schema(),
        nodes: scan.nodes().iter().map(|n| node_row(scan.mode(), n)).collect(),
        edges: scan.edges().iter().map(edge_row).collect(),
    };
    serde_json::to_writer_pretty(&mut out, &document)?;
    writeln!(out).map_err(serde_json::Error::io)
}
