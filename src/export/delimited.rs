use std::io::Write;

use serde_json::Value;

use crate::graph::Scan;
use crate::graph::schema::Column;

use super::model::{cell_text, edge_row, node_row};

/// Prefix of the schema comment lines that precede every table.
pub const COMMENT_PREFIX: char = '#';

/// Write the node table: schema comments, header, one row per node.
pub fn write_nodes<W: Write>(scan: &Scan, out: W) -> csv::Result<()> {
    let schema = scan.schema();
    let rows = scan.nodes().iter().map(|n| node_row(scan.mode(), n));
    write_table(out, schema.version, schema.nodes, rows)
}

/// Write the edge table: schema comments, header, one row per edge.
pub fn write_edges<W: Write>(scan: &Scan, out: W) -> csv::Result<()> {
    let schema = scan.schema();
    let rows = scan.edges().iter().map(edge_row);
    write_table(out, schema.version, schema.edges, rows)
}

fn write_table<W, I>(mut out: W, version: &str, columns: &[Column], rows: I) -> csv::Result<()>
where
    W: Write,
    I: IntoIterator<Item = Vec<Value>>,
{
    writeln!(out, "{COMMENT_PREFIX} schema: {version}")?;
    for column in columns {
        writeln!(out, "{COMMENT_PREFIX} {}: {}", column.name, column.description)?;
    }

    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(out);
    writer.write_record(columns.iter().map(|c| c.name))?;
    for row in rows {
        writer.write_record(row.iter().map(cell_text))?;
    }
    writer.flush()?;
    Ok(())
}
