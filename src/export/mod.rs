pub mod delimited;
pub mod document;
pub mod load;
pub mod merge;
pub mod model;

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use tracing::debug;

use crate::error::ScanError;
use crate::graph::Scan;

use model::{ExportFormat, ExportParams, ExportResult, ExportTarget, output_paths};

/// Path reported for failures while streaming to standard output.
const STDOUT: &str = "<stdout>";

/// Export a frozen scan as files or to stdout.
///
/// An unwritable destination is fatal; nothing is retried.
pub fn export(scan: &Scan, params: &ExportParams) -> Result<ExportResult, ScanError> {
    let paths = match &params.target {
        ExportTarget::Stdout => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            write_scan(scan, params.format, &mut out)?;
            out.flush().map_err(|e| ScanError::output(Path::new(STDOUT), e))?;
            Vec::new()
        }
        ExportTarget::Files(base) => {
            let paths = output_paths(base, params.format);
            match params.format {
                ExportFormat::Csv => {
                    write_file(&paths[0], |path, w| {
                        delimited::write_nodes(scan, w).map_err(|e| ScanError::from_csv(path, e))
                    })?;
                    write_file(&paths[1], |path, w| {
                        delimited::write_edges(scan, w).map_err(|e| ScanError::from_csv(path, e))
                    })?;
                }
                ExportFormat::Json => {
                    write_file(&paths[0], |path, w| {
                        document::write_document(scan, w)
                            .map_err(|e| ScanError::from_json(path, e))
                    })?;
                }
            }
            paths
        }
    };

    debug!(files = paths.len(), format = ?params.format, "export written");
    Ok(ExportResult {
        paths,
        node_count: scan.nodes().len(),
        edge_count: scan.edges().len(),
    })
}

/// Write the whole scan to one stream: the JSON document, or the node table, a blank
/// line, then the edge table.
pub fn write_scan<W: Write>(scan: &Scan, format: ExportFormat, out: &mut W) -> Result<(), ScanError> {
    let stream = Path::new(STDOUT);
    match format {
        ExportFormat::Csv => {
            delimited::write_nodes(scan, &mut *out).map_err(|e| ScanError::from_csv(stream, e))?;
            writeln!(out).map_err(|e| ScanError::output(stream, e))?;
            delimited::write_edges(scan, &mut *out).map_err(|e| ScanError::from_csv(stream, e))?;
        }
        ExportFormat::Json => {
            document::write_document(scan, &mut *out).map_err(|e| ScanError::from_json(stream, e))?;
        }
    }
    Ok(())
}

fn write_file<F>(path: &Path, write: F) -> Result<(), ScanError>
where
    F: FnOnce(&Path, &mut BufWriter<fs::File>) -> Result<(), ScanError>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| ScanError::output(parent, e))?;
    }
    let file = fs::File::create(path).map_err(|e| ScanError::output(path, e))?;
    let mut writer = BufWriter::new(file);
    write(path, &mut writer)?;
    writer.flush().map_err(|e| ScanError::output(path, e))
}
