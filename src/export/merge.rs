use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::ScanError;

const BANNER_WIDTH: usize = 78;

/// Node and edge tables of one exported scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TablePair {
    pub nodes: PathBuf,
    pub edges: PathBuf,
}

/// Inputs of a context merge. Either pair may be absent.
#[derive(Debug, Clone, Default)]
pub struct MergeInputs {
    pub filesystem: Option<TablePair>,
    pub ast: Option<TablePair>,
}

impl MergeInputs {
    fn sections(&self) -> Vec<(&'static str, &Path)> {
        let mut sections = Vec::new();
        if let Some(pair) = &self.filesystem {
            sections.push(("FILESYSTEM NODES", pair.nodes.as_path()));
            sections.push(("FILESYSTEM EDGES", pair.edges.as_path()));
        }
        if let Some(pair) = &self.ast {
            sections.push(("AST NODES", pair.nodes.as_path()));
            sections.push(("AST EDGES", pair.edges.as_path()));
        }
        sections
    }
}

/// Concatenate exported tables into one annotated text file, each under a banner.
/// A missing input is noted in place of its content; the merge still succeeds.
pub fn merge_context(output: &Path, inputs: &MergeInputs) -> Result<(), ScanError> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| ScanError::output(parent, e))?;
    }

    let mut text = String::new();
    for (title, path) in inputs.sections() {
        let rule = "=".repeat(BANNER_WIDTH);
        text.push_str(&format!("# {rule}\n# {title}\n# {rule}\n\n"));
        match fs::read_to_string(path) {
            Ok(content) => {
                text.push_str(content.trim());
                text.push_str("\n\n");
            }
            Err(err) => {
                debug!(path = %path.display(), "merge input unavailable: {err}");
                text.push_str(&format!("# Missing file: {}\n\n", path.display()));
            }
        }
    }

    let mut file = fs::File::create(output).map_err(|e| ScanError::output(output, e))?;
    file.write_all(text.as_bytes())
        .map_err(|e| ScanError::output(output, e))
}
