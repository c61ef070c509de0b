use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::error::Diagnostic;
use crate::graph::Scan;
use crate::graph::schema::ScanMode;

/// Aggregate statistics of one scan and its export.
#[derive(Debug, Serialize)]
pub struct ScanSummary {
    pub root: PathBuf,
    pub mode: ScanMode,
    pub nodes: usize,
    pub edges: usize,
    /// Node count per kind, keyed by kind name.
    pub node_kinds: BTreeMap<&'static str, usize>,
    /// Edge count per relation, keyed by relation name.
    pub relations: BTreeMap<&'static str, usize>,
    pub diagnostics: Vec<Diagnostic>,
    /// Files written by the export; empty when the export went to stdout.
    pub outputs: Vec<PathBuf>,
    /// Wall-clock time for scan plus export in seconds.
    pub elapsed_secs: f64,
}

impl ScanSummary {
    pub fn new(scan: &Scan, outputs: Vec<PathBuf>, elapsed: Duration) -> Self {
        Self {
            root: scan.root().to_path_buf(),
            mode: scan.mode(),
            nodes: scan.nodes().len(),
            edges: scan.edges().len(),
            node_kinds: scan
                .node_counts()
                .into_iter()
                .map(|(kind, n)| (kind.as_str(), n))
                .collect(),
            relations: scan
                .edge_counts()
                .into_iter()
                .map(|(relation, n)| (relation.as_str(), n))
                .collect(),
            diagnostics: scan.diagnostics().to_vec(),
            outputs,
            elapsed_secs: elapsed.as_secs_f64(),
        }
    }
}

/// Print a summary of the scan.
///
/// - `json = true`: a pretty-printed JSON object.
/// - `json = false`: a cargo-style human-readable summary.
///
/// Goes to stderr when `to_stderr` is set, so that an export written to stdout stays
/// clean for downstream consumers.
pub fn print_summary(summary: &ScanSummary, json: bool, to_stderr: bool) {
    let text = if json {
        match serde_json::to_string_pretty(summary) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("error serialising summary: {}", e);
                return;
            }
        }
    } else {
        render_summary(summary)
    };

    if to_stderr {
        let _ = writeln!(std::io::stderr(), "{}", text.trim_end());
    } else {
        println!("{}", text.trim_end());
    }
}

fn join_counts(counts: &BTreeMap<&'static str, usize>) -> String {
    counts
        .iter()
        .map(|(name, n)| format!("{n} {name}"))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn render_summary(summary: &ScanSummary) -> String {
    let mut out = format!(
        "Scanned {} ({} mode) in {:.2}s\n",
        summary.root.display(),
        summary.mode,
        summary.elapsed_secs
    );
    out.push_str(&format!(
        "  {} nodes: {}\n",
        summary.nodes,
        join_counts(&summary.node_kinds)
    ));
    out.push_str(&format!(
        "  {} edges: {}\n",
        summary.edges,
        join_counts(&summary.relations)
    ));
    for path in &summary.outputs {
        out.push_str(&format!("  wrote {}\n", path.display()));
    }
    if !summary.diagnostics.is_empty() {
        out.push_str(&format!("  {} entries skipped:\n", summary.diagnostics.len()));
        for diagnostic in &summary.diagnostics {
            out.push_str(&format!("    {diagnostic}\n"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::{ScanOptions, scan};
    use std::fs;

    #[test]
    fn test_summary_counts() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(
            dir.path().join("m.py"),
            "import os\n\nclass A:\n    def run(self):\n        self.go()\n    def go(self):\n        pass\n",
        )
        .unwrap();
        fs::write(dir.path().join("bad.py"), "def (:\n").unwrap();
        let scan = scan(dir.path(), &ScanOptions::new(ScanMode::Ast)).unwrap();

        let summary = ScanSummary::new(&scan, Vec::new(), Duration::from_millis(5));
        assert_eq!(summary.node_kinds.get("method"), Some(&2));
        assert_eq!(summary.relations.get("calls"), Some(&1));
        assert_eq!(summary.diagnostics.len(), 1);

        let text = render_summary(&summary);
        assert!(text.contains("4 nodes: 1 class, 2 method, 1 module"), "got:\n{text}");
        assert!(text.contains("1 entries skipped"));
        assert!(text.contains("[parse]"));
    }
}
