use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::export::model::ExportFormat;

/// Flatten a directory tree, or the Python code inside it, into node and edge tables.
///
/// With no subcommand, flatscan scans ROOT once and writes the tables as CSV (or a JSON
/// document), ready to load into a dataframe or a database.
#[derive(Parser, Debug)]
#[command(
    name = "flatscan",
    version,
    about,
    long_about = None,
    propagate_version = true,
    args_conflicts_with_subcommands = true,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub scan: ScanArgs,

    /// Log debug output to stderr (RUST_LOG overrides).
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Flags shared by a one-shot scan and `watch`.
#[derive(Args, Debug, Clone)]
pub struct ScanArgs {
    /// Directory to scan.
    #[arg(default_value = ".")]
    pub root: PathBuf,

    /// Scan Python symbols (modules, classes, functions) instead of the directory tree.
    #[arg(long)]
    pub ast: bool,

    /// Table format.
    #[arg(long, value_enum, default_value_t = ExportFormat::Csv)]
    pub format: ExportFormat,

    /// Output base path: BASE_nodes.csv + BASE_edges.csv, or BASE.json.
    /// Defaults to the root directory's name in the current directory.
    #[arg(short, long, value_name = "BASE")]
    pub output: Option<PathBuf>,

    /// Gitignore-style pattern file, instead of <ROOT>/.flatscanignore or the built-in set.
    #[arg(long, value_name = "PATH")]
    pub ignore_file: Option<PathBuf>,

    /// Write the tables to stdout instead of files.
    #[arg(long)]
    pub stdout: bool,

    /// Print the summary as JSON.
    #[arg(long)]
    pub json_summary: bool,
}

/// Output format for search results.
#[derive(Clone, Copy, Debug, ValueEnum, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// One header line per symbol or file with indented hits (default).
    #[default]
    Compact,
    /// Structured JSON array suitable for programmatic consumption.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan and export, then re-scan and re-export whenever files under ROOT change.
    ///
    /// Every re-scan is a full traversal; changes to ignored paths and to the output files
    /// themselves are not watched.
    Watch {
        #[command(flatten)]
        scan: ScanArgs,

        /// Debounce window in milliseconds.
        #[arg(long, default_value_t = 200)]
        debounce_ms: u64,
    },

    /// Regex search over every non-ignored file; Python hits are grouped by enclosing symbol.
    Search {
        /// Regular expression (Rust regex syntax).
        pattern: String,

        /// Directory to scan.
        #[arg(default_value = ".")]
        root: PathBuf,

        /// Case-insensitive matching.
        #[arg(short = 'i', long)]
        ignore_case: bool,

        /// Gitignore-style pattern file, instead of <ROOT>/.flatscanignore or the built-in set.
        #[arg(long, value_name = "PATH")]
        ignore_file: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Compact)]
        format: OutputFormat,
    },

    /// Print the symbol enclosing MODULE_PATH:LINE in an exported AST graph.
    Locate {
        /// Exported graph: a .json document or an AST node table (.csv).
        graph: PathBuf,

        /// Module file path relative to the scanned root, e.g. pkg/core.py.
        module_path: String,

        /// 1-based line number.
        line: u32,

        /// Edge table accompanying a CSV node table.
        #[arg(long, value_name = "EDGES_CSV")]
        edges: Option<PathBuf>,

        /// Source root for printing the symbol's code (defaults to the graph's root).
        #[arg(long, value_name = "DIR")]
        root: Option<PathBuf>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Merge exported filesystem and AST tables into one annotated text file.
    Context {
        /// Destination file.
        #[arg(short, long)]
        output: PathBuf,

        #[arg(long, requires = "fs_edges")]
        fs_nodes: Option<PathBuf>,

        #[arg(long, requires = "fs_nodes")]
        fs_edges: Option<PathBuf>,

        #[arg(long, requires = "ast_edges")]
        ast_nodes: Option<PathBuf>,

        #[arg(long, requires = "ast_nodes")]
        ast_edges: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_bare_invocation_scans_cwd() {
        let cli = Cli::try_parse_from(["flatscan"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.scan.root, PathBuf::from("."));
        assert_eq!(cli.scan.format, ExportFormat::Csv);
        assert!(!cli.scan.ast);
    }

    #[test]
    fn test_scan_flags() {
        let cli = Cli::try_parse_from([
            "flatscan", "src", "--ast", "--format", "json", "-o", "out/g", "--stdout",
        ])
        .unwrap();
        assert_eq!(cli.scan.root, PathBuf::from("src"));
        assert!(cli.scan.ast && cli.scan.stdout);
        assert_eq!(cli.scan.format, ExportFormat::Json);
        assert_eq!(cli.scan.output, Some(PathBuf::from("out/g")));
    }

    #[test]
    fn test_locate_subcommand() {
        let cli = Cli::try_parse_from(["flatscan", "locate", "g.json", "pkg/a.py", "12"]).unwrap();
        match cli.command {
            Some(Commands::Locate {
                module_path, line, ..
            }) => {
                assert_eq!(module_path, "pkg/a.py");
                assert_eq!(line, 12);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_context_requires_pairs() {
        let err = Cli::try_parse_from(["flatscan", "context", "-o", "c.txt", "--fs-nodes", "n.csv"]);
        assert!(err.is_err());
    }
}
