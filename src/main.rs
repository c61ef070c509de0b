use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::Parser;
use regex::RegexBuilder;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use flatscan::cli::{Cli, Commands, OutputFormat, ScanArgs};
use flatscan::config::ScanConfig;
use flatscan::export::export;
use flatscan::export::load::load;
use flatscan::export::merge::{MergeInputs, TablePair, merge_context};
use flatscan::export::model::{ExportParams, ExportTarget};
use flatscan::filter::IgnoreFilter;
use flatscan::graph::index::ScanIndex;
use flatscan::graph::schema::ScanMode;
use flatscan::output::{ScanSummary, print_summary};
use flatscan::scan::{ScanOptions, absolute, scan};
use flatscan::search::{render_compact, search};
use flatscan::watcher;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        None => {
            scan_and_export(&cli.scan)?;
        }

        Some(Commands::Watch { scan, debounce_ms }) => {
            run_watch(&scan, Duration::from_millis(debounce_ms))?;
        }

        Some(Commands::Search {
            pattern,
            root,
            ignore_case,
            ignore_file,
            format,
        }) => {
            let regex = RegexBuilder::new(&pattern)
                .case_insensitive(ignore_case)
                .build()
                .with_context(|| format!("invalid pattern {pattern:?}"))?;
            let mut options = ScanOptions::new(ScanMode::Ast);
            options.ignore_file = ignore_file;
            let results = search(&root, &options, &regex)?;
            match format {
                OutputFormat::Compact => print!("{}", render_compact(&results)),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&results)?),
            }
        }

        Some(Commands::Locate {
            graph,
            module_path,
            line,
            edges,
            root,
            json,
        }) => {
            run_locate(&graph, edges.as_deref(), &module_path, line, root.as_deref(), json)?;
        }

        Some(Commands::Context {
            output,
            fs_nodes,
            fs_edges,
            ast_nodes,
            ast_edges,
        }) => {
            let pair = |nodes: Option<PathBuf>, edges: Option<PathBuf>| {
                nodes.zip(edges).map(|(nodes, edges)| TablePair { nodes, edges })
            };
            let inputs = MergeInputs {
                filesystem: pair(fs_nodes, fs_edges),
                ast: pair(ast_nodes, ast_edges),
            };
            merge_context(&output, &inputs)?;
            println!("wrote {}", output.display());
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .init();
}

// ---------------------------------------------------------------------------
// Scan + export
// ---------------------------------------------------------------------------

fn mode(args: &ScanArgs) -> ScanMode {
    if args.ast { ScanMode::Ast } else { ScanMode::Filesystem }
}

fn export_params(args: &ScanArgs) -> Result<ExportParams> {
    let target = if args.stdout {
        ExportTarget::Stdout
    } else {
        let base = match &args.output {
            Some(base) => base.clone(),
            None => {
                let name = args
                    .root
                    .canonicalize()
                    .ok()
                    .and_then(|p| p.file_name().map(|n| n.to_os_string()))
                    .unwrap_or_else(|| "scan".into());
                std::env::current_dir()
                    .context("cannot determine the current directory")?
                    .join(name)
            }
        };
        ExportTarget::Files(base)
    };
    Ok(ExportParams {
        format: args.format,
        target,
    })
}

/// One complete scan, export, and summary. Returns the files written.
fn scan_and_export(args: &ScanArgs) -> Result<Vec<PathBuf>> {
    let start = Instant::now();
    let params = export_params(args)?;

    let mut options = ScanOptions::new(mode(args));
    options.ignore_file = args.ignore_file.clone();
    options.exclude_paths = params.output_paths();

    let scan = scan(&args.root, &options)?;
    let result = export(&scan, &params)?;

    let summary = ScanSummary::new(&scan, result.paths.clone(), start.elapsed());
    print_summary(&summary, args.json_summary, args.stdout);
    Ok(result.paths)
}

fn run_watch(args: &ScanArgs, debounce: Duration) -> Result<()> {
    let outputs: Vec<PathBuf> = scan_and_export(args)?.iter().map(|p| absolute(p)).collect();

    let root = args
        .root
        .canonicalize()
        .with_context(|| format!("cannot watch {}", args.root.display()))?;
    let config = ScanConfig::load(&root);
    let filter = IgnoreFilter::load(&root, args.ignore_file.as_deref(), config.exclude_patterns())?;

    watcher::watch(&root, debounce, &filter, &outputs, |events| {
        info!(changes = events.len(), "re-scanning");
        if let Err(err) = scan_and_export(args) {
            error!("re-scan failed: {err:#}");
        }
        Ok(())
    })
}

// ---------------------------------------------------------------------------
// Locate
// ---------------------------------------------------------------------------

#[derive(serde::Serialize)]
struct Located<'a> {
    id: u32,
    kind: &'a str,
    name: &'a str,
    qualified_name: Option<&'a str>,
    module_path: &'a str,
    lineno: u32,
    end_lineno: u32,
    signature: Option<&'a str>,
    doc: Option<&'a str>,
    source: Option<String>,
}

fn run_locate(
    graph: &Path,
    edges: Option<&Path>,
    module_path: &str,
    line: u32,
    root: Option<&Path>,
    json: bool,
) -> Result<()> {
    let scan = load(graph, edges)?;
    if scan.mode() != ScanMode::Ast {
        bail!("{} is a filesystem graph; locate needs an AST graph", graph.display());
    }

    let index = ScanIndex::new(&scan);
    let Some(node) = index.find_symbol_at(module_path, line) else {
        bail!("no symbol encloses {module_path}:{line}");
    };
    let Some(attrs) = node.symbol() else {
        bail!("node {} carries no symbol attributes", node.id);
    };
    let source = index.extract_source(root.unwrap_or(scan.root()), node.id);

    if json {
        let located = Located {
            id: node.id,
            kind: node.kind.as_str(),
            name: &node.name,
            qualified_name: attrs.qualified_name.as_deref(),
            module_path: &attrs.module_path,
            lineno: attrs.lineno,
            end_lineno: attrs.end_lineno,
            signature: attrs.signature.as_deref(),
            doc: attrs.doc.as_deref(),
            source,
        };
        println!("{}", serde_json::to_string_pretty(&located)?);
        return Ok(());
    }

    println!(
        "{} {} {}:{}-{}",
        attrs.qualified_name.as_deref().unwrap_or(&node.name),
        node.kind,
        attrs.module_path,
        attrs.lineno,
        attrs.end_lineno
    );
    if let Some(signature) = &attrs.signature {
        println!("  signature: {signature}");
    }
    if let Some(doc) = &attrs.doc {
        println!("  doc: {doc}");
    }
    if let Some(source) = source {
        println!();
        print!("{source}");
        if !source.ends_with('\n') {
            println!();
        }
    }
    Ok(())
}
