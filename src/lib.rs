//! Flat-graph scanner: turns a directory tree, or the Python code inside it, into a node
//! table and an edge table with stable integer ids.
//!
//! ```no_run
//! use std::path::Path;
//!
//! use flatscan::graph::schema::ScanMode;
//! use flatscan::scan::{ScanOptions, scan};
//!
//! let scan = scan(Path::new("src"), &ScanOptions::new(ScanMode::Ast))?;
//! for node in scan.nodes() {
//!     println!("{} {} {}", node.id, node.kind, node.name);
//! }
//! # Ok::<(), flatscan::error::ScanError>(())
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod filter;
pub mod graph;
pub mod ids;
pub mod output;
pub mod parser;
pub mod resolver;
pub mod scan;
pub mod search;
pub mod walker;
pub mod watcher;
