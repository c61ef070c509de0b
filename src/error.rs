use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// Unrecoverable errors: the scan (or export) is aborted and no partial result is returned.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// The scan root does not exist.
    #[error("path does not exist: {}", .0.display())]
    RootNotFound(PathBuf),
    /// The scan root exists but is not a directory.
    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),
    /// An explicitly supplied ignore file could not be read.
    #[error("cannot read ignore file {}: {source}", path.display())]
    IgnoreFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The resolved ignore patterns could not be compiled into a matcher.
    #[error("invalid ignore rules: {0}")]
    IgnoreRules(#[from] ignore::Error),
    /// An output destination could not be created or written.
    #[error("cannot write {}: {source}", path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("csv encoding failed: {0}")]
    Csv(csv::Error),
    #[error("json encoding failed: {0}")]
    Json(serde_json::Error),
    #[error(transparent)]
    Load(#[from] LoadError),
}

impl ScanError {
    pub(crate) fn output(path: &Path, source: std::io::Error) -> Self {
        ScanError::Output {
            path: path.to_path_buf(),
            source,
        }
    }

    /// A csv writer failure while writing `path`; I/O failures are output errors.
    pub(crate) fn from_csv(path: &Path, err: csv::Error) -> Self {
        if !err.is_io_error() {
            return ScanError::Csv(err);
        }
        match err.into_kind() {
            csv::ErrorKind::Io(source) => Self::output(path, source),
            other => Self::output(path, std::io::Error::other(format!("{other:?}"))),
        }
    }

    /// A JSON writer failure while writing `path`; I/O failures are output errors.
    pub(crate) fn from_json(path: &Path, err: serde_json::Error) -> Self {
        if err.is_io() {
            Self::output(path, err.into())
        } else {
            ScanError::Json(err)
        }
    }
}

/// Errors raised while reading an exported graph back into memory.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{}: {message}", path.display())]
    Format { path: PathBuf, message: String },
    #[error("malformed csv in {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("malformed json in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// The rows parsed but do not form a valid scan (gaps in ids, dangling edges, ...).
    #[error("{}: inconsistent graph: {message}", path.display())]
    Inconsistent { path: PathBuf, message: String },
}

/// Category of a recoverable, per-entry problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// A directory listing or file read failed (permissions, races with deletion).
    Unreadable,
    /// A symbolic link chain leads back to one of its own ancestors.
    SymlinkLoop,
    /// `stat` on an entry failed.
    Metadata,
    /// A source file is not valid UTF-8.
    Decode,
    /// A source file has syntax errors.
    Parse,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::Unreadable => "unreadable",
            DiagnosticKind::SymlinkLoop => "symlink_loop",
            DiagnosticKind::Metadata => "metadata",
            DiagnosticKind::Decode => "decode",
            DiagnosticKind::Parse => "parse",
        }
    }
}

/// A recoverable problem recorded during a scan. The affected unit is skipped and the
/// scan continues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub path: PathBuf,
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    pub fn new(path: impl Into<PathBuf>, kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}]: {}",
            self.path.display(),
            self.kind.as_str(),
            self.message
        )
    }
}
