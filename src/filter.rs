use std::path::{Path, PathBuf};

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use tracing::{debug, warn};

use crate::error::ScanError;

/// Conventional ignore file looked up in the scan root when none is given explicitly.
pub const DEFAULT_IGNORE_FILE: &str = ".flatscanignore";

/// Patterns used when neither an explicit nor a conventional ignore file exists.
pub const BUILTIN_PATTERNS: &[&str] = &[
    ".git/",
    ".hg/",
    ".svn/",
    "__pycache__/",
    "*.py[cod]",
    ".venv/",
    "venv/",
    ".tox/",
    ".mypy_cache/",
    ".pytest_cache/",
    ".ruff_cache/",
    "node_modules/",
    "*.egg-info/",
    ".DS_Store",
];

/// Decides whether a path (relative to the scan root) is excluded from a scan.
pub trait IgnorePredicate: Send + Sync {
    fn matches(&self, relative_path: &Path, is_dir: bool) -> bool;
}

/// Where the active ignore patterns came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternSource {
    Explicit(PathBuf),
    RootDefault(PathBuf),
    Builtin,
}

/// Gitignore-style predicate loaded once per scan.
pub struct IgnoreFilter {
    matcher: Gitignore,
    source: PatternSource,
}

impl IgnoreFilter {
    /// Resolve the pattern source and compile it.
    ///
    /// Precedence: `explicit` file, then `<root>/.flatscanignore`, then [`BUILTIN_PATTERNS`].
    /// `extra` patterns (from `flatscan.toml`) are appended whichever source wins.
    ///
    /// # Errors
    /// An explicit file that cannot be read is fatal, as is a rule set the matcher rejects
    /// as a whole. Individual malformed lines are skipped with a warning.
    pub fn load(root: &Path, explicit: Option<&Path>, extra: &[String]) -> Result<Self, ScanError> {
        let mut builder = GitignoreBuilder::new(root);

        let source = match explicit {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ScanError::IgnoreFile {
                    path: path.to_path_buf(),
                    source,
                })?;
                add_lines(&mut builder, Some(path), text.lines());
                PatternSource::Explicit(path.to_path_buf())
            }
            None => {
                let candidate = root.join(DEFAULT_IGNORE_FILE);
                match std::fs::read_to_string(&candidate) {
                    Ok(text) => {
                        add_lines(&mut builder, Some(&candidate), text.lines());
                        PatternSource::RootDefault(candidate)
                    }
                    Err(_) => {
                        add_lines(&mut builder, None, BUILTIN_PATTERNS.iter().copied());
                        PatternSource::Builtin
                    }
                }
            }
        };

        add_lines(&mut builder, None, extra.iter().map(String::as_str));

        let matcher = builder.build()?;
        debug!(?source, rules = matcher.num_ignores(), "ignore rules loaded");
        Ok(Self { matcher, source })
    }

    /// A predicate built from in-memory pattern lines.
    pub fn from_patterns<'a>(
        root: &Path,
        patterns: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, ScanError> {
        let mut builder = GitignoreBuilder::new(root);
        add_lines(&mut builder, None, patterns);
        Ok(Self {
            matcher: builder.build()?,
            source: PatternSource::Builtin,
        })
    }

    pub fn source(&self) -> &PatternSource {
        &self.source
    }
}

impl IgnorePredicate for IgnoreFilter {
    fn matches(&self, relative_path: &Path, is_dir: bool) -> bool {
        // The scan root itself is never ignored.
        if relative_path.as_os_str().is_empty() || relative_path.has_root() {
            return false;
        }
        self.matcher
            .matched_path_or_any_parents(relative_path, is_dir)
            .is_ignore()
    }
}

fn add_lines<'a>(
    builder: &mut GitignoreBuilder,
    from: Option<&Path>,
    lines: impl IntoIterator<Item = &'a str>,
) {
    for line in lines {
        if let Err(err) = builder.add_line(from.map(Path::to_path_buf), line) {
            warn!("skipping ignore pattern {line:?}: {err}");
        }
    }
}
