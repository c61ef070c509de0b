use std::path::Path;

use serde::Deserialize;
use tracing::warn;

/// Name of the optional configuration file looked up in the scan root.
pub const CONFIG_FILE: &str = "flatscan.toml";

/// Source extensions parsed in AST mode when the configuration does not override them.
const DEFAULT_EXTENSIONS: &[&str] = &["py"];

/// How symbolic links met during the walk are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymlinkPolicy {
    /// Follow links, walking each target once. Links into the root and repeat links to an
    /// outside target are dropped. A link back to one of its ancestors is reported and skipped.
    #[default]
    Follow,
    /// Never emit or descend into symbolic links.
    Skip,
}

/// What name resolution does when one qualified name is defined more than once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AmbiguityPolicy {
    /// Leave references to the name unresolved.
    #[default]
    Skip,
    /// Resolve to the definition with the lowest node id.
    First,
}

/// How anonymous constructs (lambdas) are represented in AST mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnonymousPolicy {
    /// Emit no node; names bound by the lambda still shadow outer names inside its body.
    #[default]
    Skip,
    /// Emit a `function` node named `<lambda>` with no qualified name.
    Synthetic,
}

/// Configuration loaded from `flatscan.toml` at the scan root.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Additional gitignore-style patterns, appended to whichever ignore source is in effect.
    pub exclude: Option<Vec<String>>,
    pub symlinks: SymlinkPolicy,
    pub ambiguity: AmbiguityPolicy,
    pub anonymous: AnonymousPolicy,
    /// File extensions (without the dot) treated as parseable source in AST mode.
    pub extensions: Option<Vec<String>>,
}

impl ScanConfig {
    /// Load configuration from `flatscan.toml` in the given root directory.
    ///
    /// Returns a default configuration if the file does not exist or cannot be parsed.
    pub fn load(root: &Path) -> Self {
        let config_path = root.join(CONFIG_FILE);

        if !config_path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match toml::from_str::<Self>(&contents) {
                Ok(config) => config,
                Err(err) => {
                    warn!("failed to parse {CONFIG_FILE}: {err}. Using defaults.");
                    Self::default()
                }
            },
            Err(err) => {
                warn!("failed to read {CONFIG_FILE}: {err}. Using defaults.");
                Self::default()
            }
        }
    }

    /// Extra exclusion patterns, empty when none are configured.
    pub fn exclude_patterns(&self) -> &[String] {
        self.exclude.as_deref().unwrap_or(&[])
    }

    /// Returns true if `path` has one of the configured source extensions.
    pub fn is_source_file(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        match &self.extensions {
            Some(exts) => exts.iter().any(|e| e.trim_start_matches('.') == ext),
            None => DEFAULT_EXTENSIONS.contains(&ext),
        }
    }
}
