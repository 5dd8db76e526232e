//! Configuration file discovery and loading.

use eyre::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Config file name.
const CONFIG_FILE: &str = ".jjtask.toml";

/// Legacy workspace file, read but never rewritten.
const LEGACY_FILE: &str = ".jj-workspaces.yaml";

/// Default jj executable.
const DEFAULT_BINARY: &str = "jj";

/// Default per-call timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub jj: JjConfig,
    pub workspaces: WorkspacesConfig,
}

/// How jj is invoked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JjConfig {
    /// Executable to run
    pub binary: String,

    /// Per-call timeout in seconds
    pub timeout_secs: u64,
}

impl Default for JjConfig {
    fn default() -> Self {
        Self {
            binary: DEFAULT_BINARY.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Repositories grouped into one workspace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspacesConfig {
    pub repos: Vec<Repo>,
}

/// One repository entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repo {
    /// Path relative to the config file's directory, or absolute
    pub path: String,

    #[serde(default)]
    pub name: String,
}

impl Repo {
    /// Name for display: explicit name, else "workspace" for ".", else the path.
    pub fn display_name(&self) -> &str {
        if !self.name.is_empty() {
            &self.name
        } else if self.path == "." {
            "workspace"
        } else {
            &self.path
        }
    }

    /// Resolve the repository path against the workspace root.
    pub fn resolve(&self, root: &Path) -> PathBuf {
        let path = Path::new(&self.path);
        if self.path == "." {
            root.to_path_buf()
        } else if path.is_absolute() {
            path.to_path_buf()
        } else {
            root.join(path)
        }
    }
}

#[derive(Deserialize)]
struct LegacyWorkspaces {
    #[serde(default)]
    repos: Vec<Repo>,
}

/// A loaded configuration and the directory it was found in.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedConfig {
    pub config: Config,
    /// Directory holding the config file, if one was found
    pub root: Option<PathBuf>,
}

impl LoadedConfig {
    /// Repositories to operate on, with absolute-or-root-relative paths.
    ///
    /// Without configured repos this is the single repository at `cwd`.
    pub fn repos(&self, cwd: &Path) -> Vec<(String, PathBuf)> {
        let root = self.root.as_deref().unwrap_or(cwd);
        if self.config.workspaces.repos.is_empty() {
            return vec![("workspace".to_string(), cwd.to_path_buf())];
        }
        self.config
            .workspaces
            .repos
            .iter()
            .map(|repo| (repo.display_name().to_string(), repo.resolve(root)))
            .collect()
    }

    pub fn is_multi_repo(&self) -> bool {
        self.config.workspaces.repos.len() > 1
    }
}

/// Walk up from `start` looking for a config file.
pub fn find_config(start: &Path) -> Option<PathBuf> {
    for dir in start.ancestors() {
        let primary = dir.join(CONFIG_FILE);
        if primary.is_file() {
            return Some(primary);
        }
        let legacy = dir.join(LEGACY_FILE);
        if legacy.is_file() {
            return Some(legacy);
        }
    }
    None
}

/// Parse a config file, choosing the format by file name.
pub fn parse_file(path: &Path) -> Result<Config> {
    let raw = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;

    if path.file_name().is_some_and(|name| name == LEGACY_FILE) {
        let legacy: LegacyWorkspaces =
            serde_yaml::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))?;
        info!("Using legacy workspace file {}", path.display());
        return Ok(Config {
            workspaces: WorkspacesConfig { repos: legacy.repos },
            ..Config::default()
        });
    }

    toml::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Load configuration for the directory `start`, falling back to defaults.
pub fn load(start: &Path) -> Result<LoadedConfig> {
    match find_config(start) {
        Some(path) => {
            debug!("Loading config from {}", path.display());
            let config = parse_file(&path)?;
            Ok(LoadedConfig {
                config,
                root: path.parent().map(Path::to_path_buf),
            })
        }
        None => Ok(LoadedConfig {
            config: Config::default(),
            root: None,
        }),
    }
}
