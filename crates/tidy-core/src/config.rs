//! Project configuration (`.tidy/tidy.yaml`)

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::paths::Paths;

/// Type checker config used when nothing else is set
pub const DEFAULT_TYPE_CONFIG: &str = "mypy.ini";

/// Errors loading project configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
}

/// Settings a project can pin in `.tidy/tidy.yaml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    /// Run wrapper, e.g. `["poetry", "run"]`
    pub wrapper: Option<Vec<String>>,
    /// Interpreter handed to the type checker
    pub python: Option<PathBuf>,
    /// Type checker configuration file
    pub type_config: Option<PathBuf>,
    /// Per-step timeout in seconds
    pub timeout: Option<u64>,
    /// Stop at the first failing step
    pub fail_fast: bool,
    /// Steps to skip
    pub skip: Vec<String>,
}

impl ProjectConfig {
    /// Parse config text. A file holding only comments is an empty config.
    pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let blank = content
            .lines()
            .map(str::trim)
            .all(|l| l.is_empty() || l.starts_with('#'));
        if blank {
            return Ok(Self::default());
        }

        serde_yaml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Type checker config, falling back to `mypy.ini`
    pub fn type_config_or_default(&self) -> PathBuf {
        self.type_config
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_TYPE_CONFIG))
    }
}

/// Load config for a project.
///
/// An explicit path must exist. Without one, `.tidy/tidy.yaml` under the
/// project is used when present, otherwise defaults apply.
pub fn load_project_config(
    project: &Path,
    explicit: Option<&Path>,
) -> Result<ProjectConfig, ConfigError> {
    let path = match explicit {
        Some(p) => {
            if !p.exists() {
                return Err(ConfigError::NotFound(p.to_path_buf()));
            }
            p.to_path_buf()
        }
        None => {
            let p = Paths::project_config(project);
            if !p.exists() {
                debug!(path = %p.display(), "no project config, using defaults");
                return Ok(ProjectConfig::default());
            }
            p
        }
    };

    let content = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;

    debug!(path = %path.display(), "loaded project config");
    ProjectConfig::parse(&content, &path)
}
