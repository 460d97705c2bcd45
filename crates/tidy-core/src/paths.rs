//! Standard paths used by tidy

use std::path::{Path, PathBuf};

/// Directory inside a project that holds tidy's config
pub const PROJECT_DIR: &str = ".tidy";

/// Config file name inside [`PROJECT_DIR`]
pub const CONFIG_FILE: &str = "tidy.yaml";

/// Standard tidy paths
pub struct Paths {
    /// Data directory (~/.local/share/tidy)
    pub data: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}

impl Paths {
    pub fn new() -> Self {
        let data = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("tidy");

        Self { data }
    }

    /// Rooted somewhere other than the user data dir (tests)
    pub fn with_data(data: impl Into<PathBuf>) -> Self {
        Self { data: data.into() }
    }

    /// File recording the most recent run
    pub fn last_run(&self) -> PathBuf {
        self.data.join("last_run.json")
    }

    /// Project-level config file
    pub fn project_config(project: &Path) -> PathBuf {
        project.join(PROJECT_DIR).join(CONFIG_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_config_path() {
        let path = Paths::project_config(Path::new("/work/app"));
        assert_eq!(path, PathBuf::from("/work/app/.tidy/tidy.yaml"));
    }

    #[test]
    fn test_last_run_under_data() {
        let paths = Paths::with_data("/tmp/tidy-state");
        assert_eq!(paths.last_run(), PathBuf::from("/tmp/tidy-state/last_run.json"));
    }
}
