//! Last-run record kept under the user data directory

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use tidy_core::Paths;

use crate::runner::RunResult;

/// One step as recorded on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedStep {
    pub name: String,
    pub exit_code: i32,
    pub skipped: bool,
    pub duration_ms: u64,
}

/// The most recent run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LastRun {
    pub project_path: String,
    pub timestamp: String,
    pub exit_code: i32,
    pub duration_ms: u64,
    pub steps: Vec<RecordedStep>,
}

impl LastRun {
    pub fn from_result(project: &Path, result: &RunResult) -> Self {
        Self {
            project_path: canonical(project),
            timestamp: chrono::Utc::now().to_rfc3339(),
            exit_code: result.exit_code(),
            duration_ms: result.duration_ms,
            steps: result
                .steps
                .iter()
                .map(|s| RecordedStep {
                    name: s.kind.name().to_string(),
                    exit_code: s.exit_code,
                    skipped: s.skipped,
                    duration_ms: s.duration_ms,
                })
                .collect(),
        }
    }
}

/// Save the last run
pub fn save_last_run(paths: &Paths, run: &LastRun) -> Result<()> {
    fs::create_dir_all(&paths.data)
        .with_context(|| format!("Failed to create state directory: {}", paths.data.display()))?;

    let content = serde_json::to_string_pretty(run)?;
    fs::write(paths.last_run(), content).context("Failed to write last run")?;

    Ok(())
}

/// Load the last run, only if it was for this project
pub fn load_last_run(paths: &Paths, project: &Path) -> Option<LastRun> {
    let content = fs::read_to_string(paths.last_run()).ok()?;
    let run: LastRun = serde_json::from_str(&content).ok()?;

    if run.project_path == canonical(project) {
        Some(run)
    } else {
        None
    }
}

fn canonical(path: &Path) -> String {
    path.canonicalize()
        .unwrap_or_else(|_| path.to_path_buf())
        .to_string_lossy()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::StepKind;
    use crate::runner::StepResult;
    use tempfile::tempdir;

    fn sample() -> RunResult {
        RunResult {
            steps: vec![
                StepResult {
                    kind: StepKind::Lint,
                    exit_code: 1,
                    duration_ms: 120,
                    skipped: false,
                    note: None,
                },
                StepResult {
                    kind: StepKind::Types,
                    exit_code: 0,
                    duration_ms: 900,
                    skipped: false,
                    note: None,
                },
            ],
            duration_ms: 1020,
            stopped_early: false,
        }
    }

    #[test]
    fn test_save_and_load_for_same_project() {
        let state = tempdir().unwrap();
        let project = tempdir().unwrap();
        let paths = Paths::with_data(state.path().join("tidy"));

        save_last_run(&paths, &LastRun::from_result(project.path(), &sample())).unwrap();

        let run = load_last_run(&paths, project.path()).unwrap();
        assert_eq!(run.exit_code, 0);
        assert_eq!(run.steps.len(), 2);
        assert_eq!(run.steps[0].name, "lint");
        assert_eq!(run.steps[0].exit_code, 1);
    }

    #[test]
    fn test_other_project_is_ignored() {
        let state = tempdir().unwrap();
        let project = tempdir().unwrap();
        let other = tempdir().unwrap();
        let paths = Paths::with_data(state.path());

        save_last_run(&paths, &LastRun::from_result(project.path(), &sample())).unwrap();

        assert!(load_last_run(&paths, other.path()).is_none());
    }

    #[test]
    fn test_no_record() {
        let state = tempdir().unwrap();
        let project = tempdir().unwrap();
        let paths = Paths::with_data(state.path());
        assert!(load_last_run(&paths, project.path()).is_none());
    }
}
