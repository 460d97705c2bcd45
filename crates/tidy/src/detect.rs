//! Wrapper and interpreter detection

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use tidy_core::process::{find_program, probe_output};

/// Wrapper used when no lock file says otherwise
pub const DEFAULT_WRAPPER: &[&str] = &["poetry", "run"];

/// Detect the dependency manager's run wrapper from lock files
pub fn detect_wrapper(path: &Path) -> Vec<String> {
    let wrapper: &[&str] = if path.join("poetry.lock").exists() {
        &["poetry", "run"]
    } else if path.join("uv.lock").exists() {
        &["uv", "run"]
    } else if path.join("pdm.lock").exists() {
        &["pdm", "run"]
    } else {
        DEFAULT_WRAPPER
    };

    wrapper.iter().map(|s| s.to_string()).collect()
}

/// Where the type checker's interpreter came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PythonSource {
    Flag,
    Env,
    Config,
    Wrapper,
    Venv,
    Path,
}

impl PythonSource {
    pub fn name(&self) -> &'static str {
        match self {
            PythonSource::Flag => "--python",
            PythonSource::Env => "TIDY_PYTHON",
            PythonSource::Config => "config",
            PythonSource::Wrapper => "wrapper",
            PythonSource::Venv => ".venv",
            PythonSource::Path => "PATH",
        }
    }

    /// Whether the user named this interpreter themselves
    pub fn is_explicit(&self) -> bool {
        matches!(self, PythonSource::Flag | PythonSource::Env | PythonSource::Config)
    }
}

/// An interpreter for the type checker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPython {
    pub path: PathBuf,
    pub source: PythonSource,
}

/// Explicit interpreter candidates, highest precedence first
#[derive(Debug, Default)]
pub struct PythonHints {
    pub flag: Option<PathBuf>,
    pub env: Option<OsString>,
    pub config: Option<PathBuf>,
}

/// Resolve the interpreter handed to the type checker.
///
/// Explicit choices are returned as-is even when the file is missing, so a
/// stale path fails the type-check step instead of being replaced silently.
pub fn resolve_python(project: &Path, wrapper: &[String], hints: PythonHints) -> Option<ResolvedPython> {
    let explicit = [
        (hints.flag, PythonSource::Flag),
        (hints.env.filter(|v| !v.is_empty()).map(PathBuf::from), PythonSource::Env),
        (hints.config, PythonSource::Config),
    ];

    for (candidate, source) in explicit {
        if let Some(path) = candidate {
            if !project.join(&path).exists() {
                warn!(
                    path = %path.display(),
                    source = source.name(),
                    "configured interpreter does not exist; type check will fail"
                );
            }
            return Some(ResolvedPython { path, source });
        }
    }

    if let Some(path) = wrapper_python(project, wrapper) {
        return Some(ResolvedPython {
            path,
            source: PythonSource::Wrapper,
        });
    }

    let venv = venv_python(project);
    if venv.exists() {
        return Some(ResolvedPython {
            path: venv,
            source: PythonSource::Venv,
        });
    }

    if let Some(path) = find_program(&["python3", "python"]) {
        return Some(ResolvedPython {
            path,
            source: PythonSource::Path,
        });
    }

    warn!("no python interpreter found; type checker will use its default");
    None
}

/// Ask the dependency manager which interpreter its environment uses
fn wrapper_python(project: &Path, wrapper: &[String]) -> Option<PathBuf> {
    let program = wrapper.first()?;
    let stem = Path::new(program)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())?;

    let args: &[&str] = match stem.as_str() {
        "poetry" => &["env", "info", "--executable"],
        "uv" => &["python", "find"],
        "pdm" => &["info", "--python"],
        _ => return None,
    };

    let out = probe_output(program, args, project)?;
    let path = PathBuf::from(out);
    if path.exists() {
        debug!(path = %path.display(), wrapper = %stem, "interpreter from wrapper");
        Some(path)
    } else {
        None
    }
}

/// Conventional in-project virtualenv interpreter
fn venv_python(project: &Path) -> PathBuf {
    if cfg!(windows) {
        project.join(".venv").join("Scripts").join("python.exe")
    } else {
        project.join(".venv").join("bin").join("python")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn direct() -> Vec<String> {
        Vec::new()
    }

    #[test]
    fn test_detect_wrapper_from_lock_files() {
        let dir = tempdir().unwrap();
        assert_eq!(detect_wrapper(dir.path()), vec!["poetry", "run"]);

        fs::write(dir.path().join("uv.lock"), "").unwrap();
        assert_eq!(detect_wrapper(dir.path()), vec!["uv", "run"]);

        fs::write(dir.path().join("poetry.lock"), "").unwrap();
        assert_eq!(detect_wrapper(dir.path()), vec!["poetry", "run"]);
    }

    #[test]
    fn test_detect_pdm() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("pdm.lock"), "").unwrap();
        assert_eq!(detect_wrapper(dir.path()), vec!["pdm", "run"]);
    }

    #[test]
    fn test_flag_beats_env_and_config() {
        let dir = tempdir().unwrap();
        let hints = PythonHints {
            flag: Some(PathBuf::from("/flag/python")),
            env: Some(OsString::from("/env/python")),
            config: Some(PathBuf::from("/config/python")),
        };
        let resolved = resolve_python(dir.path(), &direct(), hints).unwrap();
        assert_eq!(resolved.path, PathBuf::from("/flag/python"));
        assert_eq!(resolved.source, PythonSource::Flag);
    }

    #[test]
    fn test_env_beats_config() {
        let dir = tempdir().unwrap();
        let hints = PythonHints {
            flag: None,
            env: Some(OsString::from("/env/python")),
            config: Some(PathBuf::from("/config/python")),
        };
        let resolved = resolve_python(dir.path(), &direct(), hints).unwrap();
        assert_eq!(resolved.source, PythonSource::Env);
    }

    #[test]
    fn test_empty_env_is_ignored() {
        let dir = tempdir().unwrap();
        let hints = PythonHints {
            flag: None,
            env: Some(OsString::new()),
            config: Some(PathBuf::from("/config/python")),
        };
        let resolved = resolve_python(dir.path(), &direct(), hints).unwrap();
        assert_eq!(resolved.source, PythonSource::Config);
    }

    #[test]
    fn test_missing_explicit_path_is_kept() {
        let dir = tempdir().unwrap();
        let stale = PathBuf::from("/Users/nobody/Library/Caches/venv/bin/python");
        let hints = PythonHints {
            config: Some(stale.clone()),
            ..Default::default()
        };
        let resolved = resolve_python(dir.path(), &direct(), hints).unwrap();
        assert_eq!(resolved.path, stale);
        assert!(resolved.source.is_explicit());
    }

    #[test]
    fn test_venv_detected() {
        let dir = tempdir().unwrap();
        let venv = venv_python(dir.path());
        fs::create_dir_all(venv.parent().unwrap()).unwrap();
        fs::write(&venv, "").unwrap();

        let resolved = resolve_python(dir.path(), &direct(), PythonHints::default()).unwrap();
        assert_eq!(resolved.path, venv);
        assert_eq!(resolved.source, PythonSource::Venv);
    }

    #[test]
    fn test_unknown_wrapper_is_not_probed() {
        let dir = tempdir().unwrap();
        let wrapper = vec!["hatch".to_string(), "run".to_string()];
        assert!(wrapper_python(dir.path(), &wrapper).is_none());
        assert!(wrapper_python(dir.path(), &direct()).is_none());
    }
}
