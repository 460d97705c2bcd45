//! External program lookup and probing

use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;
use which::which;

/// Find the first of `names` on PATH
pub fn find_program(names: &[&str]) -> Option<PathBuf> {
    names.iter().find_map(|name| which(name).ok())
}

/// Run a probe command and return its trimmed stdout when it succeeds.
///
/// Used for cheap queries like `poetry env info --executable`. Failures of any
/// kind (missing program, non-zero exit, empty output) yield `None`.
pub fn probe_output(program: &str, args: &[&str], cwd: &Path) -> Option<String> {
    let output = match Command::new(program).args(args).current_dir(cwd).output() {
        Ok(o) => o,
        Err(e) => {
            debug!(program, error = %e, "probe could not start");
            return None;
        }
    };

    if !output.status.success() {
        debug!(program, status = ?output.status.code(), "probe failed");
        return None;
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let line = stdout.lines().next()?.trim();
    if line.is_empty() {
        None
    } else {
        Some(line.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_program_is_none() {
        assert!(find_program(&["tidy-definitely-not-installed"]).is_none());
        let dir = std::env::temp_dir();
        assert!(probe_output("tidy-definitely-not-installed", &[], &dir).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_probe_reads_first_line() {
        let dir = std::env::temp_dir();
        let out = probe_output("sh", &["-c", "printf '  /venv/bin/python \\nextra\\n'"], &dir);
        assert_eq!(out.as_deref(), Some("/venv/bin/python"));
    }

    #[cfg(unix)]
    #[test]
    fn test_probe_failure_is_none() {
        let dir = std::env::temp_dir();
        assert!(probe_output("sh", &["-c", "echo nope; exit 3"], &dir).is_none());
    }
}
