//! Sequential step runner

use anyhow::Result;
use std::io::{ErrorKind, Write};
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{debug, warn};

use tidy_core::format::{format_duration, shell_join};

use crate::pipeline::{Pipeline, Step, StepKind};

/// Exit status a shell reports for a command it cannot find
pub const EXIT_NOT_FOUND: i32 = 127;
/// Exit status a shell reports for a command it found but could not run
pub const EXIT_CANNOT_RUN: i32 = 126;
/// Exit status `timeout(1)` reports
pub const EXIT_TIMEOUT: i32 = 124;

/// How long to wait for a killed process group to disappear
const GROUP_EXIT_GRACE: Duration = Duration::from_secs(2);

/// How to run a pipeline
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Stop after the first failing step
    pub fail_fast: bool,
    /// Run only this step
    pub only: Option<StepKind>,
    /// Steps to skip
    pub skip: Vec<StepKind>,
    /// Per-step timeout in seconds
    pub timeout: Option<u64>,
    /// Send tool stdout to stderr, keeping stdout for a JSON report
    pub tool_stdout_to_stderr: bool,
    pub quiet: bool,
    pub verbose: bool,
}

/// Result of one step
#[derive(Debug, Clone)]
pub struct StepResult {
    pub kind: StepKind,
    /// Exit code, shell style. Zero for skipped steps.
    pub exit_code: i32,
    pub duration_ms: u64,
    pub skipped: bool,
    /// Why the step was skipped or could not run
    pub note: Option<String>,
}

impl StepResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    fn skipped(kind: StepKind, reason: &str) -> Self {
        Self {
            kind,
            exit_code: 0,
            duration_ms: 0,
            skipped: true,
            note: Some(reason.to_string()),
        }
    }
}

/// Result of the whole run
#[derive(Debug, Clone)]
pub struct RunResult {
    pub steps: Vec<StepResult>,
    pub duration_ms: u64,
    /// Fail-fast cut the run short
    pub stopped_early: bool,
}

impl RunResult {
    /// Exit code of the last step that actually ran, like a shell script
    pub fn exit_code(&self) -> i32 {
        self.steps
            .iter()
            .rev()
            .find(|s| !s.skipped)
            .map(|s| s.exit_code)
            .unwrap_or(0)
    }

    pub fn ran(&self) -> usize {
        self.steps.iter().filter(|s| !s.skipped).count()
    }

    pub fn failures(&self) -> usize {
        self.steps.iter().filter(|s| !s.success()).count()
    }
}

/// Run the pipeline's steps one after another in `path`.
///
/// Banners and result lines go to `out`; tool output goes to the terminal.
pub async fn run_pipeline<W: Write>(
    pipeline: &Pipeline,
    path: &Path,
    opts: &RunOptions,
    out: &mut W,
) -> Result<RunResult> {
    let start = Instant::now();
    let mut results = Vec::new();
    let mut stopped_early = false;

    for step in &pipeline.steps {
        if let Some(only) = opts.only {
            if step.kind != only {
                continue;
            }
        }

        if opts.skip.contains(&step.kind) {
            if !opts.quiet {
                print_step_skipped(out, step.kind, "user skip")?;
            }
            results.push(StepResult::skipped(step.kind, "user skip"));
            continue;
        }

        let argv = pipeline.argv(step);
        if !opts.quiet {
            print_step_start(out, step, &argv)?;
        }
        if opts.verbose {
            eprintln!("Running: {}", shell_join(&argv));
        }

        let result = run_step(step, &argv, path, opts).await;

        if !opts.quiet {
            print_step_result(out, &result)?;
        }

        let failed = !result.success();
        results.push(result);

        if failed && opts.fail_fast {
            stopped_early = true;
            break;
        }
    }

    Ok(RunResult {
        steps: results,
        duration_ms: start.elapsed().as_millis() as u64,
        stopped_early,
    })
}

/// Run a single step
async fn run_step(step: &Step, argv: &[String], path: &Path, opts: &RunOptions) -> StepResult {
    let start = Instant::now();

    let (exit_code, note) = match run_command(argv, path, opts).await {
        Ok(Some(status)) => (status_code(status), None),
        Ok(None) => (EXIT_TIMEOUT, Some("timeout exceeded".to_string())),
        Err(e) => {
            let code = if e.kind() == ErrorKind::NotFound {
                EXIT_NOT_FOUND
            } else {
                EXIT_CANNOT_RUN
            };
            eprintln!("tidy: {}: {}", argv[0], spawn_message(&e));
            (code, Some(e.to_string()))
        }
    };

    debug!(step = %step.kind, exit_code, "step finished");

    StepResult {
        kind: step.kind,
        exit_code,
        duration_ms: start.elapsed().as_millis() as u64,
        skipped: false,
        note,
    }
}

/// Spawn and wait. `Ok(None)` means the timeout fired and the step was killed.
///
/// With a timeout the step gets its own process group so that everything the
/// wrapper started can be killed together. Without one it stays in the
/// terminal's foreground group and receives Ctrl-C like any other command.
async fn run_command(argv: &[String], path: &Path, opts: &RunOptions) -> std::io::Result<Option<ExitStatus>> {
    let stdout = if opts.tool_stdout_to_stderr {
        Stdio::from(std::io::stderr())
    } else {
        Stdio::inherit()
    };

    let mut cmd = Command::new(&argv[0]);
    cmd.args(&argv[1..])
        .current_dir(path)
        .stdin(Stdio::inherit())
        .stdout(stdout)
        .stderr(Stdio::inherit())
        .kill_on_drop(true);

    #[cfg(unix)]
    if opts.timeout.is_some() {
        cmd.process_group(0);
    }

    let mut child = cmd.spawn()?;

    match opts.timeout {
        None => child.wait().await.map(Some),
        Some(secs) => match timeout(Duration::from_secs(secs), child.wait()).await {
            Ok(status) => status.map(Some),
            Err(_) => {
                kill_step(&mut child).await;
                Ok(None)
            }
        },
    }
}

/// Kill a timed-out step and everything in its process group, then wait
#[cfg(unix)]
async fn kill_step(child: &mut Child) {
    let Some(pid) = child.id() else {
        let _ = child.wait().await;
        return;
    };

    let pgid = pid as libc::pid_t;
    // SAFETY: plain signal delivery to the group created at spawn
    unsafe {
        libc::killpg(pgid, libc::SIGKILL);
    }
    let _ = child.wait().await;

    // Signal 0 only checks whether any member is left
    let deadline = Instant::now() + GROUP_EXIT_GRACE;
    while unsafe { libc::killpg(pgid, 0) } == 0 {
        if Instant::now() >= deadline {
            warn!(pgid, "process group still alive after kill");
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[cfg(not(unix))]
async fn kill_step(child: &mut Child) {
    let _ = child.kill().await;
}

/// Exit code as a shell would report it
fn status_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    1
}

fn spawn_message(e: &std::io::Error) -> String {
    match e.kind() {
        ErrorKind::NotFound => "command not found".to_string(),
        ErrorKind::PermissionDenied => "permission denied".to_string(),
        _ => e.to_string(),
    }
}

// Output formatting functions

fn print_step_start<W: Write>(out: &mut W, step: &Step, argv: &[String]) -> std::io::Result<()> {
    writeln!(
        out,
        "\x1b[1m==>\x1b[0m {} \x1b[2m({})\x1b[0m",
        step.kind.title(),
        shell_join(argv)
    )?;
    // Banner must land before the tool's own output
    out.flush()
}

fn print_step_result<W: Write>(out: &mut W, result: &StepResult) -> std::io::Result<()> {
    let duration_str = format_duration(result.duration_ms);

    if result.success() {
        writeln!(
            out,
            "[\x1b[2m{:>5}\x1b[0m] \x1b[32mok\x1b[0m {}",
            duration_str, result.kind
        )
    } else {
        writeln!(
            out,
            "[\x1b[2m{:>5}\x1b[0m] \x1b[31mFAIL\x1b[0m {} \x1b[2m(exit {})\x1b[0m",
            duration_str, result.kind, result.exit_code
        )
    }
}

fn print_step_skipped<W: Write>(out: &mut W, kind: StepKind, reason: &str) -> std::io::Result<()> {
    writeln!(
        out,
        "[\x1b[2m  -  \x1b[0m] \x1b[33mskip\x1b[0m {} \x1b[2m({})\x1b[0m",
        kind, reason
    )
}
