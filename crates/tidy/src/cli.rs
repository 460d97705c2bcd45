//! CLI command definitions and handlers

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use tidy_core::config::load_project_config;
use tidy_core::format::{format_duration, shell_join};
use tidy_core::{Paths, ProjectConfig};

use crate::detect::{detect_wrapper, resolve_python, PythonHints, ResolvedPython};
use crate::pipeline::{build_pipeline, Pipeline, StepKind};
use crate::runner::{run_pipeline, RunOptions, RunResult};
use crate::status::{load_last_run, save_last_run, LastRun};

/// Environment variable naming the type checker's interpreter
pub const PYTHON_ENV: &str = "TIDY_PYTHON";

/// tidy - lint, format, sort imports and type-check in one go
#[derive(Parser)]
#[command(name = "tidy")]
#[command(version)]
#[command(about = "Run ruff --fix, black, isort and mypy on a Python project")]
#[command(after_help = "\
EXAMPLES:
    tidy                        Run all four steps in the current directory
    tidy services/api           Run in another project directory
    tidy --fail-fast            Stop at the first failing step
    tidy --step types           Only type-check
    tidy --skip format          Everything except the formatter
    tidy --python .venv/bin/python
    tidy plan                   Print the commands without running them
    tidy status                 Show the last run for this project
    tidy init                   Create .tidy/tidy.yaml

INTERPRETER:
    --python, then $TIDY_PYTHON, then `python` in .tidy/tidy.yaml, then the
    dependency manager's environment, then .venv, then python3 on PATH.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Project directory (default: current directory)
    #[arg(global = true)]
    pub path: Option<PathBuf>,

    /// Config file (default: <project>/.tidy/tidy.yaml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Interpreter passed to the type checker
    #[arg(long, global = true)]
    pub python: Option<PathBuf>,

    /// Run wrapper, e.g. "poetry run" (empty string runs tools directly)
    #[arg(long, global = true)]
    pub wrapper: Option<String>,

    /// Type checker configuration file (default: mypy.ini)
    #[arg(long, global = true)]
    pub type_config: Option<PathBuf>,

    /// Stop after the first failing step
    #[arg(long, global = true, overrides_with = "no_fail_fast")]
    pub fail_fast: bool,

    /// Keep going after failures, even if the config says fail_fast
    #[arg(long, global = true, overrides_with = "fail_fast")]
    pub no_fail_fast: bool,

    /// Run only this step
    #[arg(long, value_enum)]
    pub step: Option<StepKind>,

    /// Skip a step (can be repeated)
    #[arg(long, value_enum)]
    pub skip: Vec<StepKind>,

    /// Per-step timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// No banners or summary
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Print each command before running it
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the commands that would run, in order
    Plan,

    /// Show the last run and resolved settings
    Status,

    /// Create .tidy/tidy.yaml
    Init,
}

/// Everything a run needs, after flags, env and config are merged
#[derive(Debug)]
pub struct Settings {
    pub project: PathBuf,
    pub config: ProjectConfig,
    pub wrapper: Vec<String>,
    pub python: Option<ResolvedPython>,
    pub type_config: PathBuf,
}

impl Settings {
    pub fn pipeline(&self) -> Pipeline {
        build_pipeline(
            self.wrapper.clone(),
            &self.type_config,
            self.python.as_ref().map(|p| p.path.as_path()),
        )
    }
}

/// Run the CLI, returning the process exit code
pub async fn run(cli: Cli) -> Result<i32> {
    let project = match cli.path.clone() {
        Some(p) => p,
        None => std::env::current_dir().context("Failed to read current directory")?,
    };

    if !project.is_dir() {
        bail!("Not a directory: {}", project.display());
    }

    let paths = Paths::new();

    match cli.command {
        Some(Commands::Init) => cmd_init(&project),
        Some(Commands::Plan) => {
            let settings = resolve_settings(&cli, project)?;
            cmd_plan(&settings, cli.json)
        }
        Some(Commands::Status) => {
            let settings = resolve_settings(&cli, project)?;
            cmd_status(&settings, cli.json, &paths)
        }
        None => {
            let settings = resolve_settings(&cli, project)?;
            cmd_run(&cli, &settings, &paths).await
        }
    }
}

/// Merge flags, environment and project config
pub fn resolve_settings(cli: &Cli, project: PathBuf) -> Result<Settings> {
    let config = load_project_config(&project, cli.config.as_deref())?;

    let wrapper = match (&cli.wrapper, &config.wrapper) {
        (Some(flag), _) => flag.split_whitespace().map(String::from).collect(),
        (None, Some(configured)) => configured.clone(),
        (None, None) => detect_wrapper(&project),
    };
    debug!(wrapper = %shell_join(&wrapper), "resolved wrapper");

    let hints = PythonHints {
        flag: cli.python.clone(),
        env: std::env::var_os(PYTHON_ENV),
        config: config.python.clone(),
    };
    let python = resolve_python(&project, &wrapper, hints);

    let type_config = cli
        .type_config
        .clone()
        .unwrap_or_else(|| config.type_config_or_default());
    if !project.join(&type_config).exists() {
        warn!(path = %type_config.display(), "type checker config not found");
    }

    Ok(Settings {
        project,
        config,
        wrapper,
        python,
        type_config,
    })
}

/// Combine run flags with config defaults
pub fn run_options(cli: &Cli, config: &ProjectConfig) -> Result<RunOptions> {
    let mut skip = cli.skip.clone();
    for name in &config.skip {
        match StepKind::from_name(name) {
            Some(kind) if !skip.contains(&kind) => skip.push(kind),
            Some(_) => {}
            None => bail!("Unknown step in config skip list: {}", name),
        }
    }

    Ok(RunOptions {
        fail_fast: !cli.no_fail_fast && (cli.fail_fast || config.fail_fast),
        only: cli.step,
        skip,
        timeout: cli.timeout.or(config.timeout),
        tool_stdout_to_stderr: cli.json,
        quiet: cli.quiet || cli.json,
        verbose: cli.verbose,
    })
}

/// Run the pipeline
async fn cmd_run(cli: &Cli, settings: &Settings, paths: &Paths) -> Result<i32> {
    let opts = run_options(cli, &settings.config)?;
    let pipeline = settings.pipeline();

    if cli.verbose && !cli.quiet && !cli.json {
        if let Some(python) = &settings.python {
            println!("Interpreter: {} ({})", python.path.display(), python.source.name());
        }
    }

    let result = run_pipeline(&pipeline, &settings.project, &opts, &mut std::io::stdout()).await?;

    if let Err(e) = save_last_run(paths, &LastRun::from_result(&settings.project, &result)) {
        warn!(error = %e, "could not record run");
    }

    if cli.json {
        print_json_result(&result);
    } else if !cli.quiet {
        print_summary(&result);
    }

    Ok(result.exit_code())
}

/// Print the resolved commands
fn cmd_plan(settings: &Settings, json: bool) -> Result<i32> {
    let pipeline = settings.pipeline();

    if json {
        let steps: Vec<_> = pipeline
            .steps
            .iter()
            .map(|s| {
                serde_json::json!({
                    "name": s.kind.name(),
                    "argv": pipeline.argv(s),
                })
            })
            .collect();

        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "project": settings.project.display().to_string(),
                "wrapper": pipeline.wrapper,
                "python": python_json(settings.python.as_ref()),
                "type_config": settings.type_config.display().to_string(),
                "steps": steps,
            }))?
        );
    } else {
        for (i, step) in pipeline.steps.iter().enumerate() {
            println!("{}. {:<8} {}", i + 1, step.kind.name(), shell_join(&pipeline.argv(step)));
        }
    }

    Ok(0)
}

/// Show resolved settings and the last run
fn cmd_status(settings: &Settings, json: bool, paths: &Paths) -> Result<i32> {
    let last = load_last_run(paths, &settings.project);
    let pyproject = settings.project.join("pyproject.toml").exists();
    let type_config_found = settings.project.join(&settings.type_config).exists();

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "project": settings.project.display().to_string(),
                "pyproject": pyproject,
                "wrapper": settings.wrapper,
                "python": python_json(settings.python.as_ref()),
                "type_config": settings.type_config.display().to_string(),
                "type_config_found": type_config_found,
                "config": settings.config,
                "last_run": last,
            }))?
        );
        return Ok(0);
    }

    println!("Tidy Status");
    println!("----------------------------");
    println!("Project: {}", settings.project.display());
    println!("pyproject.toml: {}", found(pyproject));
    println!("Wrapper: {}", display_wrapper(&settings.wrapper));
    match &settings.python {
        Some(p) => {
            println!("Interpreter: {} ({})", p.path.display(), p.source.name());
            if p.source.is_explicit() && !settings.project.join(&p.path).exists() {
                println!("  warning: interpreter not found, the types step will fail");
            }
        }
        None => println!("Interpreter: type checker default"),
    }
    println!(
        "Type config: {} ({})",
        settings.type_config.display(),
        found(type_config_found)
    );

    println!();
    match last {
        Some(run) => {
            println!("Last run: {}", run.timestamp);
            println!("Last exit: {} in {}", run.exit_code, format_duration(run.duration_ms));
            for step in &run.steps {
                if step.skipped {
                    println!("  - {} (skipped)", step.name);
                } else {
                    println!("  - {} exit {}", step.name, step.exit_code);
                }
            }
        }
        None => println!("Last run: never"),
    }

    Ok(0)
}

/// Create project config
fn cmd_init(path: &Path) -> Result<i32> {
    let config_file = Paths::project_config(path);

    if config_file.exists() {
        eprintln!("Config already exists: {}", config_file.display());
        return Ok(1);
    }

    if let Some(dir) = config_file.parent() {
        std::fs::create_dir_all(dir).context("Failed to create .tidy directory")?;
    }

    let wrapper = detect_wrapper(path);
    let content = format!(
        r#"# tidy configuration

# Run wrapper for every tool ([] runs them directly)
# wrapper: [{}]

# Interpreter for the type checker (default: auto-detect)
# python: .venv/bin/python

# Type checker config file
# type_config: mypy.ini

# Per-step timeout in seconds
# timeout: 300

# Stop at the first failing step
# fail_fast: false

# Steps to skip: lint, format, imports, types
# skip: []
"#,
        wrapper.join(", ")
    );

    std::fs::write(&config_file, content).context("Failed to write config file")?;

    println!("Created {}", config_file.display());

    Ok(0)
}

fn python_json(python: Option<&ResolvedPython>) -> serde_json::Value {
    match python {
        Some(p) => serde_json::json!({
            "path": p.path.display().to_string(),
            "source": p.source.name(),
        }),
        None => serde_json::Value::Null,
    }
}

fn display_wrapper(wrapper: &[String]) -> String {
    if wrapper.is_empty() {
        "(none)".to_string()
    } else {
        shell_join(wrapper)
    }
}

fn found(yes: bool) -> &'static str {
    if yes {
        "found"
    } else {
        "missing"
    }
}

/// Print JSON result
fn print_json_result(result: &RunResult) {
    let steps: Vec<_> = result
        .steps
        .iter()
        .map(|s| {
            serde_json::json!({
                "name": s.kind.name(),
                "exit_code": s.exit_code,
                "skipped": s.skipped,
                "duration_ms": s.duration_ms,
                "note": s.note,
            })
        })
        .collect();

    println!(
        "{}",
        serde_json::json!({
            "exit_code": result.exit_code(),
            "stopped_early": result.stopped_early,
            "duration_ms": result.duration_ms,
            "steps": steps
        })
    );
}

/// Print summary
fn print_summary(result: &RunResult) {
    println!("----------------------------");
    let duration_str = format_duration(result.duration_ms);
    let failures = result.failures();
    if failures == 0 {
        println!("Total: {} {} step(s) clean", duration_str, result.ran());
    } else if result.stopped_early {
        println!("Total: {} stopped after first failure", duration_str);
    } else {
        println!("Total: {} {} of {} step(s) failed", duration_str, failures, result.ran());
    }
}
