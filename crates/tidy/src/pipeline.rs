//! The fixed lint → format → imports → types pipeline

use clap::ValueEnum;
use std::path::Path;

/// A pipeline step
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StepKind {
    /// Linter with auto-fix
    Lint,
    /// Code formatter
    Format,
    /// Import sorter
    Imports,
    /// Static type checker
    Types,
}

impl StepKind {
    pub fn name(&self) -> &'static str {
        match self {
            StepKind::Lint => "lint",
            StepKind::Format => "format",
            StepKind::Imports => "imports",
            StepKind::Types => "types",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "lint" => Some(StepKind::Lint),
            "format" | "fmt" => Some(StepKind::Format),
            "imports" | "isort" => Some(StepKind::Imports),
            "types" | "typecheck" => Some(StepKind::Types),
            _ => None,
        }
    }

    /// Banner shown before the step runs
    pub fn title(&self) -> &'static str {
        match self {
            StepKind::Lint => "Linting and fixing",
            StepKind::Format => "Formatting",
            StepKind::Imports => "Sorting imports",
            StepKind::Types => "Type checking",
        }
    }

    /// Run order
    pub fn all() -> &'static [Self] {
        &[StepKind::Lint, StepKind::Format, StepKind::Imports, StepKind::Types]
    }
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One tool invocation
#[derive(Debug, Clone)]
pub struct Step {
    pub kind: StepKind,
    /// Tool program, resolved through the wrapper
    pub program: String,
    pub args: Vec<String>,
}

/// Steps plus the wrapper that prefixes each of them
#[derive(Debug, Clone)]
pub struct Pipeline {
    pub wrapper: Vec<String>,
    pub steps: Vec<Step>,
}

impl Pipeline {
    /// Full argv for a step, wrapper included
    pub fn argv(&self, step: &Step) -> Vec<String> {
        let mut argv = self.wrapper.clone();
        argv.push(step.program.clone());
        argv.extend(step.args.iter().cloned());
        argv
    }
}

/// Build the pipeline.
///
/// `python` is omitted from the type checker's arguments when unknown.
pub fn build_pipeline(wrapper: Vec<String>, type_config: &Path, python: Option<&Path>) -> Pipeline {
    let steps = StepKind::all()
        .iter()
        .map(|&kind| build_step(kind, type_config, python))
        .collect();

    Pipeline { wrapper, steps }
}

fn build_step(kind: StepKind, type_config: &Path, python: Option<&Path>) -> Step {
    let (program, args): (&str, Vec<String>) = match kind {
        StepKind::Lint => ("ruff", strings(&["check", "--fix", "."])),
        StepKind::Format => ("black", strings(&["--color", "."])),
        StepKind::Imports => ("isort", strings(&["."])),
        StepKind::Types => {
            let mut args = vec![
                "--config-file".to_string(),
                type_config.to_string_lossy().to_string(),
            ];
            if let Some(python) = python {
                args.push("--python-executable".to_string());
                args.push(python.to_string_lossy().to_string());
            }
            args.push(".".to_string());
            ("mypy", args)
        }
    };

    Step {
        kind,
        program: program.to_string(),
        args,
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn poetry() -> Vec<String> {
        vec!["poetry".to_string(), "run".to_string()]
    }

    #[test]
    fn test_steps_in_fixed_order() {
        let pipeline = build_pipeline(poetry(), Path::new("mypy.ini"), None);
        let kinds: Vec<_> = pipeline.steps.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![StepKind::Lint, StepKind::Format, StepKind::Imports, StepKind::Types]
        );
        let programs: Vec<_> = pipeline.steps.iter().map(|s| s.program.as_str()).collect();
        assert_eq!(programs, vec!["ruff", "black", "isort", "mypy"]);
    }

    #[test]
    fn test_argv_includes_wrapper() {
        let pipeline = build_pipeline(poetry(), Path::new("mypy.ini"), None);
        assert_eq!(
            pipeline.argv(&pipeline.steps[0]),
            vec!["poetry", "run", "ruff", "check", "--fix", "."]
        );
        assert_eq!(
            pipeline.argv(&pipeline.steps[1]),
            vec!["poetry", "run", "black", "--color", "."]
        );
        assert_eq!(pipeline.argv(&pipeline.steps[2]), vec!["poetry", "run", "isort", "."]);
    }

    #[test]
    fn test_type_check_uses_config_and_python() {
        let python = PathBuf::from("/venv/bin/python");
        let pipeline = build_pipeline(poetry(), Path::new("mypy.ini"), Some(&python));
        assert_eq!(
            pipeline.argv(&pipeline.steps[3]),
            vec![
                "poetry",
                "run",
                "mypy",
                "--config-file",
                "mypy.ini",
                "--python-executable",
                "/venv/bin/python",
                "."
            ]
        );
    }

    #[test]
    fn test_type_check_without_python() {
        let pipeline = build_pipeline(Vec::new(), Path::new("setup.cfg"), None);
        assert_eq!(
            pipeline.argv(&pipeline.steps[3]),
            vec!["mypy", "--config-file", "setup.cfg", "."]
        );
    }

    #[test]
    fn test_every_step_targets_project_dir() {
        let pipeline = build_pipeline(poetry(), Path::new("mypy.ini"), Some(Path::new("/py")));
        for step in &pipeline.steps {
            assert_eq!(step.args.last().map(String::as_str), Some("."), "{}", step.kind);
            assert!(!step.args.iter().any(|a| a == ".." || a.starts_with("../")));
        }
    }

    #[test]
    fn test_step_kind_from_name() {
        assert_eq!(StepKind::from_name("LINT"), Some(StepKind::Lint));
        assert_eq!(StepKind::from_name("isort"), Some(StepKind::Imports));
        assert_eq!(StepKind::from_name("typecheck"), Some(StepKind::Types));
        assert_eq!(StepKind::from_name("test"), None);
    }
}
