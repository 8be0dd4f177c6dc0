//! `fam lint`: ruff configuration and invocation.
use std::fs;
use std::path::Path;

use tracing::{info, warn};

use super::process::{self, CommandOutput, CommandSpec};
use crate::config::Config;
use crate::error::{FamError, Result};

const PYPROJECT: &str = "pyproject.toml";

/// `[tool.ruff]` written when a project has none.
const RUFF_CONFIG: &str = r#"
line-length = 88
exclude = [".git", "__pycache__", ".venv", "venv", "env", "alembic/versions"]

[lint]
select = ["E", "W", "F", "I", "B", "C4", "UP", "N", "RUF"]
ignore = ["E501", "B008"]

[lint.per-file-ignores]
"__init__.py" = ["F401"]

[lint.isort]
known-first-party = ["app"]

[format]
quote-style = "double"
indent-style = "space"
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LintMode {
    /// Report problems only.
    Check,
    /// Apply safe fixes.
    Fix,
    /// Format only.
    Format,
    /// Fix, then format.
    All,
    /// Check, then format.
    #[default]
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintStep {
    pub command: CommandSpec,
    /// A non-zero exit is only warned about.
    pub tolerate_failure: bool,
}

impl LintStep {
    fn strict(command: CommandSpec) -> Self {
        Self {
            command,
            tolerate_failure: false,
        }
    }
}

/// Steps a mode runs, in order.
pub fn steps(mode: LintMode, config: &Config) -> Vec<LintStep> {
    let ruff = config.formatter.as_str();
    let check = CommandSpec::new(ruff, &["check"]);
    let fix = CommandSpec::new(ruff, &["check", "--fix"]);
    let format = CommandSpec::new(ruff, &["format"]);
    match mode {
        LintMode::Check => vec![LintStep::strict(check)],
        LintMode::Fix => vec![LintStep::strict(fix)],
        LintMode::Format => vec![LintStep::strict(format)],
        // Unfixable findings must not keep the formatter from running.
        LintMode::All => vec![
            LintStep {
                command: fix,
                tolerate_failure: true,
            },
            LintStep::strict(format),
        ],
        LintMode::Default => vec![LintStep::strict(check), LintStep::strict(format)],
    }
}

/// Add a `[tool.ruff]` section to `pyproject.toml`, creating the file if
/// needed. Other sections are preserved; an existing ruff section is never
/// replaced. Returns whether the file changed.
pub fn ensure_ruff_config(project: &Path) -> Result<bool> {
    let path = project.join(PYPROJECT);
    let mut doc = if path.exists() {
        let text = fs::read_to_string(&path).map_err(|e| FamError::io(&path, e))?;
        text.parse::<toml::Table>()
            .map_err(|e| FamError::Config(format!("invalid TOML in {}: {e}", path.display())))?
    } else {
        toml::Table::new()
    };

    let tool = doc
        .entry("tool")
        .or_insert_with(|| toml::Value::Table(toml::Table::new()));
    let Some(tool) = tool.as_table_mut() else {
        return Err(FamError::Config(format!("`tool` in {} is not a table", path.display())));
    };
    if tool.contains_key("ruff") {
        return Ok(false);
    }

    let ruff = RUFF_CONFIG
        .parse::<toml::Table>()
        .map_err(|e| FamError::Config(format!("built-in ruff config: {e}")))?;
    tool.insert("ruff".to_string(), toml::Value::Table(ruff));

    let text = toml::to_string_pretty(&doc)
        .map_err(|e| FamError::Config(format!("failed to serialize {}: {e}", path.display())))?;
    fs::write(&path, text).map_err(|e| FamError::io(&path, e))?;
    info!("Added [tool.ruff] to {}", path.display());
    Ok(true)
}

/// Run every step of `mode`, relaying each output. All steps run even if one
/// fails; the first failure of a strict step is returned at the end.
pub fn run_lint(
    project: &Path,
    config: &Config,
    mode: LintMode,
    relay: &mut dyn FnMut(&CommandSpec, &CommandOutput),
) -> Result<()> {
    ensure_ruff_config(project)?;

    let mut first_failure = None;
    for step in steps(mode, config) {
        let output = process::run(&step.command, project)?;
        relay(&step.command, &output);
        match output.into_result(&step.command) {
            Ok(_) => {}
            Err(e) if step.tolerate_failure => warn!("{e}, continuing"),
            Err(e) => {
                warn!("{e}");
                first_failure.get_or_insert(e);
            }
        }
    }

    match first_failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_commands() {
        let config = Config::default();
        let render = |mode| {
            steps(mode, &config)
                .iter()
                .map(|s| s.command.to_string())
                .collect::<Vec<_>>()
        };
        assert_eq!(render(LintMode::Check), ["ruff check"]);
        assert_eq!(render(LintMode::All), ["ruff check --fix", "ruff format"]);
        assert_eq!(render(LintMode::Default), ["ruff check", "ruff format"]);

        let all = steps(LintMode::All, &config);
        assert!(all[0].tolerate_failure);
        assert!(!all[1].tolerate_failure);
        assert!(steps(LintMode::Check, &config).iter().all(|s| !s.tolerate_failure));
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_check_still_formats() {
        let dir = tempfile::tempdir().unwrap();
        // `false check` fails, `false format` fails too; both must run.
        let config = Config {
            formatter: "false".into(),
            ..Config::default()
        };
        let mut seen = Vec::new();
        let err = run_lint(dir.path(), &config, LintMode::Default, &mut |spec, _| {
            seen.push(spec.to_string())
        })
        .unwrap_err();
        assert!(matches!(err, FamError::Subprocess { ref command, .. } if command == "false check"));
        assert_eq!(seen, ["false check", "false format"]);
        assert!(dir.path().join(PYPROJECT).is_file());
    }

    #[test]
    fn test_ruff_section_merged_into_existing_pyproject() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PYPROJECT);
        fs::write(&path, "[project]\nname = \"demo\"\n\n[tool.pytest]\naddopts = \"-q\"\n").unwrap();

        assert!(ensure_ruff_config(dir.path()).unwrap());
        let doc: toml::Table = fs::read_to_string(&path).unwrap().parse().unwrap();
        assert_eq!(doc["project"]["name"].as_str(), Some("demo"));
        assert_eq!(doc["tool"]["pytest"]["addopts"].as_str(), Some("-q"));
        assert_eq!(doc["tool"]["ruff"]["line-length"].as_integer(), Some(88));

        assert!(!ensure_ruff_config(dir.path()).unwrap());
    }

    #[test]
    fn test_existing_ruff_section_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PYPROJECT);
        let original = "[tool.ruff]\nline-length = 120\n";
        fs::write(&path, original).unwrap();
        assert!(!ensure_ruff_config(dir.path()).unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), original);
    }

    #[test]
    fn test_invalid_pyproject() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(PYPROJECT), "[tool\n").unwrap();
        assert!(matches!(ensure_ruff_config(dir.path()), Err(FamError::Config(_))));
    }
}
