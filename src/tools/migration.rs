//! `fam migrate`: alembic autogenerate followed by upgrade.
use std::path::Path;

use tracing::info;

use super::process::{self, CommandOutput, CommandSpec};
use crate::config::Config;
use crate::error::Result;

pub fn revision_command(python: &str, message: Option<&str>) -> CommandSpec {
    let spec = CommandSpec::new(python, &["-m", "alembic", "revision", "--autogenerate"]);
    match message {
        Some(msg) if !msg.trim().is_empty() => spec.arg("-m").arg(msg),
        _ => spec,
    }
}

pub fn upgrade_command(python: &str) -> CommandSpec {
    CommandSpec::new(python, &["-m", "alembic", "upgrade", "head"])
}

/// Generate a revision, then upgrade to head. `relay` sees each command's
/// output as soon as it finishes, failed or not; the first failure stops
/// the sequence. The interpreter comes from [`Config::python_for`].
pub fn run_migrations(
    project: &Path,
    config: &Config,
    message: Option<&str>,
    relay: &mut dyn FnMut(&CommandSpec, &CommandOutput),
) -> Result<()> {
    let python = config.python_for(project);
    for spec in [revision_command(&python, message), upgrade_command(&python)] {
        let output = process::run(&spec, project)?;
        relay(&spec, &output);
        output.into_result(&spec)?;
    }
    info!("Migrations applied");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FamError;

    #[test]
    fn test_commands() {
        assert_eq!(
            revision_command("python", Some("add books")).to_string(),
            "python -m alembic revision --autogenerate -m \"add books\""
        );
        assert_eq!(
            revision_command("python", None).to_string(),
            "python -m alembic revision --autogenerate"
        );
        assert_eq!(upgrade_command("python").to_string(), "python -m alembic upgrade head");
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_revision_stops_before_upgrade() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            python: "false".into(),
            ..Config::default()
        };
        let mut seen = Vec::new();
        let err = run_migrations(dir.path(), &config, None, &mut |spec, _| seen.push(spec.to_string()))
            .unwrap_err();
        assert!(matches!(err, FamError::Subprocess { .. }));
        assert_eq!(seen, ["false -m alembic revision --autogenerate"]);
    }
}
