//! Running external tools with captured output.
use std::fmt;
use std::io;
use std::path::Path;
use std::process::Command;

use tracing::debug;

use crate::error::{FamError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.contains(' ') {
                write!(f, " \"{arg}\"")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    /// Exit code, or a description when the process was killed by a signal.
    pub status: String,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Turn an unsuccessful run into a `Subprocess` error carrying its output.
    pub fn into_result(self, spec: &CommandSpec) -> Result<Self> {
        if self.success {
            return Ok(self);
        }
        Err(FamError::Subprocess {
            command: spec.to_string(),
            status: self.status,
            stdout: self.stdout,
            stderr: self.stderr,
        })
    }
}

/// Run `spec` in `cwd`, waiting for it and capturing both streams.
pub fn run(spec: &CommandSpec, cwd: &Path) -> Result<CommandOutput> {
    debug!("Running `{spec}` in {}", cwd.display());
    let output = Command::new(&spec.program)
        .args(&spec.args)
        .current_dir(cwd)
        .output()
        .map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => FamError::ToolNotFound(spec.program.clone()),
            _ => FamError::io(cwd, e),
        })?;

    let status = match output.status.code() {
        Some(code) => format!("exit code {code}"),
        None => "termination by signal".to_string(),
    };
    debug!("`{spec}` finished with {status}");

    Ok(CommandOutput {
        success: output.status.success(),
        status,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}
