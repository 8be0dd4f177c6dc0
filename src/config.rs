/// Configuration module for fastapi-maker.
///
/// Handles loading, validating, and providing default configuration values.
/// The file lives at the project root as `fam.json`; every field is optional.
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{FamError, Result};

pub const DEFAULT_CONFIG_FILE: &str = "fam.json";

// ── Default value functions ──────────────────────────────────────────

fn default_entities_root() -> String {
    "app/api".to_string()
}

fn default_import_root() -> String {
    "app.api".to_string()
}

fn default_shared_models_dir() -> String {
    "app/api/shared/models".to_string()
}

fn default_python() -> String {
    "python".to_string()
}

fn default_formatter() -> String {
    "ruff".to_string()
}

// ── Config struct ────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    /// Directory holding one sub-directory per entity.
    #[serde(default = "default_entities_root")]
    pub entities_root: String,

    /// Python import path of `entities_root`.
    #[serde(default = "default_import_root")]
    pub import_root: String,

    /// Where many-to-many association tables are written.
    #[serde(default = "default_shared_models_dir")]
    pub shared_models_dir: String,

    /// Interpreter used to run `-m alembic`.
    #[serde(default = "default_python")]
    pub python: String,

    #[serde(default = "default_formatter")]
    pub formatter: String,

    /// Abort every write of a relationship plan if any anchor is missing.
    #[serde(default)]
    pub atomic_relations: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            entities_root: default_entities_root(),
            import_root: default_import_root(),
            shared_models_dir: default_shared_models_dir(),
            python: default_python(),
            formatter: default_formatter(),
            atomic_relations: false,
        }
    }
}

// ── Config implementation ────────────────────────────────────────────

impl Config {
    /// Load configuration from a JSON file.
    ///
    /// A missing file yields the defaults. Unknown keys are ignored; a file
    /// that is not valid JSON is reported rather than silently replaced,
    /// since the project layout depends on it.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("{} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let data = std::fs::read_to_string(path).map_err(|e| FamError::io(path, e))?;
        let cfg: Config = serde_json::from_str(&data)
            .map_err(|e| FamError::Config(format!("invalid JSON in {}: {e}", path.display())))?;

        info!("Loaded configuration from {}", path.display());
        cfg.validate()?;
        Ok(cfg)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_string_pretty(self)
            .map_err(|e| FamError::Config(format!("failed to serialize config: {e}")))?;
        std::fs::write(path, data + "\n").map_err(|e| FamError::io(path, e))
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.entities_root.trim().is_empty() {
            return Err(FamError::Config("entities_root must not be empty".into()));
        }
        if self.import_root.trim().is_empty() || self.import_root.contains('/') {
            return Err(FamError::Config(
                "import_root must be a dotted Python module path".into(),
            ));
        }
        if self.python.trim().is_empty() {
            return Err(FamError::Config("python must not be empty".into()));
        }
        if self.formatter.trim().is_empty() {
            return Err(FamError::Config("formatter must not be empty".into()));
        }
        Ok(())
    }

    /// Absolute entities root for a project directory.
    #[must_use]
    pub fn entities_dir(&self, project: &Path) -> PathBuf {
        project.join(&self.entities_root)
    }

    #[must_use]
    pub fn shared_models_path(&self, project: &Path) -> PathBuf {
        project.join(&self.shared_models_dir)
    }

    /// Python module path of the shared models directory, e.g.
    /// `app.api.shared.models`.
    #[must_use]
    pub fn shared_models_module(&self) -> String {
        self.shared_models_dir
            .trim_matches(['/', '\\'])
            .replace(['/', '\\'], ".")
    }

    /// Interpreter used for subprocesses. A `python` left at its default is
    /// replaced by the interpreter of a project virtualenv (`.venv`, `venv`
    /// or `env`) when one exists.
    #[must_use]
    pub fn python_for(&self, project: &Path) -> String {
        if self.python != default_python() {
            return self.python.clone();
        }
        let exe = if cfg!(windows) { "Scripts/python.exe" } else { "bin/python" };
        for venv in [".venv", "venv", "env"] {
            let candidate = project.join(venv).join(exe);
            if candidate.is_file() {
                debug!("Using virtualenv interpreter {}", candidate.display());
                return candidate.to_string_lossy().into_owned();
            }
        }
        self.python.clone()
    }

    /// Resolve the config path: explicit flag wins, otherwise `fam.json` in
    /// the project directory.
    #[must_use]
    pub fn resolve_path(project: &Path, explicit: Option<&Path>) -> PathBuf {
        match explicit {
            Some(p) => p.to_path_buf(),
            None => project.join(DEFAULT_CONFIG_FILE),
        }
    }

    /// Load, falling back to defaults with a warning when the file is broken.
    ///
    /// Used by commands that only need the subprocess settings.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!("{e}");
                warn!("Using default configuration");
                Self::default()
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.entities_root, "app/api");
        assert_eq!(config.import_root, "app.api");
        assert_eq!(config.python, "python");
        assert_eq!(config.formatter, "ruff");
        assert!(!config.atomic_relations);
    }

    #[test]
    fn test_load_from_json() {
        let json = r#"{"entities_root": "src/entities", "atomic_relations": true}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.entities_root, "src/entities");
        assert!(config.atomic_relations);
        // Other fields should have defaults
        assert_eq!(config.import_root, "app.api");
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("fam.json")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_invalid_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fam.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(Config::load(&path), Err(FamError::Config(_))));
        assert_eq!(Config::load_or_default(&path), Config::default());
    }

    #[test]
    fn test_validate_rejects_slash_import_root() {
        let config = Config {
            import_root: "app/api".into(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_shared_models_module() {
        let config = Config::default();
        assert_eq!(config.shared_models_module(), "app.api.shared.models");
    }

    #[test]
    fn test_python_prefers_project_virtualenv() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        assert_eq!(config.python_for(dir.path()), "python");

        let exe = if cfg!(windows) { "Scripts/python.exe" } else { "bin/python" };
        let venv_python = dir.path().join("venv").join(exe);
        std::fs::create_dir_all(venv_python.parent().unwrap()).unwrap();
        std::fs::write(&venv_python, "").unwrap();
        assert_eq!(config.python_for(dir.path()), venv_python.to_string_lossy());

        // `.venv` is looked at first.
        let dot_venv_python = dir.path().join(".venv").join(exe);
        std::fs::create_dir_all(dot_venv_python.parent().unwrap()).unwrap();
        std::fs::write(&dot_venv_python, "").unwrap();
        assert_eq!(config.python_for(dir.path()), dot_venv_python.to_string_lossy());

        let explicit = Config {
            python: "python3.12".into(),
            ..Config::default()
        };
        assert_eq!(explicit.python_for(dir.path()), "python3.12");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fam.json");
        let config = Config {
            python: ".venv/bin/python".into(),
            ..Config::default()
        };
        config.save(&path).unwrap();
        assert_eq!(Config::load(&path).unwrap(), config);
    }
}
