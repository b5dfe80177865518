//! Project-level configuration stored in `.drover.toml` next to the code.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const PROJECT_FILE: &str = ".drover.toml";

/// Per-repository settings. The board name is the only required wiring; the
/// rest defaults from the CLI.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub board: Option<String>,
}

fn path_in(dir: &Path) -> PathBuf {
    dir.join(PROJECT_FILE)
}

/// Read the project config. A missing file is not an error — it yields the
/// default config, matching first-run behavior.
pub fn load(dir: &Path) -> Result<ProjectConfig> {
    let path = path_in(dir);
    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(ProjectConfig::default())
        }
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read {}", path.display()))
        }
    };
    toml::from_str(&contents).with_context(|| format!("failed to parse {}", path.display()))
}

pub fn save(dir: &Path, config: &ProjectConfig) -> Result<()> {
    let contents = toml::to_string_pretty(config).context("failed to serialize project config")?;
    std::fs::write(path_in(dir), contents)
        .with_context(|| format!("failed to write {}", path_in(dir).display()))
}

pub fn exists(dir: &Path) -> bool {
    path_in(dir).exists()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_default() {
        let dir = TempDir::new().unwrap();
        let config = load(dir.path()).unwrap();
        assert_eq!(config, ProjectConfig::default());
        assert!(!exists(dir.path()));
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let config = ProjectConfig {
            board: Some("Sprint Board".to_string()),
        };
        save(dir.path(), &config).unwrap();
        assert!(exists(dir.path()));
        assert_eq!(load(dir.path()).unwrap(), config);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(PROJECT_FILE), "board = [not toml").unwrap();
        assert!(load(dir.path()).is_err());
    }
}
