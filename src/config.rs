//! Runtime configuration for the drover binary.
//!
//! Bridges CLI flags, the project file, and environment overrides into the
//! concrete paths and commands the runner uses.

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::runner::executor;

/// Resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Repository the runner operates in.
    pub work_dir: PathBuf,
    /// Root for persisted state (credentials, per-card logs).
    pub state_dir: PathBuf,
    /// Command used to invoke the agent; `DROVER_AGENT_CMD` overrides the
    /// default so tests and wrappers can substitute their own binary.
    pub agent_command: String,
    pub agent_args: Vec<String>,
}

impl Config {
    pub fn load(work_dir: Option<PathBuf>) -> Result<Self> {
        let work_dir = match work_dir {
            Some(dir) => dir,
            None => std::env::current_dir().context("failed to get working directory")?,
        };
        let work_dir = work_dir
            .canonicalize()
            .context("failed to resolve working directory")?;

        Ok(Self {
            work_dir,
            state_dir: default_state_dir()?,
            agent_command: std::env::var("DROVER_AGENT_CMD")
                .unwrap_or_else(|_| executor::AGENT_COMMAND.to_string()),
            agent_args: executor::default_agent_args(),
        })
    }

    pub fn log_dir(&self) -> PathBuf {
        self.state_dir.join("logs")
    }

    pub fn credentials_path(&self) -> PathBuf {
        self.state_dir.join("credentials.json")
    }

    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.state_dir).context("failed to create state directory")?;
        std::fs::create_dir_all(self.log_dir()).context("failed to create log directory")?;
        Ok(())
    }
}

fn default_state_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("DROVER_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".config").join("drover"))
}
