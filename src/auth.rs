//! Credential storage for external services.
//!
//! Credentials live in a single JSON file under the state directory, keyed
//! by service name. The file is created user-readable only.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

type ServiceCredentials = HashMap<String, String>;

pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the credentials for one service. Missing file or missing service
    /// both mean "not logged in".
    pub fn load(&self, service: &str) -> Result<ServiceCredentials> {
        let all = self.read_all()?;
        match all.get(service) {
            Some(creds) => Ok(creds.clone()),
            None => bail!("not logged in to {service}"),
        }
    }

    /// Store (or replace) the credentials for one service.
    pub fn save(&self, service: &str, credentials: ServiceCredentials) -> Result<()> {
        let mut all = self.read_all().unwrap_or_default();
        all.insert(service.to_string(), credentials);

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).context("failed to create state directory")?;
        }
        let contents =
            serde_json::to_string_pretty(&all).context("failed to serialize credentials")?;
        std::fs::write(&self.path, contents)
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        restrict_permissions(&self.path)?;
        Ok(())
    }

    pub fn services(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .read_all()
            .unwrap_or_default()
            .into_keys()
            .collect();
        names.sort();
        names
    }

    fn read_all(&self) -> Result<HashMap<String, ServiceCredentials>> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(HashMap::new())
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read {}", self.path.display()))
            }
        };
        serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse {}", self.path.display()))
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .context("failed to restrict credential file permissions")
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}
