//! # Settings File
//!
//! This module defines the `Settings` structure read from `.module-tree.yaml`
//! (or the file named by `--config`). Every field is optional in the file;
//! missing fields take the values from `crate::defaults`.
//!
//! ```yaml
//! download_root: /srv/modules
//! fetch_timeout_secs: 20
//! resolve_concurrency: 8
//! ```
//!
//! Command-line flags and environment variables are applied on top of the
//! loaded settings by the CLI.

use std::path::{Path, PathBuf};
use std::time::Duration;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::error::{Error, Result};

/// Engine settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Directory holding one subdirectory per project.
    pub download_root: PathBuf,
    /// Per-attempt timeout for metadata requests.
    pub fetch_timeout_secs: u64,
    /// Maximum number of metadata requests in flight.
    pub resolve_concurrency: usize,
    pub user_agent: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            download_root: defaults::default_download_root(),
            fetch_timeout_secs: defaults::FETCH_TIMEOUT_SECS,
            resolve_concurrency: defaults::RESOLVE_CONCURRENCY,
            user_agent: defaults::USER_AGENT.to_string(),
        }
    }
}

impl Settings {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Check values that deserialize fine but cannot work.
    pub fn validate(&self) -> Result<()> {
        if self.fetch_timeout_secs == 0 {
            return Err(Error::Config {
                message: "fetch_timeout_secs must be greater than zero".to_string(),
                hint: Some("The default is 15 seconds".to_string()),
            });
        }
        if self.resolve_concurrency == 0 {
            return Err(Error::Config {
                message: "resolve_concurrency must be at least 1".to_string(),
                hint: None,
            });
        }
        if self.download_root.as_os_str().is_empty() {
            return Err(Error::Config {
                message: "download_root must not be empty".to_string(),
                hint: Some("Remove the key to use the platform data directory".to_string()),
            });
        }
        Ok(())
    }

    /// Load settings from `path`, or from `.module-tree.yaml` in the current
    /// directory when no path is given and that file exists.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => from_file(path),
            None => {
                let local = Path::new(defaults::CONFIG_FILENAME);
                if local.is_file() {
                    from_file(local)
                } else {
                    debug!("No {} found, using defaults", defaults::CONFIG_FILENAME);
                    Ok(Self::default())
                }
            }
        }
    }
}

/// Parses a YAML string into `Settings`.
///
/// An empty document yields the defaults.
pub fn parse(yaml_content: &str) -> Result<Settings> {
    if yaml_content.trim().is_empty() {
        return Ok(Settings::default());
    }
    let settings: Settings = serde_yaml::from_str(yaml_content)?;
    settings.validate()?;
    Ok(settings)
}

/// Parse settings from a YAML file path
pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| Error::Config {
        message: format!("cannot read {}: {}", path.display(), e),
        hint: None,
    })?;
    debug!("Loading settings from {}", path.display());
    parse(&content)
}
