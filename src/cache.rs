//! On-disk caching of resolved hierarchies
//!
//! Resolving a large hierarchy costs one or more HTTP requests per module, so
//! the last resolved tree is stored as JSON next to the downloaded modules and
//! reused on the next start. A record that cannot be used (missing, from an
//! older format version, unparseable, or for a different root) is a cache
//! miss and never an error.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::address;
use crate::error::{Error, Result};
use crate::hierarchy::{ModuleNode, ModuleTree};

/// Format version written into every record.
pub const CACHE_VERSION: u32 = 1;

/// Filename of the record inside a project directory.
pub const CACHE_FILENAME: &str = "hierarchy_cache.json";

/// Serialized form of a cached hierarchy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheRecord {
    pub version: u32,
    pub cached_at: DateTime<Utc>,
    pub initial_repo_url: String,
    pub modules: ModuleNode,
}

/// Summary of a stored record for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheInfo {
    pub path: PathBuf,
    pub cached_at: DateTime<Utc>,
    pub initial_repo_url: String,
    pub module_count: usize,
}

/// Hierarchy cache for one project directory
#[derive(Debug, Clone)]
pub struct HierarchyCache {
    path: PathBuf,
}

impl HierarchyCache {
    /// Create a cache storing its record in `project_dir`
    pub fn new(project_dir: impl AsRef<Path>) -> Self {
        Self {
            path: project_dir.as_ref().join(CACHE_FILENAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Store `tree` as the cached hierarchy for `root_address`
    pub fn save(&self, root_address: &str, tree: &ModuleTree) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let record = CacheRecord {
            version: CACHE_VERSION,
            cached_at: Utc::now(),
            initial_repo_url: address::normalize(root_address).address,
            modules: tree.root().clone(),
        };
        let json = serde_json::to_string_pretty(&record)?;
        fs::write(&self.path, json)?;
        debug!("Saved {} modules to {}", tree.len(), self.path.display());
        Ok(())
    }

    /// Load the cached hierarchy for `root_address`, if a usable one exists
    pub fn load(&self, root_address: &str) -> Option<ModuleTree> {
        let record = match self.read_record() {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!("No hierarchy cache at {}", self.path.display());
                return None;
            }
            Err(e) => {
                warn!("Ignoring hierarchy cache: {}", e);
                return None;
            }
        };

        let requested = address::normalize(root_address).address;
        if record.initial_repo_url != requested {
            debug!(
                "Hierarchy cache is for {}, not {}",
                record.initial_repo_url, requested
            );
            return None;
        }

        Some(ModuleTree::new(record.modules))
    }

    /// Delete the stored record. A missing record is not an error.
    pub fn invalidate(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!("Removed {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Describe the stored record, or `None` when nothing usable is cached
    pub fn info(&self) -> Option<CacheInfo> {
        let record = self.read_record().ok().flatten()?;
        Some(CacheInfo {
            path: self.path.clone(),
            cached_at: record.cached_at,
            initial_repo_url: record.initial_repo_url,
            module_count: record.modules.count(),
        })
    }

    fn read_record(&self) -> Result<Option<CacheRecord>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        // Check the version before the shape so old records give a clear reason
        let value: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| Error::MalformedCache {
                message: e.to_string(),
            })?;
        let version = value.get("version").and_then(|v| v.as_u64());
        if version != Some(u64::from(CACHE_VERSION)) {
            return Err(Error::MalformedCache {
                message: format!(
                    "unsupported version {:?} (expected {})",
                    version, CACHE_VERSION
                ),
            });
        }

        let record = serde_json::from_value(value).map_err(|e| Error::MalformedCache {
            message: e.to_string(),
        })?;
        Ok(Some(record))
    }
}
