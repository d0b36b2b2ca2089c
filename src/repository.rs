//! # Working Copy Management
//!
//! This module provides the seam between the download coordinator and the
//! system `git` command. Downloads go through the `GitOperations` trait so the
//! coordinator's ordering, cancellation and failure handling can be tested
//! with a mock that never touches the network.
//!
//! ## Key Components
//!
//! - **`GitOperations`**: clone a repository, update an existing working
//!   copy, and the combined `sync` that picks between the two.
//! - **`DefaultGitOperations`**: the implementation backed by `crate::git`.
//! - **`SyncAction`**: which of clone or update was performed.

use std::path::Path;

use crate::address;
use crate::error::{Error, Result};

/// What `GitOperations::sync` did to bring a working copy up to date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    Cloned,
    Updated,
}

impl std::fmt::Display for SyncAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncAction::Cloned => write!(f, "cloned"),
            SyncAction::Updated => write!(f, "updated"),
        }
    }
}

/// Trait for git operations - allows mocking in tests
pub trait GitOperations: Send + Sync {
    /// Clones `url` into `target_dir`, checking out `branch` when given.
    fn clone_repository(&self, url: &str, branch: Option<&str>, target_dir: &Path) -> Result<()>;

    /// Pulls the latest changes into an existing working copy.
    fn update_repository(&self, repo_dir: &Path, branch: Option<&str>) -> Result<()>;

    /// Whether `dir` already holds a working copy.
    fn is_repository(&self, dir: &Path) -> bool {
        dir.join(".git").exists()
    }

    /// The `origin` remote of a working copy, if it has one.
    fn remote_url(&self, _repo_dir: &Path) -> Result<Option<String>> {
        Ok(None)
    }

    /// Clones when the target has no working copy yet, otherwise updates it.
    ///
    /// A working copy whose `origin` is a different repository is left alone
    /// and reported as `WorkingCopyConflict`.
    fn sync(&self, url: &str, branch: Option<&str>, target_dir: &Path) -> Result<SyncAction> {
        if self.is_repository(target_dir) {
            if let Some(found) = self.remote_url(target_dir)? {
                if !address::same_repository(&found, url) {
                    return Err(Error::WorkingCopyConflict {
                        path: target_dir.to_path_buf(),
                        expected: url.to_string(),
                        found,
                    });
                }
            }
            self.update_repository(target_dir, branch)?;
            Ok(SyncAction::Updated)
        } else {
            self.clone_repository(url, branch, target_dir)?;
            Ok(SyncAction::Cloned)
        }
    }
}

/// The default implementation of `GitOperations`, which uses the system's
/// `git` command to perform real Git operations.
pub struct DefaultGitOperations;

impl GitOperations for DefaultGitOperations {
    fn clone_repository(&self, url: &str, branch: Option<&str>, target_dir: &Path) -> Result<()> {
        crate::git::clone_repository(url, branch, target_dir)
    }

    fn update_repository(&self, repo_dir: &Path, branch: Option<&str>) -> Result<()> {
        crate::git::update_repository(repo_dir, branch)
    }

    fn is_repository(&self, dir: &Path) -> bool {
        crate::git::is_repository(dir)
    }

    fn remote_url(&self, repo_dir: &Path) -> Result<Option<String>> {
        crate::git::remote_url(repo_dir)
    }
}
