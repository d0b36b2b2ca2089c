//! On-disk layout of a project.
//!
//! ```text
//! <download_root>/
//!   <project>/
//!     hierarchy_cache.json
//!     <repository name>/      one working copy per downloaded module
//! ```
//!
//! The project name defaults to the repository name of the root address.

use std::path::{Path, PathBuf};

use crate::address;
use crate::hierarchy::RepositoryRef;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    project: String,
    project_dir: PathBuf,
}

impl Workspace {
    pub fn new(download_root: impl AsRef<Path>, project: &str) -> Self {
        Self {
            project: project.to_string(),
            project_dir: download_root.as_ref().join(project),
        }
    }

    /// Workspace for a root address, named after its repository unless
    /// `project` overrides it.
    pub fn for_root(download_root: impl AsRef<Path>, root_address: &str, project: Option<&str>) -> Self {
        let name = match project {
            Some(p) if !p.trim().is_empty() => p.trim().to_string(),
            _ => address::repository_name(&address::normalize(root_address).address),
        };
        Self::new(download_root, &name)
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// Working copy directory of a module.
    pub fn module_dir(&self, repository: &RepositoryRef) -> PathBuf {
        self.project_dir.join(&repository.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_root_uses_repository_name() {
        let ws = Workspace::for_root("/data", "https://github.com/u/rover.git/tree/dev", None);
        assert_eq!(ws.project_dir(), Path::new("/data/rover"));
        assert_eq!(ws.project(), "rover");
    }

    #[test]
    fn test_for_root_with_project_override() {
        let ws = Workspace::for_root("/data", "https://github.com/u/rover", Some("Rover 2"));
        assert_eq!(ws.project_dir(), Path::new("/data/Rover 2"));
        assert_eq!(ws.project(), "Rover 2");

        let ws = Workspace::for_root("/data", "https://github.com/u/rover", Some("  "));
        assert_eq!(ws.project_dir(), Path::new("/data/rover"));
    }

    #[test]
    fn test_module_dir() {
        let ws = Workspace::new("/data", "rover");
        let repo = RepositoryRef {
            name: "wheels".to_string(),
            address: "https://gitlab.com/g/wheels".to_string(),
            branch: None,
        };
        assert_eq!(ws.module_dir(&repo), PathBuf::from("/data/rover/wheels"));
    }
}
