//! Shared test utilities for E2E tests.
//!
//! This module provides a fixture that owns a temporary download root and can
//! pre-populate it with a cached hierarchy and downloaded modules, so CLI
//! commands can be exercised without network access.
//!
//! ## Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let fixture = TestFixture::new().with_cached_rover();
//!     fixture.command().args(["tree", ROVER]).assert().success();
//! }
//! ```

use assert_fs::prelude::*;
use std::env;
use std::path::{Path, PathBuf};

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::fixtures::{ROVER, WHEELS};
    #[allow(unused_imports)]
    pub use super::should_skip_network_tests;
    pub use super::TestFixture;
}

/// Addresses and documents used by the fixtures.
#[allow(dead_code)]
pub mod fixtures {
    /// Root module of the cached fixture project.
    pub const ROVER: &str = "https://github.com/example/rover";

    /// The only submodule of `ROVER`.
    pub const WHEELS: &str = "https://github.com/example/wheels";

    /// Metadata file of a downloaded `wheels` module.
    pub const WHEELS_INFO: &str = "[Module Name] Wheels\r\n\
                                   [Module Info] Drive train\r\n\
                                   [Team/Assigned] None\r\n\
                                   [Completed] No\r\n";

    /// A hierarchy cache record for `ROVER` with one child.
    pub fn rover_cache() -> String {
        serde_json::json!({
            "version": 1,
            "cached_at": "2024-05-01T10:00:00Z",
            "initial_repo_url": ROVER,
            "modules": {
                "name": "Rover",
                "description": "Six-wheeled rover",
                "repository": { "name": "rover", "address": ROVER },
                "submodule_addresses": [WHEELS],
                "children": [{
                    "name": "Wheels",
                    "repository": { "name": "wheels", "address": WHEELS }
                }]
            }
        })
        .to_string()
    }
}

/// Check if network tests should be skipped.
///
/// Returns `true` if the `SKIP_NETWORK_TESTS` environment variable is set.
#[allow(dead_code)]
pub fn should_skip_network_tests() -> bool {
    env::var("SKIP_NETWORK_TESTS").is_ok()
}

/// A test fixture owning a temporary working directory and download root.
///
/// # Example
///
/// ```rust,ignore
/// let fixture = TestFixture::new()
///     .with_cached_rover()
///     .with_downloaded_module("rover", "wheels", fixtures::WHEELS_INFO);
///
/// fixture.command().args(["cache", "show", ROVER]).assert().success();
/// ```
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

#[allow(dead_code)]
impl TestFixture {
    /// Create a new test fixture with an empty temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Download root handed to the binary through `MODULE_TREE_ROOT`.
    pub fn download_root(&self) -> PathBuf {
        self.temp_dir.path().join("downloads")
    }

    /// Path of a project directory under the download root.
    pub fn project_dir(&self, project: &str) -> PathBuf {
        self.download_root().join(project)
    }

    /// Store the `rover` hierarchy as the cached hierarchy of project `rover`.
    pub fn with_cached_rover(self) -> Self {
        self.with_file("downloads/rover/hierarchy_cache.json", &fixtures::rover_cache())
    }

    /// Create a downloaded module with the given metadata file.
    pub fn with_downloaded_module(self, project: &str, repo: &str, info: &str) -> Self {
        let path = format!("downloads/{}/{}/lib/ModuleInfo.txt", project, repo);
        self.with_file(&path, info)
    }

    /// Add a `.module-tree.yaml` settings file in the working directory.
    pub fn with_settings(self, content: &str) -> Self {
        self.with_file(".module-tree.yaml", content)
    }

    /// Add a file with the given path and content.
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    /// Get the path to the temporary directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Create a child path in the temp directory.
    pub fn child(&self, path: &str) -> assert_fs::fixture::ChildPath {
        self.temp_dir.child(path)
    }

    /// Create a command running in this fixture with its download root and
    /// without colors or log noise.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("module-tree");
        cmd.current_dir(self.path())
            .env("MODULE_TREE_ROOT", self.download_root())
            .env("NO_COLOR", "1")
            .env_remove("RUST_LOG")
            .arg("--color")
            .arg("never");
        cmd
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_creates_temp_dir() {
        let fixture = TestFixture::new();
        assert!(fixture.path().exists());
    }

    #[test]
    fn test_cached_rover_is_valid_json() {
        let value: serde_json::Value = serde_json::from_str(&fixtures::rover_cache()).unwrap();
        assert_eq!(value["version"], 1);
        assert_eq!(value["modules"]["children"][0]["name"], "Wheels");
    }

    #[test]
    fn test_downloaded_module_layout() {
        let fixture = TestFixture::new().with_downloaded_module("rover", "wheels", "x");
        assert!(fixture
            .project_dir("rover")
            .join("wheels/lib/ModuleInfo.txt")
            .exists());
    }
}
