//! Default values for module-tree configuration.
//!
//! This module provides centralized default values used by the settings file
//! and the CLI, ensuring consistency and avoiding duplication.

use std::path::PathBuf;

/// Settings file picked up from the current directory when `--config` is not given.
pub const CONFIG_FILENAME: &str = ".module-tree.yaml";

/// Per-attempt timeout for metadata requests, in seconds.
pub const FETCH_TIMEOUT_SECS: u64 = 15;

/// Maximum number of metadata requests in flight during resolution.
pub const RESOLVE_CONCURRENCY: usize = 4;

/// User agent sent with metadata requests.
pub const USER_AGENT: &str = concat!("module-tree/", env!("CARGO_PKG_VERSION"));

/// Returns the default download root directory.
///
/// Uses the platform-appropriate data directory:
/// - Linux: `~/.local/share/module-tree` (XDG Base Directory)
/// - macOS: `~/Library/Application Support/module-tree`
/// - Windows: `{FOLDERID_RoamingAppData}\module-tree`
///
/// Falls back to `Downloaded Repositories` in the current directory if the
/// platform data directory cannot be determined.
///
/// This can be overridden by the `--download-root` CLI flag or the
/// `MODULE_TREE_ROOT` environment variable.
pub fn default_download_root() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("module-tree"))
        .unwrap_or_else(|| PathBuf::from("Downloaded Repositories"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_download_root_returns_path() {
        let root = default_download_root();
        assert!(
            root.ends_with("module-tree") || root.ends_with("Downloaded Repositories"),
            "unexpected default root: {:?}",
            root
        );
    }

    #[test]
    fn test_default_download_root_is_absolute_or_fallback() {
        let root = default_download_root();
        // Either absolute (normal case) or relative fallback
        assert!(
            root.is_absolute() || root.starts_with("Downloaded Repositories"),
            "Expected absolute path or fallback, got: {:?}",
            root
        );
    }

    #[test]
    fn test_user_agent_names_the_tool() {
        assert!(USER_AGENT.starts_with("module-tree/"));
    }
}
