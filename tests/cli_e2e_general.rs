//! End-to-end tests for global flags, settings and exit codes.
//!
//! - Exit code 0: Success
//! - Exit code 1: Runtime error (settings, resolution, status writes)
//! - Exit code 2: Invalid command-line usage (handled by clap)

mod common;
use common::prelude::*;

#[test]
fn test_help_lists_commands() {
    let mut cmd = cargo_bin_cmd!("module-tree");
    cmd.arg("--help")
        .assert()
        .code(0)
        .stdout(predicate::str::contains("tree"))
        .stdout(predicate::str::contains("refresh"))
        .stdout(predicate::str::contains("download"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("cache"));
}

#[test]
fn test_version() {
    let mut cmd = cargo_bin_cmd!("module-tree");
    cmd.arg("--version")
        .assert()
        .code(0)
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_unknown_subcommand_is_usage_error() {
    let mut cmd = cargo_bin_cmd!("module-tree");
    cmd.arg("frobnicate").assert().code(2);
}

#[test]
fn test_invalid_config_file() {
    let fixture = TestFixture::new().with_file("broken.yaml", "resolve_concurrency: 0\n");

    fixture
        .command()
        .args(["--config", "broken.yaml", "cache", "show", ROVER])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Failed to load settings"))
        .stderr(predicate::str::contains("resolve_concurrency must be at least 1"));
}

#[test]
fn test_unknown_settings_key_is_rejected() {
    let fixture = TestFixture::new().with_settings("colour: always\n");

    fixture
        .command()
        .args(["cache", "show", ROVER])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Failed to load settings"));
}

#[test]
fn test_missing_config_file() {
    let fixture = TestFixture::new();

    fixture
        .command()
        .args(["--config", "nonexistent.yaml", "cache", "show", ROVER])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Failed to load settings"));
}

#[test]
fn test_settings_download_root_is_used() {
    let fixture = TestFixture::new()
        .with_settings("download_root: projects\n")
        .with_file(
            "projects/rover/hierarchy_cache.json",
            &common::fixtures::rover_cache(),
        );

    fixture
        .command()
        .env_remove("MODULE_TREE_ROOT")
        .args(["cache", "show", ROVER])
        .assert()
        .success()
        .stdout(predicate::str::contains("Modules:     2"));
}

#[test]
fn test_download_root_flag_overrides_settings() {
    let fixture = TestFixture::new()
        .with_settings("download_root: projects\n")
        .with_file(
            "elsewhere/rover/hierarchy_cache.json",
            &common::fixtures::rover_cache(),
        );

    fixture
        .command()
        .args(["--download-root", "elsewhere", "cache", "show", ROVER])
        .assert()
        .success()
        .stdout(predicate::str::contains("Modules:     2"));
}

#[test]
fn test_log_level_info_writes_to_stderr() {
    let fixture = TestFixture::new().with_cached_rover();

    fixture
        .command()
        .args(["--log-level", "info", "tree", ROVER])
        .assert()
        .success()
        .stderr(predicate::str::contains("Loaded 2 modules from cache"));
}
