//! # Error Handling
//!
//! This module defines the centralized error type for the `module-tree`
//! engine. It uses the `thiserror` library to create a single `Error` enum
//! covering every failure mode of the engine, with enough context in each
//! variant to produce a useful message.
//!
//! ## Key Components
//!
//! - **`Error`**: The main enum. The variants map onto the failure kinds the
//!   engine distinguishes:
//!   - `UnsupportedHost`: the address's domain is not a known hosting provider.
//!   - `NotFound`: no metadata file exists at any candidate location.
//!   - `Network`: timeout or transport failure while fetching metadata.
//!   - `MalformedCache`: the hierarchy cache record could not be used.
//!   - `GitClone` / `GitCommand`: a download (clone or update) failed.
//!   - `Persistence`: a status write to a metadata file failed.
//!   - `InvalidRepositoryName` / `WorkingCopyConflict`: a download target
//!     would leave the project directory or clobber another module.
//!
//! - **`Result<T>`**: A type alias for `std::result::Result<T, Error>`.
//!
//! Failures inside a hierarchy are always local: the resolver records them on
//! the affected node instead of returning them, and the download coordinator
//! reports them per item. Only failures of the root address, cache I/O, and
//! status writes surface as `Err` values.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for module-tree operations
#[derive(Error, Debug)]
pub enum Error {
    /// The address does not belong to a supported hosting provider.
    #[error("Unsupported repository host: {address}")]
    UnsupportedHost { address: String },

    /// No metadata file was found at any candidate path, branch or filename.
    #[error("Module metadata not found for {address}")]
    NotFound { address: String },

    /// A timeout or transport-level failure while talking to a remote host.
    #[error("Network operation error: {url} - {message}")]
    Network { url: String, message: String },

    /// The hierarchy cache record has the wrong version or could not be parsed.
    #[error("Malformed hierarchy cache: {message}")]
    MalformedCache { message: String },

    /// An error occurred while cloning or updating a Git repository.
    ///
    /// Includes the repository URL, branch, error message, and an optional
    /// hint for resolution.
    #[error("Git clone error for {url}@{}: {message}{}", branch.as_deref().unwrap_or("default"), hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    GitClone {
        url: String,
        branch: Option<String>,
        message: String,
        /// Optional hint for how to resolve the clone issue
        hint: Option<String>,
    },

    /// An error occurred while executing a Git command in a working copy.
    #[error("Git command failed in {}: {command} - {stderr}", path.display())]
    GitCommand {
        command: String,
        path: PathBuf,
        stderr: String,
    },

    /// Writing a status field back to a metadata file failed.
    #[error("Failed to persist module status to {}: {message}", path.display())]
    Persistence { path: PathBuf, message: String },

    /// A downloaded module directory has no metadata file to update.
    #[error("No ModuleInfo.txt found in {}", module_dir.display())]
    MetadataFileMissing { module_dir: PathBuf },

    /// A module address was not present in the resolved hierarchy.
    #[error("Module not found in hierarchy: {address}")]
    ModuleNotFound { address: String },

    /// An address whose last segment cannot be used as a directory name.
    #[error("Invalid repository name '{name}' in address {address}")]
    InvalidRepositoryName { address: String, name: String },

    /// A working copy directory already holds a different repository.
    #[error("{} already holds a working copy of {found}, not {expected}", path.display())]
    WorkingCopyConflict {
        path: PathBuf,
        expected: String,
        found: String,
    },

    /// The settings file could not be read or understood.
    #[error("Configuration error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    Config {
        message: String,
        /// Optional hint for how to fix the configuration issue
        hint: Option<String>,
    },

    /// A background worker thread panicked before reporting its result.
    #[error("Background worker failed: {context}")]
    WorkerPanicked { context: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON error, wrapped from `serde_json::Error`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
