//! # Module Tree Library
//!
//! This library resolves and synchronizes hierarchies of modules, where each
//! module is a Git repository describing itself in a small bracketed
//! `lib/ModuleInfo.txt` file that may point at further submodule
//! repositories. It is used by the `module-tree` command-line tool but can
//! be embedded in other front ends, which only need the `engine::Engine`
//! facade and the observer traits.
//!
//! ## Quick Example
//!
//! ```
//! use module_tree::address;
//! use module_tree::metadata::{CompletionStatus, ModuleRecord};
//!
//! let record = ModuleRecord::parse(
//!     "[Module Name] Frame\n\
//!      [Module Address] https://github.com/org/wheels/tree/dev\n\
//!      [Completed] In progress\n",
//! );
//! assert_eq!(record.name.as_deref(), Some("Frame"));
//! assert_eq!(record.completed, Some(CompletionStatus::InProgress));
//!
//! let child = address::normalize(&record.submodule_addresses[0]);
//! assert_eq!(child.address, "https://github.com/org/wheels");
//! assert_eq!(child.branch.as_deref(), Some("dev"));
//! ```
//!
//! ## Core Concepts
//!
//! - **Metadata (`metadata`)**: Parsing, serializing and patching of
//!   `ModuleInfo.txt` documents.
//! - **Addresses (`address`)**: Cleaning of hand-edited repository addresses
//!   and provider detection.
//! - **Fetching (`fetcher`)**: Retrieval of a single metadata file from a
//!   provider's raw-file endpoint.
//! - **Hierarchy (`hierarchy`, `resolver`, `cache`)**: The resolved module
//!   tree, how it is built, and how it is stored between runs.
//! - **Downloads (`download`, `repository`, `git`)**: Cloning and updating
//!   working copies one at a time with progress and cancellation.
//! - **Status (`status`)**: Writing assignment, completion and deployment
//!   fields back into downloaded modules.
//!
//! ## Execution Flow
//!
//! 1.  **Open**: Load the cached hierarchy for the root address, or resolve it
//!     from the remote hosts and cache it.
//! 2.  **Download**: Queue one module or a subtree and materialize it under
//!     the project directory.
//! 3.  **Track**: Record who works on a module and how far along it is.

pub mod address;
pub mod cache;
pub mod config;
pub mod defaults;
pub mod download;
pub mod engine;
pub mod error;
pub mod fetcher;
pub mod git;
pub mod hierarchy;
pub mod metadata;
pub mod output;
pub mod repository;
pub mod resolver;
pub mod status;
pub mod workspace;
