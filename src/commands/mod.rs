//! # CLI Command Implementations
//!
//! This module contains the implementation for each subcommand of the
//! `module-tree` command-line tool. Each subcommand is defined in its own file
//! to keep the logic separated and maintainable.
//!
//! ## Structure
//!
//! Each command module typically contains:
//! - An `Args` struct that defines the command-specific arguments and options,
//!   derived using `clap`.
//! - An `execute` function that takes the parsed `Args` plus the shared
//!   `Context` and performs the command's logic.
//!
//! The `execute` function is the main entry point for the command and is
//! responsible for orchestrating the necessary operations, calling into the
//! `module_tree` library to perform the core logic.

pub mod cache;
pub mod completions;
pub mod download;
pub mod refresh;
pub mod status;
pub mod tree;

use std::time::Duration;

use anyhow::{Context as _, Result};
use indicatif::{ProgressBar, ProgressStyle};

use module_tree::config::Settings;
use module_tree::engine::Engine;
use module_tree::hierarchy::ModuleNode;
use module_tree::output::OutputConfig;
use module_tree::resolver::ResolveObserver;

/// Settings shared by every command, assembled from global flags.
#[derive(Debug, Clone)]
pub struct Context {
    pub output: OutputConfig,
    pub settings: Settings,
    pub project: Option<String>,
}

impl Context {
    /// Engine for the project rooted at `root_url`.
    pub fn engine(&self, root_url: &str) -> Result<Engine> {
        Engine::new(&self.settings, root_url, self.project.as_deref())
            .with_context(|| format!("Failed to set up project for {}", root_url))
    }
}

/// Spinner counting modules while a hierarchy resolves.
pub struct ResolveSpinner {
    bar: ProgressBar,
}

impl ResolveSpinner {
    pub fn new(output: &OutputConfig) -> Self {
        let bar = if output.use_color {
            ProgressBar::new_spinner()
        } else {
            ProgressBar::hidden()
        };
        bar.set_style(
            ProgressStyle::with_template("{spinner} Resolving modules ({pos}) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ResolveObserver for ResolveSpinner {
    fn on_node_resolved(&self, node: &ModuleNode) {
        self.bar.inc(1);
        self.bar.set_message(node.name.clone());
    }
}

/// Number of nodes that could not be resolved.
pub fn failed_count(root: &ModuleNode) -> usize {
    root.walk().filter(|n| n.is_failed()).count()
}
