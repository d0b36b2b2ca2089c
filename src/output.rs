//! # Terminal Output
//!
//! Color and emoji handling for the CLI, and the one-line labels used when a
//! module hierarchy is printed.
//!
//! `--color auto` (the default) turns color off when `NO_COLOR` is present,
//! `CLICOLOR=0`, `TERM=dumb`, or stdout is not a terminal.
//! `CLICOLOR_FORCE` (non-zero) turns it back on for pipes. Emoji follow the
//! same switch so piped output stays plain ASCII.
//!
//! ```rust,ignore
//! use module_tree::output::{emoji, OutputConfig};
//!
//! let output = OutputConfig::from_env_and_flag("auto");
//! println!("{} Downloading", emoji(&output, "📦", "[DL]"));
//! ```

use std::env;

use console::style;

use crate::hierarchy::{ModuleNode, Resolution, UNASSIGNED};
use crate::metadata::CompletionStatus;

/// Whether the CLI decorates its output.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub use_color: bool,
}

impl OutputConfig {
    /// Resolve the `--color` flag (`always`, `never` or `auto`).
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => {
                auto_color(|name| env::var_os(name).map(|v| v.to_string_lossy().into_owned()))
                    .unwrap_or_else(|| console::Term::stdout().features().colors_supported())
            }
        };
        Self { use_color }
    }

    pub fn with_color() -> Self {
        Self { use_color: true }
    }

    pub fn without_color() -> Self {
        Self { use_color: false }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::from_env_and_flag("auto")
    }
}

/// Decision taken from the environment alone, `None` to ask the terminal.
fn auto_color(var: impl Fn(&str) -> Option<String>) -> Option<bool> {
    if var("NO_COLOR").is_some() {
        return Some(false);
    }
    if var("CLICOLOR").as_deref() == Some("0") {
        return Some(false);
    }
    if var("CLICOLOR_FORCE").is_some_and(|v| !v.is_empty() && v != "0") {
        return Some(true);
    }
    if var("TERM").as_deref() == Some("dumb") {
        return Some(false);
    }
    None
}

/// `decorated` when colors are on, `plain` otherwise.
pub fn emoji<'a>(config: &OutputConfig, decorated: &'a str, plain: &'a str) -> &'a str {
    if config.use_color {
        decorated
    } else {
        plain
    }
}

/// Marker for a module's completion state.
pub fn completion_marker(config: &OutputConfig, status: CompletionStatus) -> &'static str {
    match status {
        CompletionStatus::Completed => emoji(config, "✅", "[done]"),
        CompletionStatus::InProgress => emoji(config, "🚧", "[wip]"),
        CompletionStatus::NotStarted => emoji(config, "⬜", "[ ]"),
    }
}

/// One-line description of a module for tree output.
///
/// `Frame (rover-frame) [Mechanics] ✅ ⬇` for a resolved node, with the
/// failure reason appended for nodes that could not be resolved.
pub fn node_label(config: &OutputConfig, node: &ModuleNode) -> String {
    let mut label = String::new();

    match &node.resolution {
        Resolution::Failed { reason } => {
            let text = format!("{} (unresolved: {})", node.repository.address, reason);
            label.push_str(emoji(config, "❌ ", "[x] "));
            if config.use_color {
                label.push_str(&style(text).red().to_string());
            } else {
                label.push_str(&text);
            }
            return label;
        }
        Resolution::MetadataMissing | Resolution::Resolved => {}
    }

    label.push_str(completion_marker(config, node.completion_status));
    label.push(' ');
    if config.use_color {
        label.push_str(&style(&node.name).bold().to_string());
    } else {
        label.push_str(&node.name);
    }
    if node.name != node.repository.name {
        label.push_str(&format!(" ({})", node.repository.name));
    }
    if let Some(branch) = &node.repository.branch {
        label.push_str(&format!(" @ {}", branch));
    }
    if node.assigned_to != UNASSIGNED {
        label.push_str(&format!(" [{}]", node.assigned_to));
    }
    if node.downloaded {
        label.push(' ');
        label.push_str(emoji(config, "⬇", "(downloaded)"));
    }
    if node.resolution == Resolution::MetadataMissing {
        label.push_str(" (no module info)");
    }
    label
}
