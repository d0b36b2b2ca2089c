//! CLI argument parsing and command dispatch

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};

use module_tree::config::Settings;
use module_tree::output::OutputConfig;

use crate::commands::{self, Context};

/// Module Tree - Resolve, download and track module hierarchies
#[derive(Parser, Debug)]
#[command(name = "module-tree")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: String,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "warn")]
    log_level: String,

    /// Settings file (defaults to ./.module-tree.yaml when present)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory holding downloaded projects.
    ///
    /// Overrides `download_root` from the settings file.
    #[arg(long, global = true, value_name = "DIR", env = "MODULE_TREE_ROOT")]
    download_root: Option<PathBuf>,

    /// Project directory name (defaults to the root repository's name)
    #[arg(long, global = true, value_name = "NAME")]
    project: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Display the module hierarchy below a root repository
    Tree(commands::tree::TreeArgs),

    /// Discard the cached hierarchy and resolve it again
    Refresh(commands::refresh::RefreshArgs),

    /// Clone or update modules into the project directory
    Download(commands::download::DownloadArgs),

    /// Record assignment or completion status of a downloaded module
    Status(commands::status::StatusArgs),

    /// Inspect or clear the cached hierarchy
    Cache(commands::cache::CacheArgs),

    /// Generate shell completion scripts
    Completions(commands::completions::CompletionsArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        init_logging(&self.log_level);

        // Completions need neither settings nor a project
        let command = match self.command {
            Commands::Completions(args) => return commands::completions::execute(args),
            command => command,
        };

        let mut settings = Settings::load(self.config.as_deref())
            .context("Failed to load settings")?;
        if let Some(root) = self.download_root {
            settings.download_root = root;
        }

        let ctx = Context {
            output: OutputConfig::from_env_and_flag(&self.color),
            settings,
            project: self.project,
        };

        match command {
            Commands::Tree(args) => commands::tree::execute(args, &ctx),
            Commands::Refresh(args) => commands::refresh::execute(args, &ctx),
            Commands::Download(args) => commands::download::execute(args, &ctx),
            Commands::Status(args) => commands::status::execute(args, &ctx),
            Commands::Cache(args) => commands::cache::execute(args, &ctx),
            Commands::Completions(_) => unreachable!("handled before settings are loaded"),
        }
    }
}

/// Route `log` output to stderr. `RUST_LOG` takes precedence over `--log-level`.
fn init_logging(level: &str) {
    let env = env_logger::Env::default().default_filter_or(level);
    let _ = env_logger::Builder::from_env(env)
        .format_target(false)
        .format_timestamp(None)
        .try_init();
}
