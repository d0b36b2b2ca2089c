//! # Cache Command Implementation
//!
//! This module implements the `cache` subcommand, which manages the stored
//! hierarchy of a project.
//!
//! ## Subcommands
//!
//! - **`show`**: Display when the hierarchy was cached and how many modules it holds
//! - **`clear`**: Delete the cached hierarchy so the next run resolves again

use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};

use module_tree::output::emoji;

use super::Context;

/// Manage the cached hierarchy
#[derive(Args, Debug)]
pub struct CacheArgs {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: CacheSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum CacheSubcommand {
    /// Show the cached hierarchy's details
    Show {
        /// Address of the root module repository
        #[arg(value_name = "ROOT_URL")]
        root_url: String,
    },
    /// Delete the cached hierarchy
    Clear {
        /// Address of the root module repository
        #[arg(value_name = "ROOT_URL")]
        root_url: String,
    },
}

/// Execute the `cache` command.
pub fn execute(args: CacheArgs, ctx: &Context) -> Result<()> {
    match args.command {
        CacheSubcommand::Show { root_url } => execute_show(&root_url, ctx),
        CacheSubcommand::Clear { root_url } => execute_clear(&root_url, ctx),
    }
}

/// Execute the `cache show` command.
fn execute_show(root_url: &str, ctx: &Context) -> Result<()> {
    let engine = ctx.engine(root_url)?;

    match engine.cache_info() {
        Some(info) => {
            println!("Cache file:  {}", info.path.display());
            println!("Root:        {}", info.initial_repo_url);
            println!(
                "Cached at:   {}",
                info.cached_at
                    .with_timezone(&chrono::Local)
                    .format("%Y-%m-%d %H:%M:%S")
            );
            println!("Modules:     {}", info.module_count);
        }
        None => {
            println!(
                "No cached hierarchy in {}",
                engine.workspace().project_dir().display()
            );
        }
    }
    Ok(())
}

/// Execute the `cache clear` command.
fn execute_clear(root_url: &str, ctx: &Context) -> Result<()> {
    let engine = ctx.engine(root_url)?;
    engine
        .invalidate_cache()
        .context("Failed to remove cached hierarchy")?;
    println!(
        "{} Cleared cached hierarchy for {}",
        emoji(&ctx.output, "🧹", "[OK]"),
        engine.root_address()
    );
    Ok(())
}
