//! # Refresh Command Implementation
//!
//! Discards the cached hierarchy of a project and resolves it again from the
//! remote hosts.

use anyhow::{Context as _, Result};
use clap::Args;

use module_tree::output::emoji;

use super::{failed_count, Context, ResolveSpinner};

/// Resolve the module hierarchy again, replacing the cache
#[derive(Args, Debug)]
pub struct RefreshArgs {
    /// Address of the root module repository
    #[arg(value_name = "ROOT_URL")]
    pub root_url: String,
}

/// Execute the `refresh` command.
pub fn execute(args: RefreshArgs, ctx: &Context) -> Result<()> {
    let engine = ctx.engine(&args.root_url)?;

    let spinner = ResolveSpinner::new(&ctx.output);
    let result = engine.refresh_hierarchy(&spinner);
    spinner.finish();
    let tree =
        result.with_context(|| format!("Failed to resolve module tree for {}", args.root_url))?;

    let failed = failed_count(tree.root());
    println!(
        "{} Resolved {} modules ({} unresolved)",
        emoji(&ctx.output, "🔄", "[OK]"),
        tree.len(),
        failed
    );
    if failed > 0 {
        println!("Run `module-tree tree {}` to see which ones.", args.root_url);
    }
    Ok(())
}
