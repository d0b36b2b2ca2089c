//! # Status Command Implementation
//!
//! Writes progress information into a downloaded module's metadata file:
//!
//! - **`assign`**: set `[Team/Assigned]`
//! - **`complete`**: set `[Completed]` to not-started, in-progress or completed
//!
//! The module must be downloaded; the hierarchy cache is updated afterwards.

use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};

use module_tree::metadata::CompletionStatus;
use module_tree::output::emoji;

use super::{Context, ResolveSpinner};

/// Record module status
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: StatusSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum StatusSubcommand {
    /// Assign a module to a person or team
    Assign {
        /// Address of the root module repository
        #[arg(value_name = "ROOT_URL")]
        root_url: String,
        /// Address of the module to update
        #[arg(value_name = "ADDRESS")]
        address: String,
        /// Assignee; an empty string clears the assignment
        #[arg(value_name = "NAME")]
        name: String,
    },
    /// Set a module's completion status
    Complete {
        /// Address of the root module repository
        #[arg(value_name = "ROOT_URL")]
        root_url: String,
        /// Address of the module to update
        #[arg(value_name = "ADDRESS")]
        address: String,
        /// not-started, in-progress or completed
        #[arg(value_name = "STATUS")]
        status: CompletionStatus,
    },
}

/// Execute the `status` command.
pub fn execute(args: StatusArgs, ctx: &Context) -> Result<()> {
    let root_url = match &args.command {
        StatusSubcommand::Assign { root_url, .. } | StatusSubcommand::Complete { root_url, .. } => {
            root_url.clone()
        }
    };
    let engine = ctx.engine(&root_url)?;

    let spinner = ResolveSpinner::new(&ctx.output);
    let result = engine.open(&spinner);
    spinner.finish();
    let (mut tree, _) =
        result.with_context(|| format!("Failed to resolve module tree for {}", root_url))?;

    match args.command {
        StatusSubcommand::Assign { address, name, .. } => {
            engine
                .set_assigned(&mut tree, &address, &name)
                .with_context(|| format!("Failed to assign {}", address))?;
            let assigned = tree
                .find(&module_tree::address::normalize(&address).address)
                .map(|n| n.assigned_to.clone())
                .unwrap_or(name);
            println!(
                "{} {} assigned to {}",
                emoji(&ctx.output, "👤", "[OK]"),
                address,
                assigned
            );
        }
        StatusSubcommand::Complete {
            address, status, ..
        } => {
            engine
                .set_completion_status(&mut tree, &address, status)
                .with_context(|| format!("Failed to update status of {}", address))?;
            println!(
                "{} {} marked as {}",
                emoji(&ctx.output, "📝", "[OK]"),
                address,
                status
            );
        }
    }
    Ok(())
}
