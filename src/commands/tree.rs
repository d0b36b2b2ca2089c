//! # Tree Command Implementation
//!
//! This module implements the `tree` subcommand, which displays the module
//! hierarchy below a root repository.
//!
//! ## Functionality
//!
//! - **Hierarchy Visualization**: Shows every module with its completion
//!   marker, assignment, branch and download state
//! - **Depth Control**: Supports `--depth` to limit how deep the tree is printed
//! - **Cache Use**: Reuses the cached hierarchy unless `--refresh` is given
//!
//! Apart from writing the hierarchy cache, this command does not modify
//! anything on disk.

use anyhow::{Context as _, Result};
use clap::Args;
use ptree::{print_tree, TreeItem};

use module_tree::engine::TreeOrigin;
use module_tree::hierarchy::ModuleNode;
use module_tree::output::{emoji, node_label, OutputConfig};

use super::{failed_count, Context, ResolveSpinner};

/// Display the module hierarchy
#[derive(Args, Debug)]
pub struct TreeArgs {
    /// Address of the root module repository
    #[arg(value_name = "ROOT_URL")]
    pub root_url: String,

    /// Maximum depth to display in the tree.
    ///
    /// If not specified, displays the full tree.
    /// Use 0 to show only the root module, 1 to show its direct submodules, etc.
    #[arg(long, value_name = "NUM")]
    pub depth: Option<usize>,

    /// Resolve from the remote hosts even if a cached hierarchy exists
    #[arg(long)]
    pub refresh: bool,
}

/// Execute the `tree` command.
pub fn execute(args: TreeArgs, ctx: &Context) -> Result<()> {
    let engine = ctx.engine(&args.root_url)?;

    let spinner = ResolveSpinner::new(&ctx.output);
    let result = if args.refresh {
        engine
            .refresh_hierarchy(&spinner)
            .map(|tree| (tree, TreeOrigin::Resolved))
    } else {
        engine.open(&spinner)
    };
    spinner.finish();
    let (tree, origin) =
        result.with_context(|| format!("Failed to resolve module tree for {}", args.root_url))?;

    println!(
        "{} Module tree for: {}{}",
        emoji(&ctx.output, "🌳", "[TREE]"),
        engine.root_address(),
        match origin {
            TreeOrigin::Cache => " (cached)",
            TreeOrigin::Resolved => "",
        }
    );

    let tree_root = build_tree_node(
        &ctx.output,
        tree.root(),
        args.depth.unwrap_or(usize::MAX),
        0,
    );
    print_tree(&tree_root).context("Failed to display tree")?;

    let failed = failed_count(tree.root());
    println!("{} modules, {} unresolved", tree.len(), failed);
    Ok(())
}

/// Build a display node from a module node
fn build_tree_node(
    output: &OutputConfig,
    node: &ModuleNode,
    max_depth: usize,
    current_depth: usize,
) -> TreeNode {
    let label = node_label(output, node);

    if current_depth >= max_depth || node.children.is_empty() {
        TreeNode {
            label,
            children: vec![],
        }
    } else {
        let children = node
            .children
            .iter()
            .map(|child| build_tree_node(output, child, max_depth, current_depth + 1))
            .collect();
        TreeNode { label, children }
    }
}

/// Tree node structure for ptree visualization
#[derive(Clone)]
struct TreeNode {
    label: String,
    children: Vec<TreeNode>,
}

impl TreeItem for TreeNode {
    type Child = TreeNode;

    fn write_self<W: std::io::Write>(
        &self,
        f: &mut W,
        _style: &ptree::Style,
    ) -> std::io::Result<()> {
        write!(f, "{}", self.label)
    }

    fn children(&self) -> std::borrow::Cow<'_, [Self::Child]> {
        std::borrow::Cow::Borrowed(&self.children)
    }
}
