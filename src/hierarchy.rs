//! # Module Hierarchy Model
//!
//! The resolved bill-of-modules is an explicit tree of owned `ModuleNode`s.
//! A `ModuleTree` wraps the root node together with a lookup table from
//! normalized address to the node's position, so status updates and download
//! bookkeeping can find a node without walking the whole tree.
//!
//! The tree is serializable so it can be stored in the hierarchy cache; the
//! lookup table is not stored and is rebuilt on load.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::metadata::CompletionStatus;

/// Default value of `ModuleNode::assigned_to`.
pub const UNASSIGNED: &str = "None";

/// Where a module's repository lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryRef {
    pub name: String,
    /// Normalized address, without any branch suffix.
    pub address: String,
    #[serde(default)]
    pub branch: Option<String>,
}

/// Why a node could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    UnsupportedHost,
    Network { message: String },
    /// The address already appears on the path from the root.
    Cycle,
    /// The address ends in a segment that cannot name a working copy
    /// directory (empty, `.`, `..`).
    InvalidName,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::UnsupportedHost => write!(f, "unsupported host"),
            FailureReason::Network { message } => write!(f, "network error: {}", message),
            FailureReason::Cycle => write!(f, "cycle in module graph"),
            FailureReason::InvalidName => write!(f, "address has no usable repository name"),
        }
    }
}

/// Terminal resolution state of a node.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Resolution {
    /// Metadata was fetched and parsed; children are attached.
    #[default]
    Resolved,
    /// No metadata file exists; the node is a leaf.
    MetadataMissing,
    /// The node is kept with no children so the rest of the tree renders.
    Failed { reason: FailureReason },
}

/// One module in the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleNode {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub repository: RepositoryRef,
    /// Resolved children, in the order of `submodule_addresses`.
    #[serde(default)]
    pub children: Vec<ModuleNode>,
    /// Declared child addresses (normalized), kept for re-resolution.
    #[serde(default)]
    pub submodule_addresses: Vec<String>,
    #[serde(default)]
    pub downloaded: bool,
    #[serde(default)]
    pub completion_status: CompletionStatus,
    #[serde(default = "default_assigned")]
    pub assigned_to: String,
    #[serde(default)]
    pub resolution: Resolution,
}

fn default_assigned() -> String {
    UNASSIGNED.to_string()
}

impl ModuleNode {
    /// A leaf node for `repository` with default status fields.
    pub fn new(name: String, repository: RepositoryRef) -> Self {
        Self {
            name,
            description: String::new(),
            repository,
            children: Vec::new(),
            submodule_addresses: Vec::new(),
            downloaded: false,
            completion_status: CompletionStatus::NotStarted,
            assigned_to: default_assigned(),
            resolution: Resolution::Resolved,
        }
    }

    /// A leaf node recording why it could not be resolved.
    pub fn failed(repository: RepositoryRef, reason: FailureReason) -> Self {
        let mut node = Self::new(repository.name.clone(), repository);
        node.resolution = Resolution::Failed { reason };
        node
    }

    pub fn add_child(&mut self, child: ModuleNode) {
        self.children.push(child);
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.resolution, Resolution::Failed { .. })
    }

    /// Pre-order iterator over this node and all descendants.
    pub fn walk(&self) -> PreOrder<'_> {
        PreOrder { stack: vec![self] }
    }

    /// Number of nodes in this subtree, including this one.
    pub fn count(&self) -> usize {
        self.walk().count()
    }
}

/// Pre-order traversal of a subtree.
pub struct PreOrder<'a> {
    stack: Vec<&'a ModuleNode>,
}

impl<'a> Iterator for PreOrder<'a> {
    type Item = &'a ModuleNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// A resolved hierarchy plus its address lookup table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleTree {
    root: ModuleNode,
    /// Address -> child-index path of its first pre-order occurrence.
    index: HashMap<String, Vec<usize>>,
}

impl ModuleTree {
    pub fn new(root: ModuleNode) -> Self {
        let mut index = HashMap::new();
        Self::index_node(&root, &mut Vec::new(), &mut index);
        Self { root, index }
    }

    fn index_node(
        node: &ModuleNode,
        path: &mut Vec<usize>,
        index: &mut HashMap<String, Vec<usize>>,
    ) {
        index
            .entry(node.repository.address.clone())
            .or_insert_with(|| path.clone());
        for (i, child) in node.children.iter().enumerate() {
            path.push(i);
            Self::index_node(child, path, index);
            path.pop();
        }
    }

    pub fn root(&self) -> &ModuleNode {
        &self.root
    }

    pub fn into_root(self) -> ModuleNode {
        self.root
    }

    /// Number of nodes in the tree.
    pub fn len(&self) -> usize {
        self.root.count()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn walk(&self) -> PreOrder<'_> {
        self.root.walk()
    }

    pub fn contains(&self, address: &str) -> bool {
        self.index.contains_key(address)
    }

    pub fn find(&self, address: &str) -> Option<&ModuleNode> {
        let path = self.index.get(address)?;
        let mut node = &self.root;
        for &i in path {
            node = node.children.get(i)?;
        }
        Some(node)
    }

    /// Mutable access to a node. The tree's shape cannot be changed through it.
    pub fn find_mut(&mut self, address: &str) -> Option<&mut ModuleNode> {
        let path = self.index.get(address)?;
        let mut node = &mut self.root;
        for &i in path {
            node = node.children.get_mut(i)?;
        }
        Some(node)
    }

    /// Apply `update` to every node with this address.
    ///
    /// The same repository can appear under several parents and all of them
    /// share one working copy. Returns the number of nodes updated.
    pub fn update_all<F>(&mut self, address: &str, mut update: F) -> usize
    where
        F: FnMut(&mut ModuleNode),
    {
        fn visit<F>(node: &mut ModuleNode, address: &str, update: &mut F) -> usize
        where
            F: FnMut(&mut ModuleNode),
        {
            let mut updated = 0;
            if node.repository.address == address {
                update(node);
                updated += 1;
            }
            for child in node.children.iter_mut() {
                updated += visit(child, address, update);
            }
            updated
        }
        visit(&mut self.root, address, &mut update)
    }

    /// Mark every node with this address as downloaded.
    pub fn mark_downloaded(&mut self, address: &str) -> usize {
        self.update_all(address, |node| node.downloaded = true)
    }
}
