//! # Hierarchy Resolution
//!
//! Builds the module tree reachable from a root address by fetching each
//! module's metadata file and following its declared `[Module Address]`
//! entries.
//!
//! ## Process
//!
//! For every address, depth-first:
//!
//! 1.  Normalize the address and fetch its metadata (`MetadataSource`).
//! 2.  Parse the document into a `ModuleRecord`. The module name falls back to
//!     the repository name when the document has none.
//! 3.  Normalize every declared child address.
//! 4.  Resolve the children and attach them in declaration order.
//!
//! ## Failures
//!
//! Failures below the root are local to their node. A child whose metadata is
//! missing becomes a leaf (`Resolution::MetadataMissing`); a child on an
//! unsupported host, behind a network error, or that would close a cycle is
//! kept as a `Resolution::Failed` leaf. Its siblings are unaffected. Only a
//! failure of the root address itself is returned as an error.
//!
//! ## Cycle Detection
//!
//! Each branch carries the set of addresses on its path from the root. An
//! address already on that path is not followed again. The same repository
//! may still appear under several different parents.
//!
//! ## Concurrency
//!
//! Siblings are resolved in parallel on a dedicated rayon pool sized by the
//! configured concurrency limit. Results are collected in declaration order,
//! so the order of `children` never depends on which fetch finishes first.

use std::collections::HashSet;
use std::sync::Arc;

use log::{info, warn};
use rayon::prelude::*;

use crate::address::{self, NormalizedAddress};
use crate::error::{Error, Result};
use crate::fetcher::MetadataSource;
use crate::hierarchy::{FailureReason, ModuleNode, ModuleTree, RepositoryRef, Resolution, UNASSIGNED};
use crate::metadata::ModuleRecord;

/// Receives a callback as each node finishes resolving.
///
/// Callbacks arrive from resolver worker threads, in no particular order.
pub trait ResolveObserver: Send + Sync {
    fn on_node_resolved(&self, _node: &ModuleNode) {}
}

/// Observer that ignores every event.
pub struct NoopObserver;

impl ResolveObserver for NoopObserver {}

/// Resolves module hierarchies from root addresses.
pub struct Resolver {
    source: Arc<dyn MetadataSource>,
    pool: rayon::ThreadPool,
}

impl Resolver {
    /// Creates a resolver fetching through `source` with at most
    /// `concurrency` metadata requests in flight.
    pub fn new(source: Arc<dyn MetadataSource>, concurrency: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(concurrency.max(1))
            .thread_name(|i| format!("module-resolve-{}", i))
            .build()
            .map_err(|e| Error::Config {
                message: format!("failed to start resolver pool: {}", e),
                hint: None,
            })?;
        Ok(Self { source, pool })
    }

    /// Resolve the full hierarchy below `root_address`.
    pub fn resolve(&self, root_address: &str) -> Result<ModuleTree> {
        self.resolve_with(root_address, &NoopObserver)
    }

    /// Like `resolve`, reporting each resolved node to `observer`.
    pub fn resolve_with(
        &self,
        root_address: &str,
        observer: &dyn ResolveObserver,
    ) -> Result<ModuleTree> {
        let normalized = address::normalize(root_address);
        let name = address::repository_name(&normalized.address);
        if !address::is_valid_repository_name(&name) {
            return Err(Error::InvalidRepositoryName {
                address: root_address.to_string(),
                name,
            });
        }
        info!("Resolving module hierarchy from {}", normalized.address);

        let root = self.pool.install(|| -> Result<ModuleNode> {
            let text = self
                .source
                .fetch(&normalized.address, normalized.branch.as_deref())?;
            let mut active = HashSet::new();
            active.insert(normalized.address.clone());
            Ok(self.build_node(&normalized, &text, &active, observer))
        })?;

        let tree = ModuleTree::new(root);
        info!("Resolved {} modules", tree.len());
        Ok(tree)
    }

    /// Resolve one declared address and everything below it.
    ///
    /// Never fails; problems are recorded on the returned node.
    pub fn resolve_subtree(&self, declared: &str, observer: &dyn ResolveObserver) -> ModuleNode {
        self.pool
            .install(|| self.resolve_child(declared, &HashSet::new(), observer))
    }

    fn resolve_child(
        &self,
        declared: &str,
        active: &HashSet<String>,
        observer: &dyn ResolveObserver,
    ) -> ModuleNode {
        let normalized = address::normalize(declared);
        let repository = RepositoryRef {
            name: address::repository_name(&normalized.address),
            address: normalized.address.clone(),
            branch: normalized.branch.clone(),
        };

        if !address::is_valid_repository_name(&repository.name) {
            warn!(
                "Not following {}: '{}' cannot name a working copy",
                normalized.address, repository.name
            );
            let node = ModuleNode::failed(repository, FailureReason::InvalidName);
            observer.on_node_resolved(&node);
            return node;
        }

        if active.contains(&normalized.address) {
            warn!(
                "Not following {}: it already appears above this module",
                normalized.address
            );
            let node = ModuleNode::failed(repository, FailureReason::Cycle);
            observer.on_node_resolved(&node);
            return node;
        }

        let node = match self
            .source
            .fetch(&normalized.address, normalized.branch.as_deref())
        {
            Ok(text) => {
                let mut path = active.clone();
                path.insert(normalized.address.clone());
                return self.build_node(&normalized, &text, &path, observer);
            }
            Err(Error::NotFound { .. }) => {
                info!("No module info for {}; treating it as a leaf", normalized.address);
                let mut node = ModuleNode::new(repository.name.clone(), repository);
                node.resolution = Resolution::MetadataMissing;
                node
            }
            Err(Error::UnsupportedHost { address }) => {
                warn!("Unsupported host for module {}", address);
                ModuleNode::failed(repository, FailureReason::UnsupportedHost)
            }
            Err(e) => {
                warn!("Failed to fetch module info for {}: {}", normalized.address, e);
                ModuleNode::failed(
                    repository,
                    FailureReason::Network {
                        message: e.to_string(),
                    },
                )
            }
        };

        observer.on_node_resolved(&node);
        node
    }

    fn build_node(
        &self,
        normalized: &NormalizedAddress,
        text: &str,
        active: &HashSet<String>,
        observer: &dyn ResolveObserver,
    ) -> ModuleNode {
        let record = ModuleRecord::parse(text);
        let repo_name = address::repository_name(&normalized.address);

        let repository = RepositoryRef {
            name: repo_name.clone(),
            address: normalized.address.clone(),
            branch: normalized.branch.clone().or(record.branch.clone()),
        };

        let mut node = ModuleNode::new(record.name.clone().unwrap_or(repo_name), repository);
        node.description = record.description;
        node.submodule_addresses = record
            .submodule_addresses
            .iter()
            .map(|a| address::normalize(a).to_declared())
            .collect();
        node.assigned_to = record
            .assigned
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| UNASSIGNED.to_string());
        node.completion_status = record.completed.unwrap_or_default();

        info!(
            "Resolved module '{}' ({} submodules)",
            node.name,
            node.submodule_addresses.len()
        );
        observer.on_node_resolved(&node);

        node.children = node
            .submodule_addresses
            .par_iter()
            .map(|declared| self.resolve_child(declared, active, observer))
            .collect();

        node
    }
}
