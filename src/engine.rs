//! # Engine
//!
//! The single entry point used by the CLI. An `Engine` is bound to one root
//! address and owns everything needed to work on that project: the
//! resolver, the hierarchy cache, the download queue and the on-disk
//! workspace.
//!
//! ## Typical Flow
//!
//! 1.  `open` returns the cached hierarchy, or resolves and caches it.
//! 2.  `enqueue_download` + `run_downloads` materialize modules; the tree's
//!     `downloaded` flags and the cache are updated afterwards.
//! 3.  `set_assigned` / `set_completion_status` write status back into a
//!     downloaded module's metadata file and then into the tree.
//!
//! `refresh_hierarchy` discards the cache and resolves from scratch.

use std::path::PathBuf;
use std::sync::Arc;

use log::{info, warn};

use crate::address;
use crate::cache::{CacheInfo, HierarchyCache};
use crate::config::Settings;
use crate::download::{CancellationToken, DownloadCoordinator, DownloadObserver, DownloadSummary};
use crate::error::{Error, Result};
use crate::fetcher::{HttpMetadataSource, MetadataSource};
use crate::hierarchy::{ModuleNode, ModuleTree, RepositoryRef};
use crate::metadata::CompletionStatus;
use crate::repository::{DefaultGitOperations, GitOperations};
use crate::resolver::{ResolveObserver, Resolver};
use crate::status;
use crate::workspace::Workspace;

/// Where the tree returned by `Engine::open` came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeOrigin {
    Cache,
    Resolved,
}

pub struct Engine {
    root_address: String,
    workspace: Workspace,
    resolver: Resolver,
    cache: HierarchyCache,
    downloads: DownloadCoordinator,
}

impl Engine {
    /// Create an engine using HTTP metadata fetching and the system `git`.
    pub fn new(settings: &Settings, root_address: &str, project: Option<&str>) -> Result<Self> {
        settings.validate()?;
        let source = Arc::new(HttpMetadataSource::new(
            settings.fetch_timeout(),
            &settings.user_agent,
        )?);
        let workspace = Workspace::for_root(&settings.download_root, root_address, project);
        Self::with_parts(
            root_address,
            workspace,
            source,
            Arc::new(DefaultGitOperations),
            settings.resolve_concurrency,
        )
    }

    /// Create an engine from explicit parts.
    pub fn with_parts(
        root_address: &str,
        workspace: Workspace,
        source: Arc<dyn MetadataSource>,
        git: Arc<dyn GitOperations>,
        concurrency: usize,
    ) -> Result<Self> {
        let normalized = address::normalize(root_address);
        if normalized.address.is_empty() {
            return Err(Error::UnsupportedHost {
                address: root_address.to_string(),
            });
        }
        let name = address::repository_name(&normalized.address);
        if !address::is_valid_repository_name(&name) {
            return Err(Error::InvalidRepositoryName {
                address: root_address.to_string(),
                name,
            });
        }
        // the project directory must be a plain child of the download root
        if !address::is_valid_repository_name(workspace.project()) {
            return Err(Error::InvalidRepositoryName {
                address: root_address.to_string(),
                name: workspace.project().to_string(),
            });
        }
        Ok(Self {
            root_address: normalized.to_declared(),
            resolver: Resolver::new(source, concurrency)?,
            cache: HierarchyCache::new(workspace.project_dir()),
            downloads: DownloadCoordinator::new(git, workspace.project_dir()),
            workspace,
        })
    }

    pub fn root_address(&self) -> &str {
        &self.root_address
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Working copy directory of a module.
    pub fn module_dir(&self, repository: &RepositoryRef) -> PathBuf {
        self.workspace.module_dir(repository)
    }

    /// Resolve the hierarchy from the remote hosts, ignoring the cache.
    pub fn resolve_hierarchy(&self, observer: &dyn ResolveObserver) -> Result<ModuleTree> {
        let mut tree = self.resolver.resolve_with(&self.root_address, observer)?;
        self.sync_download_flags(&mut tree);
        Ok(tree)
    }

    /// The cached hierarchy for this root, if a usable one exists.
    pub fn load_cached_hierarchy(&self) -> Option<ModuleTree> {
        let mut tree = self.cache.load(&self.root_address)?;
        self.sync_download_flags(&mut tree);
        Some(tree)
    }

    pub fn save_hierarchy(&self, tree: &ModuleTree) -> Result<()> {
        self.cache.save(&self.root_address, tree)
    }

    /// Cached hierarchy if present, otherwise resolve and cache it.
    pub fn open(&self, observer: &dyn ResolveObserver) -> Result<(ModuleTree, TreeOrigin)> {
        if let Some(tree) = self.load_cached_hierarchy() {
            info!("Loaded {} modules from cache", tree.len());
            return Ok((tree, TreeOrigin::Cache));
        }
        let tree = self.resolve_hierarchy(observer)?;
        self.save_hierarchy(&tree)?;
        Ok((tree, TreeOrigin::Resolved))
    }

    /// Discard the cache, resolve again and store the result.
    pub fn refresh_hierarchy(&self, observer: &dyn ResolveObserver) -> Result<ModuleTree> {
        self.cache.invalidate()?;
        let tree = self.resolve_hierarchy(observer)?;
        self.save_hierarchy(&tree)?;
        Ok(tree)
    }

    pub fn cache_info(&self) -> Option<CacheInfo> {
        self.cache.info()
    }

    pub fn invalidate_cache(&self) -> Result<()> {
        self.cache.invalidate()
    }

    /// Queue a module, or its whole not yet downloaded subtree.
    pub fn enqueue_download(&mut self, node: &ModuleNode, include_descendants: bool) -> usize {
        self.downloads.enqueue(node, include_descendants)
    }

    /// Run queued downloads, then record the results in `tree` and the cache.
    pub fn run_downloads(
        &mut self,
        tree: &mut ModuleTree,
        observer: &dyn DownloadObserver,
    ) -> DownloadSummary {
        let summary = self.downloads.run(observer);
        summary.apply_to(tree);
        if !summary.succeeded.is_empty() {
            self.save_quietly(tree);
        }
        summary
    }

    pub fn cancel_downloads(&self) {
        self.downloads.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.downloads.cancellation_token()
    }

    /// Assign a module to a person or team.
    pub fn set_assigned(&self, tree: &mut ModuleTree, address: &str, name: &str) -> Result<()> {
        let key = address::normalize(address).address;
        let dir = self.downloaded_module_dir(tree, &key)?;
        let node = tree.find_mut(&key).ok_or_else(|| Error::ModuleNotFound {
            address: address.to_string(),
        })?;
        status::set_assigned(node, &dir, name)?;
        let value = node.assigned_to.clone();
        tree.update_all(&key, |n| n.assigned_to = value.clone());
        self.save_quietly(tree);
        Ok(())
    }

    /// Set a module's completion status.
    pub fn set_completion_status(
        &self,
        tree: &mut ModuleTree,
        address: &str,
        value: CompletionStatus,
    ) -> Result<()> {
        let key = address::normalize(address).address;
        let dir = self.downloaded_module_dir(tree, &key)?;
        let node = tree.find_mut(&key).ok_or_else(|| Error::ModuleNotFound {
            address: address.to_string(),
        })?;
        status::set_completion_status(node, &dir, value)?;
        tree.update_all(&key, |n| n.completion_status = value);
        self.save_quietly(tree);
        Ok(())
    }

    fn downloaded_module_dir(&self, tree: &ModuleTree, key: &str) -> Result<PathBuf> {
        let node = tree.find(key).ok_or_else(|| Error::ModuleNotFound {
            address: key.to_string(),
        })?;
        if !address::is_valid_repository_name(&node.repository.name) {
            return Err(Error::InvalidRepositoryName {
                address: node.repository.address.clone(),
                name: node.repository.name.clone(),
            });
        }
        Ok(self.module_dir(&node.repository))
    }

    /// A module counts as downloaded exactly when its working copy is on disk.
    fn sync_download_flags(&self, tree: &mut ModuleTree) {
        let flags: Vec<(String, bool)> = tree
            .walk()
            .map(|n| {
                let present = self.downloads.is_materialized(&n.repository);
                (n.repository.address.clone(), present)
            })
            .collect();
        for (address, present) in flags {
            tree.update_all(&address, |n| n.downloaded = present);
        }
    }

    // Status and download results are already on disk; a stale cache only
    // costs a re-resolve later.
    fn save_quietly(&self, tree: &ModuleTree) {
        if let Err(e) = self.save_hierarchy(tree) {
            warn!("Could not update hierarchy cache: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::NoopObserver;
    use std::collections::HashMap;
    use std::fs;
    use std::path::Path;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Mock metadata source answering from in-memory documents
    struct MockSource {
        docs: HashMap<String, String>,
        calls: Mutex<usize>,
    }

    impl MetadataSource for MockSource {
        fn fetch(&self, address: &str, _branch: Option<&str>) -> Result<String> {
            *self.calls.lock().unwrap() += 1;
            self.docs.get(address).cloned().ok_or_else(|| Error::NotFound {
                address: address.to_string(),
            })
        }
    }

    /// Mock git that creates a working copy with a metadata file
    struct MockGit;

    impl GitOperations for MockGit {
        fn clone_repository(&self, url: &str, _branch: Option<&str>, target: &Path) -> Result<()> {
            fs::create_dir_all(target.join("lib")).unwrap();
            fs::write(
                target.join("lib/ModuleInfo.txt"),
                format!("[Module Name] {}\n[Team/Assigned] None\n[Completed] No\n", url),
            )
            .unwrap();
            Ok(())
        }

        fn update_repository(&self, _dir: &Path, _branch: Option<&str>) -> Result<()> {
            Ok(())
        }
    }

    const ROOT: &str = "https://github.com/u/rover";
    const WHEELS: &str = "https://github.com/u/wheels";

    fn engine(temp_dir: &TempDir) -> (Engine, Arc<MockSource>) {
        let mut docs = HashMap::new();
        docs.insert(
            ROOT.to_string(),
            format!("[Module Name] Rover\n[Module Address] {}\n", WHEELS),
        );
        docs.insert(WHEELS.to_string(), "[Module Name] Wheels\n".to_string());
        let source = Arc::new(MockSource {
            docs,
            calls: Mutex::new(0),
        });
        let workspace = Workspace::for_root(temp_dir.path(), ROOT, None);
        let engine =
            Engine::with_parts(ROOT, workspace, source.clone(), Arc::new(MockGit), 2).unwrap();
        (engine, source)
    }

    #[test]
    fn test_open_resolves_then_uses_cache() {
        let temp_dir = TempDir::new().unwrap();
        let (engine, source) = engine(&temp_dir);

        let (tree, origin) = engine.open(&NoopObserver).unwrap();
        assert_eq!(origin, TreeOrigin::Resolved);
        assert_eq!(tree.len(), 2);
        assert_eq!(*source.calls.lock().unwrap(), 2);
        assert!(temp_dir.path().join("rover/hierarchy_cache.json").exists());

        let (cached, origin) = engine.open(&NoopObserver).unwrap();
        assert_eq!(origin, TreeOrigin::Cache);
        assert_eq!(cached, tree);
        assert_eq!(*source.calls.lock().unwrap(), 2);
    }

    #[test]
    fn test_refresh_resolves_again() {
        let temp_dir = TempDir::new().unwrap();
        let (engine, source) = engine(&temp_dir);
        engine.open(&NoopObserver).unwrap();

        let tree = engine.refresh_hierarchy(&NoopObserver).unwrap();
        assert_eq!(tree.len(), 2);
        assert_eq!(*source.calls.lock().unwrap(), 4);
        assert!(engine.cache_info().is_some());
    }

    #[test]
    fn test_download_then_set_status() {
        let temp_dir = TempDir::new().unwrap();
        let (mut engine, _) = engine(&temp_dir);
        let (mut tree, _) = engine.open(&NoopObserver).unwrap();

        let wheels = tree.find(WHEELS).unwrap().clone();
        assert_eq!(engine.enqueue_download(&wheels, false), 1);
        let summary = engine.run_downloads(&mut tree, &());
        assert!(summary.is_success());
        assert!(tree.find(WHEELS).unwrap().downloaded);

        engine.set_assigned(&mut tree, WHEELS, "Mechanics").unwrap();
        engine
            .set_completion_status(&mut tree, &format!("{}/", WHEELS), CompletionStatus::Completed)
            .unwrap();

        let node = tree.find(WHEELS).unwrap();
        assert_eq!(node.assigned_to, "Mechanics");
        assert_eq!(node.completion_status, CompletionStatus::Completed);

        let text = fs::read_to_string(temp_dir.path().join("rover/wheels/lib/ModuleInfo.txt")).unwrap();
        assert!(text.contains("[Team/Assigned] Mechanics\n"));
        assert!(text.contains("[Completed] Yes\n"));

        let cached = engine.load_cached_hierarchy().unwrap();
        assert_eq!(cached.find(WHEELS).unwrap().assigned_to, "Mechanics");
        assert!(cached.find(WHEELS).unwrap().downloaded);
    }

    #[test]
    fn test_status_on_missing_download_fails_without_change() {
        let temp_dir = TempDir::new().unwrap();
        let (engine, _) = engine(&temp_dir);
        let (mut tree, _) = engine.open(&NoopObserver).unwrap();

        let result = engine.set_assigned(&mut tree, WHEELS, "Mechanics");
        assert!(matches!(result, Err(Error::MetadataFileMissing { .. })));
        assert_eq!(tree.find(WHEELS).unwrap().assigned_to, "None");
    }

    #[test]
    fn test_status_on_unknown_module() {
        let temp_dir = TempDir::new().unwrap();
        let (engine, _) = engine(&temp_dir);
        let (mut tree, _) = engine.open(&NoopObserver).unwrap();

        let result = engine.set_completion_status(
            &mut tree,
            "https://github.com/u/nope",
            CompletionStatus::InProgress,
        );
        assert!(matches!(result, Err(Error::ModuleNotFound { .. })));
    }

    #[test]
    fn test_removed_working_copy_is_no_longer_downloaded() {
        let temp_dir = TempDir::new().unwrap();
        let (mut engine, _) = engine(&temp_dir);
        let (mut tree, _) = engine.open(&NoopObserver).unwrap();

        let wheels = tree.find(WHEELS).unwrap().clone();
        engine.enqueue_download(&wheels, false);
        assert!(engine.run_downloads(&mut tree, &()).is_success());
        assert!(tree.find(WHEELS).unwrap().downloaded);

        fs::remove_dir_all(temp_dir.path().join("rover/wheels")).unwrap();

        let cached = engine.load_cached_hierarchy().unwrap();
        assert!(!cached.find(WHEELS).unwrap().downloaded);
        assert_eq!(engine.enqueue_download(cached.root(), true), 2);
    }

    #[test]
    fn test_dot_segment_roots_are_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let source = Arc::new(MockSource {
            docs: HashMap::new(),
            calls: Mutex::new(0),
        });
        for root in ["https://github.com/u/.", "https://github.com/u/.."] {
            let workspace = Workspace::for_root(temp_dir.path(), root, None);
            let result =
                Engine::with_parts(root, workspace, source.clone(), Arc::new(MockGit), 2);
            assert!(matches!(result, Err(Error::InvalidRepositoryName { .. })));
        }
        assert_eq!(*source.calls.lock().unwrap(), 0);
    }

    #[test]
    fn test_project_override_must_stay_inside_download_root() {
        let temp_dir = TempDir::new().unwrap();
        let source = Arc::new(MockSource {
            docs: HashMap::new(),
            calls: Mutex::new(0),
        });
        for project in ["..", ".", "a/b"] {
            let workspace = Workspace::for_root(temp_dir.path(), ROOT, Some(project));
            let result =
                Engine::with_parts(ROOT, workspace, source.clone(), Arc::new(MockGit), 2);
            match result {
                Err(Error::InvalidRepositoryName { name, .. }) => assert_ne!(name, "rover"),
                Err(e) => panic!("expected InvalidRepositoryName, got {:?}", e),
                Ok(_) => panic!("project {:?} was accepted", project),
            }
        }
    }

    #[test]
    fn test_existing_working_copy_marks_downloaded() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("rover/wheels")).unwrap();
        let (engine, _) = engine(&temp_dir);

        let tree = engine.resolve_hierarchy(&NoopObserver).unwrap();
        assert!(tree.find(WHEELS).unwrap().downloaded);
        assert!(!tree.root().downloaded);
    }
}
