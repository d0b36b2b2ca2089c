//! # Download Coordination
//!
//! Materializes modules on disk by cloning (or updating) their repositories
//! one at a time.
//!
//! ## Key Components
//!
//! - **`DownloadCoordinator`**: a FIFO queue of `DownloadTask`s. Each task is
//!   processed by `run_next`; `run` drains the queue and `spawn` moves the
//!   coordinator onto a background worker thread.
//! - **`DownloadObserver`**: progress callbacks. An implementation for
//!   `mpsc::Sender<DownloadEvent>` forwards events to another thread.
//! - **`CancellationToken`**: a shared flag checked before each task. A task
//!   already in flight runs to completion; everything still queued is dropped.
//!
//! ## Batches
//!
//! Tasks enqueued while the queue is idle start a new batch. Reports number
//! items within their batch, a failed item never stops the ones after it, and
//! `on_complete` fires exactly once when the batch drains or is cancelled.
//!
//! After a successful clone or update the module's metadata file receives a
//! `[Deployed]` timestamp. Modules without a metadata file are still counted
//! as downloaded.

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::JoinHandle;

use chrono::Local;
use log::{info, warn};

use crate::address;
use crate::error::{Error, Result};
use crate::hierarchy::{ModuleNode, ModuleTree, RepositoryRef};
use crate::repository::{GitOperations, SyncAction};
use crate::status;

/// One repository to clone or update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    pub repository: RepositoryRef,
    pub target_dir: PathBuf,
}

/// Result of processing one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Cloned,
    Updated,
    Failed { message: String },
}

impl DownloadOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, DownloadOutcome::Failed { .. })
    }
}

impl From<SyncAction> for DownloadOutcome {
    fn from(action: SyncAction) -> Self {
        match action {
            SyncAction::Cloned => DownloadOutcome::Cloned,
            SyncAction::Updated => DownloadOutcome::Updated,
        }
    }
}

/// Per-item progress report. `index` is 1-based within the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadReport {
    pub index: usize,
    pub total: usize,
    pub repository: RepositoryRef,
    pub target_dir: PathBuf,
    pub outcome: DownloadOutcome,
}

/// What happened to a whole batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadSummary {
    pub total: usize,
    pub succeeded: Vec<RepositoryRef>,
    pub failed: Vec<(RepositoryRef, String)>,
    /// Tasks dropped from the queue by cancellation.
    pub cancelled: usize,
}

impl DownloadSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.cancelled == 0
    }

    /// Mark every successfully downloaded repository in `tree`.
    pub fn apply_to(&self, tree: &mut ModuleTree) {
        for repository in &self.succeeded {
            tree.mark_downloaded(&repository.address);
        }
    }
}

/// Messages sent through an `mpsc` channel observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadEvent {
    Started {
        index: usize,
        total: usize,
        repository: RepositoryRef,
    },
    Finished(DownloadReport),
    Complete(DownloadSummary),
}

/// Receives download progress. Callbacks run on the downloading thread.
pub trait DownloadObserver: Send {
    fn on_started(&self, _index: usize, _total: usize, _repository: &RepositoryRef) {}
    fn on_finished(&self, _report: &DownloadReport) {}
    fn on_complete(&self, _summary: &DownloadSummary) {}
}

impl DownloadObserver for () {}

impl DownloadObserver for Sender<DownloadEvent> {
    // A dropped receiver only means nobody is listening any more
    fn on_started(&self, index: usize, total: usize, repository: &RepositoryRef) {
        let _ = self.send(DownloadEvent::Started {
            index,
            total,
            repository: repository.clone(),
        });
    }

    fn on_finished(&self, report: &DownloadReport) {
        let _ = self.send(DownloadEvent::Finished(report.clone()));
    }

    fn on_complete(&self, summary: &DownloadSummary) {
        let _ = self.send(DownloadEvent::Complete(summary.clone()));
    }
}

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Serial download queue.
pub struct DownloadCoordinator {
    git: Arc<dyn GitOperations>,
    download_root: PathBuf,
    queue: VecDeque<DownloadTask>,
    token: CancellationToken,
    batch: Option<DownloadSummary>,
    last_summary: Option<DownloadSummary>,
    processed: usize,
}

impl DownloadCoordinator {
    /// Creates a coordinator placing working copies under `download_root`.
    pub fn new(git: Arc<dyn GitOperations>, download_root: impl Into<PathBuf>) -> Self {
        Self {
            git,
            download_root: download_root.into(),
            queue: VecDeque::new(),
            token: CancellationToken::new(),
            batch: None,
            last_summary: None,
            processed: 0,
        }
    }

    pub fn download_root(&self) -> &Path {
        &self.download_root
    }

    /// Where a repository's working copy lives.
    pub fn target_dir(&self, repository: &RepositoryRef) -> PathBuf {
        self.download_root.join(&repository.name)
    }

    /// Whether the working copy of `repository` is on disk.
    ///
    /// A directory holding a clone of a different repository with the same
    /// name does not count.
    pub fn is_materialized(&self, repository: &RepositoryRef) -> bool {
        if !address::is_valid_repository_name(&repository.name) {
            return false;
        }
        let dir = self.target_dir(repository);
        if !dir.is_dir() {
            return false;
        }
        if !self.git.is_repository(&dir) {
            return true;
        }
        match self.git.remote_url(&dir) {
            Ok(Some(found)) => address::same_repository(&found, &repository.address),
            _ => true,
        }
    }

    /// Queue `node`, or with `include_descendants` every not yet downloaded
    /// node of its subtree in pre-order. Returns the number of tasks added.
    ///
    /// A repository already waiting in the queue is not queued twice, and a
    /// repository whose name cannot be a directory below the download root is
    /// never queued.
    pub fn enqueue(&mut self, node: &ModuleNode, include_descendants: bool) -> usize {
        let mut queued: HashSet<String> = self
            .queue
            .iter()
            .map(|t| t.repository.address.clone())
            .collect();

        let candidates: Vec<&ModuleNode> = if include_descendants {
            node.walk().filter(|n| !n.downloaded).collect()
        } else {
            vec![node]
        };

        let mut added = 0;
        for candidate in candidates {
            if !address::is_valid_repository_name(&candidate.repository.name) {
                warn!(
                    "Not downloading {}: '{}' is not a usable directory name",
                    candidate.repository.address, candidate.repository.name
                );
                continue;
            }
            if !queued.insert(candidate.repository.address.clone()) {
                continue;
            }
            self.queue.push_back(DownloadTask {
                repository: candidate.repository.clone(),
                target_dir: self.target_dir(&candidate.repository),
            });
            added += 1;
        }

        if added > 0 {
            let batch = self.batch.get_or_insert_with(DownloadSummary::default);
            batch.total += added;
        }
        added
    }

    /// Number of tasks waiting.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// A token that cancels this coordinator's current batch.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Stop after the task in flight and drop everything still queued.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Process the next task.
    ///
    /// Returns `None` when there was nothing to do, either because the queue
    /// is empty or because the batch was cancelled.
    pub fn run_next(&mut self, observer: &dyn DownloadObserver) -> Option<DownloadReport> {
        if self.token.is_cancelled() {
            let dropped = self.queue.len();
            self.queue.clear();
            if let Some(batch) = self.batch.as_mut() {
                batch.cancelled += dropped;
                info!("Download cancelled; {} queued modules skipped", dropped);
            }
            self.finish_batch(observer);
            return None;
        }

        let task = self.queue.pop_front()?;
        let total = self.batch.as_ref().map_or(1, |b| b.total);
        self.processed += 1;
        let index = self.processed;

        observer.on_started(index, total, &task.repository);
        info!(
            "[{}/{}] Downloading {} into {}",
            index,
            total,
            task.repository.address,
            task.target_dir.display()
        );

        let outcome = match self.materialize(&task) {
            Ok(action) => DownloadOutcome::from(action),
            Err(e) => {
                warn!("Download of {} failed: {}", task.repository.address, e);
                DownloadOutcome::Failed {
                    message: e.to_string(),
                }
            }
        };

        if let Some(batch) = self.batch.as_mut() {
            match &outcome {
                DownloadOutcome::Failed { message } => {
                    batch.failed.push((task.repository.clone(), message.clone()))
                }
                _ => batch.succeeded.push(task.repository.clone()),
            }
        }

        let report = DownloadReport {
            index,
            total,
            repository: task.repository,
            target_dir: task.target_dir,
            outcome,
        };
        observer.on_finished(&report);

        if self.queue.is_empty() {
            self.finish_batch(observer);
        }
        Some(report)
    }

    /// Drain the queue and return the batch summary.
    pub fn run(&mut self, observer: &dyn DownloadObserver) -> DownloadSummary {
        while self.run_next(observer).is_some() {}
        self.last_summary.take().unwrap_or_default()
    }

    /// Run the queue on a background thread.
    pub fn spawn<O>(mut self, observer: O) -> DownloadHandle
    where
        O: DownloadObserver + 'static,
    {
        let token = self.token.clone();
        let join = std::thread::Builder::new()
            .name("module-download".to_string())
            .spawn(move || self.run(&observer));
        DownloadHandle { token, join }
    }

    fn materialize(&self, task: &DownloadTask) -> Result<SyncAction> {
        self.check_target(task)?;
        let action = self.git.sync(
            &task.repository.address,
            task.repository.branch.as_deref(),
            &task.target_dir,
        )?;
        // The clone itself succeeded; a failed stamp is only worth a warning
        if let Err(e) = status::stamp_deployed(&task.target_dir, Local::now()) {
            warn!("Could not record deployment time: {}", e);
        }
        Ok(action)
    }

    /// The target must be a direct, plainly named child of the download root.
    fn check_target(&self, task: &DownloadTask) -> Result<()> {
        let name = task
            .target_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let inside = task.target_dir.parent() == Some(self.download_root.as_path())
            && name == task.repository.name
            && address::is_valid_repository_name(&name);
        if inside {
            Ok(())
        } else {
            Err(Error::InvalidRepositoryName {
                address: task.repository.address.clone(),
                name: task.repository.name.clone(),
            })
        }
    }

    fn finish_batch(&mut self, observer: &dyn DownloadObserver) {
        if let Some(summary) = self.batch.take() {
            info!(
                "All done: {} downloaded, {} failed, {} skipped",
                summary.succeeded.len(),
                summary.failed.len(),
                summary.cancelled
            );
            observer.on_complete(&summary);
            self.last_summary = Some(summary);
        }
        self.processed = 0;
        self.token.reset();
    }
}

/// Handle to a coordinator running on a background thread.
pub struct DownloadHandle {
    token: CancellationToken,
    join: std::io::Result<JoinHandle<DownloadSummary>>,
}

impl DownloadHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Wait for the batch to finish.
    pub fn join(self) -> Result<DownloadSummary> {
        let handle = self.join?;
        handle.join().map_err(|_| Error::WorkerPanicked {
            context: "download worker".to_string(),
        })
    }
}
