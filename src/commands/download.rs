//! # Download Command Implementation
//!
//! Clones (or updates) one module, or a module and every submodule below it
//! that is not downloaded yet, into the project directory.
//!
//! Failed items are reported as they happen and do not stop the batch; the
//! command exits with an error at the end if any item failed.

use anyhow::{anyhow, bail, Context as _, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};

use module_tree::address;
use module_tree::download::{
    DownloadObserver, DownloadOutcome, DownloadReport, DownloadSummary,
};
use module_tree::hierarchy::RepositoryRef;
use module_tree::output::{emoji, OutputConfig};

use super::{Context, ResolveSpinner};

/// Download modules into the project directory
#[derive(Args, Debug)]
pub struct DownloadArgs {
    /// Address of the root module repository
    #[arg(value_name = "ROOT_URL")]
    pub root_url: String,

    /// Address of the module to download (defaults to the root module)
    #[arg(long, value_name = "ADDRESS")]
    pub module: Option<String>,

    /// Also download every submodule that is not downloaded yet
    #[arg(short, long)]
    pub recursive: bool,
}

/// Execute the `download` command.
pub fn execute(args: DownloadArgs, ctx: &Context) -> Result<()> {
    let mut engine = ctx.engine(&args.root_url)?;

    let spinner = ResolveSpinner::new(&ctx.output);
    let result = engine.open(&spinner);
    spinner.finish();
    let (mut tree, _) =
        result.with_context(|| format!("Failed to resolve module tree for {}", args.root_url))?;

    let target = match &args.module {
        Some(module) => {
            let key = address::normalize(module).address;
            tree.find(&key)
                .ok_or_else(|| anyhow!("Module {} is not part of this hierarchy", module))?
                .clone()
        }
        None => tree.root().clone(),
    };

    let queued = engine.enqueue_download(&target, args.recursive);
    if queued == 0 {
        println!("Nothing to download: every module is already present.");
        return Ok(());
    }

    let observer = ProgressObserver::new(&ctx.output, queued as u64);
    let summary = engine.run_downloads(&mut tree, &observer);

    println!(
        "{} {} downloaded, {} failed into {}",
        emoji(&ctx.output, "📦", "[DONE]"),
        summary.succeeded.len(),
        summary.failed.len(),
        engine.workspace().project_dir().display()
    );
    if !summary.failed.is_empty() {
        bail!("{} of {} downloads failed", summary.failed.len(), summary.total);
    }
    Ok(())
}

/// Progress bar over the items of a download batch.
struct ProgressObserver {
    bar: ProgressBar,
    output: OutputConfig,
}

impl ProgressObserver {
    fn new(output: &OutputConfig, total: u64) -> Self {
        let bar = if output.use_color {
            ProgressBar::new(total)
        } else {
            ProgressBar::hidden()
        };
        bar.set_style(
            ProgressStyle::with_template("[{bar:30}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        Self {
            bar,
            output: output.clone(),
        }
    }
}

impl DownloadObserver for ProgressObserver {
    fn on_started(&self, index: usize, total: usize, repository: &RepositoryRef) {
        self.bar.set_message(repository.name.clone());
        if !self.output.use_color {
            println!("[{}/{}] {}", index, total, repository.address);
        }
    }

    fn on_finished(&self, report: &DownloadReport) {
        self.bar.inc(1);
        let line = match &report.outcome {
            DownloadOutcome::Cloned => format!(
                "{} cloned {}",
                emoji(&self.output, "✅", "[OK]"),
                report.repository.name
            ),
            DownloadOutcome::Updated => format!(
                "{} updated {}",
                emoji(&self.output, "✅", "[OK]"),
                report.repository.name
            ),
            DownloadOutcome::Failed { message } => format!(
                "{} {} failed: {}",
                emoji(&self.output, "❌", "[FAIL]"),
                report.repository.name,
                message
            ),
        };
        // A hidden bar drops println output.
        if self.bar.is_hidden() {
            println!("{}", line);
        } else {
            self.bar.println(line);
        }
    }

    fn on_complete(&self, _summary: &DownloadSummary) {
        self.bar.finish_and_clear();
    }
}
