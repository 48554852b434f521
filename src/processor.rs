//! Run orchestration across record collections.
//!
//! Collections are processed strictly one after another. A collection that
//! cannot be loaded is logged and skipped; everything else about it (item
//! failures, persistence failures) is absorbed into its statistics and logs.

use crate::client::{LlmClient, LlmGateway};
use crate::config::LlmConfig;
use crate::error::Result;
use crate::record::ProcessedItem;
use crate::scheduler::{BatchScheduler, SchedulerOptions};
use crate::storage;
use crate::template::Template;
use crate::tracker::ProcessStats;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Run-level options that are not about scheduling.
#[derive(Debug, Clone, Default)]
pub struct ProcessorOptions {
    /// Keep only the first N records of each collection.
    pub max_items_per_file: Option<usize>,
    /// Where per-file results are written. `None` disables writing.
    pub output_dir: Option<PathBuf>,
    /// Write `<stem>_processed.json` after each collection.
    pub save_individually: bool,
    /// Show a progress bar per collection.
    pub show_progress: bool,
}

/// Processor for record collections.
pub struct Processor {
    gateway: Arc<dyn LlmGateway>,
    template: Template,
    scheduler: SchedulerOptions,
    options: ProcessorOptions,
}

impl Processor {
    /// Create a processor talking to the configured HTTP endpoint.
    pub fn new(config: &LlmConfig, template: Template, options: ProcessorOptions) -> Result<Self> {
        let client = LlmClient::new(config)?;
        Ok(Self::with_gateway(
            Arc::new(client),
            template,
            SchedulerOptions::from_config(config),
            options,
        ))
    }

    /// Create a processor over any gateway.
    pub fn with_gateway(
        gateway: Arc<dyn LlmGateway>,
        template: Template,
        scheduler: SchedulerOptions,
        options: ProcessorOptions,
    ) -> Self {
        Self {
            gateway,
            template,
            scheduler,
            options,
        }
    }

    /// Scheduling options in effect.
    pub fn scheduler_options(&self) -> &SchedulerOptions {
        &self.scheduler
    }

    /// Process every collection in order, skipping those that fail to load.
    pub async fn process_all(&self, paths: &[PathBuf]) -> RunOutcome {
        info!(files = paths.len(), "Starting run");

        let mut stats = ProcessStats::start_run();
        let mut items = Vec::new();
        let mut files = Vec::with_capacity(paths.len());

        for path in paths {
            match self.process_file(path).await {
                Ok(outcome) => {
                    stats.merge(&outcome.stats);
                    items.extend(outcome.items);
                    files.push(FileReport {
                        path: path.clone(),
                        stats: outcome.stats,
                        saved_to: outcome.saved_to,
                    });
                }
                Err(e) => {
                    error!(file = %path.display(), error = %e, "Skipping collection");
                }
            }
        }

        stats.finish();
        info!(
            files = files.len(),
            items = items.len(),
            failed = stats.failed_items,
            "Run complete"
        );

        RunOutcome {
            items,
            stats,
            files,
        }
    }

    /// Process one collection.
    pub async fn process_file(&self, path: &Path) -> Result<FileOutcome> {
        let mut records = storage::load_collection(path).await?;
        let available = records.len();
        if let Some(max) = self.options.max_items_per_file {
            records.truncate(max);
        }

        info!(
            file = %path.display(),
            available,
            processing = records.len(),
            batch_size = self.scheduler.batch_size,
            "Processing collection"
        );

        let mut scheduler =
            BatchScheduler::new(self.gateway.as_ref(), &self.template, self.scheduler.clone());
        let progress = self
            .options
            .show_progress
            .then(|| progress_bar(records.len() as u64));
        if let Some(pb) = &progress {
            scheduler = scheduler.with_progress(pb.clone());
        }

        let outcome = scheduler.run(&records).await;

        if let Some(pb) = &progress {
            pb.finish_with_message("Complete!");
        }

        let saved_to = match &self.options.output_dir {
            Some(dir) if self.options.save_individually && !outcome.items.is_empty() => {
                let name = storage::processed_file_name(path);
                match storage::save_json(&outcome.items, dir, &name).await {
                    Ok(saved) => Some(saved),
                    Err(e) => {
                        error!(file = %path.display(), error = %e, "Failed to save collection results");
                        None
                    }
                }
            }
            _ => None,
        };

        info!(
            file = %path.display(),
            success = outcome.stats.success_items,
            failed = outcome.stats.failed_items,
            duration_ms = outcome.stats.total_duration,
            "Collection complete"
        );

        Ok(FileOutcome {
            items: outcome.items,
            stats: outcome.stats,
            saved_to,
        })
    }
}

fn progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) | {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓▒░");
    pb.set_style(style);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Result of processing one collection.
#[derive(Debug, Clone)]
pub struct FileOutcome {
    /// Successful items.
    pub items: Vec<ProcessedItem>,
    /// Statistics for the collection.
    pub stats: ProcessStats,
    /// Where the items were written, if they were.
    pub saved_to: Option<PathBuf>,
}

/// Per-collection entry of a [`RunOutcome`].
#[derive(Debug, Clone)]
pub struct FileReport {
    /// The collection.
    pub path: PathBuf,
    /// Its statistics.
    pub stats: ProcessStats,
    /// Where its items were written, if they were.
    pub saved_to: Option<PathBuf>,
}

/// Result of a whole run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Successful items from every collection, in collection order.
    pub items: Vec<ProcessedItem>,
    /// Run statistics.
    pub stats: ProcessStats,
    /// Collections that loaded, in processing order.
    pub files: Vec<FileReport>,
}

impl RunOutcome {
    /// Write the run summary and statistics artifacts for `mode`.
    ///
    /// The summary is skipped when no item succeeded.
    pub async fn save(&self, dir: &Path, mode: &str) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();
        if !self.items.is_empty() {
            written.push(storage::save_json(&self.items, dir, &storage::summary_file_name(mode)).await?);
        }
        written.push(storage::save_json(&self.stats, dir, &storage::stats_file_name(mode)).await?);
        Ok(written)
    }
}
