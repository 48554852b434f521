//! Per-file dispatch of records to the LLM.
//!
//! With a batch size of 1 records run one after another. With a larger batch
//! size they run in consecutive groups: every record of a group is in flight
//! at once, the group is joined, and only then does the next group start.
//! The configured delay separates consecutive requests or groups.

use crate::client::LlmGateway;
use crate::config::LlmConfig;
use crate::error::{BatchError, Result};
use crate::extract::extract_result;
use crate::record::{ProcessedItem, Record, Reply, ReplyPayload, display_title};
use crate::template::Template;
use crate::tracker::{BatchStats, ItemDelta, ProcessStats};
use chrono::{SecondsFormat, Utc};
use futures::future::join_all;
use indicatif::ProgressBar;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

/// Scheduling knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerOptions {
    /// Records in flight together; 1 means sequential.
    pub batch_size: usize,
    /// Pause between requests (sequential) or groups (concurrent).
    pub delay: Duration,
    /// Upper bound on one record's pipeline. `None` waits indefinitely.
    pub item_timeout: Option<Duration>,
    /// Treat gateway transport failures as failed items.
    pub count_gateway_errors_as_failures: bool,
}

impl SchedulerOptions {
    /// Options taken from the LLM configuration.
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            batch_size: config.effective_batch_size(),
            delay: config.delay(),
            item_timeout: config.item_timeout(),
            count_gateway_errors_as_failures: config.count_gateway_errors_as_failures,
        }
    }

    /// Whether records run in concurrent groups.
    pub fn is_concurrent(&self) -> bool {
        self.batch_size > 1
    }
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            batch_size: 1,
            delay: Duration::from_secs(1),
            item_timeout: None,
            count_gateway_errors_as_failures: false,
        }
    }
}

/// Items and statistics produced for one file.
#[derive(Debug, Clone)]
pub struct ScheduleOutcome {
    /// Successful items, in input order (group order when concurrent).
    pub items: Vec<ProcessedItem>,
    /// Finished statistics for the file.
    pub stats: ProcessStats,
}

/// Result of one record's pipeline, before it is folded into the stats.
struct ItemOutcome {
    delta: ItemDelta,
    result: Result<ProcessedItem>,
}

impl ItemOutcome {
    fn failed(reply: Option<&ReplyPayload>, error: BatchError) -> Self {
        Self {
            delta: ItemDelta::failure(reply),
            result: Err(error),
        }
    }
}

/// Runs the records of one file through fill, call and extract.
pub struct BatchScheduler<'a> {
    gateway: &'a dyn LlmGateway,
    template: &'a Template,
    options: SchedulerOptions,
    progress: Option<ProgressBar>,
}

impl<'a> BatchScheduler<'a> {
    /// Create a scheduler.
    pub fn new(
        gateway: &'a dyn LlmGateway,
        template: &'a Template,
        options: SchedulerOptions,
    ) -> Self {
        Self {
            gateway,
            template,
            options,
            progress: None,
        }
    }

    /// Advance a progress bar as records finish.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Process every record. Failures are counted, never propagated.
    pub async fn run(&self, records: &[Record]) -> ScheduleOutcome {
        let batch_size = self.options.batch_size.max(1);
        let mut stats = ProcessStats::start(records.len(), batch_size > 1);

        let items = if batch_size > 1 {
            self.run_concurrent(records, batch_size, &mut stats).await
        } else {
            self.run_sequential(records, &mut stats).await
        };

        stats.finish();
        ScheduleOutcome { items, stats }
    }

    async fn run_sequential(
        &self,
        records: &[Record],
        stats: &mut ProcessStats,
    ) -> Vec<ProcessedItem> {
        let mut items = Vec::with_capacity(records.len());

        for (index, record) in records.iter().enumerate() {
            let outcome = self.process_item(record, index).await;
            stats.record(&outcome.delta);
            match outcome.result {
                Ok(item) => items.push(item),
                Err(e) => warn!(index, error = %e, "Item failed, skipping"),
            }
            self.tick(stats, 1);

            if index + 1 < records.len() {
                self.pause().await;
            }
        }

        items
    }

    async fn run_concurrent(
        &self,
        records: &[Record],
        batch_size: usize,
        stats: &mut ProcessStats,
    ) -> Vec<ProcessedItem> {
        let mut items = Vec::with_capacity(records.len());
        let group_count = records.len().div_ceil(batch_size);

        for (group_index, group) in records.chunks(batch_size).enumerate() {
            let mut batch = BatchStats::open(group_index, group.len());
            debug!(
                batch = group_index + 1,
                batches = group_count,
                size = group.len(),
                "Starting batch"
            );

            // join_all yields outcomes in the order of `group`, so each
            // outcome stays paired with its record.
            let outcomes = join_all(
                group
                    .iter()
                    .enumerate()
                    .map(|(i, record)| self.process_item(record, group_index * batch_size + i)),
            )
            .await;

            for (i, outcome) in outcomes.into_iter().enumerate() {
                batch.record(&outcome.delta);
                stats.record(&outcome.delta);
                match outcome.result {
                    Ok(item) => items.push(item),
                    Err(e) => warn!(
                        index = group_index * batch_size + i,
                        batch = group_index + 1,
                        error = %e,
                        "Item failed, skipping"
                    ),
                }
            }

            batch.close();
            info!(
                batch = group_index + 1,
                batches = group_count,
                success = batch.success_count,
                failed = batch.failed_count,
                duration_ms = batch.duration,
                "Batch complete"
            );
            stats.push_batch(batch);
            self.tick(stats, group.len() as u64);

            if group_index + 1 < group_count {
                self.pause().await;
            }
        }

        items
    }

    /// Run one record, applying the item timeout when configured.
    async fn process_item(&self, record: &Record, index: usize) -> ItemOutcome {
        match self.options.item_timeout {
            Some(limit) => match timeout(limit, self.pipeline(record, index)).await {
                Ok(outcome) => outcome,
                Err(_) => ItemOutcome::failed(
                    None,
                    BatchError::ItemTimeout {
                        index,
                        elapsed: limit,
                    },
                ),
            },
            None => self.pipeline(record, index).await,
        }
    }

    async fn pipeline(&self, record: &Record, index: usize) -> ItemOutcome {
        debug!(index, title = %display_title(record), "Processing item");

        let prompt = self.template.fill(record);
        let reply = self.gateway.call(&prompt).await;

        if reply.transport_error {
            if self.options.count_gateway_errors_as_failures {
                return ItemOutcome::failed(
                    Some(&reply),
                    BatchError::GatewayFailure {
                        index,
                        message: reply.content.clone(),
                    },
                );
            }
            warn!(index, error = %reply.content, "Gateway failed; keeping error text as reply");
        }

        let extracted = extract_result(&reply.content);
        debug!(
            index,
            output_chars = reply.output_chars,
            result_type = extracted.result_formatted.type_label(),
            "Item processed"
        );

        ItemOutcome {
            delta: ItemDelta::success(&reply),
            result: Ok(ProcessedItem {
                original: record.clone(),
                reply: Reply {
                    context: reply.content,
                    result: extracted.result,
                    result_formatted: extracted.result_formatted,
                    time: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
                    model: self.gateway.model().to_string(),
                },
            }),
        }
    }

    async fn pause(&self) {
        if !self.options.delay.is_zero() {
            sleep(self.options.delay).await;
        }
    }

    fn tick(&self, stats: &ProcessStats, n: u64) {
        if let Some(pb) = &self.progress {
            pb.set_message(format!(
                "Success: {} | Failed: {}",
                stats.success_items, stats.failed_items
            ));
            pb.inc(n);
        }
    }
}
