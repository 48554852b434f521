//! Statistics for batch processing.
//!
//! Item tasks never touch shared counters. Each one produces an
//! [`ItemDelta`], and the scheduler folds deltas into [`BatchStats`] and
//! [`ProcessStats`] after its tasks have joined. File stats are merged into
//! run stats the same way.

use crate::record::ReplyPayload;
use serde::Serialize;

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn elapsed_ms(start: i64, end: i64) -> u64 {
    u64::try_from(end - start).unwrap_or(0)
}

/// Contribution of one finished item to the statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemDelta {
    /// Whether the item produced a result.
    pub succeeded: bool,
    /// Prompt characters, when a reply was received.
    pub input_chars: usize,
    /// Reply characters, when a reply was received.
    pub output_chars: usize,
    /// Response time of a successful item.
    pub response_ms: Option<u64>,
}

impl ItemDelta {
    /// A successful item.
    pub fn success(reply: &ReplyPayload) -> Self {
        Self {
            succeeded: true,
            input_chars: reply.input_chars,
            output_chars: reply.output_chars,
            response_ms: Some(reply.duration_ms),
        }
    }

    /// A failed item, with the reply if one came back before it failed.
    pub fn failure(reply: Option<&ReplyPayload>) -> Self {
        Self {
            succeeded: false,
            input_chars: reply.map_or(0, |r| r.input_chars),
            output_chars: reply.map_or(0, |r| r.output_chars),
            response_ms: None,
        }
    }
}

/// Statistics for one concurrent batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchStats {
    /// Position of the batch within its file, starting at 0.
    pub batch_id: usize,
    /// Items in the batch.
    pub batch_size: usize,
    /// Wall time of the batch in milliseconds.
    pub duration: u64,
    /// Items that produced a result.
    pub success_count: usize,
    /// Items that failed.
    pub failed_count: usize,
    /// Prompt characters sent.
    pub total_input_chars: usize,
    /// Reply characters received.
    pub total_output_chars: usize,
    /// Epoch milliseconds at batch start.
    pub start_time: i64,
    /// Epoch milliseconds at batch end.
    pub end_time: i64,
}

impl BatchStats {
    /// Open a batch record at the current time.
    pub fn open(batch_id: usize, batch_size: usize) -> Self {
        let start_time = now_millis();
        Self {
            batch_id,
            batch_size,
            duration: 0,
            success_count: 0,
            failed_count: 0,
            total_input_chars: 0,
            total_output_chars: 0,
            start_time,
            end_time: start_time,
        }
    }

    /// Add one item's outcome.
    pub fn record(&mut self, delta: &ItemDelta) {
        if delta.succeeded {
            self.success_count += 1;
        } else {
            self.failed_count += 1;
        }
        self.total_input_chars += delta.input_chars;
        self.total_output_chars += delta.output_chars;
    }

    /// Stamp the end time.
    pub fn close(&mut self) {
        self.end_time = now_millis();
        self.duration = elapsed_ms(self.start_time, self.end_time);
    }
}

/// Statistics for one file, or for a whole run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessStats {
    /// Items scheduled.
    pub total_items: usize,
    /// Items that produced a result.
    pub success_items: usize,
    /// Items that failed.
    pub failed_items: usize,
    /// Prompt characters sent.
    pub total_input_chars: usize,
    /// Reply characters received.
    pub total_output_chars: usize,
    /// Wall time in milliseconds.
    pub total_duration: u64,
    /// Mean response time of successful items, in milliseconds.
    pub average_response_time: f64,
    /// Sum of successful response times, in milliseconds.
    pub total_response_time: u64,
    /// Epoch milliseconds at start.
    pub start_time: i64,
    /// Epoch milliseconds at end.
    pub end_time: i64,
    /// Per-batch records, present when items ran concurrently.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_stats: Option<Vec<BatchStats>>,
    /// Whether any items ran concurrently.
    pub is_concurrent: bool,
}

impl ProcessStats {
    /// Start statistics for `total_items` items.
    pub fn start(total_items: usize, concurrent: bool) -> Self {
        let start_time = now_millis();
        Self {
            total_items,
            success_items: 0,
            failed_items: 0,
            total_input_chars: 0,
            total_output_chars: 0,
            total_duration: 0,
            average_response_time: 0.0,
            total_response_time: 0,
            start_time,
            end_time: start_time,
            batch_stats: concurrent.then(Vec::new),
            is_concurrent: concurrent,
        }
    }

    /// Start run-level statistics; totals arrive through [`merge`](Self::merge).
    pub fn start_run() -> Self {
        Self::start(0, false)
    }

    /// Add one item's outcome.
    pub fn record(&mut self, delta: &ItemDelta) {
        if delta.succeeded {
            self.success_items += 1;
        } else {
            self.failed_items += 1;
        }
        self.total_input_chars += delta.input_chars;
        self.total_output_chars += delta.output_chars;
        if let Some(ms) = delta.response_ms {
            self.total_response_time += ms;
        }
    }

    /// Append a closed batch record.
    pub fn push_batch(&mut self, batch: BatchStats) {
        self.batch_stats.get_or_insert_with(Vec::new).push(batch);
    }

    /// Fold a finished file's statistics into run statistics.
    pub fn merge(&mut self, file: &ProcessStats) {
        self.total_items += file.total_items;
        self.success_items += file.success_items;
        self.failed_items += file.failed_items;
        self.total_input_chars += file.total_input_chars;
        self.total_output_chars += file.total_output_chars;
        self.total_response_time += file.total_response_time;
        self.is_concurrent |= file.is_concurrent;
        if let Some(batches) = &file.batch_stats {
            self.batch_stats
                .get_or_insert_with(Vec::new)
                .extend(batches.iter().cloned());
        }
    }

    /// Stamp the end time and derive duration and average response time.
    pub fn finish(&mut self) {
        self.end_time = now_millis();
        self.total_duration = elapsed_ms(self.start_time, self.end_time);
        self.average_response_time = if self.success_items > 0 {
            self.total_response_time as f64 / self.success_items as f64
        } else {
            0.0
        };
    }

    /// Every scheduled item has been counted exactly once.
    pub fn is_complete(&self) -> bool {
        self.success_items + self.failed_items == self.total_items
    }

    /// Number of batch records.
    pub fn batch_count(&self) -> usize {
        self.batch_stats.as_ref().map_or(0, Vec::len)
    }

    /// Get the success rate as a percentage.
    pub fn success_rate(&self) -> f64 {
        if self.total_items > 0 {
            (self.success_items as f64 / self.total_items as f64) * 100.0
        } else {
            100.0
        }
    }

    /// Print a summary of the statistics.
    pub fn print_summary(&self) {
        println!("\n{}", "═".repeat(60));
        println!("                    PROCESSING COMPLETE");
        println!("{}", "═".repeat(60));
        println!("  Total Items:      {}", self.total_items);
        println!(
            "  Successful:       {} ({:.1}%)",
            self.success_items,
            self.success_rate()
        );
        println!("  Failed:           {}", self.failed_items);
        println!("  Input Chars:      {}", self.total_input_chars);
        println!("  Output Chars:     {}", self.total_output_chars);
        println!(
            "  Elapsed Time:     {:.2}s",
            self.total_duration as f64 / 1000.0
        );
        println!("  Avg Response:     {:.1}ms", self.average_response_time);
        if self.is_concurrent {
            println!("  Batches:          {}", self.batch_count());
        }
        println!("{}", "═".repeat(60));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(input: usize, output: usize, ms: u64) -> ReplyPayload {
        ReplyPayload {
            content: "x".repeat(output),
            duration_ms: ms,
            input_chars: input,
            output_chars: output,
            transport_error: false,
        }
    }

    #[test]
    fn test_stats_tracking() {
        let mut stats = ProcessStats::start(3, false);
        stats.record(&ItemDelta::success(&reply(10, 20, 50)));
        stats.record(&ItemDelta::success(&reply(5, 5, 100)));
        stats.record(&ItemDelta::failure(None));
        stats.finish();

        assert_eq!(stats.success_items, 2);
        assert_eq!(stats.failed_items, 1);
        assert_eq!(stats.total_input_chars, 15);
        assert_eq!(stats.total_output_chars, 25);
        assert_eq!(stats.average_response_time, 75.0);
        assert!(stats.is_complete());
        assert!(stats.batch_stats.is_none());
    }

    #[test]
    fn test_failure_with_reply_counts_chars() {
        let mut stats = ProcessStats::start(1, false);
        stats.record(&ItemDelta::failure(Some(&reply(7, 3, 10))));
        stats.finish();

        assert_eq!(stats.failed_items, 1);
        assert_eq!(stats.total_input_chars, 7);
        assert_eq!(stats.total_output_chars, 3);
        assert_eq!(stats.average_response_time, 0.0);
    }

    #[test]
    fn test_batch_stats() {
        let mut batch = BatchStats::open(2, 3);
        batch.record(&ItemDelta::success(&reply(1, 2, 5)));
        batch.record(&ItemDelta::failure(None));
        batch.record(&ItemDelta::success(&reply(3, 4, 5)));
        batch.close();

        assert_eq!(batch.success_count + batch.failed_count, batch.batch_size);
        assert_eq!(batch.total_input_chars, 4);
        assert_eq!(batch.total_output_chars, 6);
        assert!(batch.end_time >= batch.start_time);
    }

    #[test]
    fn test_merge_flattens_batches() {
        let mut first = ProcessStats::start(4, true);
        first.push_batch(BatchStats::open(0, 2));
        first.push_batch(BatchStats::open(1, 2));
        for _ in 0..4 {
            first.record(&ItemDelta::success(&reply(1, 1, 10)));
        }
        first.finish();

        let mut second = ProcessStats::start(2, false);
        second.record(&ItemDelta::success(&reply(1, 1, 40)));
        second.record(&ItemDelta::failure(None));
        second.finish();

        let mut run = ProcessStats::start_run();
        run.merge(&first);
        run.merge(&second);
        run.finish();

        assert_eq!(run.total_items, 6);
        assert_eq!(run.success_items, 5);
        assert_eq!(run.failed_items, 1);
        assert_eq!(run.batch_count(), 2);
        assert!(run.is_concurrent);
        assert!(run.is_complete());
        assert_eq!(run.average_response_time, 16.0);
    }

    #[test]
    fn test_success_rate() {
        let mut stats = ProcessStats::start(10, false);
        for _ in 0..8 {
            stats.record(&ItemDelta::success(&reply(1, 1, 1)));
        }
        for _ in 0..2 {
            stats.record(&ItemDelta::failure(None));
        }
        assert_eq!(stats.success_rate(), 80.0);
    }

    #[test]
    fn test_serialized_field_names() {
        let stats = ProcessStats::start(0, true);
        let value = serde_json::to_value(&stats).unwrap();
        assert!(value.get("successItems").is_some());
        assert!(value.get("averageResponseTime").is_some());
        assert_eq!(value["batchStats"], serde_json::json!([]));
        assert_eq!(value["isConcurrent"], true);
    }
}
