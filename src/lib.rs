//! # llm-batch
//!
//! Template-driven batch runner for LLM chat APIs.
//!
//! Every record of every JSON collection is rendered into a prompt, sent to an
//! OpenAI-compatible chat completions endpoint, and the `<result>...</result>`
//! section of the reply is extracted into a structured result.
//!
//! ## Features
//!
//! - **Template Filling**: literal `{ field }` placeholders, filled in one pass
//! - **Tolerant Extraction**: JSON when the result parses, text when it does not, a preview when the tag is missing
//! - **Batched Concurrency**: records run one by one or in joined groups of `batch_size`
//! - **Failure Isolation**: a failed record or an unreadable collection never stops the run
//! - **Statistics**: per-batch, per-file and per-run counters and timings
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use llm_batch::{LlmConfig, Processor, ProcessorOptions, Template};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut config = LlmConfig::new("gpt-4o-mini", "https://api.openai.com/v1", "sk-...");
//!     config.batch_size = Some(5);
//!
//!     let template = Template::new("Summarize: { title }\n{ content }");
//!     let processor = Processor::new(&config, template, ProcessorOptions::default())?;
//!
//!     let files = llm_batch::storage::list_collections("data".as_ref()).await?;
//!     let run = processor.process_all(&files).await;
//!
//!     run.stats.print_summary();
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! The connection comes from a JSON file (`llm.config.json`); scheduling knobs
//! can be overridden on the command line or through `LLM_BATCH_*` environment
//! variables. See [`LlmConfig`] and [`Args`].

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod error;
pub mod extract;
pub mod processor;
pub mod record;
pub mod scheduler;
pub mod storage;
pub mod template;
pub mod tracker;

#[cfg(test)]
#[allow(missing_docs)]
mod test_support;

// Re-exports for convenience
pub use client::{LlmClient, LlmGateway};
pub use config::{Args, LlmConfig, RunMode};
pub use error::{BatchError, Result};
pub use extract::{ContentKind, ExtractedResult, StructuredResult, extract_result};
pub use processor::{FileOutcome, FileReport, Processor, ProcessorOptions, RunOutcome};
pub use record::{ProcessedItem, Record, Reply, ReplyPayload};
pub use scheduler::{BatchScheduler, ScheduleOutcome, SchedulerOptions};
pub use template::{Template, fill_template};
pub use tracker::{BatchStats, ItemDelta, ProcessStats};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
