//! Configuration management for llm-batch.
//!
//! The LLM connection settings come from a JSON file; CLI arguments (and
//! their `LLM_BATCH_*` environment variables) override scheduling knobs on
//! top of it.

use crate::error::{BatchError, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Number of records processed per file in demo mode.
pub const DEMO_MAX_ITEMS: usize = 10;

/// CLI arguments for the llm-batch runner.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "llm-batch",
    version,
    about = "Run a prompt template over JSON record collections through an LLM chat API",
    long_about = "llm-batch fills a prompt template for every record of every JSON file in a\n\
                  data directory, sends it to an OpenAI-compatible chat endpoint and extracts\n\
                  the <result>...</result> section of each reply.\n\n\
                  Without --full only the first records of each file are processed.",
    after_help = "EXAMPLES:\n    \
        llm-batch\n    \
        llm-batch --full --batch-size 5\n    \
        llm-batch --config llm.config.json --template llm_prompt.md --data-dir data --dry-run"
)]
pub struct Args {
    /// Process every record instead of the demo subset
    #[arg(long, env = "LLM_BATCH_FULL")]
    pub full: bool,

    /// Path to the LLM configuration file (JSON)
    #[arg(short, long, default_value = "llm.config.json", env = "LLM_BATCH_CONFIG")]
    pub config: PathBuf,

    /// Path to the prompt template
    #[arg(short, long, default_value = "llm_prompt.md", env = "LLM_BATCH_TEMPLATE")]
    pub template: PathBuf,

    /// Directory scanned for *.json record collections
    #[arg(short, long, default_value = "data", env = "LLM_BATCH_DATA_DIR")]
    pub data_dir: PathBuf,

    /// Directory receiving result files
    #[arg(short, long, default_value = "dist", env = "LLM_BATCH_OUTPUT_DIR")]
    pub output_dir: PathBuf,

    /// Records per file in demo mode
    #[arg(short = 'm', long, default_value_t = DEMO_MAX_ITEMS, env = "LLM_BATCH_MAX_ITEMS")]
    pub max_items: usize,

    /// Delay between requests (sequential) or batches (concurrent), in milliseconds
    #[arg(long, env = "LLM_BATCH_DELAY_MS")]
    pub delay_ms: Option<u64>,

    /// Concurrent requests per batch (overrides the config file)
    #[arg(short, long, env = "LLM_BATCH_BATCH_SIZE")]
    pub batch_size: Option<usize>,

    /// Enable verbose logging
    #[arg(short, long, env = "LLM_BATCH_VERBOSE")]
    pub verbose: bool,

    /// Output logs as JSON
    #[arg(long, env = "LLM_BATCH_JSON_LOGS")]
    pub json_logs: bool,

    /// Disable progress bar
    #[arg(long, env = "LLM_BATCH_NO_PROGRESS")]
    pub no_progress: bool,

    /// Dry run - validate inputs without sending requests
    #[arg(long)]
    pub dry_run: bool,
}

impl Args {
    /// Parse CLI arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The run mode selected by `--full`.
    pub fn mode(&self) -> RunMode {
        if self.full { RunMode::Full } else { RunMode::Demo }
    }

    /// Per-file item cap for the selected mode.
    pub fn max_items_per_file(&self) -> Option<usize> {
        match self.mode() {
            RunMode::Full => None,
            RunMode::Demo => Some(self.max_items),
        }
    }
}

/// Whether a run covers every record or only a demo subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// First few records of each file.
    Demo,
    /// All records.
    Full,
}

impl RunMode {
    /// Label used in artifact names.
    pub fn label(self) -> &'static str {
        match self {
            Self::Demo => "demo",
            Self::Full => "full",
        }
    }
}

/// LLM connection and scheduling settings, as stored in `llm.config.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Model identifier sent with every request.
    pub model: String,

    /// Base URL of the OpenAI-compatible API (without `/chat/completions`).
    pub base_url: String,

    /// Bearer token.
    #[serde(default)]
    pub api_key: String,

    /// Requests per concurrent batch; absent or <= 1 means sequential.
    #[serde(default)]
    pub batch_size: Option<i64>,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Completion token limit.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Pause between requests or batches, in milliseconds.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    /// Per-item timeout in seconds. Unset means an item may wait forever.
    #[serde(default)]
    pub item_timeout_secs: Option<u64>,

    /// Count gateway transport failures as failed items instead of
    /// successful items carrying an error message.
    #[serde(default)]
    pub count_gateway_errors_as_failures: bool,
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    2000
}

fn default_delay_ms() -> u64 {
    1000
}

impl LlmConfig {
    /// Create a config with defaults for everything but the connection.
    pub fn new(
        model: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            model: model.into(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            batch_size: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            delay_ms: default_delay_ms(),
            item_timeout_secs: None,
            count_gateway_errors_as_failures: false,
        }
    }

    /// Load configuration from a file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| BatchError::ConfigRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        serde_json::from_str(&content).map_err(|e| BatchError::ConfigParse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Load the config file named by the CLI and apply CLI overrides.
    pub fn from_args(args: &Args) -> Result<Self> {
        let mut config = Self::from_file(&args.config)?;

        if let Some(batch_size) = args.batch_size {
            config.batch_size = Some(batch_size as i64);
        }
        if let Some(delay_ms) = args.delay_ms {
            config.delay_ms = delay_ms;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(BatchError::InvalidConfig(
                "model cannot be empty".to_string(),
            ));
        }
        if self.base_url.trim().is_empty() {
            return Err(BatchError::InvalidConfig(
                "base_url cannot be empty".to_string(),
            ));
        }
        if self.item_timeout_secs == Some(0) {
            return Err(BatchError::InvalidConfig(
                "item_timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Effective batch size, never below 1.
    pub fn effective_batch_size(&self) -> usize {
        match self.batch_size {
            Some(n) if n > 1 => n as usize,
            _ => 1,
        }
    }

    /// Pause between dispatch units.
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Per-item timeout, if configured.
    pub fn item_timeout(&self) -> Option<Duration> {
        self.item_timeout_secs.map(Duration::from_secs)
    }

    /// Full chat completions URL.
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

/// Load the prompt template text.
pub fn load_template_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| BatchError::ConfigRead {
        path: path.to_path_buf(),
        source: e,
    })
}
