//! llm-batch CLI - run a prompt template over JSON record collections.
//!
//! Run `llm-batch --help` for usage information.

use anyhow::Result;
use console::style;
use llm_batch::storage;
use llm_batch::{Args, LlmConfig, Processor, ProcessorOptions, SchedulerOptions, Template};
use std::path::PathBuf;
use tracing::{Level, error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse_args();

    // Setup logging
    setup_logging(&args);

    // Print banner
    if !args.json_logs {
        print_banner();
    }

    // Load configuration and template
    let config = match LlmConfig::from_args(&args) {
        Ok(c) => c,
        Err(e) => fail(&format!("Configuration error: {e}")),
    };
    let template = match Template::from_file(&args.template) {
        Ok(t) => t,
        Err(e) => fail(&format!("Template error: {e}")),
    };
    info!(model = %config.model, template = %args.template.display(), "Configuration loaded");

    // Discover collections
    let files = match storage::list_collections(&args.data_dir).await {
        Ok(files) => files,
        Err(e) => fail(&format!("Data directory error: {e}")),
    };
    info!(count = files.len(), dir = %args.data_dir.display(), "Found collections");

    let mode = args.mode();
    let fields = template.placeholders();
    let processor = Processor::new(
        &config,
        template,
        ProcessorOptions {
            max_items_per_file: args.max_items_per_file(),
            output_dir: Some(args.output_dir.clone()),
            save_individually: true,
            show_progress: !args.no_progress && !args.json_logs,
        },
    )?;

    // Dry run mode
    if args.dry_run {
        println!("\n{}", style("DRY RUN MODE").yellow().bold());
        println!("Configuration validated successfully.\n");
        print_config_summary(&args, &config, processor.scheduler_options(), &fields, &files);
        return Ok(());
    }

    if !args.json_logs {
        print_config_summary(&args, &config, processor.scheduler_options(), &fields, &files);
    }

    info!(mode = mode.label(), files = files.len(), "Starting processing");
    let run = processor.process_all(&files).await;

    if let Err(e) = run.save(&args.output_dir, mode.label()).await {
        error!(error = %e, "Failed to save run summary");
    }

    // Print results
    if args.json_logs {
        // JSON output for programmatic consumption
        let json_result = serde_json::json!({
            "status": "complete",
            "mode": mode.label(),
            "files": run.files.len(),
            "stats": run.stats,
        });
        println!("{}", serde_json::to_string(&json_result)?);
    } else {
        run.stats.print_summary();
        println!(
            "\n{} Results saved to: {}",
            style("✓").green().bold(),
            args.output_dir.display()
        );
        if run.stats.failed_items > 0 {
            println!(
                "{} {} items failed, see the log for details",
                style("⚠").yellow().bold(),
                run.stats.failed_items
            );
        }
    }

    Ok(())
}

fn fail(message: &str) -> ! {
    error!("{}", message);
    eprintln!("{} {}", style("Error:").red().bold(), message);
    std::process::exit(1);
}

fn setup_logging(args: &Args) {
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("llm_batch={level}")));

    if args.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .compact(),
            )
            .init();
    }
}

fn print_banner() {
    println!(
        "\n    {}",
        style("llm-batch").cyan().bold()
    );
    println!(
        "    {}",
        style("Prompt templates over record collections").white().dim()
    );
    println!(
        "    {}",
        style(format!("v{}", llm_batch::VERSION)).white().dim()
    );
    println!();
}

fn print_config_summary(
    args: &Args,
    config: &LlmConfig,
    scheduler: &SchedulerOptions,
    fields: &[String],
    files: &[PathBuf],
) {
    println!("{}", style("Configuration:").bold());
    println!("  Mode:       {}", args.mode().label());
    if let Some(max) = args.max_items_per_file() {
        println!("  Max Items:  {} per file", max);
    }
    println!("  Model:      {}", config.model);
    println!("  Endpoint:   {}", config.completions_url());
    println!("  Batch Size: {}", scheduler.batch_size);
    println!("  Delay:      {:?}", scheduler.delay);
    match scheduler.item_timeout {
        Some(timeout) => println!("  Timeout:    {:?}", timeout),
        None => println!("  Timeout:    none"),
    }
    println!("  Template:   {}", args.template.display());
    println!("  Fields:     {}", fields.join(", "));
    println!("  Output:     {}", args.output_dir.display());
    println!("  Files:      {}", files.len());
    for (i, file) in files.iter().enumerate() {
        println!("    {}. {}", i + 1, file.display());
    }
    println!();
}
