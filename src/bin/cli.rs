//! notice-push CLI
//!
//! Local execution entry point. For AWS Lambda, use `notice-push-lambda`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use notice_push::{
    error::{AppError, Result},
    models::{Config, Source, SourceConfig},
    pipeline::{Ingestor, purge_collection},
    push::build_push,
    services::{Notifier, PostingRepository, SourceAdapter, build_adapter},
    storage::open_store,
    utils::http,
};

/// notice-push - announcement board watcher
#[derive(Parser, Debug)]
#[command(
    name = "notice-push",
    version,
    about = "Push notifications for new tender and announcement postings"
)]
struct Cli {
    /// Path to storage directory containing config.toml and local records
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one ingestion pass
    Run {
        /// Only run these sources (repeatable); defaults to every enabled source
        #[arg(long = "source")]
        sources: Vec<Source>,

        /// Log notifications instead of sending them
        #[arg(long)]
        dry_run: bool,
    },

    /// Fetch and parse one source without touching the store
    Probe {
        #[arg(long)]
        source: Source,

        /// Maximum postings to print
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Print every stored record
    List,

    /// Delete every stored record
    Purge {
        #[arg(long, default_value_t = 10)]
        batch_size: usize,

        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },

    /// Send a test notification per source
    TestPush {
        /// Only these sources (repeatable); defaults to all
        #[arg(long = "source")]
        sources: Vec<Source>,
    },

    /// Validate configuration
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Configured sources selected on the command line.
fn select_sources<'a>(config: &'a Config, requested: &[Source]) -> Result<Vec<&'a SourceConfig>> {
    if requested.is_empty() {
        return Ok(config.enabled_sources().collect());
    }
    requested
        .iter()
        .map(|&source| {
            config
                .source(source)
                .ok_or_else(|| AppError::config(format!("Source {source} is not configured")))
        })
        .collect()
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = cli.storage_dir.join("config.toml");
    let config = Config::load_or_default(&config_path);
    log::debug!("Loaded configuration from {}", config_path.display());

    match cli.command {
        Command::Run { sources, dry_run } => {
            config.validate()?;
            let client = http::create_client(&config.crawler)?;
            let adapters = select_sources(&config, &sources)?
                .into_iter()
                .map(|source| build_adapter(&config, source, client.clone()))
                .collect::<Result<Vec<Box<dyn SourceAdapter>>>>()?;

            let store = open_store(&config.store, &cli.storage_dir).await?;
            let push = build_push(&config.push, &cli.storage_dir, dry_run)?;
            let ingestor = Ingestor::new(
                PostingRepository::from_config(store, &config.store),
                Notifier::new(push, &config.push),
                config.crawler.max_concurrent,
            );

            let report = ingestor.run(&adapters).await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Command::Probe { source, limit } => {
            let source_config = config
                .source(source)
                .ok_or_else(|| AppError::config(format!("Source {source} is not configured")))?;
            let client = http::create_client(&config.crawler)?;
            let adapter = build_adapter(&config, source_config, client)?;

            let postings = adapter.extract().await?;
            log::info!("[{}] {} posting(s) parsed", source, postings.len());
            for posting in postings.iter().take(limit) {
                println!(
                    "{:>8} | {} | {} | {}",
                    posting.number, posting.date, posting.title, posting.link
                );
            }
        }

        Command::List => {
            let store = open_store(&config.store, &cli.storage_dir).await?;
            let repository = PostingRepository::from_config(store, &config.store);
            let records = repository.list().await?;
            for record in &records {
                println!(
                    "{} [{}] {} | {} | {}",
                    record.created_at.format("%Y-%m-%d %H:%M:%S"),
                    record.source,
                    record.title,
                    record.date,
                    record.link
                );
            }
            log::info!("{} record(s) in '{}'", records.len(), repository.collection());
        }

        Command::Purge { batch_size, yes } => {
            if !yes {
                log::warn!(
                    "Refusing to purge '{}' without --yes",
                    config.store.collection
                );
                return Ok(());
            }
            let store = open_store(&config.store, &cli.storage_dir).await?;
            purge_collection(store.as_ref(), &config.store.collection, batch_size).await?;
        }

        Command::TestPush { sources } => {
            let push = build_push(&config.push, &cli.storage_dir, false)?;
            let notifier = Notifier::new(push, &config.push);
            let sources = if sources.is_empty() {
                Source::ALL.to_vec()
            } else {
                sources
            };

            let mut sent = 0;
            for source in &sources {
                let link = config
                    .source(*source)
                    .map_or("", |s| s.list_url.as_str());
                match notifier.send(&notifier.test_message(*source, link)).await {
                    Ok(id) => {
                        sent += 1;
                        log::info!("[{}] Test push sent: {}", source, id);
                    }
                    Err(e) => log::error!("[{}] Test push failed: {}", source, e),
                }
            }
            log::info!("{}/{} test notification(s) sent", sent, sources.len());
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!(
                "✓ Config OK ({} source(s), {} enabled)",
                config.sources.len(),
                config.enabled_sources().count()
            );
        }
    }

    Ok(())
}
