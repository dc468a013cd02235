//! AWS Lambda entry point for notice-push
//!
//! Deploy with `cargo lambda build --release --features lambda` and attach
//! a scheduled (EventBridge) trigger. Each invocation runs one ingestion
//! pass with the S3 store and FCM push, and returns the run report.

use std::path::PathBuf;
use std::str::FromStr;

use lambda_runtime::{Error as LambdaError, LambdaEvent, service_fn};
use notice_push::{
    models::{Config, StoreBackend},
    pipeline::Ingestor,
    push::build_push,
    services::{Notifier, PostingRepository, build_adapters},
    storage::open_store,
    utils::http,
};
use serde_json::Value;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the AWS Lambda function.
#[tokio::main]
async fn main() -> Result<(), LambdaError> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("notice-push Lambda starting...");
    lambda_runtime::run(service_fn(handler)).await
}

fn env_override<T: FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring invalid {}={}", name, raw);
            None
        }
    }
}

/// Configuration from `CONFIG_PATH` (or defaults) plus environment overrides.
fn load_config() -> Config {
    let mut config = match std::env::var("CONFIG_PATH") {
        Ok(path) => Config::load_or_default(path),
        Err(_) => Config::default(),
    };

    if let Some(secs) = env_override("CRAWL_TIMEOUT_SECS") {
        config.crawler.timeout_secs = secs;
    }
    if let Some(max) = env_override("MAX_CONCURRENT") {
        config.crawler.max_concurrent = max;
    }
    config.store.backend = StoreBackend::S3;
    config
}

/// Handler for AWS Lambda events.
async fn handler(event: LambdaEvent<Value>) -> Result<Value, LambdaError> {
    info!("Received event: {:?}", event.payload);

    let config = load_config();
    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return Err(e.into());
    }

    let storage_dir = PathBuf::from(std::env::var("STORAGE_DIR").unwrap_or_else(|_| ".".into()));
    let client = http::create_client(&config.crawler)?;
    let adapters = build_adapters(&config, &client)?;
    let store = open_store(&config.store, &storage_dir).await?;
    let push = build_push(&config.push, &storage_dir, false)?;

    let ingestor = Ingestor::new(
        PostingRepository::from_config(store, &config.store),
        Notifier::new(push, &config.push),
        config.crawler.max_concurrent,
    );
    let report = ingestor.run(&adapters).await;

    info!(
        "Lambda execution finished: {} created, {} notified, {} failed source(s)",
        report.total_created(),
        report.total_notified(),
        report.failed_sources()
    );
    Ok(serde_json::to_value(&report)?)
}
