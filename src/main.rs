//! # News Ingest
//!
//! Runs one ingestion pass over the configured keywords and writes the run
//! report as JSON.
//!
//! ## Usage
//!
//! ```sh
//! news_ingest --keywords "ilhabela,ubatuba" --signature-file ./signatures.json
//! ```
//!
//! ## Steps
//!
//! 1. **Configuration**: YAML file (optional), then CLI/env overrides, then validation
//! 2. **Ledger**: load the signature store, if a file is configured
//! 3. **Run**: feed → resolve → extract → gate, per keyword
//! 4. **Output**: dated report JSON, `latest.json`, persisted signatures

use clap::Parser;
use news_ingest::http::ReqwestFetcher;
use news_ingest::outputs::json;
use news_ingest::utils::{ensure_writable_dir, truncate_for_log};
use news_ingest::{Pipeline, PipelineConfig, SignatureStore};
use std::error::Error;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod cli;

use cli::Cli;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("news_ingest starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    // --- Configuration ---
    let mut config = match &args.config {
        Some(path) => {
            let config = PipelineConfig::from_yaml_file(path).await?;
            info!(config_path = %path, "Loaded configuration");
            config
        }
        None => PipelineConfig::default(),
    };
    args.apply_to(&mut config);
    config.normalize_keywords();
    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(e.into());
    }
    info!(
        keywords = config.keywords.len(),
        min_chars = config.gate.min_chars,
        min_paragraphs = config.gate.min_paragraphs,
        recency_window_minutes = config.gate.recency_window_minutes,
        "Configuration ready"
    );

    ensure_writable_dir(&args.output_dir).await?;

    // --- Signature ledger ---
    let store = match &args.signature_file {
        Some(path) => SignatureStore::load(path, config.store.max_signatures).await?,
        None => SignatureStore::new(config.store.max_signatures),
    };
    info!(
        signatures = store.len(),
        max_signatures = store.max_size(),
        "Signature ledger ready"
    );
    let store = Arc::new(store);

    // --- Run ---
    let fetcher = ReqwestFetcher::new(&config.http)?;
    let keywords = config.keywords.clone();
    let pipeline = Pipeline::new(fetcher, config, Arc::clone(&store))?;
    let report = pipeline.process_all(&keywords).await?;

    for (keyword, article) in report.accepted() {
        info!(
            keyword,
            title = %truncate_for_log(&article.title, 120),
            url = %article.source_url,
            chars = article.char_count,
            "Accepted"
        );
    }
    for failure in &report.feed_failures {
        error!(keyword = %failure.keyword, error = %failure.error, "Feed failed");
    }

    // --- Output ---
    match json::write_report(&report, &args.output_dir).await {
        Ok(path) => info!(path = %path.display(), "Report written"),
        Err(e) => error!(error = %e, "Failed to write report"),
    }

    if let Some(path) = &args.signature_file {
        if let Err(e) = store.persist(path).await {
            error!(path = %path, error = %e, "Failed to persist signature store");
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        accepted = report.accepted_count(),
        "Execution complete"
    );

    Ok(())
}
