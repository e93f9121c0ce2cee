//! `finsource` command-line front end.
//!
//! Every command prints JSON on stdout; logs go to stderr.

mod cli;
mod commands;
mod config;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use finsource_core::MergeCache;
use finsource_market_data::FinancialDataService;
use finsource_storage_sqlite::SqliteCacheBackend;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::Cli;
use crate::config::{Config, IN_MEMORY_DB};

fn init_tracing() {
    let log_format = std::env::var("FINSOURCE_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_line_number(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn open_cache(db_path: &str) -> Result<Arc<MergeCache>> {
    if db_path == IN_MEMORY_DB {
        tracing::info!("Using in-memory cache");
        return Ok(Arc::new(MergeCache::in_memory()));
    }
    let backend = SqliteCacheBackend::open(db_path)?;
    tracing::info!("Cache database in use: {}", db_path);
    Ok(Arc::new(MergeCache::new(Arc::new(backend))))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(source) = &cli.source {
        config.settings.data_source = source.clone();
    }

    let cache = open_cache(&config.db_path)?;
    let service = FinancialDataService::new(config.settings, config.credentials, cache, None);

    let result = commands::run(&cli, &service).await;
    if let Err(e) = service.shutdown() {
        tracing::warn!("Cache flush on shutdown failed: {}", e);
    }

    println!("{}", serde_json::to_string_pretty(&result?)?);
    Ok(())
}
