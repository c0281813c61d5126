//! Initialization helpers for the application startup.

use crate::background::{Background, MessageSender};
use crate::config::Config;
use crate::engine::{HttpListSource, RemoteSync};
use crate::logger::ActionLogger;
use crate::stats::StatsCollector;
use crate::storage::{JsonFileStorage, Storage};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

/// Sets up the tracing subscriber with the configured filters.
pub fn setup_logging(config: &Config) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let mut filter = config.logging.level.clone();

        // The HTTP stack is chatty at debug; keep it quiet unless asked for
        if !filter.contains("reqwest") {
            filter.push_str(",reqwest=off");
        }
        if !filter.contains("hyper") {
            filter.push_str(",hyper=off");
        }

        tracing_subscriber::EnvFilter::new(filter)
    });

    let builder = tracing_subscriber::fmt().with_env_filter(env_filter);
    if config.logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Periodic dumps only when stats are enabled.
pub fn init_stats(config: &Config) -> Arc<StatsCollector> {
    if config.stats.enable {
        StatsCollector::with_dump(config.stats.log_interval_seconds)
    } else {
        StatsCollector::new()
    }
}

pub fn init_action_logger(config: &Config) -> Arc<ActionLogger> {
    if config.logging.enable {
        ActionLogger::new(config.logging.clone(), Vec::new())
    } else {
        info!("Action logging disabled.");
        ActionLogger::disabled()
    }
}

/// Opens the file-backed storage and starts the background task on it.
pub fn init_background(config: &Config) -> Result<(Arc<dyn Storage>, MessageSender)> {
    info!("Using storage file {}", config.storage.path);
    let storage: Arc<dyn Storage> = Arc::new(JsonFileStorage::new(&config.storage.path));

    let source = HttpListSource::new(&config.sync).context("Failed to build HTTP client")?;
    let sync = RemoteSync::new(storage.clone(), Arc::new(source), config.sync.interval());

    let sender = Background::new(storage.clone(), sync).spawn();
    Ok((storage, sender))
}
