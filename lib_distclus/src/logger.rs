#![forbid(unsafe_code)]

use std::fs;

use anyhow::Result;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::BoundaryConfig;

const LOG_FILE_PREFIX: &str = "distclus";

/// Installs the process-wide subscriber: stdout always, plus a daily rolling
/// file under `log_dir` when one is configured.
///
/// Returns `Ok(false)` when a subscriber is already installed, by this
/// function or by the host, and leaves that one in place.
pub fn setup_logging(config: &BoundaryConfig) -> Result<bool> {
    let filter = EnvFilter::try_new(config.log_level()).or_else(|_| EnvFilter::try_new("info"))?;

    let file_layer = match &config.log_dir {
        Some(log_dir) => {
            if !log_dir.exists() {
                fs::create_dir_all(log_dir)?;
            }
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix(LOG_FILE_PREFIX)
                .filename_suffix("log")
                .max_log_files(config.max_log_files.unwrap_or(7).max(1))
                .build(log_dir)?;
            Some(fmt::layer().with_ansi(false).with_writer(appender))
        }
        None => None,
    };

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stdout))
        .with(file_layer)
        .try_init()
        .is_ok();

    if installed {
        tracing::info!(level = config.log_level(), log_dir = ?config.log_dir, "logging initialised");
    }
    Ok(installed)
}
