/*!
 * Logging and tracing initialization
 */

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingSettings;
use crate::error::{Result, ShardpoolError};

/// Crates whose events pass the default filter
const TARGETS: [&str; 2] = ["shardpool", "shardpool_core"];

/// Initialize structured logging based on configuration
///
/// `RUST_LOG` takes precedence over the configured level; `verbose` forces debug.
/// Events go to stderr as compact text, or to `settings.file` as JSON lines.
pub fn init_logging(settings: &LoggingSettings, verbose: bool) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directives(effective_level(settings, verbose))))
        .map_err(|e| ShardpoolError::Config(format!("Failed to create log filter: {}", e)))?;

    // Exactly one of the two is set
    let (console, json) = match &settings.file {
        Some(path) => {
            let file = open_log_file(path)?;
            let json = fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .with_ansi(false)
                .with_writer(Arc::new(file));
            (None, Some(json))
        }
        None => {
            // stderr keeps stdout free for command output
            let console = fmt::layer()
                .compact()
                .with_target(true)
                .with_writer(std::io::stderr);
            (Some(console), None)
        }
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console)
        .with(json)
        .init();

    Ok(())
}

fn effective_level(settings: &LoggingSettings, verbose: bool) -> Level {
    if verbose {
        Level::DEBUG.max(settings.level.to_tracing_level())
    } else {
        settings.level.to_tracing_level()
    }
}

fn default_directives(level: Level) -> String {
    TARGETS
        .iter()
        .map(|target| format!("{}={}", target, level))
        .collect::<Vec<_>>()
        .join(",")
}

/// Open the log file for appending so restarts keep earlier output
fn open_log_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| {
            ShardpoolError::Config(format!(
                "Failed to open log file {}: {}",
                path.display(),
                e
            ))
        })
}
