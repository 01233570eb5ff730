//! Tracing setup: a log file plus stderr. Stdout carries the protocol only.

use std::path::Path;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use loremaster_core::config::GeneralConfig;

/// Install the global subscriber.
///
/// `RUST_LOG` overrides `level`. If the log file cannot be opened, logging
/// continues on stderr alone.
pub fn init(general: &GeneralConfig, level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stderr_layer = fmt::layer().with_writer(std::io::stderr);
    let (file_layer, file_error) = match open_log_file(Path::new(&general.log_dir), &general.log_file) {
        Ok(appender) => (
            Some(fmt::layer().with_writer(appender).with_ansi(false)),
            None,
        ),
        Err(e) => (None, Some(e)),
    };

    let initialized = tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init();

    if let Err(e) = initialized {
        eprintln!("tracing subscriber already set: {e}");
        return;
    }
    if let Some(e) = file_error {
        tracing::warn!(
            dir = %general.log_dir,
            file = %general.log_file,
            error = %e,
            "Log file unavailable, logging to stderr only"
        );
    }
}

/// A file appender that never rotates.
fn open_log_file(
    dir: &Path,
    file: &str,
) -> Result<RollingFileAppender, tracing_appender::rolling::InitError> {
    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file)
        .build(dir)
}
