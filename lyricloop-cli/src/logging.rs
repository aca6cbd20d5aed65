//! Tracing setup for the command line.
//!
//! Lyrics are printed on stdout, so diagnostics go to stderr and, when
//! `[logging] enabled = true`, are also appended to the log file.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset
const DEFAULT_FILTER: &str = "warn,lyricloop=info,lyricloop_core=info";

/// Read `logging.enabled` from raw config text.
///
/// Runs before the config is loaded so the subscriber exists while loading.
/// Anything unreadable counts as disabled; the full load reports it.
pub fn file_logging_requested(config_text: &str) -> bool {
    config_text
        .parse::<toml::Table>()
        .ok()
        .and_then(|table| table.get("logging")?.get("enabled")?.as_bool())
        .unwrap_or(false)
}

fn open_log_file(path: &Path) -> Option<File> {
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    match File::options().create(true).append(true).open(path) {
        Ok(file) => Some(file),
        Err(e) => {
            eprintln!("Failed to open log file at {}: {e}", path.display());
            None
        }
    }
}

/// Install the global subscriber
pub fn init(log_file: Option<&Path>) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let file_layer = log_file.and_then(open_log_file).map(|file| {
        fmt::layer()
            .with_writer(Arc::new(file))
            .with_ansi(false)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enabled_flag_is_read() {
        assert!(file_logging_requested("[logging]\nenabled = true\n"));
        assert!(!file_logging_requested("[logging]\nenabled = false\n"));
    }

    #[test]
    fn test_missing_or_broken_config_disables_file_log() {
        assert!(!file_logging_requested(""));
        assert!(!file_logging_requested("[playback]\ntick_interval_ms = 100\n"));
        assert!(!file_logging_requested("[logging\nenabled = true"));
        assert!(!file_logging_requested("[logging]\nenabled = \"yes\"\n"));
    }

    #[test]
    fn test_default_filter_parses() {
        assert!(EnvFilter::try_new(DEFAULT_FILTER).is_ok());
    }
}
