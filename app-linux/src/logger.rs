// Logger setup for the tray shell: env_logger at the configured level,
// optionally appending to a file.

use std::fs::OpenOptions;

use log::warn;
use vpn_indicator_core::config::LoggingConfig;

/// Initializes the logger. `RUST_LOG` overrides the configured level.
pub fn init_logger(config: &LoggingConfig) {
    let mut builder = env_logger::Builder::new();
    builder.parse_filters(&config.level);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }

    let mut file_error = None;
    if let Some(path) = &config.file {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => {
                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
            Err(e) => file_error = Some((path.clone(), e)),
        }
    }

    builder.init();

    if let Some((path, e)) = file_error {
        warn!("Cannot open log file {path}: {e}; logging to stderr");
    }
}
