use std::process::ExitCode;

use tracing::Level;
use vitral_core::config::{AppConfig, LoadOptions, LogFormat};

/// Logs go to stderr so stdout carries only the command payload.
fn init_logging() {
    let logging = AppConfig::load(LoadOptions::default()).map(|config| config.logging).ok();
    let log_level = logging
        .as_ref()
        .and_then(|logging| logging.level.parse::<Level>().ok())
        .unwrap_or(Level::WARN);
    let format = logging.map(|logging| logging.format).unwrap_or(LogFormat::Compact);

    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_max_level(log_level);

    match format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn main() -> ExitCode {
    init_logging();
    vitral_cli::run()
}
