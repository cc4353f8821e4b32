// External crates
use anyhow::{Context, Result};
use std::{io, panic, path::Path};
use tracing::error;
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    filter::{Directive, EnvFilter},
    fmt,
    prelude::*,
    registry::Registry,
};

/// File name prefix of the rolling diagnostics log.
const LOG_FILE_PREFIX: &str = "gtail.log";

/// Install the global subscriber.
///
/// Diagnostics go to stderr (stdout carries the tailed messages), filtered by
/// `RUST_LOG` and defaulting to `warn`. With `log_dir` set, a JSON copy is
/// also written to a daily rolling file there. Keep the returned guard alive
/// until exit so buffered file output is flushed.
pub fn init_tracing(log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    // Connection-level chatter from the HTTP stack is rarely useful.
    for noisy in ["hyper_util=warn", "reqwest=warn"] {
        if let Ok(directive) = noisy.parse::<Directive>() {
            filter = filter.add_directive(directive);
        }
    }

    let stderr_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_ansi(io::IsTerminal::is_terminal(&io::stderr()))
        .with_target(false)
        .with_timer(fmt::time::UtcTime::rfc_3339());

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let file_appender = rolling::daily(dir, LOG_FILE_PREFIX);
            let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);

            let json_layer = fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(non_blocking_writer)
                .with_file(true)
                .with_line_number(true)
                .with_thread_ids(true)
                .with_target(true)
                .with_timer(fmt::time::UtcTime::rfc_3339());

            (Some(json_layer), Some(guard))
        }
        None => (None, None),
    };

    let subscriber = Registry::default()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .with(ErrorLayer::default());

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set global tracing subscriber")?;

    Ok(guard)
}

/// Route panics through `tracing` so they also reach the log file.
pub fn init_panic_handler() {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let msg = panic_info
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| panic_info.payload().downcast_ref::<String>().map(String::as_str))
            .unwrap_or("Unknown panic");

        let location = panic_info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_else(|| "unknown location".to_string());

        error!(
            message = %msg,
            location = %location,
            "Application panicked!"
        );
        default_hook(panic_info);
    }));
}
