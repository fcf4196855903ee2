use std::fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const LOG_DIR: &str = "logs";
const DEFAULT_DIRECTIVE: &str = "event_sync=info";

/// Initializes the logging system with both console and file output.
///
/// `RUST_LOG` extends the default `event_sync=info` filter. The returned guard
/// flushes the JSON file log when dropped, so hold it for the life of `main`.
pub fn init_logging() -> Option<WorkerGuard> {
    let filter = || {
        EnvFilter::from_default_env().add_directive(
            DEFAULT_DIRECTIVE
                .parse()
                .unwrap_or_else(|_| tracing::level_filters::LevelFilter::INFO.into()),
        )
    };

    if let Err(e) = fs::create_dir_all(LOG_DIR) {
        // Console only
        let _ = tracing_subscriber::registry()
            .with(filter())
            .with(fmt::layer().with_target(false).with_writer(std::io::stdout))
            .try_init();
        tracing::warn!("Cannot create {} directory, file logging disabled: {}", LOG_DIR, e);
        return None;
    }

    // Daily-rolled JSON file next to the console output
    let file_appender = tracing_appender::rolling::daily(LOG_DIR, "event_sync.log");
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = fmt::layer().json().with_writer(non_blocking_writer);

    let _ = tracing_subscriber::registry()
        .with(filter())
        .with(file_layer)
        .with(fmt::layer().with_target(false).with_writer(std::io::stdout))
        .try_init();

    Some(guard)
}
