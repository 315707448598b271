//! Logging initialization using the `tracing` ecosystem.
//!
//! Console output is always on. When a log directory is given, a second,
//! non-blocking layer writes plain-text lines to daily-rotated files. The
//! level comes from `RUST_LOG` when set, otherwise from the config value.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber.
///
/// Must be called once, before the first log line. The returned guard flushes
/// the file writer on drop, so the caller keeps it alive for the whole run.
///
/// - `log_level`: fallback filter when `RUST_LOG` is unset (e.g. `"info"`,
///   `"ktb_bot=debug,info"`)
/// - `log_dir`: directory for the rotating files, `None` for console only
/// - `file_prefix`: log file name prefix (e.g. `"ktb-runner"`)
pub fn init_logging(
    log_level: &str,
    log_dir: Option<&Path>,
    file_prefix: &str,
) -> Option<WorkerGuard> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let console_layer = fmt::layer().with_target(false).with_ansi(true);

    match log_dir {
        Some(dir) => {
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, file_prefix));
            let file_layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(console_layer)
                .with(file_layer)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(console_layer)
                .init();
            None
        }
    }
}
