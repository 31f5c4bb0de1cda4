//! Tracing subscriber setup for terminal and file output.

use tracing_subscriber::fmt::format;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

use std::path::Path;

const MAX_MESSAGE_CHARS: usize = 280;

/// The first `max_chars` characters of `message`, or `None` if it already fits.
fn clipped_prefix(message: &str, max_chars: usize) -> Option<&str> {
    message
        .char_indices()
        .nth(max_chars)
        .map(|(byte_index, _)| &message[..byte_index])
}

fn format_field(
    writer: &mut format::Writer<'_>,
    field: &tracing::field::Field,
    value: &dyn std::fmt::Debug,
) -> std::fmt::Result {
    let field_name = field.name();

    if field_name == "message" {
        let formatted = format!("{value:?}");
        match clipped_prefix(&formatted, MAX_MESSAGE_CHARS) {
            Some(prefix) => write!(writer, "{field_name}={prefix}..."),
            None => write!(writer, "{field_name}={formatted}"),
        }
    } else {
        write!(writer, "{field_name}={value:?}")
    }
}

/// Initialize tracing to stderr for terminal mode.
///
/// Stdout is left to the chat transcript.
pub fn init_terminal_tracing(debug: bool) {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .fmt_fields(format::debug_fn(format_field))
        .compact();

    tracing_subscriber::registry()
        .with(build_env_filter(debug))
        .with(fmt_layer)
        .init();
}

/// Initialize tracing to a daily rolling file under `log_dir`.
pub fn init_file_tracing(log_dir: &Path, debug: bool) {
    let file_appender = tracing_appender::rolling::daily(log_dir, "chatline.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // The writer must outlive every span; the process owns it until exit.
    std::mem::forget(guard);

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .fmt_fields(format::debug_fn(format_field))
        .compact();

    tracing_subscriber::registry()
        .with(build_env_filter(debug))
        .with(fmt_layer)
        .init();
}

fn build_env_filter(debug: bool) -> tracing_subscriber::EnvFilter {
    if let Ok(filter) = tracing_subscriber::EnvFilter::try_from_default_env() {
        return filter;
    }
    if debug {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::new("info")
    }
}
