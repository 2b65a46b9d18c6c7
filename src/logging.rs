//! Logging setup for the chatlink binary.
//!
//! Filter directives come from `CHATLINK_LOG`, falling back to `RUST_LOG`
//! and then to `chatlink=info,warn`. `CHATLINK_LOG_FORMAT` picks the output
//! style: `pretty` (default), `compact`, or `json`.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "chatlink=info,warn";

/// Output style, selected by `CHATLINK_LOG_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

fn parse_format(label: &str) -> LogFormat {
    match label.trim().to_ascii_lowercase().as_str() {
        "json" => LogFormat::Json,
        "compact" => LogFormat::Compact,
        _ => LogFormat::Pretty,
    }
}

fn format_from_env() -> LogFormat {
    std::env::var("CHATLINK_LOG_FORMAT")
        .map(|raw| parse_format(&raw))
        .unwrap_or_default()
}

fn directives_from_env() -> String {
    std::env::var("CHATLINK_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| DEFAULT_FILTER.to_string())
}

/// Install the global subscriber from the environment.
///
/// Call once at startup; later calls are ignored.
pub fn init_from_env() {
    let filter = EnvFilter::try_new(directives_from_env())
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let _ = match format_from_env() {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_labels_parse_loosely() {
        assert_eq!(parse_format("json"), LogFormat::Json);
        assert_eq!(parse_format(" JSON "), LogFormat::Json);
        assert_eq!(parse_format("compact"), LogFormat::Compact);
        assert_eq!(parse_format("yaml"), LogFormat::Pretty);
        assert_eq!(parse_format(""), LogFormat::Pretty);
    }

    #[test]
    fn environment_selects_filter_and_format() {
        // One test body mutates these variables end to end: the process
        // environment is shared across test threads.
        unsafe {
            std::env::remove_var("CHATLINK_LOG");
            std::env::remove_var("RUST_LOG");
            std::env::remove_var("CHATLINK_LOG_FORMAT");
        }
        assert_eq!(format_from_env(), LogFormat::Pretty);
        assert_eq!(directives_from_env(), DEFAULT_FILTER);

        unsafe { std::env::set_var("CHATLINK_LOG_FORMAT", "compact") };
        assert_eq!(format_from_env(), LogFormat::Compact);

        unsafe { std::env::set_var("RUST_LOG", "debug") };
        assert_eq!(directives_from_env(), "debug");

        unsafe { std::env::set_var("CHATLINK_LOG", "chatlink=trace") };
        assert_eq!(directives_from_env(), "chatlink=trace");

        unsafe {
            std::env::remove_var("CHATLINK_LOG");
            std::env::remove_var("RUST_LOG");
            std::env::remove_var("CHATLINK_LOG_FORMAT");
        }
    }
}
