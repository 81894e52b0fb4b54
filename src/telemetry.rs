//! Telemetry initialization (tracing/tracing-subscriber).
//!
//! - LOG_LEVEL sets the filter, e.g. "debug" or
//!   "info,generation=debug,game=info,doodle_quest=debug,tower_http=info".
//! - LOG_FORMAT picks "pretty" (default) or "json".
//!
//! Targets in use: "generation" (model lifecycle), "game" (state machine),
//! "doodle_quest" (service plumbing). tower-http adds per-request spans on top.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,generation=debug,game=info,doodle_quest=debug,tower_http=info,axum=info";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    fn from_env_value(v: Option<&str>) -> Self {
        match v.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let format = LogFormat::from_env_value(std::env::var("LOG_FORMAT").ok().as_deref());

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    // JSON and pretty produce different subscriber types; init each branch separately.
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_defaults_to_pretty() {
        assert_eq!(LogFormat::from_env_value(None), LogFormat::Pretty);
        assert_eq!(LogFormat::from_env_value(Some("plain")), LogFormat::Pretty);
        assert_eq!(LogFormat::from_env_value(Some(" JSON ")), LogFormat::Json);
    }

    #[test]
    fn default_filter_parses() {
        assert!(DEFAULT_FILTER.parse::<EnvFilter>().is_ok());
    }
}
