//! Tracing subscriber setup

use alertload_config::{LogFormat, LoggingConfig};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Level precedence: `--log-level`, then `RUST_LOG`, then the config file
fn env_filter(config: &LoggingConfig, cli_level: Option<&str>) -> EnvFilter {
    let configured = || {
        EnvFilter::try_new(&config.level).unwrap_or_else(|_| {
            eprintln!("Invalid logging.level '{}', using 'info'", config.level);
            EnvFilter::new("info")
        })
    };

    match cli_level {
        Some(level) => EnvFilter::try_new(level).unwrap_or_else(|_| {
            eprintln!(
                "Invalid log level '{}', falling back to '{}'",
                level, config.level
            );
            configured()
        }),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| configured()),
    }
}

/// Install the global subscriber; logs go to stderr, command output to stdout
pub fn init_tracing(config: &LoggingConfig, cli_level: Option<&str>) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(config, cli_level))
        .with_writer(std::io::stderr)
        .with_file(config.include_location)
        .with_line_number(config.include_location);

    let installed = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Text => builder.try_init(),
    };

    if installed.is_err() {
        debug!("Global tracing subscriber already initialized, skipping");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_init_does_not_panic() {
        let config = LoggingConfig {
            level: "debug".to_string(),
            format: LogFormat::Json,
            include_location: true,
        };
        init_tracing(&config, None);
        init_tracing(&config, Some("not a level ["));
    }

    #[test]
    fn test_cli_level_wins() {
        let filter = env_filter(&LoggingConfig::default(), Some("warn"));
        assert_eq!(filter.to_string(), "warn");

        let fallback = env_filter(&LoggingConfig::default(), Some("alertload=bogus"));
        assert_eq!(fallback.to_string(), "info");
    }

    #[test]
    fn test_bad_configured_level_falls_back_to_info() {
        let config = LoggingConfig {
            level: "alertload=loud".to_string(),
            ..LoggingConfig::default()
        };
        assert_eq!(env_filter(&config, Some("nope=bogus")).to_string(), "info");
    }
}
