use std::{fs, path::Path};

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

pub mod formatter;
pub mod writer;

pub use formatter::RelayFormatter;
pub use writer::CircularFileWriter;

use crate::configs::LoggingConfig;

fn filter_directives(logging: &LoggingConfig) -> String {
    let level = logging.level.as_deref().unwrap_or("info");
    match logging.filters.as_deref() {
        Some(filters) if !filters.is_empty() => {
            format!("{},tungstenite=warn,{}", level, filters)
        }
        _ => format!("{},tungstenite=warn", level),
    }
}

/// Installs the global subscriber: stdout always, plus a line-capped log file
/// when `[logging.file]` is configured. `RUST_LOG` wins over the config.
pub fn init(logging: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(logging)));

    let stdout_layer = fmt::layer()
        .event_format(RelayFormatter::new(true))
        .with_ansi(true);

    let file_layer = logging.file.as_ref().map(|file_config| {
        if let Some(parent) = Path::new(&file_config.path).parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                eprintln!("Failed to create log directory: {}", e);
            }
        }

        fmt::layer()
            .with_writer(CircularFileWriter::new(
                file_config.path.clone(),
                file_config.max_lines,
            ))
            .event_format(RelayFormatter::new(false))
            .with_ansi(false)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_directives_quiet_tungstenite() {
        let logging = LoggingConfig::default();
        assert_eq!(filter_directives(&logging), "info,tungstenite=warn");
    }

    #[test]
    fn custom_filters_are_appended() {
        let logging = LoggingConfig {
            level: Some("debug".into()),
            filters: Some("axum=info".into()),
            file: None,
        };
        assert_eq!(
            filter_directives(&logging),
            "debug,tungstenite=warn,axum=info"
        );
    }
}
