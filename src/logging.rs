use std::io::Write;
use std::sync::OnceLock;

use chrono::Local;
use log::{LevelFilter, Metadata, Record, SetLoggerError};
use serde::Serialize;

use crate::config::LogConfig;

static LOGGER: OnceLock<BridgeLogger> = OnceLock::new();

#[derive(Debug, Serialize, Clone)]
pub struct LogMessage {
    level: String,
    target: String,
    message: String,
    timestamp: String,
}

/// Writes log records to stderr as plain lines or JSON lines
pub struct BridgeLogger {
    level: LevelFilter,
    json: bool,
}

impl BridgeLogger {
    pub fn new(level: LevelFilter, json: bool) -> Self {
        Self { level, json }
    }

    pub fn init(level: LevelFilter, json: bool) -> Result<(), SetLoggerError> {
        let logger = LOGGER.get_or_init(|| BridgeLogger::new(level, json));
        log::set_logger(logger).map(|()| log::set_max_level(logger.level))
    }

    fn format(&self, record: &Record) -> String {
        let timestamp = Local::now().to_rfc3339();
        if self.json {
            let log_message = LogMessage {
                level: record.level().to_string(),
                target: record.target().to_string(),
                message: record.args().to_string(),
                timestamp: timestamp.clone(),
            };
            match serde_json::to_string(&log_message) {
                Ok(line) => return line,
                Err(e) => return format!("[{} ERROR] Failed to format log record: {}", timestamp, e),
            }
        }
        format!("[{} {}] {}", timestamp, record.level(), record.args())
    }
}

impl log::Log for BridgeLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let line = self.format(record);
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

/// Parses a level name, falling back to `Info` for anything unknown
pub fn parse_level(level: &str) -> LevelFilter {
    level.trim().parse().unwrap_or(LevelFilter::Info)
}

/// Installs the bridge logger, or `env_logger` if a logger is already set up.
pub fn init(config: &LogConfig) {
    let level = parse_level(&config.level);
    if BridgeLogger::init(level, config.json).is_err() {
        // Only reached when something else installed a logger first
        let _ = env_logger::builder().filter_level(level).try_init();
    }
    log::info!("Logging initialized at {}", level);
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Level;

    #[test]
    fn parses_level_names() {
        assert_eq!(parse_level("debug"), LevelFilter::Debug);
        assert_eq!(parse_level(" WARN "), LevelFilter::Warn);
        assert_eq!(parse_level("off"), LevelFilter::Off);
        assert_eq!(parse_level("chatty"), LevelFilter::Info);
    }

    #[test]
    fn json_lines_carry_level_and_message() {
        let logger = BridgeLogger::new(LevelFilter::Trace, true);
        let line = logger.format(
            &Record::builder()
                .level(Level::Warn)
                .target("bridge")
                .args(format_args!("Service disconnected"))
                .build(),
        );

        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["level"], "WARN");
        assert_eq!(value["target"], "bridge");
        assert_eq!(value["message"], "Service disconnected");
    }

    #[test]
    fn respects_level() {
        use log::Log;

        let logger = BridgeLogger::new(LevelFilter::Info, false);
        assert!(logger.enabled(&Metadata::builder().level(Level::Warn).build()));
        assert!(!logger.enabled(&Metadata::builder().level(Level::Debug).build()));
    }
}
