use fern::colors::{Color, ColoredLevelConfig};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::path::Path;
use strum::Display;
use thiserror::Error;

pub const DEFAULT_LOGS_DATETIME_FORMAT: &str = "[%Y-%m-%d] (%H:%M:%S%.3f)";

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("cannot open log file: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    SetLogger(#[from] log::SetLoggerError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(value: LogLevel) -> Self {
        match value {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

pub struct LoggerConfig<'a> {
    pub level: LogLevel,
    pub dir_path: &'a str,
    pub filename_log: &'a str,
    pub disable_file_logging: bool,
    pub disable_colors: bool,
    // (module, level) overrides, ex: ("reqwest", Warn)
    pub module_logs: Vec<(String, LogLevel)>,
    pub logs_datetime_format: &'a str,
}

/// Install the global logger: terminal output plus an optional log file.
///
/// Must be called once, before any log line is emitted.
pub fn setup_logger(config: LoggerConfig) -> Result<(), LoggerError> {
    let colors = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Magenta)
        .trace(Color::Cyan);

    let disable_colors = config.disable_colors;
    let terminal_format = config.logs_datetime_format.to_owned();
    let terminal = fern::Dispatch::new()
        .format(move |out, message, record| {
            let now = chrono::Local::now().format(&terminal_format);
            if disable_colors {
                out.finish(format_args!(
                    "{} {:<5} {} > {}",
                    now,
                    record.level(),
                    record.target(),
                    message
                ))
            } else {
                out.finish(format_args!(
                    "{} {:<5} {} > {}",
                    now,
                    colors.color(record.level()),
                    record.target(),
                    message
                ))
            }
        })
        .chain(std::io::stdout());

    let mut dispatch = fern::Dispatch::new()
        .level(config.level.into())
        .chain(terminal);

    for (module, level) in config.module_logs {
        dispatch = dispatch.level_for(module, level.into());
    }

    if !config.disable_file_logging {
        std::fs::create_dir_all(config.dir_path)?;
        let path = Path::new(config.dir_path).join(config.filename_log);
        let file_format = config.logs_datetime_format.to_owned();
        let file = fern::Dispatch::new()
            .format(move |out, message, record| {
                out.finish(format_args!(
                    "{} {:<5} {} > {}",
                    chrono::Local::now().format(&file_format),
                    record.level(),
                    record.target(),
                    message
                ))
            })
            .chain(fern::log_file(path)?);
        dispatch = dispatch.chain(file);
    }

    dispatch.apply()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_names() {
        assert_eq!(LogLevel::Warn.to_string(), "warn");
        let level: LogLevel = serde_json::from_str("\"debug\"").unwrap();
        assert_eq!(LevelFilter::from(level), LevelFilter::Debug);
    }
}
