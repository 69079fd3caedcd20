//! Logger setup on top of flexi_logger
//!
//! Three output formats are supported: `text` (timestamp, level, message),
//! `ext` (adds the source location) and `json` (one compact object per line).
//! The logger handle is kept for the life of the process so file output
//! stays open.

use std::str::FromStr;
use std::sync::{Mutex, OnceLock};
use strum_macros::{Display, EnumString};

static LOGGER_HANDLE: OnceLock<Mutex<flexi_logger::LoggerHandle>> = OnceLock::new();

/// Output format of log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum LogFormat {
    #[default]
    Text,
    Ext,
    Json,
}

impl LogFormat {
    /// Parse a format name, falling back to `text` for unknown names
    pub fn from_name(name: Option<&str>) -> Self {
        name.and_then(|n| LogFormat::from_str(n).ok())
            .unwrap_or_default()
    }
}

pub fn init_logging(
    log_level: Option<&str>,
    log_format: Option<&str>,
    log_file: Option<&str>,
    color_enabled: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    use flexi_logger::{FileSpec, Logger};

    let level_str = log_level.unwrap_or("info");
    let mut logger = Logger::try_with_str(level_str)?;

    logger = match (LogFormat::from_name(log_format), color_enabled) {
        (LogFormat::Json, _) => logger.format(json_format),
        (LogFormat::Ext, true) => logger.format(extended_color_format),
        (LogFormat::Ext, false) => logger.format(extended_format),
        (LogFormat::Text, true) => logger.format(simple_color_format),
        (LogFormat::Text, false) => logger.format(simple_format),
    };

    if let Some(file_path) = log_file {
        let file_spec = FileSpec::try_from(std::path::Path::new(file_path))?;
        logger = logger.log_to_file(file_spec);
    }

    let handle = logger.start()?;
    let _ = LOGGER_HANDLE.set(Mutex::new(handle));

    Ok(())
}

fn level_abbr(level: log::Level) -> &'static str {
    match level {
        log::Level::Error => "ERR",
        log::Level::Warn => "WRN",
        log::Level::Info => "INF",
        log::Level::Debug => "DBG",
        log::Level::Trace => "TRC",
    }
}

fn level_colored(level: log::Level) -> colored::ColoredString {
    use colored::*;

    match level {
        log::Level::Error => "ERR".red().bold(),
        log::Level::Warn => "WRN".yellow(),
        log::Level::Info => "INF".green(),
        log::Level::Debug => "DBG".blue(),
        log::Level::Trace => "TRC".magenta(),
    }
}

// Format: "YYYY-MM-DD HH:mm:ss.fff INF message"
fn simple_format(
    w: &mut dyn std::io::Write,
    now: &mut flexi_logger::DeferredNow,
    record: &log::Record,
) -> Result<(), std::io::Error> {
    write!(
        w,
        "{} {} {}",
        now.format("%Y-%m-%d %H:%M:%S%.3f"),
        level_abbr(record.level()),
        record.args()
    )
}

fn simple_color_format(
    w: &mut dyn std::io::Write,
    now: &mut flexi_logger::DeferredNow,
    record: &log::Record,
) -> Result<(), std::io::Error> {
    use colored::*;

    write!(
        w,
        "{} {} {}",
        now.format("%Y-%m-%d %H:%M:%S%.3f").to_string().dimmed(),
        level_colored(record.level()),
        record.args()
    )
}

// Format: "YYYY-MM-DD HH:mm:ss.fff INF message (worker/message_loop.rs:42)"
fn extended_format(
    w: &mut dyn std::io::Write,
    now: &mut flexi_logger::DeferredNow,
    record: &log::Record,
) -> Result<(), std::io::Error> {
    write!(
        w,
        "{} {} {} ({})",
        now.format("%Y-%m-%d %H:%M:%S%.3f"),
        level_abbr(record.level()),
        record.args(),
        format_target_as_path(record.target(), record.line())
    )
}

fn extended_color_format(
    w: &mut dyn std::io::Write,
    now: &mut flexi_logger::DeferredNow,
    record: &log::Record,
) -> Result<(), std::io::Error> {
    use colored::*;

    write!(
        w,
        "{} {} {} ({})",
        now.format("%Y-%m-%d %H:%M:%S%.3f").to_string().dimmed(),
        level_colored(record.level()),
        record.args(),
        format_target_as_path(record.target(), record.line()).dimmed()
    )
}

fn json_format(
    w: &mut dyn std::io::Write,
    now: &mut flexi_logger::DeferredNow,
    record: &log::Record,
) -> Result<(), std::io::Error> {
    use serde_json::{json, to_string};

    // Ordered: timestamp, level, message, thread, metadata
    let json_obj = json!({
        "timestamp": now.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
        "level": level_abbr(record.level()),
        "message": record.args().to_string(),
        "thread": std::thread::current().name().unwrap_or("unnamed"),
        "target": format_target_as_path(record.target(), record.line())
    });

    match to_string(&json_obj) {
        Ok(json_string) => w.write_all(json_string.as_bytes()),
        Err(_) => w.write_all(b"{\"error\":\"Failed to serialize log message\"}"),
    }
}

// telebus::worker::message_loop -> worker/message_loop.rs
fn format_target_as_path(target: &str, line: Option<u32>) -> String {
    let path_like = if let Some(without_prefix) = target.strip_prefix("telebus::") {
        without_prefix.replace("::", "/") + ".rs"
    } else {
        target.replace("::", "/")
    };

    if let Some(line_num) = line {
        format!("{}:{}", path_like, line_num)
    } else {
        path_like
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flexi_logger::DeferredNow;
    use serial_test::serial;

    fn render(
        formatter: fn(
            &mut dyn std::io::Write,
            &mut DeferredNow,
            &log::Record,
        ) -> Result<(), std::io::Error>,
        level: log::Level,
        target: &str,
        line: Option<u32>,
    ) -> String {
        let mut buffer = Vec::new();
        let mut now = DeferredNow::new();
        let record = log::Record::builder()
            .level(level)
            .target(target)
            .line(line)
            .args(format_args!("queue 'two' is full"))
            .build();

        formatter(&mut buffer, &mut now, &record).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_log_format_names() {
        assert_eq!(LogFormat::from_name(Some("json")), LogFormat::Json);
        assert_eq!(LogFormat::from_name(Some("EXT")), LogFormat::Ext);
        assert_eq!(LogFormat::from_name(Some("fancy")), LogFormat::Text);
        assert_eq!(LogFormat::from_name(None), LogFormat::Text);
        assert_eq!(LogFormat::Json.to_string(), "json");
    }

    #[test]
    fn test_simple_format_has_no_location() {
        let output = render(
            simple_format,
            log::Level::Warn,
            "telebus::bus::queue",
            Some(12),
        );

        assert!(output.contains("WRN queue 'two' is full"), "got: {}", output);
        assert!(!output.contains("bus/queue.rs"));
    }

    #[test]
    fn test_extended_format_has_location() {
        let output = render(
            extended_format,
            log::Level::Info,
            "telebus::worker::message_loop",
            Some(42),
        );

        assert!(output.contains("INF queue 'two' is full"));
        assert!(
            output.ends_with("(worker/message_loop.rs:42)"),
            "got: {}",
            output
        );
    }

    #[test]
    fn test_json_format_is_one_object() {
        let output = render(json_format, log::Level::Error, "telebus::app::startup", None);

        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["level"], "ERR");
        assert_eq!(value["message"], "queue 'two' is full");
        assert_eq!(value["target"], "app/startup.rs");
        assert!(!output.contains('\n'));
    }

    #[test]
    fn test_target_outside_crate() {
        assert_eq!(format_target_as_path("tokio::runtime", None), "tokio/runtime");
        assert_eq!(
            format_target_as_path("telebus::core::shutdown", Some(7)),
            "core/shutdown.rs:7"
        );
    }

    #[test]
    #[serial]
    fn test_init_logging_once() {
        // Another test binary may already own the global logger
        match init_logging(Some("debug"), Some("ext"), None, false) {
            Ok(()) => {
                log::debug!("logger initialised for test");
                assert!(LOGGER_HANDLE.get().is_some());
            }
            Err(e) => {
                assert!(
                    e.to_string().contains("already initialized")
                        || e.to_string().contains("Logger initialization failed"),
                    "Expected initialization error, got: {}",
                    e
                );
            }
        }
    }
}
