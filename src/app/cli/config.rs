//! TOML node configuration
//!
//! Describes the workers a node runs, how each queue behaves and who
//! subscribes to whom. Loading follows the usual order: an explicit
//! `--config-file` must exist, otherwise the default location is used if
//! present, otherwise the built-in three-worker demo node.
//!
//! ```toml
//! wait-timeout-ms = 100
//! log-level = "info"
//!
//! [[worker]]
//! name = "two"
//! kind = "demo"
//! queue-capacity = 64
//! subscribe-to = ["one"]
//! schedule = "jitter"
//! interval-ms = 2500
//! ```

use crate::worker::{LoopSettings, TxSchedule, DEFAULT_INITIAL_DELAY, DEFAULT_WAIT_TIMEOUT};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use strum_macros::{Display, EnumString};

use super::args::Args;

pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Heartbeat period used by frame sources unless configured
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("The specified configuration file does not exist: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Error reading configuration file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error parsing configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    #[error("Duplicate worker name: {name}")]
    DuplicateWorker { name: String },

    #[error("Worker '{worker}' subscribes to unknown worker '{target}'")]
    UnknownTarget { worker: String, target: String },
}

/// What a configured worker does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum WorkerKind {
    Demo,
    FrameSource,
    FrameTally,
}

/// Configured transmit schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum ScheduleKind {
    Jitter,
    Fixed,
    Never,
}

impl WorkerKind {
    fn default_schedule(self) -> ScheduleKind {
        match self {
            WorkerKind::Demo => ScheduleKind::Jitter,
            WorkerKind::FrameSource => ScheduleKind::Fixed,
            WorkerKind::FrameTally => ScheduleKind::Never,
        }
    }

    fn default_interval(self) -> Duration {
        match self {
            WorkerKind::FrameSource => DEFAULT_FRAME_INTERVAL,
            _ => crate::worker::schedule::DEFAULT_JITTER_MAX,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    pub name: String,
    pub kind: WorkerKind,
    pub queue_capacity: usize,
    pub non_blocking: bool,
    /// Workers whose messages this worker receives
    pub subscribe_to: Vec<String>,
    pub schedule: ScheduleKind,
    pub interval: Duration,
    pub initial_delay: Duration,
    /// Identifiers cycled through by a frame source
    pub frame_ids: Vec<u32>,
}

impl WorkerConfig {
    pub fn new(name: &str, kind: WorkerKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            non_blocking: false,
            subscribe_to: Vec::new(),
            schedule: kind.default_schedule(),
            interval: kind.default_interval(),
            initial_delay: DEFAULT_INITIAL_DELAY,
            frame_ids: Vec::new(),
        }
    }

    fn subscribed_to(mut self, sources: &[&str]) -> Self {
        self.subscribe_to = sources.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn tx_schedule(&self) -> TxSchedule {
        match self.schedule {
            ScheduleKind::Jitter => TxSchedule::Jittered { max: self.interval },
            ScheduleKind::Fixed => TxSchedule::Fixed {
                interval: self.interval,
            },
            ScheduleKind::Never => TxSchedule::Never,
        }
    }

    pub fn loop_settings(&self, wait_timeout: Duration) -> LoopSettings {
        LoopSettings {
            wait_timeout,
            schedule: self.tx_schedule(),
            initial_delay: self.initial_delay,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    pub wait_timeout: Duration,
    pub log_level: Option<String>,
    pub log_format: Option<String>,
    pub log_file: Option<PathBuf>,
    pub color: Option<bool>,
    pub workers: Vec<WorkerConfig>,
}

impl Default for NodeConfig {
    /// Three demo workers: `two` and `three` hear `one`, `three` also hears
    /// `two`, and `one` hears both of the others
    fn default() -> Self {
        Self {
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            log_level: None,
            log_format: None,
            log_file: None,
            color: None,
            workers: vec![
                WorkerConfig::new("one", WorkerKind::Demo).subscribed_to(&["two", "three"]),
                WorkerConfig::new("two", WorkerKind::Demo).subscribed_to(&["one"]),
                WorkerConfig::new("three", WorkerKind::Demo).subscribed_to(&["one", "two"]),
            ],
        }
    }
}

impl NodeConfig {
    /// Default configuration file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("Telebus").join("telebus.toml"))
    }

    /// Load the node description.
    ///
    /// An explicit path must exist. Without one, the default location is
    /// read if present; otherwise the built-in node is returned.
    pub async fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match config_file {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound {
                        path: path.to_path_buf(),
                    });
                }
                path.to_path_buf()
            }
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => {
                    log::debug!("no configuration file, using the built-in node");
                    return Ok(Self::default());
                }
            },
        };

        log::debug!("loading configuration from {}", path.display());
        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.clone(),
                source,
            })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let table = toml::from_str::<toml::Table>(contents)?;
        Self::from_table(&table)
    }

    pub fn from_table(config: &toml::Table) -> Result<Self, ConfigError> {
        let mut node = NodeConfig {
            workers: Vec::new(),
            ..NodeConfig::default()
        };

        if let Some(ms) = get_millis(config, "wait-timeout-ms", "wait-timeout-ms")? {
            if ms.is_zero() {
                return Err(invalid("wait-timeout-ms", "must be at least 1"));
            }
            node.wait_timeout = ms;
        }
        if let Some(log_level) = get_str(config, "log-level", "log-level")? {
            node.log_level = Some(log_level.to_string());
        }
        if let Some(log_format) = get_str(config, "log-format", "log-format")? {
            node.log_format = Some(log_format.to_string());
        }
        if let Some(log_file) = get_str(config, "log-file", "log-file")? {
            // "none" and "-" disable file logging
            if !(log_file.eq_ignore_ascii_case("none") || log_file == "-") {
                node.log_file = Some(PathBuf::from(log_file));
            }
        }
        if let Some(color) = get_bool(config, "color", "color")? {
            node.color = Some(color);
        }

        match config.get("worker") {
            None => node.workers = NodeConfig::default().workers,
            Some(value) => {
                let entries = value
                    .as_array()
                    .ok_or_else(|| invalid("worker", "expected an array of [[worker]] tables"))?;
                for entry in entries {
                    let table = entry
                        .as_table()
                        .ok_or_else(|| invalid("worker", "expected a table"))?;
                    node.workers.push(Self::parse_worker(table)?);
                }
            }
        }

        node.validate()?;
        Ok(node)
    }

    fn parse_worker(table: &toml::Table) -> Result<WorkerConfig, ConfigError> {
        let name = get_str(table, "name", "worker.name")?
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| invalid("worker.name", "every worker needs a name"))?;

        let kind = match get_str(table, "kind", "worker.kind")? {
            Some(kind) => WorkerKind::from_str(kind)
                .map_err(|_| invalid("worker.kind", &format!("unknown kind '{}'", kind)))?,
            None => WorkerKind::Demo,
        };

        let mut worker = WorkerConfig::new(name, kind);

        if let Some(capacity) = get_integer(table, "queue-capacity", "worker.queue-capacity")? {
            worker.queue_capacity = usize::try_from(capacity)
                .ok()
                .filter(|&c| c >= 1)
                .ok_or_else(|| invalid("worker.queue-capacity", "must be at least 1"))?;
        }
        if let Some(non_blocking) = get_bool(table, "non-blocking", "worker.non-blocking")? {
            worker.non_blocking = non_blocking;
        }
        worker.subscribe_to = string_list(table, "subscribe-to", "worker.subscribe-to")?;
        if let Some(schedule) = get_str(table, "schedule", "worker.schedule")? {
            worker.schedule = ScheduleKind::from_str(schedule).map_err(|_| {
                invalid(
                    "worker.schedule",
                    &format!("unknown schedule '{}'", schedule),
                )
            })?;
        }
        if let Some(interval) = get_millis(table, "interval-ms", "worker.interval-ms")? {
            if interval.is_zero() && worker.schedule != ScheduleKind::Never {
                return Err(invalid("worker.interval-ms", "must be at least 1"));
            }
            worker.interval = interval;
        }
        if let Some(delay) = get_millis(table, "initial-delay-ms", "worker.initial-delay-ms")? {
            worker.initial_delay = delay;
        }
        if let Some(ids) = typed(
            table,
            "frame-ids",
            "worker.frame-ids",
            "an array",
            toml::Value::as_array,
        )? {
            worker.frame_ids = ids
                .iter()
                .map(|id| {
                    id.as_integer()
                        .and_then(|i| u32::try_from(i).ok())
                        .ok_or_else(|| invalid("worker.frame-ids", "expected identifiers"))
                })
                .collect::<Result<_, _>>()?;
        }

        Ok(worker)
    }

    /// Check names are unique and every subscription names a known worker
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut names = HashSet::new();
        for worker in &self.workers {
            if !names.insert(worker.name.as_str()) {
                return Err(ConfigError::DuplicateWorker {
                    name: worker.name.clone(),
                });
            }
        }

        for worker in &self.workers {
            if worker.queue_capacity == 0 {
                return Err(invalid("worker.queue-capacity", "must be at least 1"));
            }
            if let Some(target) = worker
                .subscribe_to
                .iter()
                .find(|t| !names.contains(t.as_str()))
            {
                return Err(ConfigError::UnknownTarget {
                    worker: worker.name.clone(),
                    target: target.clone(),
                });
            }
        }
        Ok(())
    }

    /// Command line values take precedence over the file
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(timeout) = args.wait_timeout() {
            if !timeout.is_zero() {
                self.wait_timeout = timeout;
            }
        }
        if args.log_level.is_some() {
            self.log_level = args.log_level.clone();
        }
        if args.log_format.is_some() {
            self.log_format = args.log_format.clone();
        }
        if let Some(log_file) = &args.log_file {
            let disabled = log_file
                .to_str()
                .is_some_and(|f| f.eq_ignore_ascii_case("none") || f == "-");
            self.log_file = if disabled {
                None
            } else {
                Some(log_file.clone())
            };
        }
        if let Some(color) = args.color_choice() {
            self.color = Some(color);
        }
    }
}

fn invalid(key: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}

/// Read `key` with `read`; a present value of the wrong type is an error
/// reported against `label`
fn typed<'a, T>(
    config: &'a toml::Table,
    key: &str,
    label: &str,
    expected: &str,
    read: impl FnOnce(&'a toml::Value) -> Option<T>,
) -> Result<Option<T>, ConfigError> {
    match config.get(key) {
        None => Ok(None),
        Some(value) => read(value).map(Some).ok_or_else(|| {
            invalid(
                label,
                &format!("expected {}, found {}", expected, value.type_str()),
            )
        }),
    }
}

fn get_str<'a>(
    config: &'a toml::Table,
    key: &str,
    label: &str,
) -> Result<Option<&'a str>, ConfigError> {
    typed(config, key, label, "a string", toml::Value::as_str)
}

fn get_bool(config: &toml::Table, key: &str, label: &str) -> Result<Option<bool>, ConfigError> {
    typed(config, key, label, "a boolean", toml::Value::as_bool)
}

fn get_integer(config: &toml::Table, key: &str, label: &str) -> Result<Option<i64>, ConfigError> {
    typed(config, key, label, "an integer", toml::Value::as_integer)
}

fn get_millis(
    config: &toml::Table,
    key: &str,
    label: &str,
) -> Result<Option<Duration>, ConfigError> {
    match get_integer(config, key, label)? {
        None => Ok(None),
        Some(ms) => u64::try_from(ms)
            .map(|ms| Some(Duration::from_millis(ms)))
            .map_err(|_| invalid(label, "expected a non-negative number of milliseconds")),
    }
}

/// Accepts a single string, an array of strings, or comma separated values
fn string_list(config: &toml::Table, key: &str, label: &str) -> Result<Vec<String>, ConfigError> {
    let raw: Vec<&str> = match config.get(key) {
        None => Vec::new(),
        Some(toml::Value::String(s)) => vec![s.as_str()],
        Some(toml::Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .ok_or_else(|| invalid(label, "expected an array of worker names"))
            })
            .collect::<Result<_, _>>()?,
        Some(other) => {
            return Err(invalid(
                label,
                &format!("expected a string or array, found {}", other.type_str()),
            ))
        }
    };

    let mut seen = HashSet::new();
    Ok(raw
        .iter()
        .flat_map(|s| s.split(','))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.to_string()))
        .map(str::to_string)
        .collect())
}
