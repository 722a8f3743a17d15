use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::core::token::Operator;
use crate::{alog_debug, Error, Result};

/// Simulated execution cost per operator, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct OperationTimes {
    pub addition_ms: u64,
    pub subtraction_ms: u64,
    pub multiplication_ms: u64,
    pub division_ms: u64,
}

impl OperationTimes {
    pub fn for_operator(&self, op: Operator) -> u64 {
        match op {
            Operator::Add => self.addition_ms,
            Operator::Sub => self.subtraction_ms,
            Operator::Mul => self.multiplication_ms,
            Operator::Div => self.division_ms,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Port the orchestrator listens on.
    pub port: u16,
    /// Number of workers in a pool.
    pub computing_power: usize,
    /// Capacity of the shared ready-task queue.
    pub queue_capacity: usize,
    /// Base URL remote agents poll.
    pub orchestrator_url: String,
    /// First backoff step after an empty poll or a full queue.
    pub poll_interval_ms: u64,
    /// Backoff ceiling.
    pub max_backoff_ms: u64,
    /// Run a worker pool inside the orchestrator process.
    pub embedded_workers: bool,
    pub log_file: Option<String>,
    pub operation_times: OperationTimes,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            computing_power: 4,
            queue_capacity: 100,
            orchestrator_url: "http://localhost:8080".to_string(),
            poll_interval_ms: 100,
            max_backoff_ms: 1000,
            embedded_workers: false,
            log_file: None,
            operation_times: OperationTimes::default(),
        }
    }
}

impl Config {
    pub fn abacus_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir().ok_or(Error::NoHomeDir)?.join(".abacus"))
    }

    pub fn default_path() -> Result<PathBuf> {
        Ok(Self::abacus_dir()?.join("abacus.toml"))
    }

    /// Load configuration: defaults, then the TOML file, then the process
    /// environment.
    ///
    /// An explicit `path` must exist. Without one, `~/.abacus/abacus.toml`
    /// is read if present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Ok(path) if path.exists() => Self::from_file(&path)?,
                _ => {
                    alog_debug!("Config file not found, using defaults");
                    Self::default()
                }
            },
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        alog_debug!("Config::from_file path={}", path.display());
        let config: Self = toml::from_str(&fs::read_to_string(path)?)?;
        Ok(config)
    }

    /// Override fields from environment-style variables.
    ///
    /// `lookup` abstracts the environment so overrides can be tested
    /// without touching process state.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = parse_var(&lookup, "PORT")? {
            self.port = port;
        }
        if let Some(ms) = parse_var(&lookup, "TIME_ADDITION_MS")? {
            self.operation_times.addition_ms = ms;
        }
        if let Some(ms) = parse_var(&lookup, "TIME_SUBTRACTION_MS")? {
            self.operation_times.subtraction_ms = ms;
        }
        if let Some(ms) = parse_var(&lookup, "TIME_MULTIPLICATIONS_MS")? {
            self.operation_times.multiplication_ms = ms;
        }
        if let Some(ms) = parse_var(&lookup, "TIME_DIVISIONS_MS")? {
            self.operation_times.division_ms = ms;
        }
        if let Some(power) = parse_var(&lookup, "COMPUTING_POWER")? {
            self.computing_power = power;
        }
        if let Some(capacity) = parse_var(&lookup, "QUEUE_CAPACITY")? {
            self.queue_capacity = capacity;
        }
        if let Some(url) = lookup("ORCHESTRATOR_URL").filter(|v| !v.is_empty()) {
            self.orchestrator_url = url;
        }
        if let Some(file) = lookup("ABACUS_LOG_FILE").filter(|v| !v.is_empty()) {
            self.log_file = Some(file);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(Error::Config("queue_capacity must be positive".to_string()));
        }
        if self.computing_power == 0 {
            return Err(Error::Config("computing_power must be positive".to_string()));
        }
        if self.poll_interval_ms == 0 {
            return Err(Error::Config("poll_interval_ms must be positive".to_string()));
        }
        if self.max_backoff_ms < self.poll_interval_ms {
            return Err(Error::Config(format!(
                "max_backoff_ms ({}) is below poll_interval_ms ({})",
                self.max_backoff_ms, self.poll_interval_ms
            )));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    pub fn log_path(&self) -> Option<PathBuf> {
        self.log_file.as_deref().map(expand_tilde)
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::Config(format!("{} has invalid value {:?}", key, raw))),
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
