//! Reading the config file and applying `ALERTLOAD_*` overrides

use crate::domains::{logging::LogFormat, AlertLoadConfig};
use crate::error::{ConfigError, ConfigResult};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Loads [`AlertLoadConfig`]; environment variables win over file values
pub struct ConfigLoader {
    prefix: String,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::with_prefix("ALERTLOAD")
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// YAML file, then environment, then validation
    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<AlertLoadConfig> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        self.finish(config)
    }

    /// Defaults, then environment, then validation
    pub fn from_env(&self) -> ConfigResult<AlertLoadConfig> {
        self.finish(AlertLoadConfig::default())
    }

    pub fn load(&self, config_path: Option<impl AsRef<Path>>) -> ConfigResult<AlertLoadConfig> {
        match config_path {
            Some(path) => self.from_file(path),
            None => self.from_env(),
        }
    }

    fn finish(&self, mut config: AlertLoadConfig) -> ConfigResult<AlertLoadConfig> {
        self.apply_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    fn apply_overrides(&self, config: &mut AlertLoadConfig) -> ConfigResult<()> {
        let env = Env {
            prefix: &self.prefix,
        };

        if let Some(name) = env.text("ECCTL_CONFIG") {
            config.provisioning.ecctl_config = name;
        }
        if let Some(budget) = env.seconds("WAIT_BUDGET_SECONDS")? {
            config.provisioning.wait_budget = budget;
        }

        if let Some(timeout) = env.seconds("HTTP_TIMEOUT")? {
            config.http.request_timeout = timeout;
        }
        if let Some(verify) = env.parsed::<bool>("HTTP_VERIFY_SSL")? {
            config.http.verify_ssl = verify;
        }

        if let Some(minutes) = env.parsed::<u64>("RUN_MINUTES")? {
            config.run.minutes = minutes;
        }
        if let Some(concurrency) = env.parsed::<usize>("RULE_CONCURRENCY")? {
            config.run.rule_concurrency = concurrency;
        }
        if let Some(interval) = env.seconds("SAMPLE_INTERVAL_SECONDS")? {
            config.run.sample_interval = interval;
        }

        if let Some(level) = env.text("LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Some(format) = env.parsed::<LogFormat>("LOG_FORMAT")? {
            config.logging.format = format;
        }

        if let Some(dir) = env.text("REPORT_DIR") {
            config.report.output_dir = PathBuf::from(dir);
        }

        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Prefixed environment lookups
struct Env<'a> {
    prefix: &'a str,
}

impl Env<'_> {
    fn var(&self, name: &str) -> String {
        format!("{}_{}", self.prefix, name)
    }

    /// Unset and blank both count as absent
    fn text(&self, name: &str) -> Option<String> {
        std::env::var(self.var(name))
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn parsed<T>(&self, name: &str) -> ConfigResult<Option<T>>
    where
        T: FromStr,
        T::Err: Display,
    {
        let Some(value) = self.text(name) else {
            return Ok(None);
        };
        value.parse().map(Some).map_err(|e: T::Err| ConfigError::Env {
            var: self.var(name),
            reason: e.to_string(),
            value,
        })
    }

    fn seconds(&self, name: &str) -> ConfigResult<Option<Duration>> {
        Ok(self.parsed::<u64>(name)?.map(Duration::from_secs))
    }
}
