//! Load, sampling and log collection knobs of a run

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Elasticsearch refuses scroll pages above `index.max_result_window`
pub const MAX_LOG_PAGE_SIZE: usize = 10_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// How long rules run before collection starts
    pub minutes: u64,

    /// Rule creations in flight per deployment
    pub rule_concurrency: usize,

    #[serde(with = "crate::duration::seconds")]
    pub sample_interval: Duration,

    /// Task manager fetch attempts per Kibana instance on every tick
    pub worker_retries_per_instance: usize,

    pub event_log_index: String,

    /// Index the load rules query
    pub rule_input_index: String,

    /// Documents per scroll page
    pub log_page_size: usize,

    /// Stop at an empty page even when a scroll id came back with it
    pub stop_on_empty_page: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_log_pages: Option<usize>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            minutes: 10,
            rule_concurrency: 4,
            sample_interval: Duration::from_secs(10),
            worker_retries_per_instance: 3,
            event_log_index: ".kibana-event-log-*".to_string(),
            rule_input_index: ".kibana-event-log-*".to_string(),
            log_page_size: MAX_LOG_PAGE_SIZE,
            stop_on_empty_page: true,
            max_log_pages: None,
        }
    }
}

impl RunConfig {
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.minutes * 60)
    }
}

impl Validatable for RunConfig {
    const DOMAIN: &'static str = "run";

    fn validate(&self) -> ConfigResult<()> {
        let check = Self::check();
        check.at_least("rule_concurrency", self.rule_concurrency, 1)?;
        check.not_zero("sample_interval", self.sample_interval)?;
        check.at_least(
            "worker_retries_per_instance",
            self.worker_retries_per_instance,
            1,
        )?;
        check.not_blank("event_log_index", &self.event_log_index)?;
        check.not_blank("rule_input_index", &self.rule_input_index)?;
        check.within("log_page_size", self.log_page_size, 1..=MAX_LOG_PAGE_SIZE)?;

        if let Some(pages) = self.max_log_pages {
            check.at_least("max_log_pages", pages, 1)?;
        }
        Ok(())
    }
}
