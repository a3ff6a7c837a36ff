//! Deployment sizing types

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::AlertLoadError;

static SIZE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(\d+)\s*x\s*(\d+)\s*(?:gb)?\s*$").expect("size pattern is valid")
});

/// Instance count and per-instance memory (GB) of one subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceSize {
    pub instances: u32,
    pub ram_gb: u32,
}

impl ResourceSize {
    pub fn new(instances: u32, ram_gb: u32) -> Self {
        Self { instances, ram_gb }
    }
}

impl Default for ResourceSize {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

impl fmt::Display for ResourceSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.instances, self.ram_gb)
    }
}

/// Accepts `2x8` as well as the long form `2 x 8 GB`
impl FromStr for ResourceSize {
    type Err = AlertLoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let captures = SIZE_PATTERN
            .captures(s)
            .ok_or_else(|| AlertLoadError::config(format!("invalid size spec '{}'", s.trim())))?;

        let parse = |index: usize| -> Result<u32, AlertLoadError> {
            captures[index]
                .parse::<u32>()
                .map_err(|e| AlertLoadError::config(format!("invalid size spec '{}': {}", s, e)))
        };

        Ok(Self::new(parse(1)?, parse(2)?))
    }
}

impl Serialize for ResourceSize {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ResourceSize {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// The two subsystems every deployment is made of
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Subsystem {
    Elasticsearch,
    Kibana,
}

impl Subsystem {
    /// Allowed per-instance memory sizes in GB
    pub fn memory_menu(&self) -> &'static [u32] {
        match self {
            Subsystem::Elasticsearch => &[1, 2, 4, 8, 15, 29, 58],
            Subsystem::Kibana => &[1, 2, 4, 8],
        }
    }

    /// Largest entry of the menu; required for multi-instance requests
    pub fn max_memory(&self) -> u32 {
        self.memory_menu().last().copied().unwrap_or_default()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Subsystem::Elasticsearch => "elasticsearch",
            Subsystem::Kibana => "kibana",
        }
    }

    /// Validate a requested size against the menu and return total memory in GB.
    ///
    /// More than one instance is only allowed at the maximum per-instance size.
    pub fn normalize(&self, size: ResourceSize) -> Result<u32, AlertLoadError> {
        if size.instances == 0 {
            return Err(AlertLoadError::config(format!(
                "{} needs at least one instance",
                self
            )));
        }

        let ram_max = self.max_memory();
        if size.instances > 1 && size.ram_gb != ram_max {
            return Err(AlertLoadError::config(format!(
                "must specify {}GB of ram for > 1 {} instance",
                ram_max, self
            )));
        }

        if !self.memory_menu().contains(&size.ram_gb) {
            let valid = self
                .memory_menu()
                .iter()
                .map(|ram| ram.to_string())
                .collect::<Vec<_>>()
                .join(" ");
            return Err(AlertLoadError::config(format!(
                "invalid {} ram size: {}; valid values: {}",
                self, size.ram_gb, valid
            )));
        }

        size.instances
            .checked_mul(size.ram_gb)
            .ok_or_else(|| AlertLoadError::config(format!("{} size {} is too large", self, size)))
    }
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_short_and_long_forms() {
        assert_eq!("2x8".parse::<ResourceSize>().unwrap(), ResourceSize::new(2, 8));
        assert_eq!(
            " 4 x 8 GB".parse::<ResourceSize>().unwrap(),
            ResourceSize::new(4, 8)
        );
        assert_eq!(
            "1 x 15 gb".parse::<ResourceSize>().unwrap(),
            ResourceSize::new(1, 15)
        );
        assert!("eight".parse::<ResourceSize>().is_err());
        assert!("2x".parse::<ResourceSize>().is_err());
    }

    #[test]
    fn test_normalize_single_instance() {
        assert_eq!(
            Subsystem::Elasticsearch.normalize(ResourceSize::new(1, 15)).unwrap(),
            15
        );
        assert_eq!(Subsystem::Kibana.normalize(ResourceSize::new(1, 4)).unwrap(), 4);
    }

    #[test]
    fn test_normalize_multi_instance_requires_max_ram() {
        assert_eq!(Subsystem::Kibana.normalize(ResourceSize::new(4, 8)).unwrap(), 32);

        let err = Subsystem::Kibana
            .normalize(ResourceSize::new(2, 4))
            .unwrap_err();
        assert!(matches!(err, AlertLoadError::Configuration(_)));
        assert!(err.to_string().contains("8GB"));
    }

    #[test]
    fn test_normalize_rejects_off_menu_ram() {
        let err = Subsystem::Elasticsearch
            .normalize(ResourceSize::new(1, 16))
            .unwrap_err();
        assert!(err.to_string().contains("valid values: 1 2 4 8 15 29 58"));
        assert!(Subsystem::Kibana.normalize(ResourceSize::new(0, 1)).is_err());
    }

    #[test]
    fn test_normalize_rejects_total_that_overflows() {
        let size: ResourceSize = "100000000x58".parse().unwrap();
        let err = Subsystem::Elasticsearch.normalize(size).unwrap_err();
        assert!(matches!(err, AlertLoadError::Configuration(_)));
        assert!(err.to_string().contains("too large"));
    }

    #[test]
    fn test_size_serde_as_string() {
        let size: ResourceSize = serde_json::from_str("\"2 x 8 GB\"").unwrap();
        assert_eq!(size, ResourceSize::new(2, 8));
        assert_eq!(serde_json::to_string(&size).unwrap(), "\"2x8\"");
    }
}
