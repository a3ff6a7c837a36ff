//! Field checks shared by the configuration sections

use crate::error::{ConfigError, ConfigResult};
use std::fmt::Display;
use std::ops::RangeInclusive;
use std::time::Duration;

/// A configuration section that can check itself after loading
pub trait Validatable {
    /// Section name, as written in the YAML file
    const DOMAIN: &'static str;

    fn validate(&self) -> ConfigResult<()>;

    fn check() -> Check {
        Check(Self::DOMAIN)
    }
}

/// Builds [`ConfigError::Invalid`] errors for one section
#[derive(Debug, Clone, Copy)]
pub struct Check(&'static str);

impl Check {
    pub fn new(domain: &'static str) -> Self {
        Self(domain)
    }

    pub fn fail(self, field: &'static str, reason: impl Into<String>) -> ConfigError {
        ConfigError::Invalid {
            domain: self.0,
            field,
            reason: reason.into(),
        }
    }

    pub fn not_blank(self, field: &'static str, value: &str) -> ConfigResult<()> {
        if value.trim().is_empty() {
            return Err(self.fail(field, "must not be empty"));
        }
        Ok(())
    }

    pub fn not_zero(self, field: &'static str, value: Duration) -> ConfigResult<()> {
        if value.is_zero() {
            return Err(self.fail(field, "must be longer than zero"));
        }
        Ok(())
    }

    pub fn at_least<T: PartialOrd + Display>(
        self,
        field: &'static str,
        value: T,
        min: T,
    ) -> ConfigResult<()> {
        if value < min {
            return Err(self.fail(field, format!("must be at least {}, got {}", min, value)));
        }
        Ok(())
    }

    pub fn within<T: PartialOrd + Display>(
        self,
        field: &'static str,
        value: T,
        range: RangeInclusive<T>,
    ) -> ConfigResult<()> {
        if !range.contains(&value) {
            return Err(self.fail(
                field,
                format!(
                    "must be between {} and {}, got {}",
                    range.start(),
                    range.end(),
                    value
                ),
            ));
        }
        Ok(())
    }
}
