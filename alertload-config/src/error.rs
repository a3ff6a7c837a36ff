//! Configuration errors

use std::path::PathBuf;
use thiserror::Error;

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} is not a valid alertload config: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A prefixed environment variable is set but unusable
    #[error("{var}={value:?}: {reason}")]
    Env {
        var: String,
        value: String,
        reason: String,
    },

    #[error("{domain}.{field} {reason}")]
    Invalid {
        domain: &'static str,
        field: &'static str,
        reason: String,
    },
}
