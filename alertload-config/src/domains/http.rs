//! Settings of the client shared by the Kibana and Elasticsearch calls

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    #[serde(alias = "timeout", with = "crate::duration::seconds")]
    pub request_timeout: Duration,

    #[serde(with = "crate::duration::seconds")]
    pub connect_timeout: Duration,

    pub user_agent: String,

    /// Cloud test deployments often present certificates that do not chain
    /// to a system root, so this is off unless asked for.
    pub verify_ssl: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            user_agent: concat!("alertload/", env!("CARGO_PKG_VERSION")).to_string(),
            verify_ssl: false,
        }
    }
}

impl Validatable for HttpConfig {
    const DOMAIN: &'static str = "http";

    fn validate(&self) -> ConfigResult<()> {
        let check = Self::check();
        check.not_zero("request_timeout", self.request_timeout)?;
        check.not_zero("connect_timeout", self.connect_timeout)?;
        check.not_blank("user_agent", &self.user_agent)
    }
}
