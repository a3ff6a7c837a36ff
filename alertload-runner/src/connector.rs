//! Clients bound to a provisioned deployment

use alertload_core::{Deployment, LogRecord};
use alertload_http::{EventLogSource, HttpError, HttpManager, KibanaApi, KibanaClient, PageSource};
use std::sync::Arc;

/// Everything a run talks to on one deployment
pub struct Connection {
    pub kibana: Arc<dyn KibanaApi>,
    pub event_log: Box<dyn PageSource<Item = LogRecord>>,
}

/// Builds the clients for a healthy deployment
pub trait DeploymentConnector: Send + Sync {
    fn connect(&self, deployment: &Deployment) -> Result<Connection, HttpError>;
}

/// Connects over HTTP with one shared client
#[derive(Debug, Clone)]
pub struct HttpConnector {
    http: HttpManager,
    event_log_index: String,
}

impl HttpConnector {
    pub fn new(http: HttpManager, event_log_index: impl Into<String>) -> Self {
        Self {
            http,
            event_log_index: event_log_index.into(),
        }
    }
}

impl DeploymentConnector for HttpConnector {
    fn connect(&self, deployment: &Deployment) -> Result<Connection, HttpError> {
        let kibana = KibanaClient::new(self.http.clone(), &deployment.kb_url)?;
        let event_log = EventLogSource::new(self.http.clone(), &deployment.es_url, &deployment.name)?
            .with_index(&self.event_log_index);

        Ok(Connection {
            kibana: Arc::new(kibana),
            event_log: Box::new(event_log),
        })
    }
}
