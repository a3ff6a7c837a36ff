//! Elasticsearch event log source read through the scroll API

use crate::client::{Endpoint, HttpManager};
use crate::errors::HttpError;
use crate::pagination::{Page, PageSource};
use alertload_core::LogRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;

/// Index pattern of the Kibana event log
pub const EVENT_LOG_INDEX: &str = ".kibana-event-log-*";

/// How long Elasticsearch keeps a scroll context alive between pages
pub const SCROLL_KEEP_ALIVE: &str = "10m";

/// Rule and action executions recorded in the event log of one deployment
#[derive(Debug, Clone)]
pub struct EventLogSource {
    http: HttpManager,
    endpoint: Endpoint,
    deployment: String,
    index: String,
}

impl EventLogSource {
    pub fn new(http: HttpManager, es_url: &str, deployment: &str) -> Result<Self, HttpError> {
        Ok(Self {
            http,
            endpoint: Endpoint::parse(es_url)?,
            deployment: deployment.to_string(),
            index: EVENT_LOG_INDEX.to_string(),
        })
    }

    pub fn with_index(mut self, index: impl Into<String>) -> Self {
        self.index = index.into();
        self
    }

    fn to_page(&self, response: ScrollResponse) -> Page<LogRecord> {
        let now = Utc::now();
        let items = response
            .hits
            .hits
            .into_iter()
            .map(|hit| to_log_record(&self.deployment, hit.source, now))
            .collect();
        Page::new(items, response.scroll_id)
    }
}

#[async_trait]
impl PageSource for EventLogSource {
    type Item = LogRecord;

    async fn first_page(&self, page_size: usize) -> Result<Page<LogRecord>, HttpError> {
        let path = format!("{}/_search", self.index);
        let request = self
            .http
            .request(Method::POST, &self.endpoint, &path)?
            .query(&[("scroll", SCROLL_KEEP_ALIVE)])
            .json(&json!({
                "size": page_size,
                "sort": [{ "@timestamp": { "order": "asc" } }],
                "query": { "match": { "event.action": "execute" } }
            }));

        let response: ScrollResponse = self.http.send_json(request).await?;
        Ok(self.to_page(response))
    }

    async fn next_page(&self, token: &str) -> Result<Page<LogRecord>, HttpError> {
        let request = self
            .http
            .request(Method::POST, &self.endpoint, "/_search/scroll")?
            .json(&json!({ "scroll": SCROLL_KEEP_ALIVE, "scroll_id": token }));

        let response: ScrollResponse = self.http.send_json(request).await?;
        Ok(self.to_page(response))
    }

    async fn release(&self, token: &str) -> Result<(), HttpError> {
        let request = self
            .http
            .request(Method::DELETE, &self.endpoint, "/_search/scroll")?
            .json(&json!({ "scroll_id": token }));
        self.http.send(request).await
    }

    fn describe(&self) -> String {
        format!("event log of {}", self.deployment)
    }
}

#[derive(Debug, Deserialize)]
struct ScrollResponse {
    #[serde(rename = "_scroll_id", default)]
    scroll_id: Option<String>,
    hits: Hits,
}

#[derive(Debug, Deserialize)]
struct Hits {
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "_source", default)]
    source: EventDocument,
}

/// The fields of an event log document that end up in a [`LogRecord`]
#[derive(Debug, Default, Deserialize)]
pub struct EventDocument {
    #[serde(default)]
    pub event: EventFields,
    #[serde(default)]
    pub kibana: KibanaFields,
}

#[derive(Debug, Default, Deserialize)]
pub struct EventFields {
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub start: Option<String>,
    /// Nanoseconds
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub outcome: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct KibanaFields {
    #[serde(default)]
    pub saved_objects: Vec<SavedObjectRef>,
}

#[derive(Debug, Deserialize)]
pub struct SavedObjectRef {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
}

/// Normalize one event document; missing start dates fall back to `now`
pub fn to_log_record(deployment: &str, doc: EventDocument, now: DateTime<Utc>) -> LogRecord {
    let event = doc.event;

    let date = event
        .start
        .as_deref()
        .and_then(|start| DateTime::parse_from_rfc3339(start).ok())
        .map(|date| date.with_timezone(&Utc))
        .unwrap_or(now);

    let duration_ms = (event.duration.unwrap_or_default() / 1_000_000.0).round().max(0.0) as u64;

    let mut rule_id = None;
    let mut action_id = None;
    for saved_object in doc.kibana.saved_objects {
        match saved_object.kind.as_str() {
            "alert" => rule_id = Some(saved_object.id),
            "action" => action_id = Some(saved_object.id),
            _ => {}
        }
    }

    LogRecord {
        deployment: deployment.to_string(),
        provider: event.provider.unwrap_or_else(|| "unknown".to_string()),
        date,
        duration_ms,
        outcome: event.outcome,
        rule_id,
        action_id,
    }
}
