//! `ecctl` provisioning backend

use crate::backend::{
    CreateRequest, CreatedDeployment, DeploymentStatus, ListedDeployment, ProvisioningBackend,
    ResourceInfo,
};
use crate::error::BackendError;
use alertload_config::ProvisioningConfig;
use alertload_core::scenario::{DEFAULT_TM_MAX_WORKERS, DEFAULT_TM_POLL_INTERVAL_MS};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::io::Write;
use tokio::process::Command;
use tracing::{debug, warn};

const MESSAGE_PREFIX: &str = "alertload";

/// Drives Elastic Cloud through the `ecctl` command line tool
#[derive(Debug, Clone)]
pub struct EcctlBackend {
    binary: String,
    config: String,
}

impl EcctlBackend {
    /// `config` is the ecctl config name passed as `--config`
    pub fn new(binary: impl Into<String>, config: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            config: config.into(),
        }
    }

    pub fn from_config(config: &ProvisioningConfig) -> Self {
        Self::new(&config.ecctl_binary, &config.ecctl_config)
    }

    /// Run ecctl and parse its stdout as JSON
    async fn run(&self, args: &[String]) -> Result<JsonValue, BackendError> {
        let command = format!("{} {}", self.binary, args.join(" "));
        debug!("running {}", command);

        let output = Command::new(&self.binary)
            .args(args)
            .output()
            .await
            .map_err(|source| BackendError::Spawn {
                command: command.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            debug!("{} failed: stderr:\n{}", command, stderr);
            return Err(BackendError::CommandFailed {
                command,
                status: output.status.to_string(),
                stderr,
            });
        }

        serde_json::from_slice(&output.stdout).map_err(|source| BackendError::InvalidJson { command, source })
    }

    fn base_args(&self, subcommand: &[&str], message: String) -> Vec<String> {
        let mut args: Vec<String> = subcommand.iter().map(|s| s.to_string()).collect();
        args.extend([
            "--config".to_string(),
            self.config.clone(),
            "--message".to_string(),
            format!("{}: {}", MESSAGE_PREFIX, message),
            "--output".to_string(),
            "json".to_string(),
        ]);
        args
    }

    async fn template(&self, template_id: &str) -> Result<JsonValue, BackendError> {
        let mut args = self.base_args(
            &["deployment", "template", "show"],
            format!("getting deployment template {}", template_id),
        );
        args.extend(["--template-id".to_string(), template_id.to_string()]);
        self.run(&args).await
    }
}

#[async_trait]
impl ProvisioningBackend for EcctlBackend {
    async fn create(&self, request: &CreateRequest) -> Result<CreatedDeployment, BackendError> {
        let name = &request.deployment_name;

        let mut args = self.base_args(
            &["deployment", "create"],
            format!("creating deployment {}", name),
        );
        if let Some(ref template) = request.spec.template {
            args.extend(["--deployment-template".to_string(), template.clone()]);
        }
        if let Some(ref version) = request.spec.version {
            args.extend(["--version".to_string(), version.clone()]);
        }
        args.extend([
            "--name".to_string(),
            name.clone(),
            "--generate-payload".to_string(),
        ]);

        let mut payload = self.run(&args).await?;

        // discrete sizes come from the template; without it the requested size is used as is
        let template = match template_id(&payload) {
            Some(id) => match self.template(&id).await {
                Ok(template) => Some(template),
                Err(e) => {
                    warn!("unable to read deployment template {}: {}", id, e);
                    None
                }
            },
            None => None,
        };

        patch_payload(&mut payload, request, template.as_ref())?;

        let mut file = tempfile::Builder::new()
            .prefix("alertload-payload-")
            .suffix(".json")
            .tempfile()?;
        file.write_all(&serde_json::to_vec_pretty(&payload).map_err(|source| {
            BackendError::InvalidJson {
                command: "serialize create payload".to_string(),
                source,
            }
        })?)?;
        file.flush()?;

        let mut args = self.base_args(
            &["deployment", "create"],
            format!("creating deployment {}", name),
        );
        args.extend([
            "--file".to_string(),
            file.path().to_string_lossy().to_string(),
            "--name".to_string(),
            name.clone(),
        ]);

        let result = self.run(&args).await?;
        parse_created(&result)
    }

    async fn get_status(&self, id: &str, name: &str) -> Result<DeploymentStatus, BackendError> {
        let mut args = self.base_args(
            &["deployment", "show"],
            format!("getting deployment {} {}", id, name),
        );
        args.insert(2, id.to_string());
        parse_status(&self.run(&args).await?)
    }

    async fn delete(&self, id: &str, name: &str) -> Result<(), BackendError> {
        let mut args = self.base_args(
            &["deployment", "shutdown"],
            format!("deleting deployment {} {}", id, name),
        );
        args.insert(2, id.to_string());
        args.extend(["--force".to_string(), "--skip-snapshot".to_string()]);
        self.run(&args).await.map(|_| ())
    }

    async fn list(&self) -> Result<Vec<ListedDeployment>, BackendError> {
        let args = self.base_args(&["deployment", "list"], "listing deployments".to_string());
        parse_list(&self.run(&args).await?)
    }
}

#[derive(Debug, Deserialize)]
struct CreateResponse {
    id: Option<String>,
    #[serde(default)]
    resources: Vec<CreatedResource>,
}

#[derive(Debug, Deserialize)]
struct CreatedResource {
    #[serde(default)]
    kind: String,
    #[serde(default)]
    credentials: Option<Credentials>,
}

#[derive(Debug, Deserialize)]
struct Credentials {
    username: Option<String>,
    password: Option<String>,
}

/// Extract id and Elasticsearch credentials from the create response
pub fn parse_created(value: &JsonValue) -> Result<CreatedDeployment, BackendError> {
    let response: CreateResponse = serde_json::from_value(value.clone()).map_err(|e| {
        BackendError::unexpected(format!("create deployment response: {}", e))
    })?;

    let id = response
        .id
        .ok_or_else(|| BackendError::unexpected("id null from create deployment"))?;

    let credentials = response
        .resources
        .into_iter()
        .find(|resource| resource.kind == "elasticsearch")
        .ok_or_else(|| BackendError::unexpected("no elasticsearch resource from create deployment"))?
        .credentials
        .ok_or_else(|| BackendError::unexpected("no credentials from create deployment"))?;

    Ok(CreatedDeployment {
        id,
        username: credentials
            .username
            .ok_or_else(|| BackendError::unexpected("username not set from create deployment"))?,
        password: credentials
            .password
            .ok_or_else(|| BackendError::unexpected("password not set from create deployment"))?,
    })
}

#[derive(Debug, Default, Deserialize)]
struct ShowResponse {
    #[serde(default)]
    resources: Option<ShowResources>,
}

#[derive(Debug, Default, Deserialize)]
struct ShowResources {
    #[serde(default)]
    elasticsearch: Vec<ShowResource>,
    #[serde(default)]
    kibana: Vec<ShowResource>,
}

#[derive(Debug, Default, Deserialize)]
struct ShowResource {
    #[serde(default)]
    info: ShowInfo,
}

#[derive(Debug, Default, Deserialize)]
struct ShowInfo {
    #[serde(default)]
    healthy: bool,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    metadata: ShowMetadata,
    #[serde(default)]
    topology: ShowTopology,
}

#[derive(Debug, Default, Deserialize)]
struct ShowMetadata {
    #[serde(default)]
    endpoint: Option<String>,
    #[serde(default)]
    ports: ShowPorts,
}

#[derive(Debug, Default, Deserialize)]
struct ShowPorts {
    #[serde(default)]
    https: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct ShowTopology {
    #[serde(default)]
    instances: Vec<ShowInstance>,
}

#[derive(Debug, Default, Deserialize)]
struct ShowInstance {
    #[serde(default)]
    service_version: Option<String>,
    #[serde(default)]
    zone: Option<String>,
}

impl From<ShowInfo> for ResourceInfo {
    fn from(info: ShowInfo) -> Self {
        let instance = info.topology.instances.into_iter().next().unwrap_or_default();
        ResourceInfo {
            healthy: info.healthy,
            status: info.status.unwrap_or_else(|| "unknown".to_string()),
            endpoint: info.metadata.endpoint,
            port: info.metadata.ports.https,
            version: instance.service_version.unwrap_or_else(|| "unknown".to_string()),
            zone: instance.zone.unwrap_or_else(|| "unknown".to_string()),
        }
    }
}

/// Health of the first Elasticsearch and Kibana resource of `deployment show`
pub fn parse_status(value: &JsonValue) -> Result<DeploymentStatus, BackendError> {
    let response: ShowResponse = serde_json::from_value(value.clone())
        .map_err(|e| BackendError::unexpected(format!("show deployment response: {}", e)))?;

    let resources = response
        .resources
        .ok_or_else(|| BackendError::unexpected("null resources from get deployment"))?;

    let first = |resources: Vec<ShowResource>| -> ResourceInfo {
        resources
            .into_iter()
            .next()
            .map(|resource| resource.info.into())
            .unwrap_or_else(|| ResourceInfo {
                status: "unknown".to_string(),
                ..ResourceInfo::default()
            })
    };

    Ok(DeploymentStatus {
        elasticsearch: first(resources.elasticsearch),
        kibana: first(resources.kibana),
    })
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    deployments: Vec<ListedDeployment>,
}

pub fn parse_list(value: &JsonValue) -> Result<Vec<ListedDeployment>, BackendError> {
    let response: ListResponse = serde_json::from_value(value.clone())
        .map_err(|e| BackendError::unexpected(format!("list deployments response: {}", e)))?;
    Ok(response.deployments)
}

fn template_id(payload: &JsonValue) -> Option<String> {
    payload
        .pointer("/resources/elasticsearch/0/plan/deployment_template/id")
        .and_then(JsonValue::as_str)
        .map(str::to_string)
}

/// Shape a generated create payload for this request.
///
/// Keeps only the first Elasticsearch and Kibana resource, sizes every sized
/// topology element and writes non-default task manager settings into the
/// Kibana user settings.
pub fn patch_payload(
    payload: &mut JsonValue,
    request: &CreateRequest,
    template: Option<&JsonValue>,
) -> Result<(), BackendError> {
    let resources = payload
        .get_mut("resources")
        .ok_or_else(|| BackendError::unexpected("create payload has no resources"))?;

    for (kind, memory_gb) in [
        ("elasticsearch", request.es_memory_gb),
        ("kibana", request.kb_memory_gb),
    ] {
        let list = resources
            .get_mut(kind)
            .and_then(JsonValue::as_array_mut)
            .ok_or_else(|| BackendError::unexpected(format!("create payload has no {} resource", kind)))?;
        list.truncate(1);

        let resource = list
            .first_mut()
            .ok_or_else(|| BackendError::unexpected(format!("create payload has no {} resource", kind)))?;

        let requested_mb = u64::from(memory_gb) * 1024;
        if let Some(topology) = resource
            .pointer_mut("/plan/cluster_topology")
            .and_then(JsonValue::as_array_mut)
        {
            for node in topology.iter_mut() {
                let sized = node
                    .pointer("/size/value")
                    .and_then(JsonValue::as_u64)
                    .is_some_and(|value| value > 0);
                if !sized {
                    continue;
                }

                let instance_config = node
                    .get("instance_configuration_id")
                    .and_then(JsonValue::as_str)
                    .unwrap_or_default()
                    .to_string();
                let size = template
                    .and_then(|t| template_sizes(t, &instance_config))
                    .map(|sizes| closest_size(&sizes, requested_mb))
                    .unwrap_or(requested_mb);

                if size != requested_mb {
                    debug!(
                        "changing memory of {} to {} for {}",
                        requested_mb, size, instance_config
                    );
                }
                if let Some(value) = node.pointer_mut("/size/value") {
                    *value = JsonValue::from(size);
                }
            }
        }

        if kind == "kibana" {
            if let Some(settings) = task_manager_settings(request) {
                let plan = resource
                    .get_mut("plan")
                    .and_then(JsonValue::as_object_mut)
                    .ok_or_else(|| BackendError::unexpected("kibana resource has no plan"))?;
                let kibana = plan
                    .entry("kibana")
                    .or_insert_with(|| JsonValue::Object(Default::default()));
                if let Some(kibana) = kibana.as_object_mut() {
                    kibana.insert("user_settings_yaml".to_string(), JsonValue::from(settings));
                }
            }
        }
    }

    Ok(())
}

/// Kibana yaml overrides for non-default task manager settings
pub fn task_manager_settings(request: &CreateRequest) -> Option<String> {
    let mut lines = Vec::new();
    if request.spec.tm_max_workers != DEFAULT_TM_MAX_WORKERS {
        lines.push(format!(
            "xpack.task_manager.max_workers: {}",
            request.spec.tm_max_workers
        ));
    }
    if request.spec.tm_poll_interval != DEFAULT_TM_POLL_INTERVAL_MS {
        lines.push(format!(
            "xpack.task_manager.poll_interval: {}",
            request.spec.tm_poll_interval
        ));
    }

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

fn template_sizes(template: &JsonValue, instance_config: &str) -> Option<Vec<u64>> {
    template
        .get("instance_configurations")?
        .as_array()?
        .iter()
        .find(|config| config.get("id").and_then(JsonValue::as_str) == Some(instance_config))?
        .pointer("/discrete_sizes/sizes")?
        .as_array()
        .map(|sizes| sizes.iter().filter_map(JsonValue::as_u64).collect::<Vec<_>>())
        .filter(|sizes| !sizes.is_empty())
}

/// Closest offered size to `requested`. Multiples of the largest discrete
/// size stand for multi-node topologies at full size.
pub fn closest_size(sizes: &[u64], requested: u64) -> u64 {
    let Some(&largest) = sizes.last() else {
        return requested;
    };

    sizes
        .iter()
        .copied()
        .chain((2..=100).map(|nodes| largest * nodes))
        .min_by_key(|size| size.abs_diff(requested))
        .unwrap_or(requested)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alertload_core::{DeploymentSpec, ResourceSize};
    use serde_json::json;

    fn request(tm_max_workers: u32, tm_poll_interval: u64) -> CreateRequest {
        let mut spec = DeploymentSpec::new(ResourceSize::new(1, 4), ResourceSize::new(2, 8));
        spec.tm_max_workers = tm_max_workers;
        spec.tm_poll_interval = tm_poll_interval;
        CreateRequest {
            deployment_name: "alertload-18120000-0".to_string(),
            spec,
            es_memory_gb: 4,
            kb_memory_gb: 16,
        }
    }

    fn payload() -> JsonValue {
        json!({
            "name": "alertload-18120000-0",
            "resources": {
                "elasticsearch": [
                    { "plan": {
                        "deployment_template": { "id": "aws-io-optimized-v2" },
                        "cluster_topology": [
                            { "instance_configuration_id": "aws.data.highio.i3", "size": { "value": 8192, "resource": "memory" } },
                            { "instance_configuration_id": "aws.master.r5d", "size": { "value": 0, "resource": "memory" } }
                        ]
                    } },
                    { "plan": {} }
                ],
                "kibana": [
                    { "plan": {
                        "cluster_topology": [
                            { "instance_configuration_id": "aws.kibana.r5d", "size": { "value": 1024, "resource": "memory" } }
                        ],
                        "kibana": { "version": "7.14.0" }
                    } }
                ]
            }
        })
    }

    fn template() -> JsonValue {
        json!({
            "instance_configurations": [
                { "id": "aws.data.highio.i3", "discrete_sizes": { "sizes": [1024, 2048, 4096, 8192, 15360, 29696, 59392] } },
                { "id": "aws.kibana.r5d", "discrete_sizes": { "sizes": [1024, 2048, 4096, 8192] } }
            ]
        })
    }

    #[test]
    fn test_closest_size() {
        let sizes = [1024, 2048, 4096, 8192];
        assert_eq!(closest_size(&sizes, 4096), 4096);
        assert_eq!(closest_size(&sizes, 3000), 2048);
        // two full-size nodes
        assert_eq!(closest_size(&sizes, 16384), 16384);
        assert_eq!(closest_size(&[], 5000), 5000);
    }

    #[test]
    fn test_patch_payload_sizes_and_trims() {
        let mut payload = payload();
        patch_payload(&mut payload, &request(10, 3000), Some(&template())).unwrap();

        let es = &payload["resources"]["elasticsearch"];
        assert_eq!(es.as_array().unwrap().len(), 1);
        assert_eq!(es[0]["plan"]["cluster_topology"][0]["size"]["value"], 4096);
        // unsized elements stay unsized
        assert_eq!(es[0]["plan"]["cluster_topology"][1]["size"]["value"], 0);

        let kb = &payload["resources"]["kibana"][0];
        assert_eq!(kb["plan"]["cluster_topology"][0]["size"]["value"], 16384);
        // default task manager settings are not written
        assert!(kb["plan"]["kibana"].get("user_settings_yaml").is_none());
    }

    #[test]
    fn test_patch_payload_task_manager_settings() {
        let mut payload = payload();
        patch_payload(&mut payload, &request(20, 3000), None).unwrap();

        let yaml = payload["resources"]["kibana"][0]["plan"]["kibana"]["user_settings_yaml"]
            .as_str()
            .unwrap();
        assert_eq!(yaml, "xpack.task_manager.max_workers: 20");
        assert_eq!(
            task_manager_settings(&request(10, 1000)).as_deref(),
            Some("xpack.task_manager.poll_interval: 1000")
        );
    }

    #[test]
    fn test_patch_payload_requires_resources() {
        let mut empty = json!({ "resources": { "elasticsearch": [] } });
        assert!(patch_payload(&mut empty, &request(10, 3000), None).is_err());
    }

    #[test]
    fn test_template_id() {
        assert_eq!(template_id(&payload()).as_deref(), Some("aws-io-optimized-v2"));
        assert!(template_id(&json!({})).is_none());
    }

    #[test]
    fn test_parse_created() {
        let created = parse_created(&json!({
            "id": "d2f1",
            "name": "alertload-x",
            "resources": [
                { "kind": "kibana", "id": "k" },
                { "kind": "elasticsearch", "credentials": { "username": "elastic", "password": "pw" } }
            ]
        }))
        .unwrap();
        assert_eq!(created.id, "d2f1");
        assert_eq!(created.username, "elastic");

        let err = parse_created(&json!({ "id": "d2f1", "resources": [] })).unwrap_err();
        assert!(err.to_string().contains("no elasticsearch resource"));
        assert!(parse_created(&json!({ "resources": [] })).is_err());
    }

    #[test]
    fn test_parse_status() {
        let resource = |healthy: bool, status: &str, endpoint: &str| {
            json!([{ "info": {
                "healthy": healthy,
                "status": status,
                "metadata": { "endpoint": endpoint, "ports": { "https": 9243, "http": 9200 } },
                "topology": { "instances": [ { "service_version": "7.14.0", "zone": "us-west2-a" } ] }
            } }])
        };

        let status = parse_status(&json!({
            "resources": {
                "elasticsearch": resource(true, "started", "es.example.com"),
                "kibana": resource(false, "initializing", "kb.example.com")
            }
        }))
        .unwrap();

        assert!(!status.is_healthy());
        assert_eq!(status.kibana.endpoint.as_deref(), Some("kb.example.com"));
        assert_eq!(status.elasticsearch.port, Some(9243));
        assert_eq!(status.elasticsearch.zone, "us-west2-a");
        assert_eq!(
            status.summary(),
            "es: healthy: started; kb: unhealthy: initializing"
        );

        assert!(parse_status(&json!({})).is_err());
    }

    #[test]
    fn test_parse_list() {
        let listed = parse_list(&json!({
            "deployments": [
                { "id": "1", "name": "alertload-a", "resources": [] },
                { "id": "2", "name": "prod" }
            ],
            "return_count": 2
        }))
        .unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].name, "alertload-a");
        assert!(parse_list(&json!({})).unwrap().is_empty());
    }
}
