//! HTTP client for the Ranger service registry.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, error, trace};

use crate::config::{EndpointInfo, RangerConfig};
use crate::error::DnsError;
use crate::metrics;
use crate::registry::{split_service_name, RegistrySnapshot, ServiceNode, ServiceNodesResponse};

/// Bulk listing of every service with its nodes.
pub const SERVICES_PATH: &str = "/ranger/services/nodes/v1";

/// Prefix of the per-service node listing, followed by `/{namespace}/{serviceName}`.
pub const SERVICE_NODES_PATH: &str = "/ranger/nodes/v1";

/// Anything that can produce a full registry snapshot.
///
/// The cache only depends on this, so tests can feed it canned snapshots.
#[async_trait]
pub trait RegistrySource: Send + Sync {
    /// Perform one pull. No retries.
    async fn fetch_services(&self) -> Result<RegistrySnapshot, DnsError>;
}

/// Client for the Ranger HTTP API.
#[derive(Debug, Clone)]
pub struct RangerClient {
    endpoint: EndpointInfo,
    http: reqwest::Client,
    timeout: Duration,
}

impl RangerClient {
    /// Create a client for the configured endpoint.
    ///
    /// Fails with [`DnsError::Config`] when the endpoint is not a usable URL.
    pub fn new(config: &RangerConfig) -> Result<Self, DnsError> {
        config.validate()?;
        let endpoint = EndpointInfo::parse(&config.endpoint)?;

        let http = reqwest::Client::builder()
            .user_agent(concat!("ranger-dns/", env!("CARGO_PKG_VERSION")))
            .pool_max_idle_per_host(10)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(client_build_error)?;

        Ok(Self {
            endpoint,
            http,
            timeout: config.request_timeout(),
        })
    }

    /// The parsed endpoint this client talks to.
    pub fn endpoint(&self) -> &EndpointInfo {
        &self.endpoint
    }

    /// GET `path` and decode the JSON body.
    async fn execute_request<T: DeserializeOwned>(&self, path: &str) -> Result<T, DnsError> {
        let url = format!("{}{}", self.endpoint.endpoint, path);
        trace!(%url, "registry request");

        let response = match self
            .http
            .get(&url)
            .header(ACCEPT, "application/json")
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                metrics::record_api_request("err", "GET", &self.endpoint.host);
                return Err(e.into());
            }
        };

        let status = response.status();
        metrics::record_api_request(status.as_str(), "GET", &self.endpoint.host);

        let body = response.bytes().await?;
        if !status.is_success() {
            return Err(DnsError::Status {
                code: status.as_u16(),
            });
        }

        Ok(serde_json::from_slice(&body)?)
    }

    /// Fetch every service known to the registry.
    pub async fn fetch_services(&self) -> Result<RegistrySnapshot, DnsError> {
        self.execute_request(SERVICES_PATH).await
    }

    /// Fetch the nodes of a single service.
    pub async fn fetch_service_nodes(
        &self,
        service_name: &str,
        namespace: &str,
    ) -> Result<ServiceNodesResponse, DnsError> {
        let path = format!("{SERVICE_NODES_PATH}/{namespace}/{service_name}");
        self.execute_request(&path).await
    }

    /// Resolve a DNS question name (`serviceName.namespace.`) to its nodes.
    ///
    /// Names that are not exactly two labels yield `None` without touching the
    /// network. Registry failures are logged and counted, and also yield `None`.
    pub async fn search_service(&self, question: &str) -> Option<Vec<ServiceNode>> {
        let (service_name, namespace) = split_service_name(question)?;

        metrics::record_sync_attempt();
        match self.fetch_service_nodes(service_name, namespace).await {
            Ok(response) => {
                debug!(
                    service = service_name,
                    namespace,
                    nodes = response.nodes.len(),
                    "fetched service nodes"
                );
                Some(response.nodes)
            }
            Err(e) => {
                metrics::record_sync_failure();
                error!(
                    service = service_name,
                    namespace,
                    error = %e,
                    "Error fetching nodes"
                );
                None
            }
        }
    }
}

fn client_build_error(e: reqwest::Error) -> DnsError {
    DnsError::Config(format!("failed to build HTTP client: {e}"))
}

#[async_trait]
impl RegistrySource for RangerClient {
    async fn fetch_services(&self) -> Result<RegistrySnapshot, DnsError> {
        RangerClient::fetch_services(self).await
    }
}
