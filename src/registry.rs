//! Registry data model, decoded from Ranger's JSON responses.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One reachable instance of a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceNode {
    /// Hostname of the instance (no trailing dot).
    pub host: String,
    /// Port the instance listens on.
    pub port: i32,
    /// Scheme served on the port (e.g. "HTTP").
    #[serde(default)]
    pub port_scheme: String,
}

/// Logical key of a registered service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceIdentity {
    /// Service name, first DNS label.
    pub service_name: String,
    /// Namespace, second DNS label.
    pub namespace: String,
}

impl ServiceIdentity {
    /// Fully-qualified DNS name answering for this service: `serviceName.namespace.`
    pub fn fqdn(&self) -> String {
        format!("{}.{}.", self.service_name, self.namespace)
    }
}

/// One entry of a registry snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRecord {
    /// Which service this is.
    #[serde(rename = "service")]
    pub identity: ServiceIdentity,
    /// Instances in registry order.
    #[serde(default)]
    pub nodes: Vec<ServiceNode>,
}

/// Full result of a bulk pull (`/ranger/services/nodes/v1`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    /// Registry status string.
    #[serde(default)]
    pub status: String,
    /// Registry message.
    #[serde(default)]
    pub message: String,
    /// Services in registry order.
    #[serde(default, rename = "data")]
    pub records: Vec<Arc<ServiceRecord>>,
}

/// Result of a per-service lookup (`/ranger/nodes/v1/{namespace}/{serviceName}`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceNodesResponse {
    /// Registry status string.
    #[serde(default)]
    pub status: String,
    /// Registry message.
    #[serde(default)]
    pub message: String,
    /// Instances of the requested service.
    #[serde(default, rename = "data")]
    pub nodes: Vec<ServiceNode>,
}

/// Split a query name into `(serviceName, namespace)`.
///
/// One trailing dot is stripped first; the rest must be exactly two labels.
pub fn split_service_name(question: &str) -> Option<(&str, &str)> {
    let trimmed = question.strip_suffix('.').unwrap_or(question);
    let mut labels = trimmed.split('.');
    let service = labels.next()?;
    let namespace = labels.next()?;
    if labels.next().is_some() {
        return None;
    }
    Some((service, namespace))
}
