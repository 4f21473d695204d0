//! Service lookup strategies used by the request handler.
//!
//! Two variants exist, picked from configuration:
//! - [`ServiceCache`]: bulk pull on a timer, answer from memory
//! - [`DirectLookup`]: ask the registry for one service per query

use async_trait::async_trait;
use std::sync::Arc;

use crate::client::RangerClient;
use crate::registry::{split_service_name, ServiceIdentity, ServiceRecord};
use crate::state::ServiceCache;

/// Resolves a DNS question name to a registered service.
#[async_trait]
pub trait ServiceLookup: Send + Sync {
    /// Whether queries can be answered at all yet.
    fn is_ready(&self) -> bool;

    /// Find the service answering `qname` (`serviceName.namespace.`).
    async fn search_service(&self, qname: &str) -> Option<Arc<ServiceRecord>>;
}

#[async_trait]
impl ServiceLookup for ServiceCache {
    fn is_ready(&self) -> bool {
        ServiceCache::is_ready(self)
    }

    async fn search_service(&self, qname: &str) -> Option<Arc<ServiceRecord>> {
        self.lookup(qname)
    }
}

/// Per-query registry lookup with no cache.
#[derive(Debug, Clone)]
pub struct DirectLookup {
    client: RangerClient,
}

impl DirectLookup {
    /// Wrap a registry client.
    pub fn new(client: RangerClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ServiceLookup for DirectLookup {
    fn is_ready(&self) -> bool {
        true
    }

    async fn search_service(&self, qname: &str) -> Option<Arc<ServiceRecord>> {
        let (service_name, namespace) = split_service_name(qname)?;
        let nodes = self.client.search_service(qname).await?;
        if nodes.is_empty() {
            return None;
        }

        Some(Arc::new(ServiceRecord {
            identity: ServiceIdentity {
                service_name: service_name.to_string(),
                namespace: namespace.to_string(),
            },
            nodes,
        }))
    }
}
