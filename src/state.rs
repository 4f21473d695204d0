//! In-memory service cache backed by periodic Ranger pulls.
//!
//! Every successful pull builds a fresh [`CacheState`] off to the side and
//! swaps it in under a short write lock. Readers clone the current `Arc` and
//! work on it without holding the lock, so they see either the previous or the
//! next complete state and never a partially built one.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::client::RegistrySource;
use crate::metrics;
use crate::refresh::RefreshTask;
use crate::registry::{RegistrySnapshot, ServiceRecord};

/// One installed registry snapshot plus its name index.
#[derive(Debug)]
pub struct CacheState {
    snapshot: Arc<RegistrySnapshot>,

    /// `serviceName.namespace.` -> record. Later duplicates win.
    index: HashMap<String, Arc<ServiceRecord>>,
}

impl CacheState {
    /// Build the name index for a snapshot.
    pub fn build(snapshot: RegistrySnapshot) -> Self {
        let mut index = HashMap::with_capacity(snapshot.records.len());
        for record in &snapshot.records {
            index.insert(record.identity.fqdn(), Arc::clone(record));
        }

        debug!(
            records = snapshot.records.len(),
            names = index.len(),
            "built service name index"
        );

        Self {
            snapshot: Arc::new(snapshot),
            index,
        }
    }

    /// The snapshot this state was built from.
    pub fn snapshot(&self) -> &Arc<RegistrySnapshot> {
        &self.snapshot
    }

    /// Exact-match lookup. `name` must carry the trailing dot.
    pub fn lookup(&self, name: &str) -> Option<Arc<ServiceRecord>> {
        self.index.get(name).cloned()
    }

    /// Number of distinct names in the index.
    pub fn services_count(&self) -> usize {
        self.index.len()
    }

    /// Number of nodes across all indexed services.
    pub fn nodes_count(&self) -> usize {
        self.index.values().map(|r| r.nodes.len()).sum()
    }
}

/// Thread-safe handle to the service cache. Cheap to clone.
#[derive(Clone)]
pub struct ServiceCache {
    source: Arc<dyn RegistrySource>,

    /// `None` until the first successful refresh.
    inner: Arc<RwLock<Option<Arc<CacheState>>>>,

    /// Keeps refreshes from overlapping.
    refresh_lock: Arc<tokio::sync::Mutex<()>>,
}

impl ServiceCache {
    /// Create an empty (not ready) cache pulling from `source`.
    pub fn new(source: Arc<dyn RegistrySource>) -> Self {
        Self {
            source,
            inner: Arc::new(RwLock::new(None)),
            refresh_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// Create a cache, refresh it once, then keep refreshing every `interval`
    /// on a background task until `shutdown` fires.
    pub async fn start(
        source: Arc<dyn RegistrySource>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let cache = Self::new(source);
        cache.refresh().await;

        let handle = RefreshTask::new(cache.clone(), interval).spawn(shutdown);
        (cache, handle)
    }

    /// Pull from the registry and install the result.
    ///
    /// Returns `true` when a new state was installed. Failures are logged and
    /// counted and leave the current state untouched.
    pub async fn refresh(&self) -> bool {
        let _guard = self.refresh_lock.lock().await;

        metrics::record_sync_attempt();
        match self.source.fetch_services().await {
            Ok(snapshot) => {
                self.install(snapshot);
                true
            }
            Err(e) => {
                metrics::record_sync_failure();
                error!(error = %e, ready = self.is_ready(), "Error fetching services");
                false
            }
        }
    }

    /// Replace the current state with one built from `snapshot`.
    pub fn install(&self, snapshot: RegistrySnapshot) {
        let state = Arc::new(CacheState::build(snapshot));
        let services = state.services_count();
        let nodes = state.nodes_count();

        let previous = self.inner.write().replace(state);
        if previous.is_none() {
            info!(services, nodes, "Initial service sync complete");
        } else {
            debug!(services, nodes, "installed service snapshot");
        }

        metrics::record_state_counts(services, nodes);
        metrics::record_ready_state(true);
    }

    /// Current state, or `None` if no refresh has succeeded yet.
    pub fn current(&self) -> Option<Arc<CacheState>> {
        self.inner.read().clone()
    }

    /// Last successfully installed snapshot.
    pub fn current_snapshot(&self) -> Option<Arc<RegistrySnapshot>> {
        self.current().map(|state| Arc::clone(state.snapshot()))
    }

    /// Look up `serviceName.namespace.` in the current state.
    ///
    /// Not-found covers both "not ready" and "no such service"; use
    /// [`ServiceCache::is_ready`] to tell them apart.
    pub fn lookup(&self, name: &str) -> Option<Arc<ServiceRecord>> {
        self.current()?.lookup(name)
    }

    /// True once a refresh has succeeded. Stays true afterwards.
    pub fn is_ready(&self) -> bool {
        self.inner.read().is_some()
    }

    /// Number of services in the current state.
    pub fn services_count(&self) -> usize {
        self.current().map_or(0, |s| s.services_count())
    }

    /// Emit current state metrics.
    pub fn emit_metrics(&self) {
        match self.current() {
            Some(state) => {
                metrics::record_state_counts(state.services_count(), state.nodes_count());
                metrics::record_ready_state(true);
            }
            None => {
                metrics::record_state_counts(0, 0);
                metrics::record_ready_state(false);
            }
        }
    }
}
