//! Per-request mutation context
//!
//! A [`MutationContext`] is built by the dispatcher for one request and
//! handed by shared reference to every ensurer call. The cluster of the
//! request's namespace is fetched through the [`ClusterAccessor`] at most
//! once per context.

use async_trait::async_trait;
use cpm_model::Cluster;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tokio::time::Instant;

/// Cluster lookup errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClusterError {
    /// No cluster registered for the namespace
    #[error("no cluster found for namespace '{0}'")]
    NotFound(String),

    /// Backend could not serve the lookup
    #[error("cluster for namespace '{namespace}' unavailable: {message}")]
    Unavailable {
        /// Namespace that was looked up
        namespace: String,
        /// Backend message
        message: String,
    },
}

/// Source of cluster-level data
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClusterAccessor: Send + Sync {
    /// Cluster owning the given control-plane namespace
    async fn get_cluster(&self, namespace: &str) -> Result<Cluster, ClusterError>;
}

/// Accessor over a fixed namespace -> cluster map
#[derive(Debug, Clone, Default)]
pub struct StaticClusterAccessor {
    clusters: HashMap<String, Cluster>,
}

impl StaticClusterAccessor {
    /// Create empty accessor
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a cluster for a namespace
    #[must_use]
    pub fn with_cluster(mut self, namespace: impl Into<String>, cluster: Cluster) -> Self {
        self.insert(namespace, cluster);
        self
    }

    /// Register a cluster for a namespace, replacing any previous one
    pub fn insert(&mut self, namespace: impl Into<String>, cluster: Cluster) {
        self.clusters.insert(namespace.into(), cluster);
    }

    /// Number of registered clusters
    #[must_use]
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    /// Whether no cluster is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }
}

#[async_trait]
impl ClusterAccessor for StaticClusterAccessor {
    async fn get_cluster(&self, namespace: &str) -> Result<Cluster, ClusterError> {
        self.clusters
            .get(namespace)
            .cloned()
            .ok_or_else(|| ClusterError::NotFound(namespace.to_string()))
    }
}

/// Request-scoped binding of namespace and cluster access
pub struct MutationContext {
    namespace: String,
    accessor: Arc<dyn ClusterAccessor>,
    cluster: OnceCell<Cluster>,
    deadline: Option<Instant>,
}

impl MutationContext {
    /// Create context for a namespace
    pub fn new(namespace: impl Into<String>, accessor: Arc<dyn ClusterAccessor>) -> Self {
        Self {
            namespace: namespace.into(),
            accessor,
            cluster: OnceCell::new(),
            deadline: None,
        }
    }

    /// Attach the request deadline
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Namespace of the object being mutated
    #[inline]
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Request deadline, if any
    #[inline]
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cluster of this namespace, fetched on first use
    ///
    /// # Errors
    /// Returns error if the accessor fails; a failed lookup is retried on
    /// the next call
    pub async fn cluster(&self) -> Result<&Cluster, ClusterError> {
        self.cluster
            .get_or_try_init(|| self.accessor.get_cluster(&self.namespace))
            .await
    }
}

impl fmt::Debug for MutationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationContext")
            .field("namespace", &self.namespace)
            .field("cluster", &self.cluster.get().map(|c| c.name.as_str()))
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}
