//! Cluster-level data
//!
//! The mutator only needs the declared Kubernetes version of the control
//! plane and the per-worker-pool overrides.

use crate::object::ModelError;
use serde::{Deserialize, Serialize};

/// Cluster a set of control-plane objects belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    /// Cluster name
    pub name: String,

    /// Control-plane Kubernetes settings
    pub kubernetes: KubernetesSettings,

    /// Worker pools
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub workers: Vec<WorkerPool>,
}

impl Cluster {
    /// Create a cluster without worker pools
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kubernetes: KubernetesSettings {
                version: version.into(),
            },
            workers: Vec::new(),
        }
    }

    /// Add a worker pool
    #[must_use]
    pub fn with_worker(mut self, worker: WorkerPool) -> Self {
        self.workers.push(worker);
        self
    }

    /// Find a worker pool by name
    #[must_use]
    pub fn worker_pool(&self, name: &str) -> Option<&WorkerPool> {
        self.workers.iter().find(|w| w.name == name)
    }

    /// Parse from YAML (or JSON)
    ///
    /// # Errors
    /// Returns error if the document is not a valid cluster
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ModelError> {
        serde_yaml::from_str(yaml).map_err(ModelError::InvalidYaml)
    }
}

/// Control-plane Kubernetes settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KubernetesSettings {
    /// Declared Kubernetes version
    pub version: String,
}

/// Worker pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerPool {
    /// Pool name
    pub name: String,

    /// Pool-specific Kubernetes settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubernetes: Option<WorkerKubernetes>,
}

impl WorkerPool {
    /// Create a pool without overrides
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kubernetes: None,
        }
    }

    /// Set the pool's version override (explicit version or constraint)
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.kubernetes = Some(WorkerKubernetes {
            version: Some(version.into()),
        });
        self
    }

    /// Version override, if any
    #[must_use]
    pub fn version_override(&self) -> Option<&str> {
        self.kubernetes.as_ref()?.version.as_deref()
    }
}

/// Pool-specific Kubernetes settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerKubernetes {
    /// Version override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}
