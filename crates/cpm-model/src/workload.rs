//! Service, deployment and etcd carrier objects
//!
//! Only the fields mutation strategies commonly touch are typed; everything
//! else is kept verbatim in the flattened `extra` maps.

use crate::meta::ObjectMeta;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Kubernetes service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Service {
    /// Metadata
    #[serde(default)]
    pub metadata: ObjectMeta,

    /// Service spec
    #[serde(default)]
    pub spec: ServiceSpec,

    /// Untyped top-level fields (status, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Service {
    /// Create a service with empty spec
    #[must_use]
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            metadata: ObjectMeta::new(name, namespace),
            ..Self::default()
        }
    }
}

/// Service spec
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSpec {
    /// Service type (`ClusterIP`, `LoadBalancer`, ...)
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub service_type: Option<String>,

    /// Exposed ports
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<ServicePort>,

    /// Untyped spec fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One exposed service port
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePort {
    /// Port name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Service port
    pub port: i32,

    /// Target port on the pods
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_port: Option<IntOrString>,

    /// Protocol
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,

    /// Node port
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_port: Option<i32>,
}

/// Port reference by number or by name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IntOrString {
    /// Numeric port
    Int(i32),
    /// Named port
    String(String),
}

/// Kubernetes deployment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Deployment {
    /// Metadata
    #[serde(default)]
    pub metadata: ObjectMeta,

    /// Deployment spec
    #[serde(default, skip_serializing_if = "DeploymentSpec::is_empty")]
    pub spec: DeploymentSpec,

    /// Untyped top-level fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Deployment {
    /// Create a deployment without spec
    #[must_use]
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            metadata: ObjectMeta::new(name, namespace),
            ..Self::default()
        }
    }

    /// Add a container to the pod template
    #[must_use]
    pub fn with_container(mut self, container: Container) -> Self {
        self.spec.template.spec.containers.push(container);
        self
    }
}

/// Deployment spec
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentSpec {
    /// Desired replica count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    /// Pod template
    #[serde(default, skip_serializing_if = "PodTemplateSpec::is_empty")]
    pub template: PodTemplateSpec,

    /// Untyped spec fields (selector, strategy, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DeploymentSpec {
    /// Whether no field is set
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Pod template
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PodTemplateSpec {
    /// Template metadata (labels, annotations)
    #[serde(default, skip_serializing_if = "ObjectMeta::is_empty")]
    pub metadata: ObjectMeta,

    /// Pod spec
    #[serde(default, skip_serializing_if = "PodSpec::is_empty")]
    pub spec: PodSpec,
}

impl PodTemplateSpec {
    /// Whether no field is set
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Pod spec
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    /// Containers
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub containers: Vec<Container>,

    /// Untyped pod fields (volumes, affinity, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PodSpec {
    /// Whether no field is set
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Container in a pod template
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    /// Container name
    pub name: String,

    /// Image reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Entrypoint
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,

    /// Arguments
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    /// Environment variables
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,

    /// Untyped container fields (ports, volumeMounts, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Container {
    /// Create a container
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Environment variable
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvVar {
    /// Variable name
    pub name: String,

    /// Literal value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    /// Untyped fields (`valueFrom`)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EnvVar {
    /// Create a variable with a literal value
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
            extra: Map::new(),
        }
    }
}

/// Etcd instance managed by the etcd operator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Etcd {
    /// Metadata
    #[serde(default)]
    pub metadata: ObjectMeta,

    /// Etcd spec
    #[serde(default)]
    pub spec: EtcdSpec,

    /// Untyped top-level fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Etcd {
    /// Create an etcd instance with empty spec
    #[must_use]
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            metadata: ObjectMeta::new(name, namespace),
            ..Self::default()
        }
    }
}

/// Etcd spec
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EtcdSpec {
    /// Member count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    /// Storage class of the data volume
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,

    /// Size of the data volume
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_capacity: Option<String>,

    /// Untyped spec fields (backup, etcd, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
