//! CPM Model
//!
//! Typed carrier objects handled by the control-plane mutator.
//!
//! # Core Concepts
//!
//! - [`Object`]: Closed set of carrier kinds, selected by [`ObjectKind`]
//! - [`CarrierObject`]: Typed view of one carrier kind
//! - [`OperatingSystemConfig`]: Bundle of file and unit entries with inline content
//! - [`Cluster`]: Cluster-level data used to resolve node software versions
//!
//! # Example
//!
//! ```rust,ignore
//! use cpm_model::{Object, constants};
//! use serde_json::json;
//!
//! let object = Object::from_value(json!({
//!     "apiVersion": "v1",
//!     "kind": "Service",
//!     "metadata": {"name": constants::KUBE_APISERVER, "namespace": "shoot--foo--bar"},
//! }))?;
//! assert_eq!(object.kind(), cpm_model::ObjectKind::Service);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod cluster;
pub mod constants;
pub mod lookup;
mod meta;
mod object;
mod osc;
mod workload;

pub use cluster::{Cluster, KubernetesSettings, WorkerKubernetes, WorkerPool};
pub use meta::ObjectMeta;
pub use object::{CarrierObject, ModelError, Object, ObjectKind, Unstructured};
pub use osc::{
    DropIn, File, FileContent, FileContentInline, FileContentSecretRef, OperatingSystemConfig,
    OperatingSystemConfigPurpose, OperatingSystemConfigSpec, Unit, UnitCommand,
};
pub use workload::{
    Container, Deployment, DeploymentSpec, EnvVar, Etcd, EtcdSpec, IntOrString, PodSpec,
    PodTemplateSpec, Service, ServicePort, ServiceSpec,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
