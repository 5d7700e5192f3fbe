//! Testing utilities for CPM workspace
//!
//! Shared fixtures and a recording ensurer.

#![allow(missing_docs)]

use async_trait::async_trait;
use cpm_codec::{KubeletConfiguration, UnitOption};
use cpm_model::constants::{
    FILE_PATH_KERNEL_SETTINGS, FILE_PATH_KUBELET_CONFIG, LABEL_WORKER_POOL,
    UNIT_NAME_KUBELET_SERVICE,
};
use cpm_model::{
    Cluster, Deployment, Etcd, File, FileContentInline, OperatingSystemConfig,
    OperatingSystemConfigPurpose, Service, Unit, WorkerPool,
};
use cpm_webhook::helpers::ensure_unit_option;
use cpm_webhook::semver::Version;
use cpm_webhook::{Ensurer, Mutator, MutationContext, StaticClusterAccessor};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;

pub const NAMESPACE: &str = "shoot--foo--bar";
pub const POOL: &str = "worker-a";
pub const CLUSTER_VERSION: &str = "1.27.3";

pub const KUBELET_SERVICE_CONTENT: &str = "\
[Unit]
Description=kubelet daemon
After=containerd.service

[Service]
Restart=always
ExecStart=/opt/bin/kubelet --config=/var/lib/kubelet/config/kubelet

[Install]
WantedBy=multi-user.target
";

pub const KERNEL_SETTINGS_CONTENT: &str = "net.ipv4.ip_forward = 1\nvm.max_map_count = 135217728\n";

pub fn cluster() -> Cluster {
    Cluster::new("bar", CLUSTER_VERSION).with_worker(WorkerPool::new(POOL))
}

pub fn cluster_with_override(version_override: &str) -> Cluster {
    Cluster::new("bar", CLUSTER_VERSION).with_worker(WorkerPool::new(POOL).with_version(version_override))
}

pub fn accessor(cluster: Cluster) -> Arc<StaticClusterAccessor> {
    Arc::new(StaticClusterAccessor::new().with_cluster(NAMESPACE, cluster))
}

pub fn mutator(ensurer: Arc<dyn Ensurer>) -> Mutator {
    mutator_for(ensurer, cluster())
}

pub fn mutator_for(ensurer: Arc<dyn Ensurer>, cluster: Cluster) -> Mutator {
    Mutator::builder(accessor(cluster)).ensurer(ensurer).build()
}

pub fn reconcile_osc() -> OperatingSystemConfig {
    let mut osc = OperatingSystemConfig::new("osc-worker-a", NAMESPACE, OperatingSystemConfigPurpose::Reconcile);
    osc.metadata.labels.insert(LABEL_WORKER_POOL.to_string(), POOL.to_string());
    osc
}

pub fn provision_osc() -> OperatingSystemConfig {
    let mut osc = reconcile_osc();
    osc.spec.purpose = OperatingSystemConfigPurpose::Provision;
    osc
}

pub fn kubelet_unit() -> Unit {
    Unit::new(UNIT_NAME_KUBELET_SERVICE).with_content(KUBELET_SERVICE_CONTENT)
}

pub fn kubelet_config_file(data: &str) -> File {
    File::inline(FILE_PATH_KUBELET_CONFIG, FileContentInline::plain(data))
}

pub fn kernel_settings_file(encoding: &str, data: &str) -> File {
    File::inline(FILE_PATH_KERNEL_SETTINGS, FileContentInline::new(encoding, data))
}

pub fn full_osc() -> OperatingSystemConfig {
    reconcile_osc()
        .with_unit(kubelet_unit())
        .with_file(kubelet_config_file(r#"{"apiVersion":"kubelet.config.k8s.io/v1beta1","kind":"KubeletConfiguration","maxPods":110}"#))
        .with_file(kernel_settings_file("", KERNEL_SETTINGS_CONTENT))
}

/// One observed ensurer call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnsurerCall {
    KubeApiServerService { old: bool },
    KubeApiServerDeployment { old: bool },
    KubeControllerManagerDeployment { old: bool },
    KubeSchedulerDeployment { old: bool },
    ClusterAutoscalerDeployment { old: bool },
    VpnSeedServerDeployment { old: bool },
    Etcd { name: String, old: bool },
    KubeletServiceUnitOptions { version: Version, options: usize, old: Option<usize> },
    KubeletConfiguration { version: Version, old: bool },
    ShouldProvisionCloudProviderConfig { version: Version },
    CloudProviderConfig { version: Version, namespace: String },
    KubernetesGeneralConfiguration { new: String, old: Option<String> },
    AdditionalFiles { count: usize, old: Option<usize> },
    AdditionalUnits { count: usize, old: Option<usize> },
}

impl EnsurerCall {
    /// Ensurer method name of this call
    #[must_use]
    pub fn method(&self) -> &'static str {
        match self {
            Self::KubeApiServerService { .. } => "ensure_kube_apiserver_service",
            Self::KubeApiServerDeployment { .. } => "ensure_kube_apiserver_deployment",
            Self::KubeControllerManagerDeployment { .. } => "ensure_kube_controller_manager_deployment",
            Self::KubeSchedulerDeployment { .. } => "ensure_kube_scheduler_deployment",
            Self::ClusterAutoscalerDeployment { .. } => "ensure_cluster_autoscaler_deployment",
            Self::VpnSeedServerDeployment { .. } => "ensure_vpn_seed_server_deployment",
            Self::Etcd { .. } => "ensure_etcd",
            Self::KubeletServiceUnitOptions { .. } => "ensure_kubelet_service_unit_options",
            Self::KubeletConfiguration { .. } => "ensure_kubelet_configuration",
            Self::ShouldProvisionCloudProviderConfig { .. } => "should_provision_kubelet_cloud_provider_config",
            Self::CloudProviderConfig { .. } => "ensure_kubelet_cloud_provider_config",
            Self::KubernetesGeneralConfiguration { .. } => "ensure_kubernetes_general_configuration",
            Self::AdditionalFiles { .. } => "ensure_additional_files",
            Self::AdditionalUnits { .. } => "ensure_additional_units",
        }
    }
}

/// Ensurer that records every call and applies configurable edits
#[derive(Debug, Default)]
pub struct RecordingEnsurer {
    calls: Mutex<Vec<EnsurerCall>>,
    kernel_settings: Option<String>,
    cloud_provider_config: Option<String>,
    unit_options: Vec<UnitOption>,
    kubelet_config_fields: Vec<(String, Value)>,
    additional_files: Vec<File>,
    fail_on: Option<&'static str>,
}

impl RecordingEnsurer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the kernel settings with `content` (may be empty)
    #[must_use]
    pub fn with_kernel_settings(mut self, content: impl Into<String>) -> Self {
        self.kernel_settings = Some(content.into());
        self
    }

    /// Provision the cloud provider config with `content` (may be empty)
    #[must_use]
    pub fn with_cloud_provider_config(mut self, content: impl Into<String>) -> Self {
        self.cloud_provider_config = Some(content.into());
        self
    }

    /// Ensure this option in the `kubelet.service` unit
    #[must_use]
    pub fn with_unit_option(mut self, option: UnitOption) -> Self {
        self.unit_options.push(option);
        self
    }

    /// Set this top-level field in the kubelet configuration
    #[must_use]
    pub fn with_kubelet_config_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kubelet_config_fields.push((key.into(), value.into()));
        self
    }

    /// Append this file in `ensure_additional_files`
    #[must_use]
    pub fn with_additional_file(mut self, file: File) -> Self {
        self.additional_files.push(file);
        self
    }

    /// Fail the named method after recording it
    #[must_use]
    pub fn failing_on(mut self, method: &'static str) -> Self {
        self.fail_on = Some(method);
        self
    }

    /// Recorded calls in order
    #[must_use]
    pub fn calls(&self) -> Vec<EnsurerCall> {
        self.calls.lock().clone()
    }

    /// Recorded method names in order
    #[must_use]
    pub fn methods(&self) -> Vec<&'static str> {
        self.calls.lock().iter().map(EnsurerCall::method).collect()
    }

    fn record(&self, call: EnsurerCall) -> anyhow::Result<()> {
        let method = call.method();
        self.calls.lock().push(call);
        match self.fail_on {
            Some(fail) if fail == method => anyhow::bail!("injected failure in {method}"),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl Ensurer for RecordingEnsurer {
    async fn ensure_kube_apiserver_service(
        &self,
        _ctx: &MutationContext,
        _new: &mut Service,
        old: Option<&Service>,
    ) -> anyhow::Result<()> {
        self.record(EnsurerCall::KubeApiServerService { old: old.is_some() })
    }

    async fn ensure_kube_apiserver_deployment(
        &self,
        _ctx: &MutationContext,
        _new: &mut Deployment,
        old: Option<&Deployment>,
    ) -> anyhow::Result<()> {
        self.record(EnsurerCall::KubeApiServerDeployment { old: old.is_some() })
    }

    async fn ensure_kube_controller_manager_deployment(
        &self,
        _ctx: &MutationContext,
        _new: &mut Deployment,
        old: Option<&Deployment>,
    ) -> anyhow::Result<()> {
        self.record(EnsurerCall::KubeControllerManagerDeployment { old: old.is_some() })
    }

    async fn ensure_kube_scheduler_deployment(
        &self,
        _ctx: &MutationContext,
        _new: &mut Deployment,
        old: Option<&Deployment>,
    ) -> anyhow::Result<()> {
        self.record(EnsurerCall::KubeSchedulerDeployment { old: old.is_some() })
    }

    async fn ensure_cluster_autoscaler_deployment(
        &self,
        _ctx: &MutationContext,
        _new: &mut Deployment,
        old: Option<&Deployment>,
    ) -> anyhow::Result<()> {
        self.record(EnsurerCall::ClusterAutoscalerDeployment { old: old.is_some() })
    }

    async fn ensure_vpn_seed_server_deployment(
        &self,
        _ctx: &MutationContext,
        _new: &mut Deployment,
        old: Option<&Deployment>,
    ) -> anyhow::Result<()> {
        self.record(EnsurerCall::VpnSeedServerDeployment { old: old.is_some() })
    }

    async fn ensure_etcd(
        &self,
        _ctx: &MutationContext,
        new: &mut Etcd,
        old: Option<&Etcd>,
    ) -> anyhow::Result<()> {
        self.record(EnsurerCall::Etcd {
            name: new.metadata.name.clone(),
            old: old.is_some(),
        })
    }

    async fn ensure_kubelet_service_unit_options(
        &self,
        _ctx: &MutationContext,
        version: &Version,
        mut new: Vec<UnitOption>,
        old: Option<&[UnitOption]>,
    ) -> anyhow::Result<Vec<UnitOption>> {
        self.record(EnsurerCall::KubeletServiceUnitOptions {
            version: version.clone(),
            options: new.len(),
            old: old.map(<[UnitOption]>::len),
        })?;
        for option in &self.unit_options {
            ensure_unit_option(&mut new, option.clone());
        }
        Ok(new)
    }

    async fn ensure_kubelet_configuration(
        &self,
        _ctx: &MutationContext,
        version: &Version,
        new: &mut KubeletConfiguration,
        old: Option<&KubeletConfiguration>,
    ) -> anyhow::Result<()> {
        self.record(EnsurerCall::KubeletConfiguration {
            version: version.clone(),
            old: old.is_some(),
        })?;
        for (key, value) in &self.kubelet_config_fields {
            new.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    async fn should_provision_kubelet_cloud_provider_config(
        &self,
        _ctx: &MutationContext,
        version: &Version,
    ) -> bool {
        self.calls
            .lock()
            .push(EnsurerCall::ShouldProvisionCloudProviderConfig { version: version.clone() });
        self.cloud_provider_config.is_some()
    }

    async fn ensure_kubelet_cloud_provider_config(
        &self,
        _ctx: &MutationContext,
        version: &Version,
        content: &mut String,
        namespace: &str,
    ) -> anyhow::Result<()> {
        self.record(EnsurerCall::CloudProviderConfig {
            version: version.clone(),
            namespace: namespace.to_string(),
        })?;
        if let Some(config) = &self.cloud_provider_config {
            content.clone_from(config);
        }
        Ok(())
    }

    async fn ensure_kubernetes_general_configuration(
        &self,
        _ctx: &MutationContext,
        new: &mut String,
        old: Option<&str>,
    ) -> anyhow::Result<()> {
        self.record(EnsurerCall::KubernetesGeneralConfiguration {
            new: new.clone(),
            old: old.map(str::to_string),
        })?;
        if let Some(settings) = &self.kernel_settings {
            new.clone_from(settings);
        }
        Ok(())
    }

    async fn ensure_additional_files(
        &self,
        _ctx: &MutationContext,
        new: &mut Vec<File>,
        old: Option<&[File]>,
    ) -> anyhow::Result<()> {
        self.record(EnsurerCall::AdditionalFiles {
            count: new.len(),
            old: old.map(<[File]>::len),
        })?;
        for file in &self.additional_files {
            cpm_model::lookup::ensure_file_with_path(new, file.clone());
        }
        Ok(())
    }

    async fn ensure_additional_units(
        &self,
        _ctx: &MutationContext,
        new: &mut Vec<Unit>,
        old: Option<&[Unit]>,
    ) -> anyhow::Result<()> {
        self.record(EnsurerCall::AdditionalUnits {
            count: new.len(),
            old: old.map(<[Unit]>::len),
        })
    }
}
