//! Mutation strategy contract
//!
//! An [`Ensurer`] holds all provider-specific policy. The mutator calls one
//! method per routed object or sub-document, passing `new` by exclusive
//! borrow and `old` as an explicit `Option`. Every method defaults to
//! leaving `new` untouched, so implementors override only what they need.
//!
//! Implementations are shared across concurrent requests and must be
//! stateless or internally synchronized.

use crate::context::MutationContext;
use async_trait::async_trait;
use cpm_codec::{KubeletConfiguration, UnitOption};
use cpm_model::{Deployment, Etcd, File, Service, Unit};
use semver::Version;

/// Provider requirements for control-plane objects and node configuration
#[async_trait]
pub trait Ensurer: Send + Sync {
    /// Ensure the `kube-apiserver` service
    async fn ensure_kube_apiserver_service(
        &self,
        _ctx: &MutationContext,
        _new: &mut Service,
        _old: Option<&Service>,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// Ensure the `kube-apiserver` deployment
    async fn ensure_kube_apiserver_deployment(
        &self,
        _ctx: &MutationContext,
        _new: &mut Deployment,
        _old: Option<&Deployment>,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// Ensure the `kube-controller-manager` deployment
    async fn ensure_kube_controller_manager_deployment(
        &self,
        _ctx: &MutationContext,
        _new: &mut Deployment,
        _old: Option<&Deployment>,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// Ensure the `kube-scheduler` deployment
    async fn ensure_kube_scheduler_deployment(
        &self,
        _ctx: &MutationContext,
        _new: &mut Deployment,
        _old: Option<&Deployment>,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// Ensure the `cluster-autoscaler` deployment
    async fn ensure_cluster_autoscaler_deployment(
        &self,
        _ctx: &MutationContext,
        _new: &mut Deployment,
        _old: Option<&Deployment>,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// Ensure the `vpn-seed-server` deployment
    async fn ensure_vpn_seed_server_deployment(
        &self,
        _ctx: &MutationContext,
        _new: &mut Deployment,
        _old: Option<&Deployment>,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// Ensure the `etcd-main` and `etcd-events` instances
    async fn ensure_etcd(
        &self,
        _ctx: &MutationContext,
        _new: &mut Etcd,
        _old: Option<&Etcd>,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// Ensure the options of the `kubelet.service` unit
    ///
    /// Returns the options to write back into the unit.
    async fn ensure_kubelet_service_unit_options(
        &self,
        _ctx: &MutationContext,
        _version: &Version,
        new: Vec<UnitOption>,
        _old: Option<&[UnitOption]>,
    ) -> anyhow::Result<Vec<UnitOption>> {
        Ok(new)
    }

    /// Ensure the kubelet configuration
    async fn ensure_kubelet_configuration(
        &self,
        _ctx: &MutationContext,
        _version: &Version,
        _new: &mut KubeletConfiguration,
        _old: Option<&KubeletConfiguration>,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// Whether the cloud provider config file should be provisioned
    async fn should_provision_kubelet_cloud_provider_config(
        &self,
        _ctx: &MutationContext,
        _version: &Version,
    ) -> bool {
        false
    }

    /// Produce the cloud provider config content
    ///
    /// `content` starts empty. Leaving it empty provisions no file.
    async fn ensure_kubelet_cloud_provider_config(
        &self,
        _ctx: &MutationContext,
        _version: &Version,
        _content: &mut String,
        _namespace: &str,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// Ensure the kernel settings
    ///
    /// Emptying `new` keeps the original entry unchanged.
    async fn ensure_kubernetes_general_configuration(
        &self,
        _ctx: &MutationContext,
        _new: &mut String,
        _old: Option<&str>,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// Ensure arbitrary additional files
    async fn ensure_additional_files(
        &self,
        _ctx: &MutationContext,
        _new: &mut Vec<File>,
        _old: Option<&[File]>,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// Ensure arbitrary additional units
    async fn ensure_additional_units(
        &self,
        _ctx: &MutationContext,
        _new: &mut Vec<Unit>,
        _old: Option<&[Unit]>,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Ensurer that leaves every object unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEnsurer;

impl Ensurer for NoopEnsurer {}
