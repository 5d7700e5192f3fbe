//! Dispatcher
//!
//! Routes a `(new, old)` object pair to the matching ensurer method or to
//! the [`OscPipeline`]:
//!
//! | kind | name / purpose | target |
//! |------|----------------|--------|
//! | Service | `kube-apiserver` | `ensure_kube_apiserver_service` |
//! | Deployment | `kube-apiserver` | `ensure_kube_apiserver_deployment` |
//! | Deployment | `kube-controller-manager` | `ensure_kube_controller_manager_deployment` |
//! | Deployment | `kube-scheduler` | `ensure_kube_scheduler_deployment` |
//! | Deployment | `cluster-autoscaler` | `ensure_cluster_autoscaler_deployment` |
//! | Deployment | `vpn-seed-server` | `ensure_vpn_seed_server_deployment` |
//! | Etcd | `etcd-main`, `etcd-events` | `ensure_etcd` |
//! | OperatingSystemConfig | purpose `reconcile` | pipeline |
//!
//! Everything else, and every object with a deletion timestamp, is left
//! untouched. The kind of `old` is only checked once an object is routed, so
//! an unrouted Deployment never fails on a mismatched `old`.

use crate::config::MutatorConfig;
use crate::context::{ClusterAccessor, MutationContext};
use crate::ensurer::{Ensurer, NoopEnsurer};
use crate::error::MutatorError;
use crate::logging::log_mutation;
use crate::pipeline::OscPipeline;
use cpm_codec::{
    DefaultFileContentInlineCodec, FileContentInlineCodec, JsonYamlKubeletConfigCodec,
    KubeletConfigCodec, SystemdUnitSerializer, UnitSerializer,
};
use cpm_model::constants::{
    CLUSTER_AUTOSCALER, ETCD_EVENTS, ETCD_MAIN, KUBE_APISERVER, KUBE_CONTROLLER_MANAGER,
    KUBE_SCHEDULER, VPN_SEED_SERVER,
};
use cpm_model::{CarrierObject, Object};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Deployments with a dedicated ensurer method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeploymentRoute {
    KubeApiServer,
    KubeControllerManager,
    KubeScheduler,
    ClusterAutoscaler,
    VpnSeedServer,
}

impl DeploymentRoute {
    fn for_name(name: &str) -> Option<Self> {
        match name {
            KUBE_APISERVER => Some(Self::KubeApiServer),
            KUBE_CONTROLLER_MANAGER => Some(Self::KubeControllerManager),
            KUBE_SCHEDULER => Some(Self::KubeScheduler),
            CLUSTER_AUTOSCALER => Some(Self::ClusterAutoscaler),
            VPN_SEED_SERVER => Some(Self::VpnSeedServer),
            _ => None,
        }
    }
}

/// Control-plane object mutator
///
/// Holds only shared immutable collaborators, so one instance serves any
/// number of concurrent requests.
#[derive(Clone)]
pub struct Mutator {
    ensurer: Arc<dyn Ensurer>,
    pipeline: OscPipeline,
    accessor: Arc<dyn ClusterAccessor>,
    request_timeout: Option<Duration>,
}

impl Mutator {
    /// Start building a mutator around a cluster accessor
    pub fn builder(accessor: Arc<dyn ClusterAccessor>) -> MutatorBuilder {
        MutatorBuilder::new(accessor)
    }

    /// Time budget applied by [`Mutator::mutate`]
    #[inline]
    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout
    }

    /// Mutate `new` in place according to its kind and name
    ///
    /// `old` is the previously observed object, if any. It is never
    /// modified. On error, `new` may be partially mutated and the caller
    /// must reject the request.
    ///
    /// # Errors
    /// Returns the first error of any step, or [`MutatorError::Timeout`]
    /// if the configured request timeout expires
    pub async fn mutate(&self, new: &mut Object, old: Option<&Object>) -> Result<(), MutatorError> {
        match self.request_timeout {
            Some(timeout) => self.mutate_until(new, old, Instant::now() + timeout).await,
            None => self.dispatch(new, old, None).await,
        }
    }

    /// Mutate `new` in place, giving up at `deadline`
    ///
    /// # Errors
    /// Same as [`Mutator::mutate`]; [`MutatorError::Timeout`] when the
    /// deadline passes first
    pub async fn mutate_until(
        &self,
        new: &mut Object,
        old: Option<&Object>,
        deadline: Instant,
    ) -> Result<(), MutatorError> {
        let started = Instant::now();
        match tokio::time::timeout_at(deadline, self.dispatch(new, old, Some(deadline))).await {
            Ok(result) => result,
            Err(_) => {
                let after = deadline.saturating_duration_since(started);
                tracing::warn!(after_ms = after.as_millis(), "Mutation deadline exceeded");
                Err(MutatorError::Timeout { after })
            }
        }
    }

    async fn dispatch(
        &self,
        new: &mut Object,
        old: Option<&Object>,
        deadline: Option<Instant>,
    ) -> Result<(), MutatorError> {
        if new.is_being_deleted() {
            tracing::debug!(
                kind = %new.kind_name(),
                name = %new.name(),
                "Skipping object with deletion timestamp"
            );
            return Ok(());
        }

        let mut ctx = MutationContext::new(new.namespace(), Arc::clone(&self.accessor));
        if let Some(deadline) = deadline {
            ctx = ctx.with_deadline(deadline);
        }

        let ensurer = self.ensurer.as_ref();
        match new {
            Object::Service(svc) if svc.metadata.name == KUBE_APISERVER => {
                let old = old_as(old)?;
                log_mutation(cpm_model::Service::KIND, &svc.metadata);
                ensurer.ensure_kube_apiserver_service(&ctx, svc, old).await?;
            }
            Object::Deployment(dep) => {
                let Some(route) = DeploymentRoute::for_name(&dep.metadata.name) else {
                    return Ok(());
                };
                let old = old_as(old)?;
                log_mutation(cpm_model::Deployment::KIND, &dep.metadata);
                match route {
                    DeploymentRoute::KubeApiServer => {
                        ensurer.ensure_kube_apiserver_deployment(&ctx, dep, old).await?;
                    }
                    DeploymentRoute::KubeControllerManager => {
                        ensurer
                            .ensure_kube_controller_manager_deployment(&ctx, dep, old)
                            .await?;
                    }
                    DeploymentRoute::KubeScheduler => {
                        ensurer.ensure_kube_scheduler_deployment(&ctx, dep, old).await?;
                    }
                    DeploymentRoute::ClusterAutoscaler => {
                        ensurer.ensure_cluster_autoscaler_deployment(&ctx, dep, old).await?;
                    }
                    DeploymentRoute::VpnSeedServer => {
                        ensurer.ensure_vpn_seed_server_deployment(&ctx, dep, old).await?;
                    }
                }
            }
            Object::Etcd(etcd)
                if etcd.metadata.name == ETCD_MAIN || etcd.metadata.name == ETCD_EVENTS =>
            {
                let old = old_as(old)?;
                log_mutation(cpm_model::Etcd::KIND, &etcd.metadata);
                ensurer.ensure_etcd(&ctx, etcd, old).await?;
            }
            Object::OperatingSystemConfig(osc) if osc.is_reconcile() => {
                let old = old_as(old)?;
                log_mutation(cpm_model::OperatingSystemConfig::KIND, &osc.metadata);
                self.pipeline.mutate(&ctx, osc, old).await?;
            }
            _ => {}
        }

        Ok(())
    }
}

/// Borrow `old` as the routed type, failing if it is of another kind
fn old_as<T: CarrierObject>(old: Option<&Object>) -> Result<Option<&T>, MutatorError> {
    match old {
        None => Ok(None),
        Some(object) => T::from_object(object)
            .map(Some)
            .ok_or_else(|| MutatorError::KindMismatch {
                expected: T::KIND,
                actual: object.kind_name().to_string(),
            }),
    }
}

impl fmt::Debug for Mutator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutator")
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Mutator`]
///
/// Unset collaborators default to [`NoopEnsurer`], [`SystemdUnitSerializer`],
/// [`JsonYamlKubeletConfigCodec`] and [`DefaultFileContentInlineCodec`].
pub struct MutatorBuilder {
    accessor: Arc<dyn ClusterAccessor>,
    ensurer: Option<Arc<dyn Ensurer>>,
    unit_serializer: Option<Arc<dyn UnitSerializer>>,
    kubelet_config_codec: Option<Arc<dyn KubeletConfigCodec>>,
    inline_codec: Option<Arc<dyn FileContentInlineCodec>>,
    config: MutatorConfig,
}

impl MutatorBuilder {
    /// Create builder
    pub fn new(accessor: Arc<dyn ClusterAccessor>) -> Self {
        Self {
            accessor,
            ensurer: None,
            unit_serializer: None,
            kubelet_config_codec: None,
            inline_codec: None,
            config: MutatorConfig::default(),
        }
    }

    /// Set ensurer
    #[must_use]
    pub fn ensurer(mut self, ensurer: Arc<dyn Ensurer>) -> Self {
        self.ensurer = Some(ensurer);
        self
    }

    /// Set unit serializer
    #[must_use]
    pub fn unit_serializer(mut self, serializer: Arc<dyn UnitSerializer>) -> Self {
        self.unit_serializer = Some(serializer);
        self
    }

    /// Set kubelet configuration codec
    #[must_use]
    pub fn kubelet_config_codec(mut self, codec: Arc<dyn KubeletConfigCodec>) -> Self {
        self.kubelet_config_codec = Some(codec);
        self
    }

    /// Set inline content codec
    #[must_use]
    pub fn inline_codec(mut self, codec: Arc<dyn FileContentInlineCodec>) -> Self {
        self.inline_codec = Some(codec);
        self
    }

    /// Apply configuration
    #[must_use]
    pub fn config(mut self, config: MutatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the mutator
    #[must_use]
    pub fn build(self) -> Mutator {
        let ensurer = self
            .ensurer
            .unwrap_or_else(|| Arc::new(NoopEnsurer) as Arc<dyn Ensurer>);
        let inline_codec = self
            .inline_codec
            .unwrap_or_else(|| Arc::new(DefaultFileContentInlineCodec) as Arc<dyn FileContentInlineCodec>);
        let unit_serializer = self
            .unit_serializer
            .unwrap_or_else(|| Arc::new(SystemdUnitSerializer) as Arc<dyn UnitSerializer>);
        let kubelet_config_codec = self.kubelet_config_codec.unwrap_or_else(|| {
            Arc::new(JsonYamlKubeletConfigCodec::new(DefaultFileContentInlineCodec))
                as Arc<dyn KubeletConfigCodec>
        });

        Mutator {
            pipeline: OscPipeline::new(
                Arc::clone(&ensurer),
                unit_serializer,
                kubelet_config_codec,
                inline_codec,
            ),
            ensurer,
            accessor: self.accessor,
            request_timeout: self.config.request_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ClusterError, MockClusterAccessor, StaticClusterAccessor};
    use async_trait::async_trait;
    use cpm_model::{Deployment, Service, Unstructured};

    fn mutator_with(ensurer: impl Ensurer + 'static) -> Mutator {
        Mutator::builder(Arc::new(StaticClusterAccessor::new()))
            .ensurer(Arc::new(ensurer))
            .build()
    }

    struct Sleepy;

    #[async_trait]
    impl Ensurer for Sleepy {
        async fn ensure_kube_apiserver_service(
            &self,
            _ctx: &MutationContext,
            _new: &mut Service,
            _old: Option<&Service>,
        ) -> anyhow::Result<()> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }
    }

    struct Labeler;

    #[async_trait]
    impl Ensurer for Labeler {
        async fn ensure_kube_scheduler_deployment(
            &self,
            ctx: &MutationContext,
            new: &mut Deployment,
            old: Option<&Deployment>,
        ) -> anyhow::Result<()> {
            new.metadata
                .labels
                .insert("mutated-in".into(), ctx.namespace().to_string());
            new.metadata
                .labels
                .insert("had-old".into(), old.is_some().to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn routes_deployment_by_name() {
        let mutator = mutator_with(Labeler);
        let mut new = Object::from(Deployment::new(KUBE_SCHEDULER, "shoot--a--b"));
        let old = Object::from(Deployment::new(KUBE_SCHEDULER, "shoot--a--b"));

        mutator.mutate(&mut new, Some(&old)).await.unwrap();

        assert_eq!(new.metadata().label("mutated-in"), Some("shoot--a--b"));
        assert_eq!(new.metadata().label("had-old"), Some("true"));
    }

    #[tokio::test]
    async fn other_deployment_is_untouched() {
        let mutator = mutator_with(Labeler);
        let mut new = Object::from(Deployment::new("grafana", "shoot--a--b"));
        let expected = new.clone();

        mutator.mutate(&mut new, None).await.unwrap();
        assert_eq!(new, expected);
    }

    #[tokio::test]
    async fn kind_mismatch_on_routed_object() {
        let mutator = mutator_with(Labeler);
        let mut new = Object::from(Deployment::new(KUBE_SCHEDULER, "ns"));
        let old = Object::from(Service::new(KUBE_SCHEDULER, "ns"));

        let err = mutator.mutate(&mut new, Some(&old)).await.unwrap_err();
        assert!(matches!(
            err,
            MutatorError::KindMismatch { expected: cpm_model::ObjectKind::Deployment, ref actual } if actual == "Service"
        ));
        assert!(new.metadata().labels.is_empty());
    }

    #[tokio::test]
    async fn kind_mismatch_ignored_when_not_routed() {
        let mutator = mutator_with(Labeler);
        for old in [
            Object::from(Unstructured::default()),
            Object::from(Service::new("grafana", "ns")),
        ] {
            let mut new = Object::from(Deployment::new("grafana", "ns"));
            mutator.mutate(&mut new, Some(&old)).await.unwrap();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn request_timeout_expires() {
        let mutator = Mutator::builder(Arc::new(StaticClusterAccessor::new()))
            .ensurer(Arc::new(Sleepy))
            .config(MutatorConfig::default().with_request_timeout(Some(Duration::from_millis(50))))
            .build();
        let mut new = Object::from(Service::new(KUBE_APISERVER, "ns"));

        let err = mutator.mutate(&mut new, None).await.unwrap_err();
        assert!(matches!(err, MutatorError::Timeout { after } if after == Duration::from_millis(50)));
    }

    #[tokio::test]
    async fn non_reconcile_osc_does_not_touch_cluster() {
        let mut accessor = MockClusterAccessor::new();
        accessor.expect_get_cluster().never().returning(|ns| {
            Err(ClusterError::NotFound(ns.to_string()))
        });
        let mutator = Mutator::builder(Arc::new(accessor)).build();

        let mut new = Object::from(cpm_model::OperatingSystemConfig::new(
            "osc",
            "ns",
            cpm_model::OperatingSystemConfigPurpose::Provision,
        ));
        mutator.mutate(&mut new, None).await.unwrap();
    }

    #[tokio::test]
    async fn default_codecs_keep_kubelet_config_bytes() {
        use cpm_model::constants::FILE_PATH_KUBELET_CONFIG;
        use cpm_model::{
            Cluster, File, FileContentInline, OperatingSystemConfig, OperatingSystemConfigPurpose,
        };

        let accessor = StaticClusterAccessor::new().with_cluster("ns", Cluster::new("c", "1.27.3"));
        let mutator = Mutator::builder(Arc::new(accessor)).build();
        let osc = OperatingSystemConfig::new("osc", "ns", OperatingSystemConfigPurpose::Reconcile)
            .with_file(File::inline(
                FILE_PATH_KUBELET_CONFIG,
                FileContentInline::plain(r#"{"x":1}"#),
            ));
        let mut new = Object::from(osc.clone());

        mutator.mutate(&mut new, None).await.unwrap();

        assert_eq!(new, Object::from(osc));
    }

    #[test]
    fn builder_applies_config() {
        let mutator = Mutator::builder(Arc::new(StaticClusterAccessor::new()))
            .config(MutatorConfig::default().with_request_timeout(None))
            .build();
        assert_eq!(mutator.request_timeout(), None);
    }
}
