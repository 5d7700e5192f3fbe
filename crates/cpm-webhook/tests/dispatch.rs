//! Dispatcher routing tests
//!
//! Routing by kind and name, deletion handling and `old` kind checks.

use chrono::Utc;
use cpm_model::constants::{
    CLUSTER_AUTOSCALER, ETCD_EVENTS, ETCD_MAIN, KUBE_APISERVER, KUBE_CONTROLLER_MANAGER,
    KUBE_SCHEDULER, VPN_SEED_SERVER,
};
use cpm_model::{Deployment, Etcd, Object, ObjectKind, Service, Unstructured};
use cpm_test_utils::{full_osc, mutator, provision_osc, EnsurerCall, RecordingEnsurer, NAMESPACE};
use cpm_webhook::MutatorError;
use proptest::prelude::*;
use std::sync::Arc;

fn recorder() -> Arc<RecordingEnsurer> {
    Arc::new(RecordingEnsurer::new())
}

fn deleting(mut object: Object) -> Object {
    object.metadata_mut().deletion_timestamp = Some(Utc::now());
    object
}

#[tokio::test]
async fn apiserver_service_is_delegated() {
    let ensurer = recorder();
    let mut new = Object::from(Service::new(KUBE_APISERVER, NAMESPACE));
    let old = new.clone();

    mutator(ensurer.clone()).mutate(&mut new, Some(&old)).await.unwrap();

    assert_eq!(ensurer.calls(), vec![EnsurerCall::KubeApiServerService { old: true }]);
}

#[tokio::test]
async fn other_service_is_not_delegated() {
    let ensurer = recorder();
    let mut new = Object::from(Service::new("kube-apiserver-internal", NAMESPACE));
    let expected = new.clone();

    mutator(ensurer.clone()).mutate(&mut new, None).await.unwrap();

    assert!(ensurer.calls().is_empty());
    assert_eq!(new, expected);
}

#[tokio::test]
async fn deployments_are_routed_by_name() {
    let cases = [
        (KUBE_APISERVER, EnsurerCall::KubeApiServerDeployment { old: false }),
        (KUBE_CONTROLLER_MANAGER, EnsurerCall::KubeControllerManagerDeployment { old: false }),
        (KUBE_SCHEDULER, EnsurerCall::KubeSchedulerDeployment { old: false }),
        (CLUSTER_AUTOSCALER, EnsurerCall::ClusterAutoscalerDeployment { old: false }),
        (VPN_SEED_SERVER, EnsurerCall::VpnSeedServerDeployment { old: false }),
    ];

    for (name, expected) in cases {
        let ensurer = recorder();
        let mut new = Object::from(Deployment::new(name, NAMESPACE));
        mutator(ensurer.clone()).mutate(&mut new, None).await.unwrap();
        assert_eq!(ensurer.calls(), vec![expected], "deployment {name}");
    }
}

#[tokio::test]
async fn etcd_instances_are_routed() {
    for name in [ETCD_MAIN, ETCD_EVENTS] {
        let ensurer = recorder();
        let mut new = Object::from(Etcd::new(name, NAMESPACE));
        let old = new.clone();
        mutator(ensurer.clone()).mutate(&mut new, Some(&old)).await.unwrap();
        assert_eq!(
            ensurer.calls(),
            vec![EnsurerCall::Etcd { name: name.to_string(), old: true }]
        );
    }

    let ensurer = recorder();
    let mut new = Object::from(Etcd::new("etcd-backup", NAMESPACE));
    mutator(ensurer.clone()).mutate(&mut new, None).await.unwrap();
    assert!(ensurer.calls().is_empty());
}

#[tokio::test]
async fn provision_osc_is_not_delegated() {
    let ensurer = recorder();
    let mut new = Object::from(provision_osc());
    mutator(ensurer.clone()).mutate(&mut new, None).await.unwrap();
    assert!(ensurer.calls().is_empty());
}

#[tokio::test]
async fn deleting_objects_are_never_mutated() {
    let objects = [
        Object::from(Service::new(KUBE_APISERVER, NAMESPACE)),
        Object::from(Deployment::new(KUBE_APISERVER, NAMESPACE)),
        Object::from(Etcd::new(ETCD_MAIN, NAMESPACE)),
        Object::from(full_osc()),
    ];

    for object in objects {
        let ensurer = recorder();
        let mut new = deleting(object);
        let expected = new.clone();
        let old = Object::from(Unstructured::default());

        mutator(ensurer.clone()).mutate(&mut new, Some(&old)).await.unwrap();

        assert!(ensurer.calls().is_empty());
        assert_eq!(new, expected);
    }
}

#[tokio::test]
async fn mismatched_old_fails_before_delegation() {
    let ensurer = recorder();
    let mut new = Object::from(Etcd::new(ETCD_MAIN, NAMESPACE));
    let old = Object::from(Deployment::new(ETCD_MAIN, NAMESPACE));

    let err = mutator(ensurer.clone()).mutate(&mut new, Some(&old)).await.unwrap_err();

    match err {
        MutatorError::KindMismatch { expected, actual } => {
            assert_eq!(expected, ObjectKind::Etcd);
            assert_eq!(actual, "Deployment");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(ensurer.calls().is_empty());
}

#[tokio::test]
async fn mismatched_old_on_osc_fails_before_resolution() {
    let ensurer = recorder();
    let mut new = Object::from(full_osc());
    let old = Object::from(Service::new("osc-worker-a", NAMESPACE));

    let err = mutator(ensurer.clone()).mutate(&mut new, Some(&old)).await.unwrap_err();

    assert!(matches!(err, MutatorError::KindMismatch { .. }));
    assert!(ensurer.calls().is_empty());
}

#[tokio::test]
async fn strategy_error_is_propagated_verbatim() {
    let ensurer = Arc::new(RecordingEnsurer::new().failing_on("ensure_kube_scheduler_deployment"));
    let mut new = Object::from(Deployment::new(KUBE_SCHEDULER, NAMESPACE));

    let err = mutator(ensurer).mutate(&mut new, None).await.unwrap_err();

    assert!(err.is_strategy());
    assert_eq!(
        err.to_string(),
        "injected failure in ensure_kube_scheduler_deployment"
    );
}

#[tokio::test]
async fn unstructured_objects_are_ignored() {
    let ensurer = recorder();
    let value = serde_json::json!({
        "apiVersion": "v1",
        "kind": "ConfigMap",
        "metadata": {"name": KUBE_APISERVER, "namespace": NAMESPACE},
        "data": {"key": "value"}
    });
    let mut new = Object::from_value(value).unwrap();
    let expected = new.clone();

    mutator(ensurer.clone()).mutate(&mut new, None).await.unwrap();

    assert!(ensurer.calls().is_empty());
    assert_eq!(new, expected);
}

proptest! {
    #[test]
    fn prop_unrouted_names_are_noops(name in "[a-z][a-z0-9-]{0,20}") {
        prop_assume!(![
            KUBE_APISERVER,
            KUBE_CONTROLLER_MANAGER,
            KUBE_SCHEDULER,
            CLUSTER_AUTOSCALER,
            VPN_SEED_SERVER,
            ETCD_MAIN,
            ETCD_EVENTS,
        ]
        .contains(&name.as_str()));

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        for object in [
            Object::from(Service::new(name.clone(), NAMESPACE)),
            Object::from(Deployment::new(name.clone(), NAMESPACE)),
            Object::from(Etcd::new(name.clone(), NAMESPACE)),
        ] {
            let ensurer = recorder();
            let mut new = object;
            let expected = new.clone();

            let result = runtime.block_on(mutator(ensurer.clone()).mutate(&mut new, None));

            prop_assert!(result.is_ok());
            prop_assert!(ensurer.calls().is_empty());
            prop_assert_eq!(new, expected);
        }
    }
}
