//! Closed set of carrier objects
//!
//! [`Object`] is the unit the dispatcher works on. The variant is selected by
//! the `kind` field when an object is read from its JSON/YAML form; kinds the
//! mutator does not route are kept as [`Unstructured`].

use crate::meta::ObjectMeta;
use crate::osc::OperatingSystemConfig;
use crate::workload::{Deployment, Etcd, Service};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Kind tag of a carrier object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// `v1/Service`
    Service,
    /// `apps/v1/Deployment`
    Deployment,
    /// Etcd instance of the etcd operator
    Etcd,
    /// Operating system config bundle
    OperatingSystemConfig,
    /// Any other kind
    Unstructured,
}

impl ObjectKind {
    /// Kind name as it appears in the `kind` field
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Service => "Service",
            Self::Deployment => "Deployment",
            Self::Etcd => "Etcd",
            Self::OperatingSystemConfig => "OperatingSystemConfig",
            Self::Unstructured => "Unstructured",
        }
    }

    /// Canonical `apiVersion` of routed kinds
    #[inline]
    #[must_use]
    pub fn api_version(&self) -> Option<&'static str> {
        match self {
            Self::Service => Some("v1"),
            Self::Deployment => Some("apps/v1"),
            Self::Etcd => Some("druid.gardener.cloud/v1alpha1"),
            Self::OperatingSystemConfig => Some("extensions.gardener.cloud/v1alpha1"),
            Self::Unstructured => None,
        }
    }

    /// Map a `kind` field to a routed kind
    #[must_use]
    pub fn from_kind_name(kind: &str) -> Option<Self> {
        match kind {
            "Service" => Some(Self::Service),
            "Deployment" => Some(Self::Deployment),
            "Etcd" => Some(Self::Etcd),
            "OperatingSystemConfig" => Some(Self::OperatingSystemConfig),
            _ => None,
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Object of a kind the mutator does not route
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Unstructured {
    /// API group and version
    #[serde(default)]
    pub api_version: String,

    /// Kind name
    pub kind: String,

    /// Metadata
    #[serde(default)]
    pub metadata: ObjectMeta,

    /// Remaining fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Carrier object
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    /// Service
    Service(Service),
    /// Deployment
    Deployment(Deployment),
    /// Etcd instance
    Etcd(Etcd),
    /// Operating system config bundle
    OperatingSystemConfig(OperatingSystemConfig),
    /// Anything else
    Unstructured(Unstructured),
}

impl Object {
    /// Kind tag
    #[inline]
    #[must_use]
    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::Service(_) => ObjectKind::Service,
            Self::Deployment(_) => ObjectKind::Deployment,
            Self::Etcd(_) => ObjectKind::Etcd,
            Self::OperatingSystemConfig(_) => ObjectKind::OperatingSystemConfig,
            Self::Unstructured(_) => ObjectKind::Unstructured,
        }
    }

    /// Kind name, including the real name of unstructured objects
    #[must_use]
    pub fn kind_name(&self) -> &str {
        match self {
            Self::Unstructured(u) => &u.kind,
            other => other.kind().as_str(),
        }
    }

    /// Metadata
    #[must_use]
    pub fn metadata(&self) -> &ObjectMeta {
        match self {
            Self::Service(o) => &o.metadata,
            Self::Deployment(o) => &o.metadata,
            Self::Etcd(o) => &o.metadata,
            Self::OperatingSystemConfig(o) => &o.metadata,
            Self::Unstructured(o) => &o.metadata,
        }
    }

    /// Mutable metadata
    pub fn metadata_mut(&mut self) -> &mut ObjectMeta {
        match self {
            Self::Service(o) => &mut o.metadata,
            Self::Deployment(o) => &mut o.metadata,
            Self::Etcd(o) => &mut o.metadata,
            Self::OperatingSystemConfig(o) => &mut o.metadata,
            Self::Unstructured(o) => &mut o.metadata,
        }
    }

    /// Object name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.metadata().name
    }

    /// Object namespace
    #[inline]
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.metadata().namespace
    }

    /// Whether deletion of the object has been requested
    #[inline]
    #[must_use]
    pub fn is_being_deleted(&self) -> bool {
        self.metadata().is_being_deleted()
    }

    /// Read an object from its JSON form, selecting the variant by `kind`
    ///
    /// # Errors
    /// Returns error if the value is not a JSON object, has no `kind`, or
    /// does not match the schema of its kind
    pub fn from_value(value: Value) -> Result<Self, ModelError> {
        let Value::Object(mut map) = value else {
            return Err(ModelError::NotAnObject);
        };
        let kind_name = map
            .get("kind")
            .and_then(Value::as_str)
            .ok_or(ModelError::MissingKind)?
            .to_string();

        let kind = ObjectKind::from_kind_name(&kind_name);
        if kind.is_some() {
            map.remove("kind");
            map.remove("apiVersion");
        }
        let body = Value::Object(map);

        match kind {
            Some(ObjectKind::Service) => serde_json::from_value(body).map(Self::Service),
            Some(ObjectKind::Deployment) => serde_json::from_value(body).map(Self::Deployment),
            Some(ObjectKind::Etcd) => serde_json::from_value(body).map(Self::Etcd),
            Some(ObjectKind::OperatingSystemConfig) => {
                serde_json::from_value(body).map(Self::OperatingSystemConfig)
            }
            Some(ObjectKind::Unstructured) | None => {
                serde_json::from_value(body).map(Self::Unstructured)
            }
        }
        .map_err(|source| ModelError::InvalidObject {
            kind: kind_name,
            source,
        })
    }

    /// Read an object from YAML (or JSON) text
    ///
    /// # Errors
    /// Returns error if the text is not valid YAML or not a valid object
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ModelError> {
        let value: Value = serde_yaml::from_str(yaml).map_err(ModelError::InvalidYaml)?;
        Self::from_value(value)
    }

    /// Write the object to its JSON form, including `apiVersion` and `kind`
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn to_value(&self) -> Result<Value, ModelError> {
        let body = match self {
            Self::Service(o) => serde_json::to_value(o),
            Self::Deployment(o) => serde_json::to_value(o),
            Self::Etcd(o) => serde_json::to_value(o),
            Self::OperatingSystemConfig(o) => serde_json::to_value(o),
            Self::Unstructured(o) => {
                return serde_json::to_value(o).map_err(ModelError::Serialization)
            }
        }
        .map_err(ModelError::Serialization)?;

        let kind = self.kind();
        let mut map = Map::new();
        if let Some(api_version) = kind.api_version() {
            map.insert("apiVersion".to_string(), Value::from(api_version));
        }
        map.insert("kind".to_string(), Value::from(kind.as_str()));
        if let Value::Object(fields) = body {
            map.extend(fields);
        }
        Ok(Value::Object(map))
    }
}

/// Typed view of one carrier kind
pub trait CarrierObject: Sized + Send + Sync + 'static {
    /// Kind tag of this type
    const KIND: ObjectKind;

    /// Metadata
    fn metadata(&self) -> &ObjectMeta;

    /// Borrow as this type if the object is of this kind
    fn from_object(object: &Object) -> Option<&Self>;

    /// Mutably borrow as this type if the object is of this kind
    fn from_object_mut(object: &mut Object) -> Option<&mut Self>;

    /// Wrap into an [`Object`]
    fn into_object(self) -> Object;
}

macro_rules! impl_carrier_object {
    ($ty:ident) => {
        impl CarrierObject for $ty {
            const KIND: ObjectKind = ObjectKind::$ty;

            #[inline]
            fn metadata(&self) -> &ObjectMeta {
                &self.metadata
            }

            #[inline]
            fn from_object(object: &Object) -> Option<&Self> {
                match object {
                    Object::$ty(inner) => Some(inner),
                    _ => None,
                }
            }

            #[inline]
            fn from_object_mut(object: &mut Object) -> Option<&mut Self> {
                match object {
                    Object::$ty(inner) => Some(inner),
                    _ => None,
                }
            }

            #[inline]
            fn into_object(self) -> Object {
                Object::$ty(self)
            }
        }

        impl From<$ty> for Object {
            fn from(value: $ty) -> Self {
                value.into_object()
            }
        }
    };
}

impl_carrier_object!(Service);
impl_carrier_object!(Deployment);
impl_carrier_object!(Etcd);
impl_carrier_object!(OperatingSystemConfig);

impl From<Unstructured> for Object {
    fn from(value: Unstructured) -> Self {
        Self::Unstructured(value)
    }
}

/// Errors reading or writing carrier objects
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// Value is not a JSON object
    #[error("object must be a JSON/YAML mapping")]
    NotAnObject,

    /// No `kind` field
    #[error("object has no kind")]
    MissingKind,

    /// Value does not match the schema of its kind
    #[error("invalid {kind}: {source}")]
    InvalidObject {
        /// Kind name
        kind: String,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },

    /// Invalid YAML text
    #[error("invalid YAML: {0}")]
    InvalidYaml(#[from] serde_yaml::Error),

    /// Serialization failed
    #[error("serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::osc::OperatingSystemConfigPurpose;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn from_value_selects_variant() {
        let obj = Object::from_value(json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {"name": "kube-apiserver", "namespace": "ns"}
        }))
        .unwrap();

        assert_eq!(obj.kind(), ObjectKind::Deployment);
        assert_eq!(obj.name(), "kube-apiserver");
        assert_eq!(obj.namespace(), "ns");
    }

    #[test]
    fn unknown_kind_is_unstructured() {
        let value = json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {"name": "cm"},
            "data": {"a": "b"}
        });
        let obj = Object::from_value(value.clone()).unwrap();

        assert_eq!(obj.kind(), ObjectKind::Unstructured);
        assert_eq!(obj.kind_name(), "ConfigMap");
        assert_eq!(obj.to_value().unwrap(), value);
    }

    #[test]
    fn server_managed_metadata_survives_round_trip() {
        let metadata = json!({
            "name": "kube-apiserver",
            "namespace": "ns",
            "uid": "c0ffee00-0000-4000-8000-000000000003",
            "resourceVersion": "981",
            "generation": 2,
            "creationTimestamp": "2024-05-01T10:00:00Z",
            "ownerReferences": [{"apiVersion": "v1", "kind": "Namespace", "name": "ns", "uid": "n-1"}]
        });
        let deployment = json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": metadata,
            "spec": {"replicas": 1}
        });
        let config_map = json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": metadata,
            "data": {"a": "b"}
        });

        for value in [deployment, config_map] {
            let obj = Object::from_value(value.clone()).unwrap();
            assert_eq!(obj.to_value().unwrap(), value);
        }
    }

    #[test]
    fn missing_kind_is_error() {
        let err = Object::from_value(json!({"metadata": {"name": "x"}})).unwrap_err();
        assert!(matches!(err, ModelError::MissingKind));
    }

    #[test]
    fn not_an_object_is_error() {
        assert!(matches!(
            Object::from_value(json!([1, 2])),
            Err(ModelError::NotAnObject)
        ));
    }

    #[test]
    fn invalid_osc_names_kind() {
        let err = Object::from_value(json!({
            "kind": "OperatingSystemConfig",
            "metadata": {"name": "x"},
            "spec": {"purpose": "sometimes"}
        }))
        .unwrap_err();
        assert!(err.to_string().starts_with("invalid OperatingSystemConfig"));
    }

    #[test]
    fn to_value_adds_type_meta() {
        let obj: Object = Service::new("kube-apiserver", "ns").into();
        let value = obj.to_value().unwrap();
        assert_eq!(value["apiVersion"], json!("v1"));
        assert_eq!(value["kind"], json!("Service"));
        assert_eq!(value["metadata"]["name"], json!("kube-apiserver"));
    }

    #[test]
    fn yaml_round_trip() {
        let obj = Object::from_yaml_str(
            r"
apiVersion: extensions.gardener.cloud/v1alpha1
kind: OperatingSystemConfig
metadata:
  name: osc
  namespace: ns
spec:
  purpose: reconcile
  files:
    - path: /etc/a
      content:
        inline:
          data: hello
",
        )
        .unwrap();

        let Object::OperatingSystemConfig(osc) = &obj else {
            panic!("expected operating system config");
        };
        assert_eq!(osc.spec.purpose, OperatingSystemConfigPurpose::Reconcile);
        assert_eq!(Object::from_value(obj.to_value().unwrap()).unwrap(), obj);
    }

    #[test]
    fn carrier_views() {
        let mut obj: Object = Etcd::new("etcd-main", "ns").into();
        assert!(Etcd::from_object(&obj).is_some());
        assert!(Service::from_object(&obj).is_none());

        Etcd::from_object_mut(&mut obj).unwrap().spec.replicas = Some(3);
        assert_eq!(Etcd::from_object(&obj).unwrap().spec.replicas, Some(3));
        assert_eq!(<Etcd as CarrierObject>::KIND, ObjectKind::Etcd);
    }
}
