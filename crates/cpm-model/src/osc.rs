//! Operating system config bundle
//!
//! An [`OperatingSystemConfig`] aggregates the systemd units and files a node
//! needs. Each entry carries its content inline, in one of the encodings
//! listed in [`crate::constants`].

use crate::meta::ObjectMeta;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Operating system config bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatingSystemConfig {
    /// Metadata
    #[serde(default)]
    pub metadata: ObjectMeta,

    /// Bundle spec
    pub spec: OperatingSystemConfigSpec,

    /// Untyped top-level fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl OperatingSystemConfig {
    /// Create an empty bundle with the given purpose
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        purpose: OperatingSystemConfigPurpose,
    ) -> Self {
        Self {
            metadata: ObjectMeta::new(name, namespace),
            spec: OperatingSystemConfigSpec {
                os_type: String::new(),
                purpose,
                units: Vec::new(),
                files: Vec::new(),
                extra: Map::new(),
            },
            extra: Map::new(),
        }
    }

    /// Add a file entry
    #[must_use]
    pub fn with_file(mut self, file: File) -> Self {
        self.spec.files.push(file);
        self
    }

    /// Add a unit entry
    #[must_use]
    pub fn with_unit(mut self, unit: Unit) -> Self {
        self.spec.units.push(unit);
        self
    }

    /// Whether the bundle is reconciled on running nodes
    #[inline]
    #[must_use]
    pub fn is_reconcile(&self) -> bool {
        self.spec.purpose == OperatingSystemConfigPurpose::Reconcile
    }
}

/// Bundle spec
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatingSystemConfigSpec {
    /// Operating system flavour
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub os_type: String,

    /// What the bundle is used for
    pub purpose: OperatingSystemConfigPurpose,

    /// Unit entries
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub units: Vec<Unit>,

    /// File entries
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<File>,

    /// Untyped spec fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Purpose of a bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatingSystemConfigPurpose {
    /// Bootstraps a fresh machine
    Provision,

    /// Continuously applied to a running node
    Reconcile,
}

/// Systemd unit entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Unit {
    /// Unit name (e.g. `kubelet.service`)
    pub name: String,

    /// Command applied to the unit after writing it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<UnitCommand>,

    /// Whether the unit is enabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable: Option<bool>,

    /// Unit file content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Drop-in files
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub drop_ins: Vec<DropIn>,

    /// Untyped unit fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Unit {
    /// Create a unit without content
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the unit content
    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }
}

/// Command applied to a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitCommand {
    /// Start the unit
    Start,
    /// Restart the unit
    Restart,
    /// Stop the unit
    Stop,
}

/// Unit drop-in file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropIn {
    /// Drop-in file name
    pub name: String,
    /// Drop-in content
    pub content: String,
}

/// File entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct File {
    /// Absolute path on the node
    pub path: String,

    /// File mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<i32>,

    /// Content source
    #[serde(default)]
    pub content: FileContent,

    /// Untyped file fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl File {
    /// Create a file entry with inline content
    #[must_use]
    pub fn inline(path: impl Into<String>, inline: FileContentInline) -> Self {
        Self {
            path: path.into(),
            permissions: None,
            content: FileContent {
                inline: Some(inline),
                ..FileContent::default()
            },
            extra: Map::new(),
        }
    }

    /// Set the file mode
    #[must_use]
    pub fn with_permissions(mut self, permissions: i32) -> Self {
        self.permissions = Some(permissions);
        self
    }
}

/// Content source of a file entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileContent {
    /// Inline content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline: Option<FileContentInline>,

    /// Content read from a secret
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<FileContentSecretRef>,

    /// Write the content without decoding it on the node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transmit_unencoded: Option<bool>,
}

/// Encoded inline content
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContentInline {
    /// Encoding identifier (`""`, `b64`, `gzip+b64`)
    #[serde(default)]
    pub encoding: String,

    /// Encoded data
    pub data: String,
}

impl FileContentInline {
    /// Create inline content
    #[inline]
    #[must_use]
    pub fn new(encoding: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            encoding: encoding.into(),
            data: data.into(),
        }
    }

    /// Create plain (unencoded) content
    #[inline]
    #[must_use]
    pub fn plain(data: impl Into<String>) -> Self {
        Self::new(crate::constants::ENCODING_PLAIN, data)
    }
}

/// Reference to secret data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileContentSecretRef {
    /// Secret name
    pub name: String,
    /// Key within the secret
    pub data_key: String,
}
