//! Kubelet configuration document
//!
//! The document is held as an order-preserving JSON object, so fields the
//! strategy does not touch survive a decode/encode cycle in place. The
//! source format (JSON or YAML) is remembered and reused on encode.

use crate::error::CodecError;
use crate::inline::{DefaultFileContentInlineCodec, FileContentInlineCodec};
use cpm_model::FileContentInline;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// API version written by [`KubeletConfiguration::new`]
pub const KUBELET_CONFIG_API_VERSION: &str = "kubelet.config.k8s.io/v1beta1";

/// Kind written by [`KubeletConfiguration::new`]
pub const KUBELET_CONFIG_KIND: &str = "KubeletConfiguration";

/// Serialization format of a structured document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DocumentFormat {
    /// JSON
    Json,
    /// YAML
    #[default]
    Yaml,
}

impl DocumentFormat {
    /// Guess the format of a document from its first significant character
    #[must_use]
    pub fn detect(text: &str) -> Self {
        if text.trim_start().starts_with('{') {
            Self::Json
        } else {
            Self::Yaml
        }
    }
}

/// Decoded kubelet configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KubeletConfiguration {
    fields: Map<String, Value>,
    #[serde(skip)]
    format: DocumentFormat,
}

impl KubeletConfiguration {
    /// Create configuration carrying only `apiVersion` and `kind`
    #[must_use]
    pub fn new() -> Self {
        let mut fields = Map::new();
        fields.insert("apiVersion".into(), KUBELET_CONFIG_API_VERSION.into());
        fields.insert("kind".into(), KUBELET_CONFIG_KIND.into());
        Self {
            fields,
            format: DocumentFormat::default(),
        }
    }

    /// Wrap existing fields
    #[must_use]
    pub fn from_fields(fields: Map<String, Value>, format: DocumentFormat) -> Self {
        Self { fields, format }
    }

    /// Format the document was decoded from
    #[inline]
    #[must_use]
    pub fn format(&self) -> DocumentFormat {
        self.format
    }

    /// Change the format used on encode
    pub fn set_format(&mut self, format: DocumentFormat) {
        self.format = format;
    }

    /// Top-level fields
    #[inline]
    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Mutable top-level fields
    #[inline]
    pub fn fields_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.fields
    }

    /// Top-level field
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Set top-level field, returning the previous value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(key.into(), value.into())
    }

    /// Remove top-level field
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.shift_remove(key)
    }

    /// Value at a JSON pointer (e.g. `/evictionHard/memory.available`)
    #[must_use]
    pub fn pointer(&self, pointer: &str) -> Option<&Value> {
        if pointer.is_empty() {
            return None;
        }
        let (head, rest) = split_pointer(pointer)?;
        let value = self.fields.get(&head)?;
        if rest.is_empty() {
            Some(value)
        } else {
            value.pointer(rest)
        }
    }

    /// Set the value at a JSON pointer, creating intermediate objects
    ///
    /// Returns `false` if a non-object value is in the way.
    pub fn set_pointer(&mut self, pointer: &str, value: Value) -> bool {
        let tokens: Vec<String> = match pointer.strip_prefix('/') {
            Some(p) if !p.is_empty() => p.split('/').map(unescape_token).collect(),
            _ => return false,
        };
        let Some((last, parents)) = tokens.split_last() else {
            return false;
        };

        let mut current = &mut self.fields;
        for token in parents {
            let entry = current
                .entry(token.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            match entry {
                Value::Object(map) => current = map,
                _ => return false,
            }
        }
        current.insert(last.clone(), value);
        true
    }

    /// Feature gate state, if set
    #[must_use]
    pub fn feature_gate(&self, name: &str) -> Option<bool> {
        self.fields
            .get("featureGates")
            .and_then(|g| g.get(name))
            .and_then(Value::as_bool)
    }

    /// Enable or disable a feature gate
    pub fn set_feature_gate(&mut self, name: &str, enabled: bool) -> bool {
        self.set_pointer(
            &format!("/featureGates/{}", escape_token(name)),
            Value::Bool(enabled),
        )
    }

    /// Render in the remembered format
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn to_text(&self) -> Result<String, CodecError> {
        Ok(match self.format {
            DocumentFormat::Json => serde_json::to_string(&self.fields)?,
            DocumentFormat::Yaml => serde_yaml::to_string(&self.fields)?,
        })
    }

    /// Parse JSON or YAML text, remembering which one it was
    ///
    /// # Errors
    /// Returns error if the text is not a mapping in either format
    pub fn from_text(text: &str) -> Result<Self, CodecError> {
        let format = DocumentFormat::detect(text);
        let fields: Map<String, Value> = match format {
            DocumentFormat::Json => serde_json::from_str(text)?,
            DocumentFormat::Yaml => serde_yaml::from_str(text)?,
        };
        Ok(Self { fields, format })
    }
}

fn split_pointer(pointer: &str) -> Option<(String, &str)> {
    let rest = pointer.strip_prefix('/')?;
    match rest.find('/') {
        Some(i) => Some((unescape_token(&rest[..i]), &rest[i..])),
        None => Some((unescape_token(rest), "")),
    }
}

fn unescape_token(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

fn escape_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// Inline content <-> kubelet configuration
pub trait KubeletConfigCodec: Send + Sync {
    /// Encode configuration with the given content encoding
    ///
    /// # Errors
    /// Returns error if the document cannot be rendered or encoded
    fn encode(
        &self,
        config: &KubeletConfiguration,
        encoding: &str,
    ) -> Result<FileContentInline, CodecError>;

    /// Decode inline content into a configuration
    ///
    /// # Errors
    /// Returns error if the content cannot be decoded or parsed
    fn decode(&self, fci: &FileContentInline) -> Result<KubeletConfiguration, CodecError>;
}

/// Codec accepting JSON or YAML documents inside any inline encoding
#[derive(Debug, Clone, Default)]
pub struct JsonYamlKubeletConfigCodec<C = DefaultFileContentInlineCodec> {
    inline: C,
}

impl<C: FileContentInlineCodec> JsonYamlKubeletConfigCodec<C> {
    /// Create codec on top of an inline content codec
    pub fn new(inline: C) -> Self {
        Self { inline }
    }
}

impl<C: FileContentInlineCodec> KubeletConfigCodec for JsonYamlKubeletConfigCodec<C> {
    fn encode(
        &self,
        config: &KubeletConfiguration,
        encoding: &str,
    ) -> Result<FileContentInline, CodecError> {
        let text = config.to_text()?;
        self.inline.encode(text.as_bytes(), encoding)
    }

    fn decode(&self, fci: &FileContentInline) -> Result<KubeletConfiguration, CodecError> {
        let bytes = self.inline.decode(fci)?;
        let text = String::from_utf8(bytes)?;
        KubeletConfiguration::from_text(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn codec() -> JsonYamlKubeletConfigCodec {
        JsonYamlKubeletConfigCodec::default()
    }

    #[test]
    fn json_round_trip_is_byte_identical() {
        let fci = FileContentInline::plain(r#"{"x":1}"#);
        let config = codec().decode(&fci).unwrap();

        assert_eq!(config.format(), DocumentFormat::Json);
        assert_eq!(codec().encode(&config, "").unwrap(), fci);
    }

    #[test]
    fn json_keeps_field_order() {
        let text = r#"{"kind":"KubeletConfiguration","apiVersion":"kubelet.config.k8s.io/v1beta1","maxPods":110}"#;
        let config = codec().decode(&FileContentInline::plain(text)).unwrap();
        assert_eq!(codec().encode(&config, "").unwrap().data, text);
    }

    #[test]
    fn yaml_is_reencoded_as_yaml() {
        let text = "apiVersion: kubelet.config.k8s.io/v1beta1\nkind: KubeletConfiguration\nmaxPods: 110\n";
        let config = codec().decode(&FileContentInline::plain(text)).unwrap();

        assert_eq!(config.format(), DocumentFormat::Yaml);
        assert_eq!(config.get("maxPods"), Some(&json!(110)));
        assert_eq!(codec().encode(&config, "").unwrap().data, text);
    }

    #[test]
    fn decode_b64_content() {
        let inline = DefaultFileContentInlineCodec;
        let fci = inline.encode(b"maxPods: 64\n", "b64").unwrap();
        let config = codec().decode(&fci).unwrap();
        assert_eq!(config.get("maxPods"), Some(&json!(64)));

        let encoded = codec().encode(&config, "b64").unwrap();
        assert_eq!(encoded.encoding, "b64");
        assert_eq!(inline.decode(&encoded).unwrap(), b"maxPods: 64\n");
    }

    #[test]
    fn decode_rejects_non_mapping() {
        assert!(codec().decode(&FileContentInline::plain("- a\n- b\n")).is_err());
        assert!(codec().decode(&FileContentInline::plain("{broken")).is_err());
    }

    #[test]
    fn pointer_access() {
        let mut config = KubeletConfiguration::new();
        assert!(config.set_pointer("/evictionHard/memory.available", json!("100Mi")));
        assert_eq!(
            config.pointer("/evictionHard/memory.available"),
            Some(&json!("100Mi"))
        );
        assert_eq!(config.pointer("/kind"), Some(&json!(KUBELET_CONFIG_KIND)));
        assert!(config.pointer("/missing").is_none());

        assert!(!config.set_pointer("/kind/nested", json!(1)));
        assert!(!config.set_pointer("", json!(1)));
    }

    #[test]
    fn feature_gates() {
        let mut config = KubeletConfiguration::new();
        assert_eq!(config.feature_gate("GracefulNodeShutdown"), None);

        config.set_feature_gate("GracefulNodeShutdown", true);
        assert_eq!(config.feature_gate("GracefulNodeShutdown"), Some(true));
        assert_eq!(
            config.get("featureGates"),
            Some(&json!({"GracefulNodeShutdown": true}))
        );
    }

    #[test]
    fn remove_keeps_order_of_others() {
        let mut config = KubeletConfiguration::from_text(r#"{"a":1,"b":2,"c":3}"#).unwrap();
        config.remove("b");
        assert_eq!(config.to_text().unwrap(), r#"{"a":1,"c":3}"#);
    }
}
