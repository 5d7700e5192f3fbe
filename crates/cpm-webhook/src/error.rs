//! Error types for the mutation pipeline
//!
//! Every variant is fatal for the current object: the caller must discard
//! the partially mutated `new` and reject the request.

use crate::context::ClusterError;
use crate::version::ResolutionError;
use cpm_codec::CodecError;
use cpm_model::ObjectKind;
use std::fmt;
use std::time::Duration;

/// Main mutation error type
#[derive(Debug, thiserror::Error)]
pub enum MutatorError {
    /// `old` is not of the same kind as `new`
    #[error("old object is of kind '{actual}', expected '{expected}'")]
    KindMismatch {
        /// Kind of `new`
        expected: ObjectKind,
        /// Kind name of `old`
        actual: String,
    },

    /// A sub-document could not be decoded or encoded
    #[error("could not {stage} {document}: {source}")]
    Codec {
        /// Where in the round trip the codec failed
        stage: CodecStage,
        /// Which sub-document
        document: SubDocument,
        /// Codec failure
        #[source]
        source: CodecError,
    },

    /// Effective version could not be determined
    #[error("version resolution failed: {0}")]
    Resolution(#[from] ResolutionError),

    /// Cluster lookup failed
    #[error("cluster lookup failed: {0}")]
    Cluster(#[from] ClusterError),

    /// Error reported by the ensurer, passed through unchanged
    #[error(transparent)]
    Strategy(#[from] anyhow::Error),

    /// Request deadline expired
    #[error("mutation timed out after {}ms", after.as_millis())]
    Timeout {
        /// Time budget that was exceeded
        after: Duration,
    },
}

impl MutatorError {
    /// Create codec error
    pub fn codec(stage: CodecStage, document: SubDocument, source: CodecError) -> Self {
        Self::Codec {
            stage,
            document,
            source,
        }
    }

    /// Check if the error came from the ensurer
    #[inline]
    #[must_use]
    pub fn is_strategy(&self) -> bool {
        matches!(self, Self::Strategy(_))
    }
}

/// Round-trip stage at which a codec failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecStage {
    /// Decoding the entry of `new`
    Decode,
    /// Decoding the entry of `old`
    DecodeOld,
    /// Encoding the mutated sub-document
    Encode,
}

impl fmt::Display for CodecStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Decode => "decode",
            Self::DecodeOld => "decode old",
            Self::Encode => "encode",
        })
    }
}

/// Sub-document embedded in an operating system config entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubDocument {
    /// Options of the `kubelet.service` unit
    KubeletServiceUnit,
    /// Kubelet configuration file
    KubeletConfiguration,
    /// Kernel settings file
    KubernetesGeneralConfiguration,
    /// Cloud provider config file
    CloudProviderConfig,
}

impl fmt::Display for SubDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::KubeletServiceUnit => "kubelet.service unit content",
            Self::KubeletConfiguration => "kubelet configuration",
            Self::KubernetesGeneralConfiguration => "kubernetes general configuration",
            Self::CloudProviderConfig => "kubelet cloud provider config",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_error_names_stage_and_document() {
        let err = MutatorError::codec(
            CodecStage::DecodeOld,
            SubDocument::KubeletConfiguration,
            CodecError::UnsupportedEncoding("zstd".into()),
        );
        assert_eq!(
            err.to_string(),
            "could not decode old kubelet configuration: unsupported encoding: 'zstd'"
        );
    }

    #[test]
    fn strategy_error_is_verbatim() {
        let err = MutatorError::from(anyhow::anyhow!("provider rejected flag --foo"));
        assert!(err.is_strategy());
        assert_eq!(err.to_string(), "provider rejected flag --foo");
    }

    #[test]
    fn kind_mismatch_display() {
        let err = MutatorError::KindMismatch {
            expected: ObjectKind::Service,
            actual: "Deployment".into(),
        };
        assert_eq!(err.to_string(), "old object is of kind 'Deployment', expected 'Service'");
    }
}
