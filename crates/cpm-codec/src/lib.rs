//! CPM Codecs
//!
//! Conversions between the inline content of bundle entries and the decoded
//! sub-documents mutation strategies work on.
//!
//! # Core Concepts
//!
//! - [`UnitSerializer`]: systemd unit text <-> [`UnitOption`] list
//! - [`FileContentInlineCodec`]: encoded inline content <-> raw bytes
//! - [`KubeletConfigCodec`]: inline content <-> [`KubeletConfiguration`]
//!
//! Each codec is a trait so the mutator can be wired with other
//! implementations; the `Default*`/`Systemd*`/`JsonYaml*` types are the
//! built-in ones.
//!
//! # Example
//!
//! ```rust,ignore
//! use cpm_codec::{SystemdUnitSerializer, UnitSerializer};
//!
//! let serializer = SystemdUnitSerializer;
//! let options = serializer.deserialize("[Service]\nExecStart=/opt/bin/kubelet\n")?;
//! assert_eq!(options[0].name, "ExecStart");
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod error;
mod inline;
mod kubelet;
mod unit;

pub use error::CodecError;
pub use inline::{DefaultFileContentInlineCodec, FileCodecId, FileContentInlineCodec};
pub use kubelet::{
    DocumentFormat, JsonYamlKubeletConfigCodec, KubeletConfigCodec, KubeletConfiguration,
};
pub use unit::{SystemdUnitSerializer, UnitOption, UnitSerializer};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
