//! CPM Webhook
//!
//! Admission-time mutation of control-plane objects.
//!
//! The [`Mutator`] receives a `(new, old)` pair of carrier objects and
//! routes it by kind and name to an [`Ensurer`], which holds all
//! provider-specific policy. Operating system config bundles go through the
//! [`OscPipeline`], which decodes each embedded sub-document, lets the
//! ensurer mutate it and re-encodes it in place.
//!
//! # Ownership
//!
//! - `new` is exclusively borrowed for the duration of the call
//! - `old` is an explicit `Option` and is only ever read
//! - on error, `new` may be partially mutated and must be discarded
//!
//! # Example
//!
//! ```rust,ignore
//! use cpm_webhook::{Mutator, NoopEnsurer, StaticClusterAccessor};
//! use std::sync::Arc;
//!
//! let accessor = StaticClusterAccessor::new().with_cluster("shoot--foo--bar", cluster);
//! let mutator = Mutator::builder(Arc::new(accessor))
//!     .ensurer(Arc::new(NoopEnsurer))
//!     .build();
//!
//! mutator.mutate(&mut new, old.as_ref()).await?;
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod config;
pub mod context;
pub mod ensurer;
pub mod error;
pub mod helpers;
pub mod logging;
pub mod mutator;
pub mod pipeline;
pub mod version;

pub use config::{ConfigError, LogConfig, LogFormat, MutatorConfig};
pub use context::{ClusterAccessor, ClusterError, MutationContext, StaticClusterAccessor};
pub use ensurer::{Ensurer, NoopEnsurer};
pub use error::{CodecStage, MutatorError, SubDocument};
pub use mutator::{Mutator, MutatorBuilder};
pub use pipeline::OscPipeline;
pub use version::{ResolutionError, VersionOverride};

pub use semver;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
