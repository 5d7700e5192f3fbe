//! Effective kubelet version of an operating system config
//!
//! The cluster declares a base Kubernetes version. A worker pool may
//! override it either with an explicit version or with a constraint:
//!
//! - no override: base
//! - explicit version, same major and not newer than base: override
//! - explicit version otherwise: base, with a warning
//! - constraint: base, which must satisfy it
//!
//! Version strings are parsed leniently: a leading `v` is accepted and a
//! missing minor or patch component is read as `0`.

use crate::context::MutationContext;
use crate::error::MutatorError;
use cpm_model::constants::LABEL_WORKER_POOL;
use cpm_model::{Cluster, OperatingSystemConfig};
use semver::{Version, VersionReq};

/// Version resolution errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionError {
    /// Cluster version is not a semantic version
    #[error("invalid cluster version '{version}': {reason}")]
    InvalidBaseVersion {
        /// Declared version
        version: String,
        /// Parser message
        reason: String,
    },

    /// Worker pool override is neither a version nor a constraint
    #[error("invalid version override '{value}' of worker pool '{pool}': {reason}")]
    InvalidOverride {
        /// Worker pool name
        pool: String,
        /// Declared override
        value: String,
        /// Parser message
        reason: String,
    },

    /// Cluster version does not satisfy the worker pool constraint
    #[error("cluster version {base} does not satisfy constraint '{constraint}' of worker pool '{pool}'")]
    UnsatisfiedConstraint {
        /// Worker pool name
        pool: String,
        /// Declared constraint
        constraint: String,
        /// Cluster version
        base: Version,
    },
}

/// Worker pool override, classified
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionOverride {
    /// Concrete version
    Explicit(Version),
    /// Version range
    Constraint(VersionReq),
}

impl VersionOverride {
    /// Classify and parse an override string
    ///
    /// Anything containing a comparison operator, a wildcard or a comma is
    /// a constraint; everything else must be a version.
    ///
    /// # Errors
    /// Returns the parser message if the string is neither
    pub fn parse(value: &str) -> Result<Self, String> {
        let value = value.trim();
        if is_constraint(value) {
            VersionReq::parse(value)
                .map(Self::Constraint)
                .map_err(|e| e.to_string())
        } else {
            parse_lenient(value)
                .map(Self::Explicit)
                .map_err(|e| e.to_string())
        }
    }
}

fn is_constraint(value: &str) -> bool {
    value.contains(['~', '^', '=', '<', '>', '*', ',', ' '])
        || value
            .split('.')
            .any(|part| part.eq_ignore_ascii_case("x"))
}

/// Parse a version, accepting `v1.27`, `1.27` and `1` forms
///
/// # Errors
/// Returns error if the string is not a version even after completion
pub fn parse_lenient(input: &str) -> Result<Version, semver::Error> {
    let trimmed = input.trim();
    let s = trimmed
        .strip_prefix(|c| c == 'v' || c == 'V')
        .unwrap_or(trimmed);
    let core_end = s.find(['-', '+']).unwrap_or(s.len());
    let (core, suffix) = s.split_at(core_end);

    match core.matches('.').count() {
        0 => Version::parse(&format!("{core}.0.0{suffix}")),
        1 => Version::parse(&format!("{core}.0{suffix}")),
        _ => Version::parse(s),
    }
}

/// Combine the cluster version with the override of the given worker pool
///
/// Pure function of its inputs. A pool name that does not match any worker
/// pool, or a pool without override, yields the base version.
///
/// # Errors
/// Returns error if the base version or the override cannot be parsed, or
/// if the base version violates the pool's constraint
pub fn effective_version(cluster: &Cluster, pool: Option<&str>) -> Result<Version, ResolutionError> {
    let declared = &cluster.kubernetes.version;
    let base = parse_lenient(declared).map_err(|e| ResolutionError::InvalidBaseVersion {
        version: declared.clone(),
        reason: e.to_string(),
    })?;

    let Some(pool) = pool.and_then(|name| cluster.worker_pool(name)) else {
        return Ok(base);
    };
    let Some(value) = pool.version_override() else {
        return Ok(base);
    };

    let parsed = VersionOverride::parse(value).map_err(|reason| ResolutionError::InvalidOverride {
        pool: pool.name.clone(),
        value: value.to_string(),
        reason,
    })?;

    match parsed {
        VersionOverride::Explicit(version) => {
            if version.major == base.major && version <= base {
                Ok(version)
            } else {
                tracing::warn!(
                    pool = %pool.name,
                    requested = %version,
                    base = %base,
                    "Worker pool version override is not compatible with the cluster version, using cluster version"
                );
                Ok(base)
            }
        }
        VersionOverride::Constraint(req) => {
            if req.matches(&base) {
                Ok(base)
            } else {
                Err(ResolutionError::UnsatisfiedConstraint {
                    pool: pool.name.clone(),
                    constraint: value.to_string(),
                    base,
                })
            }
        }
    }
}

/// Effective kubelet version for an operating system config
///
/// Reads the worker pool label of `osc` and the cluster of the context's
/// namespace.
///
/// # Errors
/// Returns [`MutatorError::Cluster`] if the cluster cannot be fetched and
/// [`MutatorError::Resolution`] if the version cannot be determined
pub async fn resolve(
    ctx: &MutationContext,
    osc: &OperatingSystemConfig,
) -> Result<Version, MutatorError> {
    let pool = osc.metadata.label(LABEL_WORKER_POOL);
    let cluster = ctx.cluster().await?;
    let version = effective_version(cluster, pool)?;
    tracing::debug!(
        cluster = %cluster.name,
        pool = pool.unwrap_or_default(),
        version = %version,
        "Resolved effective kubelet version"
    );
    Ok(version)
}
