//! Structured log events shared by the dispatcher

use cpm_model::{ObjectKind, ObjectMeta};

/// Log that an object is handed to the ensurer
pub fn log_mutation(kind: ObjectKind, metadata: &ObjectMeta) {
    tracing::info!(
        kind = %kind,
        namespace = %metadata.namespace,
        name = %metadata.name,
        "Mutating resource"
    );
}
