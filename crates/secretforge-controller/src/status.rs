//! Status bookkeeping of tracked resources.

use secretforge_core::{DerivedSecret, ObjectKey, Resource, now};
use secretforge_storage::DynStore;
use tracing::debug;

use crate::error::{ReconcileError, ReconcileResult};

/// Stamps the attempt time. Runs before the pipeline.
pub fn mark_attempt(derived: &mut DerivedSecret) {
    derived.status.last_sync_attempt = Some(now());
}

/// Records the pipeline outcome in `derived.status`.
///
/// Success clears the error and stamps `lastSync`; failure stores the error
/// message and leaves the previous success time alone.
pub fn record_outcome(derived: &mut DerivedSecret, outcome: &ReconcileResult<ObjectKey>) {
    let status = &mut derived.status;
    match outcome {
        Ok(artifact) => {
            status.artifact_name = Some(artifact.name.clone());
            status.artifact_namespace = Some(artifact.namespace.clone());
            status.error.clear();
            status.last_sync = Some(now());
        }
        Err(err) => {
            status.error = err.to_string();
        }
    }
}

/// Records `outcome` and writes the status. A failed write is returned as the
/// reconciliation's error.
pub async fn synchronize(
    store: &DynStore,
    mut derived: DerivedSecret,
    outcome: &ReconcileResult<ObjectKey>,
) -> ReconcileResult<DerivedSecret> {
    record_outcome(&mut derived, outcome);
    let key = derived.key();
    let stored = store
        .update_derived_secret_status(&derived)
        .await
        .map_err(|source| ReconcileError::StatusUpdate {
            key: key.clone(),
            source,
        })?;
    debug!(derived_secret = %key, error = %stored.status.error, "Status updated");
    Ok(stored)
}
