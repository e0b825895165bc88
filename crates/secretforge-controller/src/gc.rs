//! Cleanup of secrets left behind by earlier targets of the same resource.

use secretforge_core::{ObjectKey, ProvenanceIdentity, Resource};
use secretforge_storage::DynStore;
use tracing::{info, warn};

/// What a cleanup pass removed. Failures are logged, never returned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub deleted: Vec<ObjectKey>,
    pub failed: Vec<ObjectKey>,
    pub list_failed: bool,
}

/// Deletes every secret visible to `client` that was produced by `owner`,
/// except `current`.
pub async fn collect_orphans(
    client: &DynStore,
    owner: &ProvenanceIdentity,
    current: &ObjectKey,
) -> CleanupReport {
    let mut report = CleanupReport::default();

    let secrets = match client.list_secrets(None).await {
        Ok(secrets) => secrets,
        Err(e) => {
            warn!(owner = %owner, error = %e, "Failed to list secrets for cleanup");
            report.list_failed = true;
            return report;
        }
    };

    let orphans = secrets.into_iter().filter(|secret| {
        secret.key() != *current
            && ProvenanceIdentity::of_artifact(secret).as_ref() == Some(owner)
    });

    for orphan in orphans {
        let key = orphan.key();
        match client.delete_secret(&key).await {
            Ok(()) => {
                info!(secret = %key, owner = %owner, "Deleted orphaned secret");
                report.deleted.push(key);
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => {
                warn!(secret = %key, owner = %owner, error = %e, "Failed to delete orphaned secret");
                report.failed.push(key);
            }
        }
    }

    report
}
