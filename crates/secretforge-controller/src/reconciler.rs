//! One reconciliation of a tracked resource.
//!
//! Stages run in a fixed order, each feeding the next:
//! credentials, references, derivation, apply, cleanup. The first failure
//! short-circuits to the status write, which always runs once.

use std::sync::Arc;
use std::time::Duration;

use secretforge_core::{DerivedSecret, ObjectKey, ProvenanceIdentity};
use secretforge_engine::DerivationEngine;
use secretforge_storage::{ClientProvider, DynStore};
use tracing::{Instrument, debug, info, info_span, warn};

use crate::apply::apply_payload;
use crate::credentials::{select_credentials, writer_client};
use crate::error::{ReconcileError, ReconcileResult};
use crate::gc::collect_orphans;
use crate::resolver::resolve_references;
use crate::status;

/// Delay before a failed reconciliation is retried.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// What the runtime should do with a key after reconciling it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Reconcile again after the delay.
    Requeue(Duration),
    /// Wait for the next relevant watch event.
    AwaitChange,
}

#[derive(Debug, Clone)]
pub struct ReconcilerSettings {
    pub retry_delay: Duration,
    /// Secret type used when `spec.targetType` is empty.
    pub default_target_type: String,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            retry_delay: DEFAULT_RETRY_DELAY,
            default_target_type: secretforge_core::DEFAULT_SECRET_TYPE.to_string(),
        }
    }
}

/// Runs the pipeline against a store.
#[derive(Clone)]
pub struct Reconciler {
    provider: Arc<dyn ClientProvider>,
    engine: DerivationEngine,
    settings: ReconcilerSettings,
}

impl Reconciler {
    pub fn new(
        provider: Arc<dyn ClientProvider>,
        engine: DerivationEngine,
        settings: ReconcilerSettings,
    ) -> Self {
        Self {
            provider,
            engine,
            settings,
        }
    }

    pub fn settings(&self) -> &ReconcilerSettings {
        &self.settings
    }

    /// Client with the controller's own credentials.
    pub fn store(&self) -> DynStore {
        self.provider.ambient()
    }

    /// Reconciles the derived secret at `key`.
    ///
    /// Returns the error of the pipeline, or of the status write when that
    /// fails. A resource that no longer exists is not an error.
    pub async fn reconcile(&self, key: &ObjectKey) -> ReconcileResult<Action> {
        let span = info_span!("reconcile", derived_secret = %key);
        self.reconcile_inner(key).instrument(span).await
    }

    async fn reconcile_inner(&self, key: &ObjectKey) -> ReconcileResult<Action> {
        let store = self.provider.ambient();
        let fetched = store
            .get_derived_secret(key)
            .await
            .map_err(|source| ReconcileError::Fetch {
                key: key.clone(),
                source,
            })?;
        let Some(mut derived) = fetched else {
            debug!("Derived secret no longer exists");
            return Ok(Action::AwaitChange);
        };

        status::mark_attempt(&mut derived);
        let outcome = self.run_pipeline(&derived).await;
        if let Err(e) = &outcome {
            warn!(error = %e, kind = ?e.kind(), "Reconciliation failed");
        }

        status::synchronize(&store, derived, &outcome).await?;
        outcome.map(|_| Action::AwaitChange)
    }

    /// Credentials, references, derivation, apply, cleanup. Returns the key
    /// of the generated secret.
    async fn run_pipeline(&self, derived: &DerivedSecret) -> ReconcileResult<ObjectKey> {
        let credentials = select_credentials(derived)?;
        let writer = writer_client(self.provider.as_ref(), &credentials)?;

        let ambient = self.provider.ambient();
        let references = resolve_references(ambient.as_ref(), derived).await?;
        let payload = self.engine.derive(&derived.spec, &references)?;

        let target = derived.target_key();
        let target_type = derived.target_type(&self.settings.default_target_type);
        let applied = apply_payload(&writer, derived, &target, &target_type, &payload).await?;

        let owner = ProvenanceIdentity::of(derived);
        let report = collect_orphans(&writer, &owner, &applied.key).await;
        if !report.failed.is_empty() || report.list_failed {
            debug!(failed = report.failed.len(), "Cleanup left secrets behind");
        }

        info!(
            secret = %applied.key,
            operation = ?applied.operation,
            orphans_deleted = report.deleted.len(),
            "Reconciled"
        );
        Ok(applied.key)
    }

    /// Scheduling decision for a failed reconciliation of `key`.
    pub fn error_policy(&self, key: &ObjectKey, error: &ReconcileError) -> Action {
        debug!(
            derived_secret = %key,
            error = %error,
            transient = error.is_transient(),
            retry_in = ?self.settings.retry_delay,
            "Scheduling retry"
        );
        Action::Requeue(self.settings.retry_delay)
    }
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("engine", &self.engine)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
