//! Reference resolution.

use std::collections::HashSet;

use secretforge_core::{DerivedSecret, ObjectKey, Reference, SourceKind, SourceSelection};
use secretforge_engine::ResolvedReferences;
use secretforge_storage::ObjectStore;
use tracing::debug;

use crate::error::{ReconcileError, ReconcileResult};

/// Checks names are unique and each reference has exactly one source.
pub fn validate_references(references: &[Reference]) -> ReconcileResult<()> {
    let mut seen = HashSet::new();
    for reference in references {
        if !seen.insert(reference.name.as_str()) {
            return Err(ReconcileError::DuplicateReference(reference.name.clone()));
        }
    }
    for reference in references {
        match reference.selection() {
            SourceSelection::One(..) => {}
            SourceSelection::Missing => {
                return Err(ReconcileError::MissingSource(reference.name.clone()));
            }
            SourceSelection::Ambiguous => {
                return Err(ReconcileError::AmbiguousSource(reference.name.clone()));
            }
        }
    }
    Ok(())
}

/// Fetches every declared source from the tracked resource's namespace.
///
/// Validation runs before the first fetch. Missing optional sources are left
/// out of the result; missing required ones fail.
pub async fn resolve_references(
    store: &dyn ObjectStore,
    derived: &DerivedSecret,
) -> ReconcileResult<ResolvedReferences> {
    validate_references(&derived.spec.references)?;

    let namespace = &derived.metadata.namespace;
    let mut resolved = ResolvedReferences::new();

    for reference in &derived.spec.references {
        let SourceSelection::One(kind, selector) = reference.selection() else {
            continue;
        };
        let key = ObjectKey::new(namespace, &selector.name);
        let fetch_error = |source| ReconcileError::ReferenceFetch {
            reference: reference.name.clone(),
            kind,
            name: selector.name.clone(),
            source,
        };

        let found = match kind {
            SourceKind::ConfigMap => match store.get_config_map(&key).await.map_err(fetch_error)? {
                Some(config_map) => {
                    resolved.config_maps.insert(reference.name.clone(), config_map);
                    true
                }
                None => false,
            },
            SourceKind::Secret => match store.get_secret(&key).await.map_err(fetch_error)? {
                Some(secret) => {
                    resolved.secrets.insert(reference.name.clone(), secret);
                    true
                }
                None => false,
            },
        };

        if !found {
            if selector.is_optional() {
                debug!(
                    reference = %reference.name,
                    %kind,
                    source = %key,
                    "Optional reference not found, skipping"
                );
                continue;
            }
            return Err(ReconcileError::ReferenceNotFound {
                reference: reference.name.clone(),
                kind,
                name: selector.name.clone(),
            });
        }
    }

    Ok(resolved)
}
