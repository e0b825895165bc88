//! Choice of the client generated secrets are written with.

use secretforge_core::DerivedSecret;
use secretforge_storage::{ClientProvider, DynStore, Identity};
use tracing::debug;

use crate::error::{ReconcileError, ReconcileResult};

/// Credentials used for every write of one reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriterCredentials {
    /// The controller's own identity; target is in the resource's namespace.
    Ambient,
    /// The declared writer identity of a cross-namespace target.
    Impersonated(Identity),
}

/// Decides which credentials writes must use. Makes no requests.
pub fn select_credentials(derived: &DerivedSecret) -> ReconcileResult<WriterCredentials> {
    if !derived.is_cross_namespace() {
        return Ok(WriterCredentials::Ambient);
    }
    match derived.spec.writer_identity.as_deref() {
        Some(name) if !name.is_empty() => Ok(WriterCredentials::Impersonated(
            Identity::service_account(&derived.metadata.namespace, name),
        )),
        _ => Err(ReconcileError::MissingWriterIdentity {
            namespace: derived.metadata.namespace.clone(),
            target_namespace: derived.target_key().namespace,
        }),
    }
}

/// Builds the client for the selected credentials.
pub fn writer_client(
    provider: &dyn ClientProvider,
    credentials: &WriterCredentials,
) -> ReconcileResult<DynStore> {
    match credentials {
        WriterCredentials::Ambient => Ok(provider.ambient()),
        WriterCredentials::Impersonated(identity) => {
            debug!(identity = %identity, "Impersonating writer identity");
            provider
                .impersonate(identity)
                .map_err(|source| ReconcileError::Impersonation {
                    identity: identity.username(),
                    source,
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secretforge_core::{DerivedSecretSpec, ObjectMeta};
    use secretforge_store_memory::InMemoryStore;

    fn derived(target_namespace: Option<&str>, writer: Option<&str>) -> DerivedSecret {
        DerivedSecret::new(
            ObjectMeta::new("team-a", "ds"),
            DerivedSecretSpec {
                target_namespace: target_namespace.map(str::to_string),
                writer_identity: writer.map(str::to_string),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_same_namespace_uses_ambient() {
        assert_eq!(
            select_credentials(&derived(None, None)).unwrap(),
            WriterCredentials::Ambient
        );
        assert_eq!(
            select_credentials(&derived(Some("team-a"), Some("ignored"))).unwrap(),
            WriterCredentials::Ambient
        );
    }

    #[test]
    fn test_cross_namespace_requires_writer_identity() {
        let err = select_credentials(&derived(Some("team-b"), None)).unwrap_err();
        assert!(matches!(err, ReconcileError::MissingWriterIdentity { .. }));
        let err = select_credentials(&derived(Some("team-b"), Some(""))).unwrap_err();
        assert!(matches!(err, ReconcileError::MissingWriterIdentity { .. }));
    }

    #[test]
    fn test_cross_namespace_impersonates_in_source_namespace() {
        let credentials = select_credentials(&derived(Some("team-b"), Some("writer"))).unwrap();
        let expected = Identity::service_account("team-a", "writer");
        assert_eq!(credentials, WriterCredentials::Impersonated(expected.clone()));

        let store = InMemoryStore::new();
        let client = writer_client(&store, &credentials).unwrap();
        assert_eq!(client.acting_as(), Some(&expected));
        let ambient = writer_client(&store, &WriterCredentials::Ambient).unwrap();
        assert!(ambient.acting_as().is_none());
    }
}
